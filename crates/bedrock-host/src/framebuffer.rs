use std::sync::{Arc, Mutex, PoisonError};

/// Publication point for completed frames.
///
/// The emulation thread renders into its own back buffer and publishes the
/// finished frame in one swap; a reader on the UI thread always gets some
/// complete frame and can never observe a half-written one. The swap is a
/// single `Arc` replacement under a short lock, so readers keep whatever
/// frame they grabbed even while newer ones are published.
pub struct FrontBuffer {
    current: Mutex<Arc<[u8]>>,
}

impl FrontBuffer {
    pub fn new(initial: Vec<u8>) -> Self {
        Self {
            current: Mutex::new(initial.into()),
        }
    }

    /// Publishes a completed frame.
    pub fn publish(&self, frame: Vec<u8>) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = frame.into();
    }

    /// The most recently published frame.
    pub fn latest(&self) -> Arc<[u8]> {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }
}
