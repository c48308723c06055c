use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlatformError>;

#[derive(Debug, Error)]
pub enum PlatformError {
    /// The host refused to create a thread. Fatal for the caller; there is no
    /// retry policy at this layer.
    #[error("host thread could not be created: {0}")]
    ResourceUnavailable(#[source] io::Error),

    /// The handle refers to a slot that has been freed (or never existed).
    /// This is the detectable form of what would otherwise be a
    /// use-after-free on a raw pointer handle.
    #[error("stale {kind} handle (slot {index}, generation {generation})")]
    StaleHandle {
        kind: &'static str,
        index: u32,
        generation: u32,
    },

    /// `thread_wait` was called a second time on the same handle.
    #[error("thread was already waited on")]
    AlreadyWaited,

    /// The thread's closure panicked instead of returning.
    #[error("thread closure panicked")]
    ThreadPanicked,
}
