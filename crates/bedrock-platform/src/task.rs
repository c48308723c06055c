use std::fmt;

/// A single-ownership box around one deferred computation.
///
/// A `TaskBox` crosses the boundary between the emulation core and the host
/// exactly once: the creator packages the work, hands the box off (moves it,
/// never aliases it), and the receiver either invokes it or drops it. Both
/// paths release the underlying closure exactly once; invoking consumes the
/// box, so a second invocation is unrepresentable.
pub struct TaskBox {
    work: Box<dyn FnOnce() + Send + 'static>,
}

impl TaskBox {
    pub fn new(work: impl FnOnce() + Send + 'static) -> Self {
        Self {
            work: Box::new(work),
        }
    }

    /// Runs the deferred computation, consuming the box.
    pub fn invoke(self) {
        (self.work)();
    }

    /// Releases the box without running it (the cancellation path).
    pub fn cancel(self) {}
}

impl fmt::Debug for TaskBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TaskBox")
    }
}
