//! Progress reporting for long transfers.

/// Progress update callbacks for long-running transfers.
pub trait ProgressCallbacks {
    /// Called once before the transfer starts, with the total number of bytes.
    fn init(&mut self, total: usize);
    /// Called with the number of bytes transferred so far.
    fn update(&mut self, current: usize);
    /// Called once the transfer has ended, whether or not it completed.
    fn finish(&mut self);
}
