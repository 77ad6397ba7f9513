/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each row is handled, in completion order.
    fn row_done(&self, current: usize, total: usize, url: &str);
    /// Called once the stage has finished.
    fn done(&self, summary: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn row_done(&self, _current: usize, _total: usize, _url: &str) {}
    fn done(&self, _summary: &str) {}
}
