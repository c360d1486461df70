use crossbeam::channel::Sender;

/// Frames consumed so far against the expected total
///
/// `total` starts as the container's frame count, which can be wrong or
/// zero. It is raised whenever `current` would pass it, so
/// `current <= total` holds for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressState {
    current: u64,
    total: u64,
}

impl ProgressState {
    pub fn new(total: u64) -> Self {
        Self { current: 0, total }
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Count one more frame and return the new state
    pub fn advance(&mut self) -> Self {
        self.current += 1;
        self.total = self.total.max(self.current);
        *self
    }
}

/// Notifications for whoever is watching a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Progress { current: u64, total: u64 },
    Finished { success: bool, message: String },
}

/// Receives progress for one run, in order, on the thread doing the work
pub trait ProgressObserver {
    fn on_progress(&mut self, current: u64, total: u64);

    /// Called exactly once per run
    fn on_finished(&mut self, success: bool, message: &str);
}

/// Forwards events over a channel. Sending never blocks on an unbounded
/// channel, and a dropped receiver is ignored.
impl ProgressObserver for Sender<PipelineEvent> {
    fn on_progress(&mut self, current: u64, total: u64) {
        let _ = self.send(PipelineEvent::Progress { current, total });
    }

    fn on_finished(&mut self, success: bool, message: &str) {
        let _ = self.send(PipelineEvent::Finished {
            success,
            message: message.to_string(),
        });
    }
}

/// Records events in memory
impl ProgressObserver for Vec<PipelineEvent> {
    fn on_progress(&mut self, current: u64, total: u64) {
        self.push(PipelineEvent::Progress { current, total });
    }

    fn on_finished(&mut self, success: bool, message: &str) {
        self.push(PipelineEvent::Finished {
            success,
            message: message.to_string(),
        });
    }
}
