/// Progress reporting for batch variant generation
///
/// The batch runner talks to a sink rather than a console so the admin
/// endpoint, background jobs, and tests can each observe progress their own
/// way.

/// Receives progress lines from a batch variant run
pub trait VariantReport: Send {
    /// Total number of items about to be processed
    fn set_progress_total(&mut self, total: usize);

    /// One item finished (successfully or not)
    fn advance_progress(&mut self);

    /// Free-form status line for one item
    fn line(&mut self, message: &str);
}

/// Report sink that forwards everything to the tracing subscriber
#[derive(Debug, Default)]
pub struct TracingReport {
    total: usize,
    done: usize,
}

impl VariantReport for TracingReport {
    fn set_progress_total(&mut self, total: usize) {
        self.total = total;
        self.done = 0;
    }

    fn advance_progress(&mut self) {
        self.done += 1;
    }

    fn line(&mut self, message: &str) {
        tracing::info!("[{}/{}] {}", self.done, self.total, message);
    }
}

/// Report sink that collects lines in memory, for tests
#[derive(Debug, Default)]
pub struct CollectingReport {
    pub total: usize,
    pub advanced: usize,
    pub lines: Vec<String>,
}

impl VariantReport for CollectingReport {
    fn set_progress_total(&mut self, total: usize) {
        self.total = total;
    }

    fn advance_progress(&mut self) {
        self.advanced += 1;
    }

    fn line(&mut self, message: &str) {
        self.lines.push(message.to_string());
    }
}
