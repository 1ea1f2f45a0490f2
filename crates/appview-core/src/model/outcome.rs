use crate::errors::ExError;

/// One item that could not be written
#[derive(Debug, Clone)]
pub struct BatchFailure<T> {
    pub item: T,
    pub error: ExError,
    /// Position of `item` in the caller's input, independent of chunking
    pub index: usize,
}

/// Aggregate result of a batch write
///
/// `success_count + failure_count == total_count`, and `failures` is
/// ordered by `index`.
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    pub success_count: usize,
    pub failure_count: usize,
    pub total_count: usize,
    pub failures: Vec<BatchFailure<T>>,
    pub duration_ms: u64,
}

impl<T> BatchOutcome<T> {
    pub fn empty(total_count: usize) -> Self {
        Self {
            success_count: 0,
            failure_count: 0,
            total_count,
            failures: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Items processed so far, successes and failures together
    pub fn processed(&self) -> usize {
        self.success_count + self.failure_count
    }

    pub fn record_successes(&mut self, count: usize) {
        self.success_count += count;
    }

    pub fn record_failure(&mut self, failure: BatchFailure<T>) {
        self.failure_count += 1;
        self.failures.push(failure);
    }

    pub fn is_complete_success(&self) -> bool {
        self.failure_count == 0 && self.success_count == self.total_count
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }
}
