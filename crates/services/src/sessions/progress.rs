/// Aggregated view of a running test session, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}
