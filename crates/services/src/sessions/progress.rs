/// Aggregated view of session progress, useful for a progress bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    /// One-based position of the current question; `total` once exhausted.
    pub position: usize,
    pub remaining: usize,
    pub percent: f64,
    pub is_complete: bool,
}

impl SessionProgress {
    #[must_use]
    pub(crate) fn compute(total: usize, index: usize, answered: usize) -> Self {
        let answered = answered.min(total);
        let percent = if total == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let ratio = answered as f64 / total as f64;
            ratio * 100.0
        };
        Self {
            total,
            answered,
            position: (index + 1).min(total),
            remaining: total - answered,
            percent,
            is_complete: total > 0 && answered == total,
        }
    }
}
