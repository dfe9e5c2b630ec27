use crate::models::{Category, Learner};

/// Holds the two in-progress category batches and emits them as they fill.
/// Owned exclusively by the pipeline loop; one run, one accumulator.
pub struct BatchAccumulator {
    inactive: Vec<Learner>,
    low_score: Vec<Learner>,
    limit: usize,
}

impl BatchAccumulator {
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "batch limit must be positive");
        Self {
            inactive: Vec::new(),
            low_score: Vec::new(),
            limit,
        }
    }

    /// Append a classified learner, then check both in-flight batches against
    /// the limit (inactive first). Each full batch is moved out and its slot
    /// reset to empty before the next record is seen.
    pub fn append(
        &mut self,
        learner: Learner,
        category: Category,
    ) -> Vec<(Category, Vec<Learner>)> {
        match category {
            Category::Inactive => self.inactive.push(learner),
            Category::LowScore => self.low_score.push(learner),
        }

        let mut emitted = Vec::new();
        if self.inactive.len() >= self.limit {
            emitted.push((Category::Inactive, std::mem::take(&mut self.inactive)));
        }
        if self.low_score.len() >= self.limit {
            emitted.push((Category::LowScore, std::mem::take(&mut self.low_score)));
        }
        emitted
    }

    /// End-of-stream flush: any non-empty inactive batch first, then any
    /// non-empty low-score batch. Empty batches are never emitted.
    pub fn finish(self) -> Vec<(Category, Vec<Learner>)> {
        let mut emitted = Vec::new();
        if !self.inactive.is_empty() {
            emitted.push((Category::Inactive, self.inactive));
        }
        if !self.low_score.is_empty() {
            emitted.push((Category::LowScore, self.low_score));
        }
        emitted
    }
}
