use std::{
    iter::Sum,
    ops::{Add, AddAssign},
    time::Duration,
};

/// What a forward pass over some samples produced.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct StepStats {
    /// The loss summed over the samples.
    pub loss: f32,
    pub samples: usize,
    /// The amount of samples whose highest output matched the label.
    pub correct: usize,
}

impl Add for StepStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            loss: self.loss + rhs.loss,
            samples: self.samples + rhs.samples,
            correct: self.correct + rhs.correct,
        }
    }
}

impl AddAssign for StepStats {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for StepStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// The summary of a pass over a whole dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    /// The mean loss per sample.
    pub loss: f32,
    pub accuracy: f32,
    pub samples: usize,
    pub elapsed: Duration,
}

impl EpochStats {
    pub fn new(total: StepStats, elapsed: Duration) -> Self {
        let samples = total.samples.max(1) as f32;

        Self {
            loss: total.loss / samples,
            accuracy: total.correct as f32 / samples,
            samples: total.samples,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_stats_are_per_sample() {
        let total: StepStats = [
            StepStats { loss: 3.0, samples: 2, correct: 1 },
            StepStats { loss: 5.0, samples: 2, correct: 2 },
        ]
        .into_iter()
        .sum();

        let epoch = EpochStats::new(total, Duration::ZERO);
        assert_eq!(epoch.loss, 2.0);
        assert_eq!(epoch.accuracy, 0.75);
        assert_eq!(epoch.samples, 4);
    }
}
