use std::time::Duration;

/// Counters kept by a device's executor.
#[derive(Debug, Default, Clone)]
pub struct DeviceMetrics {
    /// Time spent running commands.
    pub busy: Duration,

    pub commands: u64,
    pub steps: u64,
    pub samples: u64,
}

impl DeviceMetrics {
    #[inline]
    pub fn record(&mut self, elapsed: Duration) {
        self.busy += elapsed;
        self.commands += 1;
    }

    #[inline]
    pub fn add_step(&mut self, samples: usize) {
        self.steps += 1;
        self.samples += samples as u64;
    }
}
