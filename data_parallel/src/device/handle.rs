use std::{ops::Range, sync::Arc, thread};

use log::warn;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use super::{
    DeviceId, DeviceMetrics, Pending, Replica,
    command::{Command, Reply},
    executor,
};
use crate::{Result, partition::Shard, stats::StepStats};

/// A handle to a compute device: a dedicated executor thread fed by a FIFO command queue.
///
/// Every method enqueues a command and returns immediately with a `Pending` for its result.
/// Commands issued to the same device run in issue order, different devices run concurrently.
pub struct Device {
    id: DeviceId,
    tx: Option<mpsc::UnboundedSender<Command>>,
    thread: Option<thread::JoinHandle<()>>,
    metrics: Arc<Mutex<DeviceMetrics>>,
}

impl Device {
    /// Starts a new device and its executor thread.
    pub fn spawn(id: DeviceId) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(Mutex::new(DeviceMetrics::default()));

        let thread = thread::Builder::new()
            .name(format!("device-{}", id.0))
            .spawn({
                let metrics = metrics.clone();
                move || executor::run(id, rx, metrics)
            })?;

        Ok(Self {
            id,
            tx: Some(tx),
            thread: Some(thread),
            metrics,
        })
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// A snapshot of the executor's counters.
    pub fn metrics(&self) -> DeviceMetrics {
        self.metrics.lock().clone()
    }

    /// Installs the replica every following command operates on.
    pub fn install(&self, replica: Replica) -> Pending<()> {
        self.submit(|reply| Command::Install(Box::new(replica), reply))
    }

    /// Runs forward and backward on the shard, leaving the gradient on the device.
    pub fn forward_backward(&self, shard: Shard) -> Pending<StepStats> {
        self.submit(|reply| Command::ForwardBackward(shard, reply))
    }

    /// Runs forward only on the shard.
    pub fn evaluate(&self, shard: Shard) -> Pending<StepStats> {
        self.submit(|reply| Command::Evaluate(shard, reply))
    }

    /// Copies a range of the gradient buffer to the host.
    pub fn pull_grad(&self, range: Range<usize>) -> Pending<Vec<f32>> {
        self.submit(|reply| Command::PullGrad(range, reply))
    }

    /// Adds host values into a range of the gradient buffer.
    pub fn accumulate_grad(&self, range: Range<usize>, values: Vec<f32>) -> Pending<()> {
        self.submit(|reply| Command::AccumulateGrad(range, values, reply))
    }

    /// Overwrites a range of the gradient buffer with host values.
    pub fn write_grad(&self, range: Range<usize>, values: Vec<f32>) -> Pending<()> {
        self.submit(|reply| Command::WriteGrad(range, values, reply))
    }

    /// Applies the gradient buffer, summed over `batch_size` samples, to the replica.
    pub fn update(&self, batch_size: usize) -> Pending<()> {
        self.submit(|reply| Command::Update(batch_size, reply))
    }

    /// Copies the replica's parameters to the host.
    pub fn pull_params(&self) -> Pending<Vec<f32>> {
        self.submit(Command::PullParams)
    }

    fn submit<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Pending<T> {
        let (reply, rx) = oneshot::channel();

        // A failed send drops the reply along with the command, which the
        // `Pending` reports as `DeviceGone`.
        if let Some(tx) = &self.tx {
            let _ = tx.send(command(reply));
        }

        Pending::new(self.id, rx)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.tx.take();

        if let Some(Err(_)) = self.thread.take().map(thread::JoinHandle::join) {
            warn!("{} executor panicked", self.id);
        }
    }
}
