use std::time::Instant;

use futures::future;
use log::{debug, info};
use machine_learning::{
    arch::{Model, ParamTensor, loss::LossFn},
    dataset::Dataset,
    optimization::Optimizer,
};
use ndarray::ArrayView2;
use rand::Rng;

use crate::{
    DpErr, Result,
    all_reduce::all_reduce,
    device::{Device, DeviceMetrics, Replica},
    partition::{Shard, partition},
    stats::{EpochStats, StepStats},
};

/// Trains one model replicated across several devices, splitting every batch between them.
pub struct DataParallelTrainer {
    devices: Vec<Device>,
    home: usize,
    layout: Vec<ParamTensor>,
}

impl DataParallelTrainer {
    /// Installs a replica of the model on every device.
    ///
    /// # Arguments
    /// * `devices` - The devices to train on, their count is fixed for the whole run.
    /// * `home` - The index of the device gradients are reduced on.
    /// * `model` - The architecture, cloned for every device.
    /// * `params` - The initial parameters, copied to every device.
    /// * `loss_fn` - The loss to minimize, cloned for every device.
    /// * `optimizer` - Builds one optimizer per device.
    pub async fn new<M, L, F>(
        devices: Vec<Device>,
        home: usize,
        model: M,
        params: Vec<f32>,
        loss_fn: L,
        mut optimizer: F,
    ) -> Result<Self>
    where
        M: Model + Clone + 'static,
        L: LossFn + Clone + 'static,
        F: FnMut() -> Box<dyn Optimizer>,
    {
        if devices.is_empty() {
            return Err(DpErr::NoDevices);
        }

        if home >= devices.len() {
            return Err(DpErr::InvalidHome {
                home,
                devices: devices.len(),
            });
        }

        let layout = model.layout();

        let installs = devices
            .iter()
            .map(|device| -> Result<_> {
                let replica = Replica::new(
                    Box::new(model.clone()),
                    Box::new(loss_fn.clone()),
                    optimizer(),
                    params.clone(),
                )?;
                Ok(device.install(replica))
            })
            .collect::<Result<Vec<_>>>()?;

        future::try_join_all(installs).await?;
        info!(
            "installed {} parameters on {} devices, reducing on device {home}",
            params.len(),
            devices.len()
        );

        Ok(Self {
            devices,
            home,
            layout,
        })
    }

    /// The amount of devices, every batch must be a multiple of it.
    pub fn replicas(&self) -> usize {
        self.devices.len()
    }

    pub fn layout(&self) -> &[ParamTensor] {
        &self.layout
    }

    /// Runs one data parallel step over a batch.
    ///
    /// The batch is partitioned across the devices, each computes the gradient of its shard,
    /// the gradients are all-reduced and every replica applies the same update.
    ///
    /// # Returns
    /// The stats of the whole batch, or `IndivisibleBatch` if it can't be split evenly.
    pub async fn step(&self, x: ArrayView2<'_, f32>, y: ArrayView2<'_, f32>) -> Result<StepStats> {
        let batch_size = x.nrows();
        let shards = partition(x, y, self.devices.len())?;

        let passes = self
            .devices
            .iter()
            .zip(shards)
            .map(|(device, shard)| device.forward_backward(shard));
        let stats = future::try_join_all(passes).await?;

        all_reduce(&self.devices, self.home, &self.layout).await?;

        let updates = self.devices.iter().map(|device| device.update(batch_size));
        future::try_join_all(updates).await?;

        Ok(stats.into_iter().sum())
    }

    /// Shuffles the dataset and runs a step per batch.
    ///
    /// # Arguments
    /// * `dataset` - The training samples.
    /// * `batch_size` - The samples per step, must be a multiple of the amount of devices.
    /// * `drop_last` - Whether to skip a trailing batch smaller than `batch_size`.
    /// * `rng` - The shuffling source.
    pub async fn train_epoch<R: Rng + ?Sized>(
        &self,
        dataset: &mut Dataset,
        batch_size: usize,
        drop_last: bool,
        rng: &mut R,
    ) -> Result<EpochStats> {
        let start = Instant::now();
        dataset.shuffle(rng);

        let nbatches = dataset.num_batches(batch_size, drop_last);
        let log_every = (nbatches / 10).max(1);
        let mut total = StepStats::default();

        for (i, batch) in dataset.batches(batch_size, drop_last).enumerate() {
            let stats = self.step(batch.x.view(), batch.y.view()).await?;
            total += stats;

            if (i + 1).is_multiple_of(log_every) {
                debug!(
                    "batch {}/{nbatches}: loss {:.4}",
                    i + 1,
                    stats.loss / stats.samples.max(1) as f32
                );
            }
        }

        Ok(EpochStats::new(total, start.elapsed()))
    }

    /// Computes the loss and accuracy over a dataset on the home device, leaving its
    /// gradients untouched.
    pub async fn evaluate(&self, dataset: &Dataset, batch_size: usize) -> Result<EpochStats> {
        let start = Instant::now();
        let home = &self.devices[self.home];

        let mut total = StepStats::default();

        // one batch in flight at a time
        for batch in dataset.batches(batch_size, false) {
            total += home.evaluate(Shard { x: batch.x, y: batch.y }).await?;
        }

        Ok(EpochStats::new(total, start.elapsed()))
    }

    /// Copies the home replica's parameters to the host.
    pub async fn params(&self) -> Result<Vec<f32>> {
        self.devices[self.home].pull_params().await
    }

    /// Checks every replica holds bitwise identical parameters.
    pub async fn replicas_in_sync(&self) -> Result<bool> {
        let pulls = self.devices.iter().map(Device::pull_params);
        let replicas = future::try_join_all(pulls).await?;

        let bits = |params: &[f32]| params.iter().map(|p| p.to_bits()).collect::<Vec<_>>();
        let reference = bits(&replicas[self.home]);

        Ok(replicas.iter().all(|params| bits(params) == reference))
    }

    pub fn metrics(&self) -> Vec<DeviceMetrics> {
        self.devices.iter().map(Device::metrics).collect()
    }
}
