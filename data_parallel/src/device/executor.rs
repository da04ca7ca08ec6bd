use std::{sync::Arc, time::Instant};

use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{
    DeviceId, DeviceMetrics, Replica,
    command::{Command, Reply},
};
use crate::{DpErr, Result};

/// The state owned by a device's thread.
struct Executor {
    id: DeviceId,
    replica: Option<Box<Replica>>,
    metrics: Arc<Mutex<DeviceMetrics>>,
}

/// The body of a device's thread: runs commands one at a time, in the order they were issued,
/// until every handle to the queue is dropped.
pub(super) fn run(
    id: DeviceId,
    mut rx: mpsc::UnboundedReceiver<Command>,
    metrics: Arc<Mutex<DeviceMetrics>>,
) {
    let mut executor = Executor {
        id,
        replica: None,
        metrics,
    };
    debug!("{id} ready");

    while let Some(command) = rx.blocking_recv() {
        executor.execute(command);
    }

    debug!("{id} shutting down");
}

impl Executor {
    fn execute(&mut self, command: Command) {
        let name = command.name();
        let start = Instant::now();

        match command {
            Command::Install(replica, reply) => {
                self.replica = Some(replica);
                self.respond(name, start, reply, Ok(()));
            }
            Command::ForwardBackward(shard, reply) => {
                let result = self.with_replica(|r| r.forward_backward(&shard));
                if result.is_ok() {
                    self.metrics.lock().add_step(shard.len());
                }
                self.respond(name, start, reply, result);
            }
            Command::Evaluate(shard, reply) => {
                let result = self.with_replica(|r| r.evaluate(&shard));
                self.respond(name, start, reply, result);
            }
            Command::PullGrad(range, reply) => {
                let result = self.with_replica(|r| r.grad(range).map(<[f32]>::to_vec));
                self.respond(name, start, reply, result);
            }
            Command::AccumulateGrad(range, values, reply) => {
                let result = self.with_replica(|r| r.accumulate_grad(range, &values));
                self.respond(name, start, reply, result);
            }
            Command::WriteGrad(range, values, reply) => {
                let result = self.with_replica(|r| r.write_grad(range, &values));
                self.respond(name, start, reply, result);
            }
            Command::Update(batch_size, reply) => {
                let result = self.with_replica(|r| r.update(batch_size));
                self.respond(name, start, reply, result);
            }
            Command::PullParams(reply) => {
                let result = self.with_replica(|r| Ok(r.params().to_vec()));
                self.respond(name, start, reply, result);
            }
        }
    }

    fn with_replica<T>(&mut self, f: impl FnOnce(&mut Replica) -> Result<T>) -> Result<T> {
        match &mut self.replica {
            Some(replica) => f(replica),
            None => Err(DpErr::NoReplica(self.id)),
        }
    }

    /// Records the command in the metrics before the waiting side can observe its result.
    fn respond<T>(&self, name: &str, start: Instant, reply: Reply<T>, result: Result<T>) {
        let elapsed = start.elapsed();
        self.metrics.lock().record(elapsed);
        debug!(device = self.id.0, micros = elapsed.as_micros() as u64; "ran {name}");

        if let Err(Err(e)) = reply.send(result) {
            warn!("{} failed a command nobody was waiting for: {e}", self.id);
        }
    }
}
