use std::ops::Range;

use tokio::sync::oneshot;

use super::Replica;
use crate::{Result, partition::Shard, stats::StepStats};

pub(super) type Reply<T> = oneshot::Sender<Result<T>>;

/// The work a device's executor can be asked to do.
pub(super) enum Command {
    Install(Box<Replica>, Reply<()>),
    ForwardBackward(Shard, Reply<StepStats>),
    Evaluate(Shard, Reply<StepStats>),
    PullGrad(Range<usize>, Reply<Vec<f32>>),
    AccumulateGrad(Range<usize>, Vec<f32>, Reply<()>),
    WriteGrad(Range<usize>, Vec<f32>, Reply<()>),
    Update(usize, Reply<()>),
    PullParams(Reply<Vec<f32>>),
}

impl Command {
    pub(super) fn name(&self) -> &'static str {
        match self {
            Command::Install(..) => "install",
            Command::ForwardBackward(..) => "forward_backward",
            Command::Evaluate(..) => "evaluate",
            Command::PullGrad(..) => "pull_grad",
            Command::AccumulateGrad(..) => "accumulate_grad",
            Command::WriteGrad(..) => "write_grad",
            Command::Update(..) => "update",
            Command::PullParams(..) => "pull_params",
        }
    }
}
