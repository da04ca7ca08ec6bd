mod command;
mod executor;
mod handle;
mod metrics;
mod pending;
mod replica;

use std::{fmt, num::NonZeroUsize, thread};

use log::info;

pub use handle::Device;
pub use metrics::DeviceMetrics;
pub use pending::Pending;
pub use replica::Replica;

use crate::Result;

/// The index of a device, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device {}", self.0)
    }
}

/// Starts `count` devices with ids `0..count`.
pub fn enumerate(count: NonZeroUsize) -> Result<Vec<Device>> {
    let devices = (0..count.get())
        .map(|i| Device::spawn(DeviceId(i)))
        .collect::<Result<Vec<_>>>()?;

    info!("started {} devices", devices.len());
    Ok(devices)
}

/// The amount of devices this machine can run in parallel.
pub fn available() -> NonZeroUsize {
    thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DpErr;

    #[tokio::test]
    async fn commands_without_replica_fail() {
        let devices = enumerate(NonZeroUsize::MIN).unwrap();

        let err = devices[0].pull_params().await.unwrap_err();
        assert!(matches!(err, DpErr::NoReplica(DeviceId(0))));
    }

    #[test]
    fn pending_can_be_waited_on_synchronously() {
        let devices = enumerate(NonZeroUsize::MIN).unwrap();
        assert!(devices[0].pull_grad(0..1).wait().is_err());
        assert_eq!(devices[0].metrics().commands, 1);
    }

    #[test]
    fn ids_follow_enumeration_order() {
        let count = NonZeroUsize::new(3).unwrap();
        let ids: Vec<_> = enumerate(count).unwrap().iter().map(Device::id).collect();
        assert_eq!(ids, [DeviceId(0), DeviceId(1), DeviceId(2)]);
    }
}
