use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use machine_learning::MlErr;

use crate::device::DeviceId;

/// The data parallel module's result type.
pub type Result<T> = std::result::Result<T, DpErr>;

/// Data parallel training failures.
#[derive(Debug)]
pub enum DpErr {
    /// The batch can't be split evenly across the devices.
    IndivisibleBatch { batch_size: usize, devices: usize },
    NoDevices,
    InvalidHome { home: usize, devices: usize },
    /// The device's executor is gone, so the command never ran.
    DeviceGone(DeviceId),
    /// A command reached a device before its replica was installed.
    NoReplica(DeviceId),
    Ml(MlErr),
    Io(io::Error),
    Config(serde_json::Error),
    InvalidConfig(String),
}

impl Display for DpErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DpErr::IndivisibleBatch {
                batch_size,
                devices,
            } => write!(
                f,
                "a batch of {batch_size} samples can't be split evenly across {devices} devices"
            ),
            DpErr::NoDevices => write!(f, "at least one device is required"),
            DpErr::InvalidHome { home, devices } => {
                write!(f, "home device {home} out of {devices} devices")
            }
            DpErr::DeviceGone(id) => write!(f, "{id} shut down before completing a command"),
            DpErr::NoReplica(id) => write!(f, "{id} has no replica installed"),
            DpErr::Ml(e) => write!(f, "{e}"),
            DpErr::Io(e) => write!(f, "io error: {e}"),
            DpErr::Config(e) => write!(f, "invalid config file: {e}"),
            DpErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl Error for DpErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DpErr::Ml(e) => Some(e),
            DpErr::Io(e) => Some(e),
            DpErr::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for DpErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

impl From<io::Error> for DpErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for DpErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value)
    }
}
