use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use machine_learning::MlErr;

pub type Result<T> = std::result::Result<T, GanErr>;

#[derive(Debug)]
pub enum GanErr {
    InvalidLabel { label: usize, classes: usize },
    Ml(MlErr),
    Io(io::Error),
    Config(serde_json::Error),
    InvalidConfig(String),
}

impl Display for GanErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GanErr::InvalidLabel { label, classes } => {
                write!(f, "label {label} is out of range for {classes} classes")
            }
            GanErr::Ml(e) => write!(f, "{e}"),
            GanErr::Io(e) => write!(f, "io error: {e}"),
            GanErr::Config(e) => write!(f, "invalid config file: {e}"),
            GanErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl Error for GanErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GanErr::Ml(e) => Some(e),
            GanErr::Io(e) => Some(e),
            GanErr::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for GanErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

impl From<ndarray::ShapeError> for GanErr {
    fn from(value: ndarray::ShapeError) -> Self {
        Self::Ml(value.into())
    }
}

impl From<io::Error> for GanErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for GanErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value)
    }
}
