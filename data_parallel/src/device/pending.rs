use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::oneshot;

use super::DeviceId;
use crate::{DpErr, Result};

/// The not yet materialized result of a command issued to a device.
///
/// Issuing a command never blocks; the value is only waited for when the `Pending` is awaited
/// (or `wait`ed), at which point every command queued before it on the same device has run too.
#[must_use = "a command's result is only observed by awaiting its `Pending`"]
pub struct Pending<T> {
    device: DeviceId,
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Pending<T> {
    pub(super) fn new(device: DeviceId, rx: oneshot::Receiver<Result<T>>) -> Self {
        Self { device, rx }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Blocks the current thread until the command completes.
    ///
    /// # Panics
    /// If called from within an async runtime.
    pub fn wait(self) -> Result<T> {
        let device = self.device;
        self.rx
            .blocking_recv()
            .map_err(|_| DpErr::DeviceGone(device))?
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(DpErr::DeviceGone(this.device))),
            Poll::Pending => Poll::Pending,
        }
    }
}
