use futures::future;
use machine_learning::{MlErr, arch::ParamTensor};

use crate::{DpErr, Result, device::Device};

/// Adds `other` into `acc`, element by element.
///
/// This is the reduction applied on the home device; applying it to the gradients in a fixed
/// order yields the same bits on every run.
pub fn sum_into(acc: &mut [f32], other: &[f32]) -> Result<()> {
    if acc.len() != other.len() {
        return Err(MlErr::SizeMismatch {
            what: "reduced gradient",
            got: other.len(),
            expected: acc.len(),
        }
        .into());
    }

    for (a, o) in acc.iter_mut().zip(other) {
        *a += o;
    }

    Ok(())
}

/// Sums the gradients of every device and leaves the sum on all of them.
///
/// For each tensor of `layout`, the gradients of the non-home devices are copied to the host
/// and accumulated into the home device's buffer in device index order, on top of the home
/// device's own gradient. The sum is then read back and written over every other device's
/// gradient, so all devices end up with bitwise identical buffers.
///
/// # Arguments
/// * `devices` - Every device taking part in the step, holding its gradient.
/// * `home` - The index of the device the sum is accumulated on.
/// * `layout` - The tensors of the model's flat gradient.
pub async fn all_reduce(devices: &[Device], home: usize, layout: &[ParamTensor]) -> Result<()> {
    if devices.is_empty() {
        return Err(DpErr::NoDevices);
    }

    let Some(home_device) = devices.get(home) else {
        return Err(DpErr::InvalidHome {
            home,
            devices: devices.len(),
        });
    };

    let others = move || {
        devices
            .iter()
            .enumerate()
            .filter(move |&(i, _)| i != home)
            .map(|(_, device)| device)
    };

    for tensor in layout.iter().filter(|t| !t.is_empty()) {
        let range = tensor.range();

        let pulls = others().map(|device| device.pull_grad(range.clone()));
        let grads = future::try_join_all(pulls).await?;

        // Queued back to back on the home device, the pull of the sum runs after
        // every accumulation.
        let accumulations: Vec<_> = grads
            .into_iter()
            .map(|grad| home_device.accumulate_grad(range.clone(), grad))
            .collect();
        let sum = home_device.pull_grad(range.clone());

        future::try_join_all(accumulations).await?;
        let sum = sum.await?;

        let writes = others().map(|device| device.write_grad(range.clone(), sum.clone()));
        future::try_join_all(writes).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_into_adds_elementwise() {
        let mut acc = [1.0, 1.0];
        sum_into(&mut acc, &[2.0, 2.0]).unwrap();
        assert_eq!(acc, [3.0, 3.0]);
    }

    #[test]
    fn sum_into_rejects_mismatched_lengths() {
        assert!(sum_into(&mut [0.0; 2], &[1.0]).is_err());
    }
}
