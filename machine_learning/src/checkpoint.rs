//! Saving and loading flat parameter vectors as safetensors files, one tensor per
//! `ParamTensor` of the model's layout.

use std::{fs, path::Path};

use log::info;
use safetensors::{Dtype, SafeTensors, tensor::TensorView};

use crate::{MlErr, Result, arch::ParamTensor};

fn checkpoint_err(e: impl std::fmt::Debug) -> MlErr {
    MlErr::Checkpoint(format!("{e:?}"))
}

/// Writes `params` to `path`, split into the named tensors of `layout`.
pub fn save(path: &Path, layout: &[ParamTensor], params: &[f32]) -> Result<()> {
    let end = layout.last().map_or(0, |t| t.range().end);
    if end != params.len() {
        return Err(MlErr::SizeMismatch {
            what: "checkpoint parameters",
            got: params.len(),
            expected: end,
        });
    }

    let views = layout
        .iter()
        .map(|tensor| -> Result<_> {
            let data: &[u8] = bytemuck::cast_slice(&params[tensor.range()]);
            let view = TensorView::new(Dtype::F32, tensor.shape.clone(), data)
                .map_err(checkpoint_err)?;
            Ok((tensor.name.clone(), view))
        })
        .collect::<Result<Vec<_>>>()?;

    let bytes = safetensors::serialize(views, &None).map_err(checkpoint_err)?;
    fs::write(path, bytes)?;

    info!("saved {} parameters to {}", params.len(), path.display());
    Ok(())
}

/// Reads a checkpoint written by `save` back into a flat vector laid out as `layout`.
///
/// # Returns
/// An error if a tensor is missing, isn't `f32` or has a different shape.
pub fn load(path: &Path, layout: &[ParamTensor]) -> Result<Vec<f32>> {
    let bytes = fs::read(path)?;
    let tensors = SafeTensors::deserialize(&bytes).map_err(checkpoint_err)?;

    let mut params = vec![0.0; layout.last().map_or(0, |t| t.range().end)];

    for tensor in layout {
        let view = tensors.tensor(&tensor.name).map_err(checkpoint_err)?;

        if view.dtype() != Dtype::F32 {
            return Err(MlErr::Checkpoint(format!(
                "{} is {:?}, expected F32",
                tensor.name,
                view.dtype()
            )));
        }

        if view.shape() != tensor.shape.as_slice() {
            return Err(MlErr::Checkpoint(format!(
                "{} has shape {:?}, expected {:?}",
                tensor.name,
                view.shape(),
                tensor.shape
            )));
        }

        // The data isn't guaranteed to be aligned for f32, so decode it bytewise.
        let dst = &mut params[tensor.range()];
        for (p, raw) in dst.iter_mut().zip(view.data().chunks_exact(4)) {
            *p = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        }
    }

    info!("loaded {} parameters from {}", params.len(), path.display());
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Vec<ParamTensor> {
        vec![
            ParamTensor::new("layer0.weight".into(), vec![2, 3], 0),
            ParamTensor::new("layer0.bias".into(), vec![3], 6),
        ]
    }

    #[test]
    fn restores_saved_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let params: Vec<f32> = (0..9).map(|i| i as f32 * 0.5 - 2.0).collect();

        save(&path, &layout(), &params).unwrap();
        assert_eq!(load(&path, &layout()).unwrap(), params);
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        save(&path, &layout(), &[0.0; 9]).unwrap();

        let other = vec![
            ParamTensor::new("layer0.weight".into(), vec![3, 2], 0),
            ParamTensor::new("layer0.bias".into(), vec![3], 6),
        ];
        assert!(matches!(load(&path, &other), Err(MlErr::Checkpoint(_))));
    }

    #[test]
    fn wrong_length_is_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");

        assert!(save(&path, &layout(), &[0.0; 4]).is_err());
        assert!(!path.exists());
    }
}
