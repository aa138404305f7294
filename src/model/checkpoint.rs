//! Checkpoint blobs for detector weights
//!
//! Checkpoints are safetensors files of named f32 tensors. Blobs exported
//! from a replication-wrapped model carry a uniform `module.` prefix on
//! every parameter name; the prefix is stripped during parsing. Loading is
//! all-or-nothing: any missing, extra, or misshapen parameter fails the
//! whole load and the caller keeps its previous weights.

use crate::error::{DetectionError, Result};
use crate::model::detector::DeepfakeDetector;
use burn::tensor::backend::Backend;
use safetensors::{tensor::TensorView, Dtype, SafeTensors};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Prefix applied to parameter names by multi-device replication wrappers
const WRAPPED_KEY_PREFIX: &str = "module.";

/// Read a checkpoint file into a named tensor map
///
/// Strips the wrapped-key prefix from every name. Only f32 tensors are
/// accepted.
///
/// # Errors
///
/// `DetectionError::Model` for unreadable files, malformed blobs or
/// non-f32 tensors.
pub fn read_checkpoint(path: &Path) -> Result<HashMap<String, (Vec<usize>, Vec<f32>)>> {
    let bytes = fs::read(path).map_err(|e| {
        DetectionError::model(format!("could not read checkpoint file: {e}"))
    })?;
    let blob = SafeTensors::deserialize(&bytes)
        .map_err(|e| DetectionError::model(format!("malformed checkpoint blob: {e}")))?;

    let mut tensors = HashMap::new();
    for (name, view) in blob.tensors() {
        if view.dtype() != Dtype::F32 {
            return Err(DetectionError::model(format!(
                "parameter '{}' has dtype {:?}, expected F32",
                name,
                view.dtype()
            )));
        }
        let data: Vec<f32> = view
            .data()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let key = name
            .strip_prefix(WRAPPED_KEY_PREFIX)
            .unwrap_or(name.as_str())
            .to_string();
        tensors.insert(key, (view.shape().to_vec(), data));
    }
    debug!(parameters = tensors.len(), "parsed checkpoint blob");
    Ok(tensors)
}

/// Load a checkpoint into a detector
///
/// # Errors
///
/// `DetectionError::Model` when the file is unreadable or any parameter
/// fails name/shape matching. On error the passed model is consumed;
/// callers keep a clone if they need the fallback.
pub fn load_checkpoint<B: Backend>(
    path: &Path,
    model: DeepfakeDetector<B>,
    device: &B::Device,
) -> Result<DeepfakeDetector<B>> {
    let tensors = read_checkpoint(path)?;
    model.import_tensors(&tensors, device)
}

/// Save a detector's weights as a safetensors checkpoint
///
/// # Errors
///
/// `DetectionError::Model` on serialization failure; `DetectionError::Io`
/// when the file cannot be written.
pub fn save_checkpoint<B: Backend>(model: &DeepfakeDetector<B>, path: &Path) -> Result<()> {
    let exported = model.export_tensors()?;
    let buffers: Vec<(String, Vec<usize>, Vec<u8>)> = exported
        .into_iter()
        .map(|(name, shape, data)| {
            let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
            (name, shape, bytes)
        })
        .collect();

    let views: Vec<(&str, TensorView<'_>)> = buffers
        .iter()
        .map(|(name, shape, bytes)| {
            TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map(|view| (name.as_str(), view))
                .map_err(|e| DetectionError::model(format!("could not build tensor view: {e}")))
        })
        .collect::<Result<_>>()?;

    let blob = safetensors::serialize(views, &None)
        .map_err(|e| DetectionError::model(format!("could not serialize checkpoint: {e}")))?;
    fs::write(path, blob)?;
    debug!(path = %path.display(), "saved checkpoint");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InferenceDevice, NdBackend};
    use ndarray::Array4;

    fn probe(model: &DeepfakeDetector<NdBackend>, device: &InferenceDevice) -> f32 {
        let input = Array4::from_elem((1, 3, 64, 64), 0.3);
        let tensor = crate::model::tensor_from_array::<NdBackend>(&input, device).unwrap();
        model.probability(tensor)
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let device = InferenceDevice::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.safetensors");

        let source = DeepfakeDetector::<NdBackend>::new(&device);
        save_checkpoint(&source, &path).unwrap();

        let loaded =
            load_checkpoint(&path, DeepfakeDetector::<NdBackend>::new(&device), &device).unwrap();
        assert!((probe(&source, &device) - probe(&loaded, &device)).abs() < 1e-6);
    }

    #[test]
    fn test_wrapped_prefix_is_stripped() {
        let device = InferenceDevice::default();
        let dir = tempfile::tempdir().unwrap();
        let plain_path = dir.path().join("plain.safetensors");
        let wrapped_path = dir.path().join("wrapped.safetensors");

        let source = DeepfakeDetector::<NdBackend>::new(&device);
        save_checkpoint(&source, &plain_path).unwrap();

        // Rewrite with every key under the replication-wrapper prefix.
        let exported = source.export_tensors().unwrap();
        let buffers: Vec<(String, Vec<usize>, Vec<u8>)> = exported
            .into_iter()
            .map(|(name, shape, data)| {
                let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
                (format!("module.{name}"), shape, bytes)
            })
            .collect();
        let views: Vec<(&str, TensorView<'_>)> = buffers
            .iter()
            .map(|(name, shape, bytes)| {
                (name.as_str(), TensorView::new(Dtype::F32, shape.clone(), bytes).unwrap())
            })
            .collect();
        fs::write(&wrapped_path, safetensors::serialize(views, &None).unwrap()).unwrap();

        let from_plain =
            load_checkpoint(&plain_path, DeepfakeDetector::<NdBackend>::new(&device), &device)
                .unwrap();
        let from_wrapped =
            load_checkpoint(&wrapped_path, DeepfakeDetector::<NdBackend>::new(&device), &device)
                .unwrap();
        assert!((probe(&from_plain, &device) - probe(&from_wrapped, &device)).abs() < 1e-6);
    }

    #[test]
    fn test_missing_file_is_model_error() {
        let device = InferenceDevice::default();
        let result = load_checkpoint(
            Path::new("/nonexistent/weights.safetensors"),
            DeepfakeDetector::<NdBackend>::new(&device),
            &device,
        );
        assert!(matches!(result, Err(DetectionError::Model(_))));
    }

    #[test]
    fn test_corrupt_blob_is_model_error() {
        let device = InferenceDevice::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.safetensors");
        fs::write(&path, b"not a checkpoint").unwrap();

        let result =
            load_checkpoint(&path, DeepfakeDetector::<NdBackend>::new(&device), &device);
        assert!(matches!(result, Err(DetectionError::Model(_))));
    }
}
