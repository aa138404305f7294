//! Convolutional deepfake classifier with capture support
//!
//! A small stack of conv/relu/maxpool stages followed by a pooled linear
//! head emitting one logit. The architecture deliberately avoids dropout
//! and batch normalization: burn keys their train-mode behavior on the
//! autodiff backend, which would make the explanation forward diverge from
//! the inference forward on a batch of one.

use crate::error::{DetectionError, Result};
use burn::{
    module::{Module, Param},
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{activation::sigmoid, backend::AutodiffBackend, backend::Backend, ElementConversion, Tensor, TensorData},
};
use ndarray::Array4;
use std::collections::HashMap;

/// Sigmoid probability above which an image is classified as a deepfake
pub const DECISION_THRESHOLD: f32 = 0.5;

/// Channel widths of the convolutional stages
const FEATURE_CHANNELS: [usize; 5] = [8, 16, 32, 64, 64];

/// Hidden width of the classification head
const HIDDEN_UNITS: usize = 32;

/// One convolutional stage: conv 3x3 (pad 1) + ReLU + 2x2 max-pool
#[derive(Module, Debug)]
pub(crate) struct ConvBlock<B: Backend> {
    pub(crate) conv: Conv2d<B>,
    pool: MaxPool2d,
    activation: Relu,
}

impl<B: Backend> ConvBlock<B> {
    fn new(channels_in: usize, channels_out: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([channels_in, channels_out], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        Self {
            conv,
            pool,
            activation: Relu::new(),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pool.forward(self.activation.forward(self.conv.forward(x)))
    }
}

/// Binary image-authenticity classifier
///
/// `forward` is the plain inference path; `forward_with_capture` returns a
/// [`CaptureContext`] carrying the last convolutional feature map re-marked
/// as a gradient leaf, so a targeted backward pass can recover its gradient.
#[derive(Module, Debug)]
pub struct DeepfakeDetector<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
    avgpool: AdaptiveAvgPool2d,
    pub(crate) fc1: Linear<B>,
    activation: Relu,
    pub(crate) fc2: Linear<B>,
}

/// Capture context produced by one `forward_with_capture` call
///
/// Owned exclusively by the caller of that single detection request; the
/// adapter holds no mutable capture state, so one instance can serve
/// concurrent requests.
pub struct CaptureContext<B: AutodiffBackend> {
    /// Output of the last convolutional stage, shape (1, C, h, w),
    /// re-marked as a gradient leaf
    pub activation: Tensor<B, 4>,
    /// Classifier logit, shape (1, 1), built from `activation`
    pub logit: Tensor<B, 2>,
}

impl<B: Backend> DeepfakeDetector<B> {
    /// Initialize with baseline (randomly initialized) weights
    pub fn new(device: &B::Device) -> Self {
        let mut blocks = Vec::with_capacity(FEATURE_CHANNELS.len());
        let mut channels_in = 3;
        for channels_out in FEATURE_CHANNELS {
            blocks.push(ConvBlock::new(channels_in, channels_out, device));
            channels_in = channels_out;
        }
        let last = FEATURE_CHANNELS[FEATURE_CHANNELS.len() - 1];
        Self {
            blocks,
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc1: LinearConfig::new(last, HIDDEN_UNITS).init(device),
            activation: Relu::new(),
            fc2: LinearConfig::new(HIDDEN_UNITS, 1).init(device),
        }
    }

    /// Feature extractor: input (1, 3, S, S) to (1, C, S/32, S/32)
    fn features(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks.iter().fold(x, |x, block| block.forward(x))
    }

    /// Classification head over a feature map
    fn head(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let pooled = self.avgpool.forward(features);
        let flat = pooled.flatten::<2>(1, 3);
        self.fc2.forward(self.activation.forward(self.fc1.forward(flat)))
    }

    /// Plain forward pass: one logit of shape (1, 1)
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.head(self.features(x))
    }

    /// Sigmoid probability of the deepfake class
    pub fn probability(&self, x: Tensor<B, 4>) -> f32 {
        sigmoid(self.forward(x)).into_scalar().elem()
    }

    /// Expected checkpoint parameters: name and shape, in declaration order
    pub(crate) fn parameter_shapes() -> Vec<(String, Vec<usize>)> {
        let mut shapes = Vec::new();
        let mut channels_in = 3;
        for (i, channels_out) in FEATURE_CHANNELS.iter().copied().enumerate() {
            shapes.push((format!("blocks.{i}.conv.weight"), vec![channels_out, channels_in, 3, 3]));
            shapes.push((format!("blocks.{i}.conv.bias"), vec![channels_out]));
            channels_in = channels_out;
        }
        let last = FEATURE_CHANNELS[FEATURE_CHANNELS.len() - 1];
        shapes.push(("fc1.weight".to_string(), vec![last, HIDDEN_UNITS]));
        shapes.push(("fc1.bias".to_string(), vec![HIDDEN_UNITS]));
        shapes.push(("fc2.weight".to_string(), vec![HIDDEN_UNITS, 1]));
        shapes.push(("fc2.bias".to_string(), vec![1]));
        shapes
    }

    /// Export all parameters as named raw tensors
    pub(crate) fn export_tensors(&self) -> Result<Vec<(String, Vec<usize>, Vec<f32>)>> {
        fn dump<B: Backend, const D: usize>(
            name: &str,
            tensor: Tensor<B, D>,
        ) -> Result<(String, Vec<usize>, Vec<f32>)> {
            let shape = tensor.dims().to_vec();
            let data = tensor
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| DetectionError::model(format!("export of '{name}' failed: {e:?}")))?;
            Ok((name.to_string(), shape, data))
        }

        let mut out = Vec::new();
        for (i, block) in self.blocks.iter().enumerate() {
            out.push(dump(&format!("blocks.{i}.conv.weight"), block.conv.weight.val())?);
            if let Some(bias) = &block.conv.bias {
                out.push(dump(&format!("blocks.{i}.conv.bias"), bias.val())?);
            }
        }
        out.push(dump("fc1.weight", self.fc1.weight.val())?);
        if let Some(bias) = &self.fc1.bias {
            out.push(dump("fc1.bias", bias.val())?);
        }
        out.push(dump("fc2.weight", self.fc2.weight.val())?);
        if let Some(bias) = &self.fc2.bias {
            out.push(dump("fc2.bias", bias.val())?);
        }
        Ok(out)
    }

    /// Replace all parameters from a named tensor map
    ///
    /// Proceeds key-by-key, so validation happens up front: every expected
    /// parameter must be present with the exact shape and no unknown keys
    /// may remain. A partial match is a total failure; the caller keeps its
    /// previous weights.
    pub(crate) fn import_tensors(
        mut self,
        tensors: &HashMap<String, (Vec<usize>, Vec<f32>)>,
        device: &B::Device,
    ) -> Result<Self> {
        let expected = Self::parameter_shapes();
        for (name, shape) in &expected {
            match tensors.get(name) {
                Some((found_shape, _)) if found_shape == shape => {},
                Some((found_shape, _)) => {
                    return Err(DetectionError::model(format!(
                        "parameter '{name}' has shape {found_shape:?}, expected {shape:?}"
                    )));
                },
                None => {
                    return Err(DetectionError::model(format!(
                        "parameter '{name}' missing from checkpoint"
                    )));
                },
            }
        }
        if tensors.len() != expected.len() {
            let known: Vec<&str> = expected.iter().map(|(n, _)| n.as_str()).collect();
            let extra: Vec<&str> = tensors
                .keys()
                .filter(|k| !known.contains(&k.as_str()))
                .map(String::as_str)
                .collect();
            return Err(DetectionError::model(format!(
                "checkpoint contains unknown parameters: {extra:?}"
            )));
        }

        fn build<B: Backend, const D: usize>(
            tensors: &HashMap<String, (Vec<usize>, Vec<f32>)>,
            name: &str,
            device: &B::Device,
        ) -> Tensor<B, D> {
            // Presence and shape were validated above.
            let (shape, data) = &tensors[name];
            Tensor::from_data(TensorData::new(data.clone(), shape.clone()), device)
        }

        for (i, block) in self.blocks.iter_mut().enumerate() {
            block.conv.weight =
                Param::from_tensor(build(tensors, &format!("blocks.{i}.conv.weight"), device));
            block.conv.bias = Some(Param::from_tensor(build(
                tensors,
                &format!("blocks.{i}.conv.bias"),
                device,
            )));
        }
        self.fc1.weight = Param::from_tensor(build(tensors, "fc1.weight", device));
        self.fc1.bias = Some(Param::from_tensor(build(tensors, "fc1.bias", device)));
        self.fc2.weight = Param::from_tensor(build(tensors, "fc2.weight", device));
        self.fc2.bias = Some(Param::from_tensor(build(tensors, "fc2.bias", device)));
        Ok(self)
    }
}

impl<B: AutodiffBackend> DeepfakeDetector<B> {
    /// Forward pass that captures the last convolutional feature map
    ///
    /// The feature map is detached and re-marked as a gradient leaf, then
    /// the head continues from that leaf. A backward pass from a scalar
    /// built on `logit` therefore populates the gradient of `activation`.
    pub fn forward_with_capture(&self, x: Tensor<B, 4>) -> CaptureContext<B> {
        let features = self.features(x);
        let activation = features.detach().require_grad();
        let logit = self.head(activation.clone());
        CaptureContext { activation, logit }
    }
}

/// Convert an NCHW `ndarray` tensor into a backend tensor
pub fn tensor_from_array<B: Backend>(
    array: &Array4<f32>,
    device: &B::Device,
) -> Result<Tensor<B, 4>> {
    let (b, c, h, w) = array.dim();
    let data: Vec<f32> = array.iter().copied().collect();
    Ok(Tensor::from_data(TensorData::new(data, [b, c, h, w]), device))
}
