use std::fmt;
use std::path::Path;

use log::{info, warn};
use ndarray::{Array4, ArrayViewMut3, Axis};
use ort::session::Session;
use ort::value::TensorRef;

use super::error::ClassifierError;
use super::weights::check_weights;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// Geometry of a network's single input tensor, batch axis excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputDims {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl InputDims {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self { channels, height, width }
    }

    /// Number of `f32` values in one channel plane
    pub fn plane_len(&self) -> usize {
        self.height * self.width
    }

    /// Reads `[batch, channels, height, width]` or `[channels, height, width]`.
    /// Symbolic dimensions (negative values) are only accepted on the batch axis.
    pub fn from_shape(shape: &[i64]) -> Option<Self> {
        let chw = match shape.len() {
            4 => &shape[1..],
            3 => shape,
            _ => return None,
        };
        let dim = |d: i64| usize::try_from(d).ok().filter(|&d| d > 0);
        Some(Self::new(dim(chw[0])?, dim(chw[1])?, dim(chw[2])?))
    }
}

/// The inference engine seen from the classifier.
///
/// A network owns its input tensor storage. The classifier stages every image
/// directly into that storage through [`Network::input_mut`] and then calls
/// [`Network::forward`], so implementations must keep the storage at a stable
/// address for as long as the network lives.
pub trait Network: Send {
    /// Number of input tensors the topology declares
    fn num_inputs(&self) -> usize;

    /// Number of output tensors the topology declares
    fn num_outputs(&self) -> usize;

    /// Shape of the input tensor, if it is fully known
    fn input_dims(&self) -> Option<InputDims>;

    /// Length of the output vector for a single image
    fn output_len(&self) -> Option<usize>;

    /// Mutable `(channels, height, width)` view over the input tensor storage
    fn input_mut(&mut self) -> ArrayViewMut3<'_, f32>;

    /// Base address of the input tensor storage
    fn input_ptr(&self) -> *const f32;

    /// Runs one forward pass over the current input and returns the output vector
    fn forward(&mut self) -> Result<&[f32], ClassifierError>;
}

/// [`Network`] backed by an ONNX Runtime session.
pub struct OnnxNetwork {
    session: Session,
    num_inputs: usize,
    num_outputs: usize,
    input_dims: Option<InputDims>,
    output_len: Option<usize>,
    input: Array4<f32>,
    output: Vec<f32>,
}

impl fmt::Debug for OnnxNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxNetwork")
            .field("num_inputs", &self.num_inputs)
            .field("num_outputs", &self.num_outputs)
            .field("input_dims", &self.input_dims)
            .field("output_len", &self.output_len)
            .finish()
    }
}

impl OnnxNetwork {
    /// Loads an ONNX topology and its trained initializers.
    ///
    /// `weights` is either the topology file itself (initializers embedded in the
    /// graph) or the external data file the graph references. ONNX Runtime reads
    /// external data relative to the topology, so the weights file has to be the
    /// one the graph names beside it.
    ///
    /// # Errors
    /// - `ModelError` if either file is missing, the graph does not take its
    ///   weights from `weights`, or ONNX Runtime rejects the topology
    pub fn load(topology: &Path, weights: &Path, config: &RuntimeConfig) -> Result<Self, ClassifierError> {
        check_weights(topology, weights)?;

        let session = create_session_builder(config)?
            .commit_from_file(topology)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to load topology {}: {}", topology.display(), e)))?;
        info!("Loaded topology {} with weights {}", topology.display(), weights.display());

        let input_shape: Option<Vec<i64>> = session
            .inputs
            .first()
            .and_then(|input| input.input_type.tensor_shape())
            .map(|shape| shape.iter().copied().collect());
        let output_shape: Option<Vec<i64>> = session
            .outputs
            .first()
            .and_then(|output| output.output_type.tensor_shape())
            .map(|shape| shape.iter().copied().collect());

        let input_dims = input_shape.as_deref().and_then(InputDims::from_shape);
        let output_len = output_shape.as_deref().and_then(output_len_from_shape);
        if input_dims.is_none() {
            warn!("Input tensor shape {:?} is not a fixed image geometry", input_shape);
        }

        let input = match input_dims {
            Some(dims) => Array4::zeros((1, dims.channels, dims.height, dims.width)),
            None => Array4::zeros((1, 0, 0, 0)),
        };

        Ok(Self {
            num_inputs: session.inputs.len(),
            num_outputs: session.outputs.len(),
            session,
            input_dims,
            output_len,
            input,
            output: Vec::new(),
        })
    }
}

/// Class count of an output shaped `[batch, classes, ...]` or `[classes]`.
fn output_len_from_shape(shape: &[i64]) -> Option<usize> {
    let classes = match shape.len() {
        0 => return None,
        1 => shape[0],
        _ => shape[1],
    };
    usize::try_from(classes).ok().filter(|&c| c > 0)
}

impl Network for OnnxNetwork {
    fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    fn input_dims(&self) -> Option<InputDims> {
        self.input_dims
    }

    fn output_len(&self) -> Option<usize> {
        self.output_len
    }

    fn input_mut(&mut self) -> ArrayViewMut3<'_, f32> {
        self.input.index_axis_mut(Axis(0), 0)
    }

    fn input_ptr(&self) -> *const f32 {
        self.input.as_ptr()
    }

    fn forward(&mut self) -> Result<&[f32], ClassifierError> {
        let shape: Vec<i64> = self.input.shape().iter().map(|&d| d as i64).collect();
        let data = self
            .input
            .as_slice()
            .ok_or_else(|| ClassifierError::PredictionError("Input tensor is not contiguous".into()))?;
        let tensor = TensorRef::from_array_view((shape, data))?;

        let outputs = self.session.run(ort::inputs![tensor])?;
        let (_, values) = outputs[0].try_extract_tensor::<f32>()?;
        self.output.clear();
        self.output.extend_from_slice(values);
        drop(outputs);

        Ok(&self.output)
    }
}
