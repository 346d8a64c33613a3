use std::fmt;
use std::path::Path;

use log::info;

use super::error::ClassifierError;
use super::image::Image;
use super::mean::MeanBlob;
use super::network::{InputDims, Network, OnnxNetwork};
use super::preprocess::Preprocessor;
use crate::runtime::RuntimeConfig;

/// A loaded network together with its input geometry and mean image.
///
/// Immutable after construction apart from the network's input storage, which
/// every call to [`Model::predict`] overwrites in place.
pub struct Model {
    network: Box<dyn Network>,
    preprocessor: Preprocessor,
    output_len: usize,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("input_dims", &self.preprocessor.dims())
            .field("output_len", &self.output_len)
            .finish()
    }
}

impl Model {
    /// Wraps a network and derives the mean image from `mean`.
    ///
    /// # Errors
    /// - `ModelError` if the network does not have exactly one input and one output
    /// - `ModelError` if the input is not a fixed 1- or 3-channel image
    /// - `MeanError` if the mean blob's channel count differs from the input's
    pub fn new(network: Box<dyn Network>, mean: &MeanBlob) -> Result<Self, ClassifierError> {
        Self::validate_network(network.as_ref())?;

        let dims = network
            .input_dims()
            .ok_or_else(|| ClassifierError::ModelError("Input tensor has no fixed image geometry".into()))?;
        if dims.channels != 1 && dims.channels != 3 {
            return Err(ClassifierError::ModelError(format!(
                "Input layer should have 1 or 3 channels, found {}",
                dims.channels
            )));
        }
        let preprocessor = Preprocessor::new(dims, mean)?;
        let output_len = network
            .output_len()
            .ok_or_else(|| ClassifierError::ModelError("Output tensor has no fixed class dimension".into()))?;

        info!(
            "Model ready: input {}x{}x{}, {} outputs",
            dims.channels, dims.height, dims.width, output_len
        );

        Ok(Self {
            preprocessor,
            network,
            output_len,
        })
    }

    /// Loads an ONNX topology with its trained weights and a binaryproto mean file.
    pub fn load(
        topology: &Path,
        weights: &Path,
        mean_file: &Path,
        config: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        let network = OnnxNetwork::load(topology, weights, config)?;
        let mean = MeanBlob::from_file(mean_file)?;
        Self::new(Box::new(network), &mean)
    }

    fn validate_network(network: &dyn Network) -> Result<(), ClassifierError> {
        if network.num_inputs() != 1 {
            return Err(ClassifierError::ModelError(format!(
                "Network should have exactly one input, found {}",
                network.num_inputs()
            )));
        }
        if network.num_outputs() != 1 {
            return Err(ClassifierError::ModelError(format!(
                "Network should have exactly one output, found {}",
                network.num_outputs()
            )));
        }
        Ok(())
    }

    pub fn input_dims(&self) -> InputDims {
        self.preprocessor.dims()
    }

    pub fn output_len(&self) -> usize {
        self.output_len
    }

    /// Stages `image` into the network input and runs one forward pass.
    ///
    /// # Errors
    /// - `EmptyImage`, `InvalidImage` or `ChannelMismatch` from preprocessing
    /// - `AliasingViolation` if the staged planes are not the network's own input storage
    /// - `PredictionError` or `Runtime` if the forward pass fails
    pub fn predict(&mut self, image: &Image) -> Result<&[f32], ClassifierError> {
        let base = self.network.input_ptr();
        let staged = {
            let mut input = self.network.input_mut();
            self.preprocessor.stage(image, &mut input)?
        };
        if staged != base {
            return Err(ClassifierError::AliasingViolation);
        }

        let output = self.network.forward()?;
        if output.len() != self.output_len {
            return Err(ClassifierError::PredictionError(format!(
                "Network produced {} values, expected {}",
                output.len(),
                self.output_len
            )));
        }
        Ok(output)
    }
}
