use std::fmt;

use log::{error, info};

use super::classifier::Classifier;
use super::error::ClassifierError;
use super::labels::LabelTable;
use super::mean::MeanBlob;
use super::model::Model;
use super::network::{Network, OnnxNetwork};
use crate::model_store::ModelFiles;
use crate::runtime::RuntimeConfig;

/// A builder for constructing a Classifier with a fluent interface.
///
/// Loading happens in the order topology, weights, mean image, labels; the
/// first failure aborts the build.
#[derive(Default)]
pub struct ClassifierBuilder {
    network: Option<Box<dyn Network>>,
    mean: Option<MeanBlob>,
    labels: Option<LabelTable>,
    runtime_config: RuntimeConfig,
}

impl fmt::Debug for ClassifierBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierBuilder")
            .field("has_network", &self.network.is_some())
            .field("mean", &self.mean)
            .field("labels", &self.labels.as_ref().map(LabelTable::len))
            .field("runtime_config", &self.runtime_config)
            .finish()
    }
}

impl ClassifierBuilder {
    /// Creates a new empty ClassifierBuilder instance with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the runtime configuration used when loading ONNX topologies.
    ///
    /// Only affects calls to [`with_model_files`](Self::with_model_files) made afterwards.
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Loads topology, weights, mean image and labels from disk.
    ///
    /// # Errors
    /// - `BuildError` if a network is already set
    /// - `ModelError` if the topology or weights are missing or rejected
    /// - `MeanError` if the mean file is missing or cannot be decoded
    /// - `LabelError` if the label file is missing or cannot be read
    ///
    /// # Example
    /// ```no_run
    /// use imgclass::{ClassifierBuilder, ModelFiles};
    ///
    /// let builder = ClassifierBuilder::new()
    ///     .with_model_files(&ModelFiles::in_dir("models/bvlc_reference"));
    /// ```
    pub fn with_model_files(mut self, files: &ModelFiles) -> Result<Self, ClassifierError> {
        if self.network.is_some() {
            return Err(ClassifierError::BuildError("Network already set".to_string()));
        }

        let network = OnnxNetwork::load(&files.topology, &files.weights, &self.runtime_config).map_err(|e| {
            error!("Failed to load network from {}: {}", files.topology.display(), e);
            e
        })?;
        let mean = MeanBlob::from_file(&files.mean)?;
        info!("Mean image loaded from {}", files.mean.display());
        let labels = LabelTable::from_file(&files.labels)?;
        info!("{} labels loaded from {}", labels.len(), files.labels.display());

        self.network = Some(Box::new(network));
        self.mean = Some(mean);
        self.labels = Some(labels);
        Ok(self)
    }

    /// Uses an already constructed network instead of an ONNX file.
    pub fn with_network(mut self, network: Box<dyn Network>) -> Result<Self, ClassifierError> {
        if self.network.is_some() {
            return Err(ClassifierError::BuildError("Network already set".to_string()));
        }
        self.network = Some(network);
        Ok(self)
    }

    pub fn with_mean_blob(mut self, mean: MeanBlob) -> Self {
        self.mean = Some(mean);
        self
    }

    pub fn with_labels(mut self, labels: LabelTable) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Builds and returns the final Classifier instance
    ///
    /// # Errors
    /// - `BuildError` if the network, mean image or labels were never provided
    /// - `ModelError` or `MeanError` if the network and mean image do not fit together
    /// - `LabelError` if the label count differs from the output dimension
    pub fn build(self) -> Result<Classifier, ClassifierError> {
        let network = self
            .network
            .ok_or_else(|| ClassifierError::BuildError("No network provided".to_string()))?;
        let mean = self
            .mean
            .ok_or_else(|| ClassifierError::BuildError("No mean image provided".to_string()))?;
        let labels = self
            .labels
            .ok_or_else(|| ClassifierError::BuildError("No labels provided".to_string()))?;

        let model = Model::new(network, &mean)?;
        let classifier = Classifier::new(model, labels)?;
        info!("Classifier built with {} labels", classifier.labels().len());
        Ok(classifier)
    }
}
