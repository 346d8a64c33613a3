use ort::Error as OrtError;
use std::io;

/// Represents the different types of errors that can occur in the image classifier.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// The network topology does not have the structure a classifier needs
    #[error("Model error: {0}")]
    ModelError(String),
    /// The mean image blob could not be read or does not match the network input
    #[error("Mean blob error: {0}")]
    MeanError(String),
    /// The label file could not be read or does not match the network output
    #[error("Label error: {0}")]
    LabelError(String),
    /// Error occurred during the build phase
    #[error("Build error: {0}")]
    BuildError(String),
    /// The image handed to the classifier is empty
    #[error("Empty image")]
    EmptyImage,
    /// The image buffer does not describe a valid image
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    /// The preprocessed sample has a different channel count than the mean image
    #[error("Channel mismatch: sample has {sample} channels, model expects {model}")]
    ChannelMismatch { sample: usize, model: usize },
    /// The staged input planes do not alias the network's input storage
    #[error("Input channels are not wrapping the input layer of the network")]
    AliasingViolation,
    /// Error occurred while running the forward pass
    #[error("Prediction error: {0}")]
    PredictionError(String),
    /// Error reported by ONNX Runtime
    #[error("Runtime error: {0}")]
    Runtime(#[from] OrtError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ClassifierError {
    /// Errors that stem from a broken deployment or a misbehaving caller.
    ///
    /// The boundary adapter never tries to recover from these: continuing would
    /// silently produce wrong classifications.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ModelError(_)
                | Self::MeanError(_)
                | Self::LabelError(_)
                | Self::EmptyImage
                | Self::ChannelMismatch { .. }
                | Self::AliasingViolation
        )
    }
}
