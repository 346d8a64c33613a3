use log::{debug, error};

use super::builder::ClassifierBuilder;
use super::error::ClassifierError;
use super::image::Image;
use super::keywords::{expand_keywords, Keyword, Prediction};
use super::labels::LabelTable;
use super::model::Model;
use super::ranker::top_n;
use super::ClassifierInfo;
use crate::model_store::ModelFiles;
use crate::runtime::RuntimeConfig;

/// Number of predictions `classify` expands into keywords.
pub const DEFAULT_TOP_N: usize = 5;

/// Knobs for [`Classifier::classify_with`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyOptions {
    /// How many predictions to keep before keyword expansion
    pub top_n: usize,
    /// Predictions must score strictly above this to be kept
    pub min_confidence: Option<f32>,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            min_confidence: None,
        }
    }
}

impl ClassifyOptions {
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_min_confidence(mut self, threshold: f32) -> Self {
        self.min_confidence = Some(threshold);
        self
    }
}

/// An image classifier producing ranked keywords.
///
/// # Thread Safety
///
/// A classifier is `Send` but classification takes `&mut self`: the network's
/// input storage is rewritten in place on every call, so one instance serves
/// one call at a time. Use one classifier per thread, or put it behind a
/// `Mutex`, to classify concurrently.
///
/// ```rust,no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use imgclass::{Classifier, Image, ModelFiles};
///
/// let mut classifier = Classifier::builder()
///     .with_model_files(&ModelFiles::in_dir("models/bvlc_reference"))?
///     .build()?;
///
/// let image = Image::filled(227, 227, 3, 128)?;
/// for keyword in classifier.classify(&image)? {
///     println!("{}: {:.3}", keyword.keyword, keyword.confidence);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Classifier {
    model: Model,
    labels: LabelTable,
}

// Compile-time verification that classifiers can move between threads
const _: () = {
    fn assert_send<T: Send>() {}
    fn verify_thread_safety() {
        assert_send::<Classifier>();
    }
};

impl Classifier {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> ClassifierBuilder {
        ClassifierBuilder::new()
    }

    /// Pairs a model with its labels.
    ///
    /// # Errors
    /// - `LabelError` if the label count differs from the model's output dimension
    pub fn new(model: Model, labels: LabelTable) -> Result<Self, ClassifierError> {
        if labels.len() != model.output_len() {
            return Err(ClassifierError::LabelError(format!(
                "Number of labels ({}) is different from the output layer dimension ({})",
                labels.len(),
                model.output_len()
            )));
        }
        Ok(Self { model, labels })
    }

    /// Loads topology, weights, mean image and labels from disk.
    pub fn load(files: &ModelFiles, config: &RuntimeConfig) -> Result<Self, ClassifierError> {
        Self::builder()
            .with_runtime_config(config.clone())
            .with_model_files(files)?
            .build()
    }

    /// Returns information about the classifier's model
    pub fn info(&self) -> ClassifierInfo {
        let dims = self.model.input_dims();
        ClassifierInfo {
            input_width: dims.width,
            input_height: dims.height,
            channels: dims.channels,
            num_labels: self.labels.len(),
        }
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Runs the network and returns the `n` best raw labels, highest confidence first.
    pub fn predict(&mut self, image: &Image, n: usize) -> Result<Vec<Prediction>, ClassifierError> {
        if image.is_empty() {
            error!("Refusing to classify an empty image");
            return Err(ClassifierError::EmptyImage);
        }
        let output = self.model.predict(image)?;
        let labels = &self.labels;
        top_n(output, n)
            .into_iter()
            .map(|(index, confidence)| {
                labels
                    .get(index)
                    .map(|label| Prediction::new(label, confidence))
                    .ok_or_else(|| ClassifierError::PredictionError(format!("No label for output {}", index)))
            })
            .collect()
    }

    /// Classifies `image` into keywords from the five best predictions.
    ///
    /// Keywords keep the ranking of the predictions they come from; synonyms of
    /// one prediction keep their order in the label.
    pub fn classify(&mut self, image: &Image) -> Result<Vec<Keyword>, ClassifierError> {
        self.classify_with(image, &ClassifyOptions::default())
    }

    pub fn classify_with(&mut self, image: &Image, options: &ClassifyOptions) -> Result<Vec<Keyword>, ClassifierError> {
        let predictions = self.predict(image, options.top_n)?;
        let keywords: Vec<Keyword> = predictions
            .iter()
            .filter(|p| options.min_confidence.map_or(true, |threshold| p.confidence > threshold))
            .flat_map(expand_keywords)
            .collect();
        debug!("{} predictions expanded into {} keywords", predictions.len(), keywords.len());
        Ok(keywords)
    }
}
