mod error;
mod image;
mod network;
mod weights;
mod mean;
mod labels;
mod preprocess;
mod model;
mod ranker;
mod keywords;
pub mod builder;
mod classifier;

pub use error::ClassifierError;
pub use self::image::Image;
pub use network::{InputDims, Network, OnnxNetwork};
pub use weights::check_weights;
pub use mean::{BlobProto, BlobShape, MeanBlob};
pub use labels::LabelTable;
pub use preprocess::{ColorConversion, Preprocessor};
pub use model::Model;
pub use ranker::top_n;
pub use keywords::{expand_keywords, strip_category, Keyword, Prediction};
pub use builder::ClassifierBuilder;
pub use classifier::{Classifier, ClassifyOptions, DEFAULT_TOP_N};

/// Input geometry and label count of a loaded classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierInfo {
    /// Width the network expects, in pixels
    pub input_width: usize,
    /// Height the network expects, in pixels
    pub input_height: usize,
    /// 1 for grayscale networks, 3 for BGR
    pub channels: usize,
    /// Number of labels, equal to the output dimension
    pub num_labels: usize,
}
