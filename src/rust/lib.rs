//! Image keyword classification against pretrained ONNX networks.
//!
//! A classifier stages each image straight into its network's input tensor,
//! runs one forward pass, keeps the five best labels and splits them into
//! keywords. The crate also builds as a `cdylib` exposing the classifier to a
//! JVM through the `org.imgclass.ImageClassifier` native methods.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use imgclass::{Classifier, Image, ModelStore};
//!
//! let store = ModelStore::new_default()?;
//! let files = store.load_files("bvlc_reference")?;
//! let mut classifier = Classifier::builder()
//!     .with_model_files(&files)?
//!     .build()?;
//!
//! let image = Image::from_dynamic(&image::open("cat.jpg")?);
//! for keyword in classifier.classify(&image)? {
//!     println!("{}: {:.3}", keyword.keyword, keyword.confidence);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! Classification mutates the network's input storage, so a `Classifier` serves
//! one call at a time. Independent classifiers can run on different threads.

use std::sync::Once;

pub mod classifier;
mod runtime;
pub mod model_store;
pub mod boundary;

pub use classifier::{
    Classifier, ClassifierBuilder, ClassifierError, ClassifierInfo, ClassifyOptions, Image, InputDims, Keyword,
    LabelTable, MeanBlob, Network, Prediction,
};
pub use runtime::{create_session_builder, RuntimeConfig};
pub use model_store::{Manifest, ModelError, ModelFiles, ModelStore};

static LOGGER: Once = Once::new();

/// Installs `env_logger` once per process. A logger installed earlier by the
/// host is left in place.
pub fn init_logger() {
    LOGGER.call_once(|| {
        let _ = env_logger::try_init();
    });
}
