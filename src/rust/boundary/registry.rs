use std::sync::{Mutex, PoisonError};

use crate::classifier::{Classifier, ClassifierError, Image, Keyword};

use super::handles::{HandleError, HandleTable};

/// Errors surfaced to the host.
#[derive(Debug, thiserror::Error)]
pub enum BoundaryError {
    #[error(transparent)]
    Handle(#[from] HandleError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

impl BoundaryError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, BoundaryError::Classifier(e) if e.is_fatal())
    }
}

/// Classifiers and images currently owned by the host, keyed by handle.
#[derive(Default)]
pub struct Registry {
    classifiers: HandleTable<Mutex<Classifier>>,
    images: HandleTable<Image>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_classifier(&self, classifier: Classifier) -> i64 {
        let handle = self.classifiers.insert(Mutex::new(classifier));
        log::debug!("Classifier handle {:#x} created", handle);
        handle
    }

    pub fn destroy_classifier(&self, handle: i64) -> Result<(), BoundaryError> {
        self.classifiers.remove(handle)?;
        log::debug!("Classifier handle {:#x} destroyed", handle);
        Ok(())
    }

    pub fn create_image(&self, image: Image) -> i64 {
        self.images.insert(image)
    }

    pub fn destroy_image(&self, handle: i64) -> Result<(), BoundaryError> {
        Ok(self.images.remove(handle)?)
    }

    /// Classifies the image behind `image` with the classifier behind `classifier`.
    ///
    /// The image is only read and may be shared by concurrent calls. Calls on
    /// the same classifier handle run one at a time.
    pub fn classify(&self, classifier: i64, image: i64) -> Result<Vec<Keyword>, BoundaryError> {
        let image = self.images.get(image)?;
        let classifier = self.classifiers.get(classifier)?;
        let mut classifier = classifier.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(classifier.classify(&image)?)
    }

    pub fn live_classifiers(&self) -> usize {
        self.classifiers.len()
    }

    pub fn live_images(&self) -> usize {
        self.images.len()
    }
}
