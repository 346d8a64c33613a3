mod common;

use std::sync::Arc;
use std::thread;

use common::{DenseNetwork, LiveCounter, Rendezvous};
use imgclass::boundary::{BoundaryError, HandleError, Registry};
use imgclass::{Classifier, ClassifierError, Image, InputDims, LabelTable, MeanBlob};

fn tracked_classifier(counter: &LiveCounter) -> Classifier {
    let network = DenseNetwork::uniform(InputDims::new(1, 2, 2), &[1.0, 2.0, 0.5]).tracked_by(counter);
    Classifier::builder()
        .with_network(Box::new(network))
        .unwrap()
        .with_mean_blob(MeanBlob::uniform(&[4.0], 2, 2).unwrap())
        .with_labels(LabelTable::new(vec!["x foo", "y bar,baz", "z qux"]))
        .build()
        .unwrap()
}

#[test]
fn test_create_destroy_without_classify_leaks_nothing() {
    let counter = LiveCounter::default();
    let registry = Registry::new();

    let handles: Vec<i64> = (0..5).map(|_| registry.create_classifier(tracked_classifier(&counter))).collect();
    assert_eq!(counter.get(), 5);
    assert_eq!(registry.live_classifiers(), 5);

    for handle in handles {
        registry.destroy_classifier(handle).unwrap();
    }
    assert_eq!(counter.get(), 0);
    assert_eq!(registry.live_classifiers(), 0);
}

#[test]
fn test_classify_through_handles() {
    let counter = LiveCounter::default();
    let registry = Registry::new();
    let classifier = registry.create_classifier(tracked_classifier(&counter));
    let image = registry.create_image(Image::filled(2, 2, 1, 10).unwrap());

    let words: Vec<String> = registry
        .classify(classifier, image)
        .unwrap()
        .into_iter()
        .map(|k| k.keyword)
        .collect();
    assert_eq!(words, vec!["bar", "baz", "foo", "qux"]);

    // the image stays usable after classification
    assert!(registry.classify(classifier, image).is_ok());

    registry.destroy_image(image).unwrap();
    registry.destroy_classifier(classifier).unwrap();
    assert_eq!(registry.live_images(), 0);
    assert_eq!(counter.get(), 0);
}

#[test]
fn test_stale_and_unknown_handles() {
    let counter = LiveCounter::default();
    let registry = Registry::new();
    let classifier = registry.create_classifier(tracked_classifier(&counter));
    let image = registry.create_image(Image::filled(2, 2, 1, 10).unwrap());
    registry.destroy_classifier(classifier).unwrap();

    assert!(matches!(
        registry.classify(classifier, image),
        Err(BoundaryError::Handle(HandleError::Stale(h))) if h == classifier
    ));
    assert!(matches!(
        registry.destroy_classifier(classifier),
        Err(BoundaryError::Handle(HandleError::Stale(_)))
    ));
    assert!(matches!(
        registry.classify(0, image),
        Err(BoundaryError::Handle(HandleError::Unknown(0)))
    ));

    // a new classifier in the freed slot does not revive the old handle
    let replacement = registry.create_classifier(tracked_classifier(&counter));
    assert_ne!(replacement, classifier);
    assert!(registry.classify(classifier, image).is_err());
    assert!(registry.classify(replacement, image).is_ok());
}

#[test]
fn test_empty_image_is_fatal_at_the_boundary() {
    let counter = LiveCounter::default();
    let registry = Registry::new();
    let classifier = registry.create_classifier(tracked_classifier(&counter));
    let image = registry.create_image(Image::new(0, 0, 3, Vec::new()).unwrap());

    let err = registry.classify(classifier, image).unwrap_err();
    assert!(matches!(err, BoundaryError::Classifier(ClassifierError::EmptyImage)));
    assert!(err.is_fatal());
    assert!(!BoundaryError::Handle(HandleError::Unknown(1)).is_fatal());
}

#[test]
fn test_handles_used_from_many_threads() {
    let counter = LiveCounter::default();
    let registry = Arc::new(Registry::new());
    let classifiers: Vec<i64> = (0..3).map(|_| registry.create_classifier(tracked_classifier(&counter))).collect();
    let image = registry.create_image(Image::filled(2, 2, 1, 10).unwrap());

    let workers: Vec<_> = (0..6)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let classifier = classifiers[i % classifiers.len()];
            thread::spawn(move || {
                for _ in 0..10 {
                    let keywords = registry.classify(classifier, image).unwrap();
                    assert_eq!(keywords.len(), 4);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    for classifier in classifiers {
        registry.destroy_classifier(classifier).unwrap();
    }
    registry.destroy_image(image).unwrap();
    assert_eq!(counter.get(), 0);
}

#[test]
fn test_shared_image_does_not_serialize_classifiers() {
    let rendezvous = Arc::new(Rendezvous::default());
    let registry = Arc::new(Registry::new());
    let classifiers: Vec<i64> = (0..2)
        .map(|_| {
            let network = DenseNetwork::uniform(InputDims::new(1, 2, 2), &[1.0, 2.0]).meeting_at(&rendezvous, 2);
            let classifier = Classifier::builder()
                .with_network(Box::new(network))
                .unwrap()
                .with_mean_blob(MeanBlob::uniform(&[0.0], 2, 2).unwrap())
                .with_labels(LabelTable::new(vec!["a one", "b two"]))
                .build()
                .unwrap();
            registry.create_classifier(classifier)
        })
        .collect();
    let image = registry.create_image(Image::filled(2, 2, 1, 1).unwrap());

    let workers: Vec<_> = classifiers
        .iter()
        .map(|&classifier| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.classify(classifier, image))
        })
        .collect();
    for worker in workers {
        let keywords = worker.join().unwrap().unwrap();
        assert_eq!(keywords[0].keyword, "two");
    }
}
