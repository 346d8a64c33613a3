//! `extern "system"` entry points of `org.imgclass.ImageClassifier`.
//!
//! ```java
//! package org.imgclass;
//!
//! public final class ImageClassifier {
//!     static native long create(String topology, String weights, String mean, String labels);
//!     static native Keyword[] classify(long classifier, long image);
//!     static native void destroy(long classifier);
//!     static native long createImage(byte[] pixels, int width, int height, int channels);
//!     static native void destroyImage(long image);
//! }
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};

use jni::objects::{JByteArray, JClass, JString};
use jni::sys::{jint, jlong, jobjectArray};
use jni::JNIEnv;
use lazy_static::lazy_static;
use log::{error, info};

use super::config::{BoundaryConfig, FatalPolicy};
use super::reflection::KeywordClass;
use super::registry::{BoundaryError, Registry};
use crate::classifier::{Classifier, ClassifierError, Image};
use crate::model_store::ModelFiles;
use crate::runtime::RuntimeConfig;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
    static ref CONFIG: BoundaryConfig = BoundaryConfig::from_env();
}

const ILLEGAL_ARGUMENT: &str = "java/lang/IllegalArgumentException";
const ILLEGAL_STATE: &str = "java/lang/IllegalStateException";
const RUNTIME: &str = "java/lang/RuntimeException";

/// How the boundary answers an error from the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Leave an exception of this class pending and return a null result
    Throw(&'static str),
    /// Terminate the process
    Abort,
}

/// Maps `err` to the host exception it raises under `policy`.
fn exception_for(err: &BoundaryError, policy: FatalPolicy) -> Outcome {
    match err {
        BoundaryError::Handle(_) => Outcome::Throw(ILLEGAL_ARGUMENT),
        BoundaryError::Classifier(ClassifierError::InvalidImage(_)) => Outcome::Throw(ILLEGAL_ARGUMENT),
        e if e.is_fatal() => match policy {
            FatalPolicy::Abort => Outcome::Abort,
            FatalPolicy::Throw => Outcome::Throw(ILLEGAL_STATE),
        },
        _ => Outcome::Throw(RUNTIME),
    }
}

/// Raises the host exception matching `err`, or aborts on fatal errors under
/// the default policy.
fn raise(env: &mut JNIEnv, err: BoundaryError) {
    if err.is_fatal() {
        error!("Fatal classifier error: {}", err);
    }
    match exception_for(&err, CONFIG.fatal_policy) {
        Outcome::Abort => std::process::abort(),
        Outcome::Throw(class) => throw(env, class, &err.to_string()),
    }
}

fn throw(env: &mut JNIEnv, class: &str, message: &str) {
    // an exception raised by the JVM itself is already pending
    if env.exception_check().unwrap_or(false) {
        return;
    }
    if let Err(e) = env.throw_new(class, message) {
        error!("Failed to throw {}: {}", class, e);
    }
}

/// Runs `f`, converting panics into a pending `RuntimeException`.
fn guarded<'local, R>(env: &mut JNIEnv<'local>, fallback: R, f: impl FnOnce(&mut JNIEnv<'local>) -> R) -> R {
    match catch_unwind(AssertUnwindSafe(|| f(env))) {
        Ok(value) => value,
        Err(_) => {
            error!("Panic inside native classifier call");
            throw(env, RUNTIME, "Panic inside native classifier call");
            fallback
        }
    }
}

fn read_path(env: &mut JNIEnv, value: &JString, what: &str) -> Option<String> {
    match env.get_string(value) {
        Ok(text) => Some(text.into()),
        Err(e) => {
            error!("Invalid {} path: {}", what, e);
            throw(env, ILLEGAL_ARGUMENT, &format!("Invalid {} path", what));
            None
        }
    }
}

#[no_mangle]
pub extern "system" fn Java_org_imgclass_ImageClassifier_create<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    topology: JString<'local>,
    weights: JString<'local>,
    mean: JString<'local>,
    labels: JString<'local>,
) -> jlong {
    crate::init_logger();
    log::debug!("Fatal error policy: {:?}", CONFIG.fatal_policy);

    guarded(&mut env, 0, |env| {
        let Some(topology) = read_path(env, &topology, "topology") else { return 0 };
        let Some(weights) = read_path(env, &weights, "weights") else { return 0 };
        let Some(mean) = read_path(env, &mean, "mean") else { return 0 };
        let Some(labels) = read_path(env, &labels, "labels") else { return 0 };

        let files = ModelFiles::new(topology, weights, mean, labels);
        match Classifier::load(&files, &RuntimeConfig::from_env()) {
            Ok(classifier) => {
                let handle = REGISTRY.create_classifier(classifier);
                info!("Classifier {:#x} loaded from {}", handle, files.topology.display());
                handle
            }
            Err(e) => {
                raise(env, e.into());
                0
            }
        }
    })
}

#[no_mangle]
pub extern "system" fn Java_org_imgclass_ImageClassifier_classify<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    classifier: jlong,
    image: jlong,
) -> jobjectArray {
    let null: jobjectArray = std::ptr::null_mut();
    guarded(&mut env, null, |env| {
        let keywords = match REGISTRY.classify(classifier, image) {
            Ok(keywords) => keywords,
            Err(e) => {
                raise(env, e);
                return null;
            }
        };

        // the class, the array, and one element with its string
        let array = env.ensure_local_capacity(4).and_then(|_| {
            let class = KeywordClass::resolve(env)?;
            class.new_array(env, &keywords)
        });
        match array {
            Ok(array) => array.into_raw(),
            Err(e) => {
                error!("Failed to marshal {} keywords: {}", keywords.len(), e);
                throw(env, RUNTIME, &format!("Failed to build result array: {}", e));
                null
            }
        }
    })
}

#[no_mangle]
pub extern "system" fn Java_org_imgclass_ImageClassifier_destroy<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    classifier: jlong,
) {
    guarded(&mut env, (), |env| {
        if let Err(e) = REGISTRY.destroy_classifier(classifier) {
            raise(env, e);
        }
    })
}

#[no_mangle]
pub extern "system" fn Java_org_imgclass_ImageClassifier_createImage<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    pixels: JByteArray<'local>,
    width: jint,
    height: jint,
    channels: jint,
) -> jlong {
    guarded(&mut env, 0, |env| {
        let data = match env.convert_byte_array(&pixels) {
            Ok(data) => data,
            Err(e) => {
                throw(env, ILLEGAL_ARGUMENT, &format!("Unreadable pixel array: {}", e));
                return 0;
            }
        };
        let (Ok(width), Ok(height), Ok(channels)) =
            (u32::try_from(width), u32::try_from(height), usize::try_from(channels))
        else {
            throw(env, ILLEGAL_ARGUMENT, "Image dimensions must not be negative");
            return 0;
        };
        match Image::new(width, height, channels, data) {
            Ok(image) => REGISTRY.create_image(image),
            Err(e) => {
                raise(env, e.into());
                0
            }
        }
    })
}

#[no_mangle]
pub extern "system" fn Java_org_imgclass_ImageClassifier_destroyImage<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    image: jlong,
) {
    guarded(&mut env, (), |env| {
        if let Err(e) = REGISTRY.destroy_image(image) {
            raise(env, e);
        }
    })
}
