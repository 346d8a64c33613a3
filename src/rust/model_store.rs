use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not installed: {0}")]
    NotInstalled(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Invalid manifest: {0}")]
    InvalidManifest(#[from] serde_json::Error),
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

/// The four files a classifier is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub topology: PathBuf,
    pub weights: PathBuf,
    pub mean: PathBuf,
    pub labels: PathBuf,
}

impl ModelFiles {
    pub const TOPOLOGY: &'static str = "deploy.onnx";
    pub const WEIGHTS: &'static str = "weights.onnx.data";
    pub const MEAN: &'static str = "mean.binaryproto";
    pub const LABELS: &'static str = "labels.txt";

    pub fn new(
        topology: impl Into<PathBuf>,
        weights: impl Into<PathBuf>,
        mean: impl Into<PathBuf>,
        labels: impl Into<PathBuf>,
    ) -> Self {
        Self {
            topology: topology.into(),
            weights: weights.into(),
            mean: mean.into(),
            labels: labels.into(),
        }
    }

    /// Standard file names inside a bundle directory.
    ///
    /// Bundles whose topology embeds its initializers ship no separate weights
    /// file; the topology then doubles as the weights.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let topology = dir.join(Self::TOPOLOGY);
        let external = dir.join(Self::WEIGHTS);
        let weights = if external.exists() { external } else { topology.clone() };
        Self {
            topology,
            weights,
            mean: dir.join(Self::MEAN),
            labels: dir.join(Self::LABELS),
        }
    }

    /// `(kind, path)` pairs in load order
    pub fn entries(&self) -> [(&'static str, &Path); 4] {
        [
            ("topology", self.topology.as_path()),
            ("weights", self.weights.as_path()),
            ("mean", self.mean.as_path()),
            ("labels", self.labels.as_path()),
        ]
    }

    pub fn all_exist(&self) -> bool {
        self.entries().iter().all(|(_, path)| path.exists())
    }
}

/// Optional `manifest.json` in a bundle: file name to lowercase hex SHA-256.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub sha256: BTreeMap<String, String>,
}

impl Manifest {
    pub const FILE_NAME: &'static str = "manifest.json";

    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Resolves named model bundles under a root directory.
#[derive(Debug, Clone)]
pub struct ModelStore {
    models_dir: PathBuf,
}

impl ModelStore {
    /// Creates a new ModelStore with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::default_models_dir())
    }

    /// Returns the default models directory path
    pub fn default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("IMGCLASS_MODEL_PATH") {
            return PathBuf::from(path);
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("imgclass").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("imgclass").join("models");
        }

        // 4. If all else fails, use system temp directory
        env::temp_dir().join("imgclass").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self { models_dir })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn bundle_dir(&self, name: &str) -> PathBuf {
        self.models_dir.join(name)
    }

    pub fn files(&self, name: &str) -> ModelFiles {
        ModelFiles::in_dir(self.bundle_dir(name))
    }

    pub fn is_installed(&self, name: &str) -> bool {
        let files = self.files(name);
        log::debug!("Checking bundle '{}' in {:?}", name, self.bundle_dir(name));
        files.all_exist()
    }

    /// Names of the installed bundles, sorted.
    pub fn installed(&self) -> Result<Vec<String>, ModelError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.models_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if self.is_installed(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn file_digest(path: &Path) -> Result<String, ModelError> {
        let bytes = fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Checks every bundle file listed in the manifest against its digest.
    ///
    /// A bundle without a manifest verifies trivially. Files the manifest does
    /// not mention are not checked.
    pub fn verify(&self, name: &str) -> Result<(), ModelError> {
        if !self.is_installed(name) {
            return Err(ModelError::NotInstalled(name.to_string()));
        }
        let manifest_path = self.bundle_dir(name).join(Manifest::FILE_NAME);
        if !manifest_path.exists() {
            log::info!("Bundle '{}' has no manifest, skipping verification", name);
            return Ok(());
        }
        let manifest = Manifest::from_file(&manifest_path)?;
        let files = self.files(name);

        for (file_type, path) in files.entries() {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(expected) = manifest.sha256.get(file_name) else {
                continue;
            };
            let actual = Self::file_digest(path)?;
            if !actual.eq_ignore_ascii_case(expected) {
                log::error!("Digest mismatch for {:?}", path);
                return Err(ModelError::HashMismatch {
                    file_type: file_type.to_string(),
                    expected: expected.clone(),
                    actual,
                });
            }
            log::debug!("{} file {:?} verified", file_type, path);
        }
        log::info!("Bundle '{}' verified", name);
        Ok(())
    }

    /// Files of an installed, verified bundle.
    pub fn load_files(&self, name: &str) -> Result<ModelFiles, ModelError> {
        self.verify(name)?;
        Ok(self.files(name))
    }

    /// Deletes a bundle directory if present.
    pub fn remove(&self, name: &str) -> io::Result<()> {
        let dir = self.bundle_dir(name);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}
