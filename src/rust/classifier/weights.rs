use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use prost::Message;

use super::error::ClassifierError;

const EXTERNAL: i32 = 1;

/// `onnx.StringStringEntryProto`
#[derive(Clone, PartialEq, Message)]
pub struct StringStringEntry {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

/// The subset of `onnx.TensorProto` that says where an initializer's data lives.
#[derive(Clone, PartialEq, Message)]
pub struct TensorInfo {
    #[prost(string, tag = "8")]
    pub name: String,
    #[prost(message, repeated, tag = "13")]
    pub external_data: Vec<StringStringEntry>,
    #[prost(int32, tag = "14")]
    pub data_location: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct GraphInfo {
    #[prost(message, repeated, tag = "5")]
    pub initializer: Vec<TensorInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ModelInfo {
    #[prost(message, optional, tag = "7")]
    pub graph: Option<GraphInfo>,
}

impl ModelInfo {
    /// External data files the graph's initializers are stored in, as written in the graph.
    pub fn external_locations(&self) -> BTreeSet<String> {
        self.graph
            .iter()
            .flat_map(|graph| &graph.initializer)
            .filter(|tensor| tensor.data_location == EXTERNAL)
            .filter_map(|tensor| tensor.external_data.iter().find(|entry| entry.key == "location"))
            .map(|entry| entry.value.clone())
            .collect()
    }
}

fn canonical(path: &Path, what: &str) -> Result<PathBuf, ClassifierError> {
    path.canonicalize()
        .map_err(|e| ClassifierError::ModelError(format!("{} file {} not found: {}", what, path.display(), e)))
}

/// Checks that `weights` is where the graph in `topology` takes its trained
/// initializers from.
///
/// `weights` is either the topology itself, when every initializer is embedded,
/// or one of the external data files the graph references. ONNX Runtime resolves
/// those relative to the topology, so any other file would never be read.
///
/// # Errors
/// - `ModelError` if either file is missing, the topology is not an ONNX model,
///   or the graph does not take its weights from `weights`
pub fn check_weights(topology: &Path, weights: &Path) -> Result<(), ClassifierError> {
    let topology_path = canonical(topology, "Topology")?;
    let weights_path = canonical(weights, "Weights")?;

    let bytes = fs::read(&topology_path)
        .map_err(|e| ClassifierError::ModelError(format!("Unable to read topology {}: {}", topology.display(), e)))?;
    let model = ModelInfo::decode(bytes.as_slice())
        .map_err(|e| ClassifierError::ModelError(format!("{} is not an ONNX model: {}", topology.display(), e)))?;
    let locations = model.external_locations();

    if weights_path == topology_path {
        return match locations.iter().next() {
            None => Ok(()),
            Some(location) => Err(ClassifierError::ModelError(format!(
                "Topology {} keeps its weights in {}, pass that file as weights",
                topology.display(),
                location
            ))),
        };
    }

    let dir = topology_path.parent().unwrap_or(Path::new("/"));
    let referenced = locations
        .iter()
        .any(|location| dir.join(location).canonicalize().is_ok_and(|p| p == weights_path));
    if !referenced {
        return Err(ClassifierError::ModelError(format!(
            "Weights file {} is not referenced by topology {} (external data: {:?})",
            weights.display(),
            topology.display(),
            locations
        )));
    }
    debug!("Topology {} takes its weights from {:?}", topology.display(), locations);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tensor(name: &str, location: Option<&str>) -> TensorInfo {
        TensorInfo {
            name: name.to_string(),
            external_data: location
                .map(|value| StringStringEntry {
                    key: "location".to_string(),
                    value: value.to_string(),
                })
                .into_iter()
                .collect(),
            data_location: if location.is_some() { EXTERNAL } else { 0 },
        }
    }

    fn write_model(dir: &Path, tensors: Vec<TensorInfo>) -> PathBuf {
        let model = ModelInfo {
            graph: Some(GraphInfo { initializer: tensors }),
        };
        let path = dir.join("deploy.onnx");
        fs::write(&path, model.encode_to_vec()).unwrap();
        path
    }

    #[test]
    fn test_embedded_weights_in_topology() {
        let dir = TempDir::new().unwrap();
        let topology = write_model(dir.path(), vec![tensor("conv1.w", None)]);
        check_weights(&topology, &topology).unwrap();
    }

    #[test]
    fn test_referenced_external_weights() {
        let dir = TempDir::new().unwrap();
        let topology = write_model(
            dir.path(),
            vec![tensor("conv1.w", Some("weights.onnx.data")), tensor("fc8.b", None)],
        );
        let weights = dir.path().join("weights.onnx.data");
        fs::write(&weights, [0u8; 16]).unwrap();
        check_weights(&topology, &weights).unwrap();
    }

    #[test]
    fn test_unreferenced_weights_rejected() {
        let dir = TempDir::new().unwrap();
        let topology = write_model(dir.path(), vec![tensor("conv1.w", None)]);
        let weights = dir.path().join("weights.onnx.data");
        fs::write(&weights, [0u8; 16]).unwrap();
        match check_weights(&topology, &weights) {
            Err(e @ ClassifierError::ModelError(_)) => assert!(e.is_fatal()),
            other => panic!("expected model error, got {:?}", other),
        }
    }

    #[test]
    fn test_weights_elsewhere_rejected() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let topology = write_model(dir.path(), vec![tensor("conv1.w", Some("weights.onnx.data"))]);
        fs::write(dir.path().join("weights.onnx.data"), [0u8; 16]).unwrap();
        let weights = other.path().join("weights.onnx.data");
        fs::write(&weights, [0u8; 16]).unwrap();
        assert!(matches!(check_weights(&topology, &weights), Err(ClassifierError::ModelError(_))));
    }

    #[test]
    fn test_external_graph_needs_its_weights_file() {
        let dir = TempDir::new().unwrap();
        let topology = write_model(dir.path(), vec![tensor("conv1.w", Some("weights.onnx.data"))]);
        assert!(matches!(check_weights(&topology, &topology), Err(ClassifierError::ModelError(_))));
    }

    #[test]
    fn test_missing_or_malformed_topology() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("deploy.onnx");
        assert!(matches!(check_weights(&missing, &missing), Err(ClassifierError::ModelError(_))));

        fs::write(&missing, b"\xff\xff\xff not an onnx graph").unwrap();
        assert!(matches!(check_weights(&missing, &missing), Err(ClassifierError::ModelError(_))));
    }
}
