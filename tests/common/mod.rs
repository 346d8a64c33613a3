#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use imgclass::{ClassifierError, InputDims, Network};
use ndarray::{Array3, ArrayViewMut3};

/// Counts networks alive at any moment.
#[derive(Debug, Clone, Default)]
pub struct LiveCounter(Arc<AtomicUsize>);

impl LiveCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn token(&self) -> LiveToken {
        self.0.fetch_add(1, Ordering::SeqCst);
        LiveToken(Arc::clone(&self.0))
    }
}

struct LiveToken(Arc<AtomicUsize>);

/// Meeting point for forward passes that must be in flight at the same time.
#[derive(Debug, Default)]
pub struct Rendezvous {
    arrived: Mutex<usize>,
    all_in: Condvar,
}

impl Rendezvous {
    /// Waits until `parties` callers have arrived, or gives up after `timeout`.
    fn meet(&self, parties: usize, timeout: Duration) -> bool {
        let mut arrived = self.arrived.lock().unwrap_or_else(PoisonError::into_inner);
        *arrived += 1;
        self.all_in.notify_all();
        let (arrived, result) = self
            .all_in
            .wait_timeout_while(arrived, timeout, |n| *n < parties)
            .unwrap_or_else(PoisonError::into_inner);
        drop(arrived);
        !result.timed_out()
    }
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A single fully connected layer: `output[k] = weights[k] · input + bias[k]`.
pub struct DenseNetwork {
    dims: InputDims,
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
    input: Array3<f32>,
    /// Storage handed out by `input_mut` when the network misreports its input
    scratch: Option<Array3<f32>>,
    output: Vec<f32>,
    num_inputs: usize,
    num_outputs: usize,
    rendezvous: Option<(Arc<Rendezvous>, usize)>,
    _live: Option<LiveToken>,
}

impl DenseNetwork {
    pub fn new(dims: InputDims, weights: Vec<Vec<f32>>) -> Self {
        let classes = weights.len();
        Self {
            dims,
            weights,
            bias: vec![0.0; classes],
            input: Array3::zeros((dims.channels, dims.height, dims.width)),
            scratch: None,
            output: Vec::new(),
            num_inputs: 1,
            num_outputs: 1,
            rendezvous: None,
            _live: None,
        }
    }

    /// Every class weighs all inputs equally with `scale`.
    pub fn uniform(dims: InputDims, scales: &[f32]) -> Self {
        let len = dims.channels * dims.plane_len();
        Self::new(dims, scales.iter().map(|&s| vec![s; len]).collect())
    }

    pub fn with_bias(mut self, bias: Vec<f32>) -> Self {
        self.bias = bias;
        self
    }

    pub fn tracked_by(mut self, counter: &LiveCounter) -> Self {
        self._live = Some(counter.token());
        self
    }

    /// Declares a topology with the given tensor counts.
    pub fn with_tensor_counts(mut self, inputs: usize, outputs: usize) -> Self {
        self.num_inputs = inputs;
        self.num_outputs = outputs;
        self
    }

    /// Every forward pass waits for `parties` passes to be running at once.
    pub fn meeting_at(mut self, rendezvous: &Arc<Rendezvous>, parties: usize) -> Self {
        self.rendezvous = Some((Arc::clone(rendezvous), parties));
        self
    }

    /// Hands out a view over a separate buffer instead of the input tensor.
    pub fn detached(mut self) -> Self {
        self.scratch = Some(Array3::zeros(self.input.raw_dim()));
        self
    }

    pub fn input(&self) -> &Array3<f32> {
        &self.input
    }
}

impl Network for DenseNetwork {
    fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    fn input_dims(&self) -> Option<InputDims> {
        Some(self.dims)
    }

    fn output_len(&self) -> Option<usize> {
        Some(self.weights.len())
    }

    fn input_mut(&mut self) -> ArrayViewMut3<'_, f32> {
        match &mut self.scratch {
            Some(scratch) => scratch.view_mut(),
            None => self.input.view_mut(),
        }
    }

    fn input_ptr(&self) -> *const f32 {
        self.input.as_ptr()
    }

    fn forward(&mut self) -> Result<&[f32], ClassifierError> {
        if let Some((rendezvous, parties)) = &self.rendezvous {
            if !rendezvous.meet(*parties, Duration::from_secs(10)) {
                return Err(ClassifierError::PredictionError("Forward passes never overlapped".into()));
            }
        }
        let input = self
            .input
            .as_slice()
            .ok_or_else(|| ClassifierError::PredictionError("Input is not contiguous".into()))?;
        self.output = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, bias)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + bias)
            .collect();
        Ok(&self.output)
    }
}
