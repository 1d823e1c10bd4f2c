use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activations::Activation;
use crate::error::{NavigatorError, Result};
use crate::layers::{DenseLayer, LayerCache, LayerGradients};

/// A parametrised action-value function `f(state) -> [q(state, a) for a in actions]`.
///
/// The online and target estimators of a [`DqnAgent`](crate::agent::DqnAgent) are two
/// instances of this type with identical architecture.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct QNetwork {
    layers: Vec<DenseLayer>,
}

/// Immutable copy of a network's weights and biases.
///
/// Produced by [`QNetwork::snapshot`] and consumed by [`QNetwork::assign`]; the
/// snapshot owns its arrays, so later training of the source network never
/// shows through it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Parameters {
    layers: Vec<(Array2<f32>, Array1<f32>)>,
}

impl Parameters {
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn weights(&self, layer: usize) -> Option<&Array2<f32>> {
        self.layers.get(layer).map(|(w, _)| w)
    }

    pub fn biases(&self, layer: usize) -> Option<&Array1<f32>> {
        self.layers.get(layer).map(|(_, b)| b)
    }
}

/// Per-layer caches from a training forward pass, consumed by [`QNetwork::backward`].
#[derive(Clone, Debug)]
pub struct ForwardPass {
    outputs: Array2<f32>,
    caches: Vec<LayerCache>,
}

impl ForwardPass {
    /// Action values for every row of the batch.
    pub fn outputs(&self) -> &Array2<f32> {
        &self.outputs
    }
}

impl QNetwork {
    /// Create a new network with the given layer sizes and per-layer activations.
    pub fn new<R: Rng + ?Sized>(
        layer_sizes: &[usize],
        activations: &[Activation],
        rng: &mut R,
    ) -> Result<Self> {
        if layer_sizes.len() < 2 {
            return Err(NavigatorError::invalid_parameter(
                "layer_sizes",
                "Must have at least input and output layers",
            ));
        }
        if activations.len() != layer_sizes.len() - 1 {
            return Err(NavigatorError::invalid_parameter(
                "activations",
                "Number of activations must match number of layers - 1",
            ));
        }
        if layer_sizes.iter().any(|&size| size == 0) {
            return Err(NavigatorError::invalid_parameter(
                "layer_sizes",
                "Layer sizes must be positive",
            ));
        }

        let layers = layer_sizes
            .windows(2)
            .zip(activations.iter())
            .map(|(window, &activation)| DenseLayer::new(window[0], window[1], activation, rng))
            .collect();

        Ok(QNetwork { layers })
    }

    /// Multi-layer perceptron with ReLU hidden layers and a linear output layer.
    pub fn mlp<R: Rng + ?Sized>(layer_sizes: &[usize], rng: &mut R) -> Result<Self> {
        let mut activations = vec![Activation::Relu; layer_sizes.len().saturating_sub(2)];
        activations.push(Activation::Linear);
        Self::new(layer_sizes, &activations, rng)
    }

    /// Build a network from explicit layers, checking that adjacent sizes agree.
    pub fn from_layers(layers: Vec<DenseLayer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(NavigatorError::invalid_parameter(
                "layers",
                "Network must have at least one layer",
            ));
        }
        for pair in layers.windows(2) {
            if pair[0].output_size() != pair[1].input_size() {
                return Err(NavigatorError::dimension_mismatch(
                    format!("{} inputs", pair[0].output_size()),
                    format!("{} inputs", pair[1].input_size()),
                ));
            }
        }
        Ok(QNetwork { layers })
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [DenseLayer] {
        &mut self.layers
    }

    pub fn state_size(&self) -> usize {
        self.layers[0].input_size()
    }

    pub fn action_size(&self) -> usize {
        self.layers[self.layers.len() - 1].output_size()
    }

    /// Action values for a single state. Inference only: nothing is recorded.
    pub fn predict(&self, state: ArrayView1<f32>) -> Result<Array1<f32>> {
        let output = self.predict_batch(state.insert_axis(Axis(0)))?;
        Ok(output.index_axis_move(Axis(0), 0))
    }

    /// Action values for a batch of states, one row per state.
    pub fn predict_batch(&self, states: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut current = self.layers[0].forward_batch(states)?;
        for layer in &self.layers[1..] {
            current = layer.forward_batch(current.view())?;
        }
        Ok(current)
    }

    /// Forward pass that keeps the activations needed by [`backward`](Self::backward).
    pub fn forward_train(&self, states: ArrayView2<f32>) -> Result<ForwardPass> {
        let mut caches = Vec::with_capacity(self.layers.len());
        let (mut current, cache) = self.layers[0].forward_cached(states)?;
        caches.push(cache);
        for layer in &self.layers[1..] {
            let (outputs, cache) = layer.forward_cached(current.view())?;
            caches.push(cache);
            current = outputs;
        }
        Ok(ForwardPass {
            outputs: current,
            caches,
        })
    }

    /// Backpropagate `output_gradient` (dLoss/dOutputs) through a recorded pass.
    ///
    /// Gradients are returned in layer order.
    pub fn backward(
        &self,
        pass: &ForwardPass,
        output_gradient: ArrayView2<f32>,
    ) -> Result<Vec<LayerGradients>> {
        if pass.caches.len() != self.layers.len() {
            return Err(NavigatorError::dimension_mismatch(
                format!("{} layer caches", self.layers.len()),
                format!("{} layer caches", pass.caches.len()),
            ));
        }

        let mut gradients = Vec::with_capacity(self.layers.len());
        let mut current_error = output_gradient.to_owned();
        for (layer, cache) in self.layers.iter().zip(&pass.caches).rev() {
            let (input_error, layer_gradients) = layer.backward_batch(cache, current_error.view())?;
            gradients.push(layer_gradients);
            current_error = input_error;
        }
        gradients.reverse();
        Ok(gradients)
    }

    /// Deep copy of the current parameters.
    pub fn snapshot(&self) -> Parameters {
        Parameters {
            layers: self
                .layers
                .iter()
                .map(|layer| (layer.weights.clone(), layer.biases.clone()))
                .collect(),
        }
    }

    /// Overwrite every weight and bias with `parameters`.
    ///
    /// All shapes are checked before anything is written, so a mismatched
    /// snapshot leaves the network untouched.
    pub fn assign(&mut self, parameters: &Parameters) -> Result<()> {
        if parameters.layers.len() != self.layers.len() {
            return Err(NavigatorError::dimension_mismatch(
                format!("{} layers", self.layers.len()),
                format!("{} layers", parameters.layers.len()),
            ));
        }
        for (layer, (weights, biases)) in self.layers.iter().zip(&parameters.layers) {
            if layer.weights.dim() != weights.dim() || layer.biases.dim() != biases.dim() {
                return Err(NavigatorError::dimension_mismatch(
                    format!("{:?}/{:?}", layer.weights.dim(), layer.biases.dim()),
                    format!("{:?}/{:?}", weights.dim(), biases.dim()),
                ));
            }
        }
        for (layer, (weights, biases)) in self.layers.iter_mut().zip(&parameters.layers) {
            layer.weights.assign(weights);
            layer.biases.assign(biases);
        }
        Ok(())
    }
}
