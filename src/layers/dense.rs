use ndarray::{Array1, Array2, ArrayView2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activations::Activation;
use crate::error::{NavigatorError, Result};

/// A fully connected (dense) layer in a neural network.
///
/// The layer itself holds parameters only. Activations needed for
/// backpropagation live in a [`LayerCache`] returned by
/// [`forward_cached`](DenseLayer::forward_cached), so inference never mutates it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DenseLayer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
}

/// Inputs and pre-activations recorded during a training forward pass.
#[derive(Clone, Debug)]
pub struct LayerCache {
    inputs: Array2<f32>,
    pre_activation: Array2<f32>,
}

/// Gradients of the loss with respect to one layer's parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerGradients {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
}

impl DenseLayer {
    /// Create a new dense layer with the given input size, output size, and activation function.
    /// Weights and biases are drawn from `U(-1/sqrt(input_size), 1/sqrt(input_size))`.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let bound = 1.0 / (input_size.max(1) as f32).sqrt();
        let weights = Array2::random_using(
            (input_size, output_size),
            Uniform::new_inclusive(-bound, bound),
            rng,
        );
        let biases = Array1::random_using(output_size, Uniform::new_inclusive(-bound, bound), rng);
        DenseLayer {
            weights,
            biases,
            activation,
        }
    }

    pub fn with_weights(mut self, weights: Array2<f32>) -> Self {
        assert_eq!(weights.dim(), self.weights.dim());
        self.weights = weights;
        self
    }

    pub fn with_biases(mut self, biases: Array1<f32>) -> Self {
        assert_eq!(biases.dim(), self.biases.dim());
        self.biases = biases;
        self
    }

    pub fn input_size(&self) -> usize {
        self.weights.shape()[0]
    }

    pub fn output_size(&self) -> usize {
        self.weights.shape()[1]
    }

    /// Forward pass for a batch of inputs without recording anything.
    pub fn forward_batch(&self, inputs: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut outputs = self.affine(inputs)?;
        self.activation.apply_batch(&mut outputs);
        Ok(outputs)
    }

    /// Forward pass for a batch of inputs, keeping what the backward pass needs.
    pub fn forward_cached(&self, inputs: ArrayView2<f32>) -> Result<(Array2<f32>, LayerCache)> {
        let pre_activation = self.affine(inputs)?;
        let mut outputs = pre_activation.clone();
        self.activation.apply_batch(&mut outputs);
        let cache = LayerCache {
            inputs: inputs.to_owned(),
            pre_activation,
        };
        Ok((outputs, cache))
    }

    /// Backward pass for a batch of output errors.
    ///
    /// Returns the error propagated to this layer's inputs together with the
    /// parameter gradients.
    pub fn backward_batch(
        &self,
        cache: &LayerCache,
        output_errors: ArrayView2<f32>,
    ) -> Result<(Array2<f32>, LayerGradients)> {
        if output_errors.dim() != cache.pre_activation.dim() {
            return Err(NavigatorError::dimension_mismatch(
                format!("{:?}", cache.pre_activation.dim()),
                format!("{:?}", output_errors.dim()),
            ));
        }
        let activation_deriv = self.activation.derivative_batch(cache.pre_activation.view());
        let adjusted_error = &output_errors * &activation_deriv;
        let gradients = LayerGradients {
            weights: cache.inputs.t().dot(&adjusted_error),
            biases: adjusted_error.sum_axis(Axis(0)),
        };
        let input_errors = adjusted_error.dot(&self.weights.t());
        Ok((input_errors, gradients))
    }

    fn affine(&self, inputs: ArrayView2<f32>) -> Result<Array2<f32>> {
        if inputs.ncols() != self.input_size() {
            return Err(NavigatorError::dimension_mismatch(
                format!("{} input features", self.input_size()),
                format!("{} input features", inputs.ncols()),
            ));
        }
        Ok(inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0)))
    }
}
