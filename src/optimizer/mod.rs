use ndarray::{Array, Array1, Array2, Dimension, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{NavigatorError, Result};
use crate::layers::{DenseLayer, LayerGradients};

/// Gradient-descent update rule applied to the layers of a network.
pub trait Optimizer {
    /// Apply one update to `layers` from the matching per-layer `gradients`.
    fn step(
        &mut self,
        layers: &mut [DenseLayer],
        gradients: &[LayerGradients],
        learning_rate: f32,
    ) -> Result<()>;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum OptimizerWrapper {
    SGD(SGD),
    Adam(Adam),
}

impl Optimizer for OptimizerWrapper {
    fn step(
        &mut self,
        layers: &mut [DenseLayer],
        gradients: &[LayerGradients],
        learning_rate: f32,
    ) -> Result<()> {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.step(layers, gradients, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.step(layers, gradients, learning_rate),
        }
    }
}

impl OptimizerWrapper {
    /// Check that the optimizer state was built for `layers`.
    pub fn check_layers(&self, layers: &[DenseLayer]) -> Result<()> {
        match self {
            OptimizerWrapper::SGD(_) => Ok(()),
            OptimizerWrapper::Adam(optimizer) => optimizer.check_layers(layers),
        }
    }
}

fn check_layer_count(expected: usize, layers: usize, gradients: usize) -> Result<()> {
    if layers != expected || gradients != expected {
        return Err(NavigatorError::dimension_mismatch(
            format!("{} layers and gradients", expected),
            format!("{} layers and {} gradients", layers, gradients),
        ));
    }
    Ok(())
}

/// Every gradient must match its layer before any parameter is touched.
fn check_gradients(layers: &[DenseLayer], gradients: &[LayerGradients]) -> Result<()> {
    check_layer_count(layers.len(), layers.len(), gradients.len())?;
    for (layer, grads) in layers.iter().zip(gradients) {
        check_shape(&layer.weights, &grads.weights)?;
        check_shape(&layer.biases, &grads.biases)?;
    }
    Ok(())
}

fn check_shape<D: Dimension>(params: &Array<f32, D>, gradients: &Array<f32, D>) -> Result<()> {
    if params.shape() != gradients.shape() {
        return Err(NavigatorError::dimension_mismatch(
            format!("{:?}", params.shape()),
            format!("{:?}", gradients.shape()),
        ));
    }
    Ok(())
}

/// Plain stochastic gradient descent with optional L2 weight decay.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct SGD {
    pub weight_decay: f32,
}

impl SGD {
    pub fn new() -> SGD {
        SGD { weight_decay: 0.0 }
    }

    pub fn weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    fn update<D: Dimension>(
        &self,
        params: &mut Array<f32, D>,
        gradients: &Array<f32, D>,
        learning_rate: f32,
    ) {
        let decay = self.weight_decay;
        params.zip_mut_with(gradients, |p, &g| *p -= learning_rate * (g + decay * *p));
    }
}

impl Optimizer for SGD {
    fn step(
        &mut self,
        layers: &mut [DenseLayer],
        gradients: &[LayerGradients],
        learning_rate: f32,
    ) -> Result<()> {
        check_gradients(layers, gradients)?;
        for (layer, grads) in layers.iter_mut().zip(gradients) {
            self.update(&mut layer.weights, &grads.weights, learning_rate);
            self.update(&mut layer.biases, &grads.biases, learning_rate);
        }
        Ok(())
    }
}

/// Adam with bias correction and coupled L2 weight decay.
///
/// Moment estimates are kept per layer, so the whole state can be checkpointed
/// and restored together with the network it belongs to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    pub weight_decay: f32,
    m_weights: Vec<Array2<f32>>,
    v_weights: Vec<Array2<f32>>,
    m_biases: Vec<Array1<f32>>,
    v_biases: Vec<Array1<f32>>,
    /// Number of steps taken so far
    pub t: u64,
}

impl Adam {
    pub fn new(layers: &[DenseLayer], beta1: f32, beta2: f32, epsilon: f32) -> Self {
        let m_weights = layers
            .iter()
            .map(|layer| Array2::<f32>::zeros(layer.weights.dim()))
            .collect();
        let v_weights = layers
            .iter()
            .map(|layer| Array2::<f32>::zeros(layer.weights.dim()))
            .collect();
        let m_biases = layers
            .iter()
            .map(|layer| Array1::<f32>::zeros(layer.biases.dim()))
            .collect();
        let v_biases = layers
            .iter()
            .map(|layer| Array1::<f32>::zeros(layer.biases.dim()))
            .collect();

        Adam {
            beta1,
            beta2,
            epsilon,
            weight_decay: 0.0,
            m_weights,
            v_weights,
            m_biases,
            v_biases,
            t: 0,
        }
    }

    pub fn default(layers: &[DenseLayer]) -> Self {
        Self::new(layers, 0.9, 0.999, 1e-8)
    }

    pub fn weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    /// Check that the moment estimates have one entry per layer, shaped like it.
    pub fn check_layers(&self, layers: &[DenseLayer]) -> Result<()> {
        let moments = [
            self.m_weights.len(),
            self.v_weights.len(),
            self.m_biases.len(),
            self.v_biases.len(),
        ];
        if let Some(&count) = moments.iter().find(|&&count| count != layers.len()) {
            return Err(NavigatorError::dimension_mismatch(
                format!("optimizer state for {} layers", layers.len()),
                format!("optimizer state for {} layers", count),
            ));
        }
        for (i, layer) in layers.iter().enumerate() {
            check_shape(&layer.weights, &self.m_weights[i])?;
            check_shape(&layer.weights, &self.v_weights[i])?;
            check_shape(&layer.biases, &self.m_biases[i])?;
            check_shape(&layer.biases, &self.v_biases[i])?;
        }
        Ok(())
    }
}

/// Hyper-parameters of a single Adam step, with the bias corrections for step `t`.
#[derive(Clone, Copy)]
struct AdamStep {
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    learning_rate: f32,
    bias_correction1: f32,
    bias_correction2: f32,
}

impl AdamStep {
    fn apply<D: Dimension>(
        &self,
        params: &mut Array<f32, D>,
        gradients: &Array<f32, D>,
        m: &mut Array<f32, D>,
        v: &mut Array<f32, D>,
    ) {
        let step = *self;
        Zip::from(params)
            .and(gradients)
            .and(m)
            .and(v)
            .for_each(|p, &g, m, v| {
                let g = g + step.weight_decay * *p;
                *m = step.beta1 * *m + (1.0 - step.beta1) * g;
                *v = step.beta2 * *v + (1.0 - step.beta2) * g * g;
                let m_hat = *m / step.bias_correction1;
                let v_hat = *v / step.bias_correction2;
                *p -= step.learning_rate * m_hat / (v_hat.sqrt() + step.epsilon);
            });
    }
}

impl Optimizer for Adam {
    fn step(
        &mut self,
        layers: &mut [DenseLayer],
        gradients: &[LayerGradients],
        learning_rate: f32,
    ) -> Result<()> {
        self.check_layers(layers)?;
        check_gradients(layers, gradients)?;

        self.t += 1;
        let t = self.t.min(i32::MAX as u64) as i32;
        let step = AdamStep {
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
            weight_decay: self.weight_decay,
            learning_rate,
            bias_correction1: 1.0 - self.beta1.powi(t),
            bias_correction2: 1.0 - self.beta2.powi(t),
        };

        let moments = self
            .m_weights
            .iter_mut()
            .zip(self.v_weights.iter_mut())
            .zip(self.m_biases.iter_mut().zip(self.v_biases.iter_mut()));
        for ((layer, grads), ((m_w, v_w), (m_b, v_b))) in
            layers.iter_mut().zip(gradients).zip(moments)
        {
            step.apply(&mut layer.weights, &grads.weights, m_w, v_w);
            step.apply(&mut layer.biases, &grads.biases, m_b, v_b);
        }
        Ok(())
    }
}
