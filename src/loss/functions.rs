use ndarray::{Array1, ArrayView1};

/// Trait defining the interface for regression losses over a batch of scalar predictions
pub trait Loss: Send + Sync {
    /// Compute the mean loss over the batch
    fn compute(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> f32;

    /// Compute the gradient of the mean loss with respect to each prediction
    fn gradient(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> Array1<f32>;
}

/// Mean Squared Error loss: `mean((p - t)^2)`
#[derive(Clone, Copy, Debug, Default)]
pub struct Mse;

impl Loss for Mse {
    fn compute(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> f32 {
        if predictions.is_empty() {
            return 0.0;
        }
        let diff = &predictions - &targets;
        diff.mapv(|x| x * x).sum() / predictions.len() as f32
    }

    fn gradient(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> Array1<f32> {
        let n = predictions.len().max(1) as f32;
        (&predictions - &targets) * (2.0 / n)
    }
}
