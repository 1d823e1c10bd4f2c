//! Environment.
use ndarray::Array1;

use crate::error::Result;

/// Purpose of an episode, passed to [`Environment::reset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetMode {
    Train,
    Evaluate,
}

/// Result of one environment step.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub reward: f32,
    pub next_state: Array1<f32>,
    pub done: bool,
}

/// A discrete-action environment addressed through a named agent brain.
///
/// Errors returned by either method end training; they are not retried.
pub trait Environment {
    /// Starts a new episode and returns the first observation.
    fn reset(&mut self, brain: &str, mode: ResetMode) -> Result<Array1<f32>>;

    /// Applies `action` and returns the reward, the next observation and
    /// whether the episode ended.
    fn step(&mut self, brain: &str, action: usize) -> Result<StepOutcome>;
}
