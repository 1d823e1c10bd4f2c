//! # Navigator - Double DQN for discrete-action navigation tasks
//!
//! Navigator trains a value-based agent on an episodic environment with a
//! small continuous observation vector and a handful of discrete actions.
//!
//! ## Key Features
//!
//! - **Value estimator**: Dense multilayer perceptron with per-action outputs
//! - **Double DQN**: Online network selects, target network evaluates
//! - **Experience replay**: Bounded FIFO buffer with uniform sampling
//! - **Optimizers**: SGD and Adam with serializable per-layer state
//! - **Checkpoints**: Versioned, atomic save and resume of the full training state
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use navigator::config::Config;
//! use navigator::envs::Corridor;
//! use navigator::trainer::Trainer;
//!
//! let config = Config::default();
//! let mut env = Corridor::new(config.brain_name.clone(), 9, 50, 0).unwrap();
//! let mut trainer = Trainer::new(&config).unwrap();
//! let report = trainer.train(&mut env).unwrap();
//! println!("{:?} after {} episodes", report.status, report.final_epoch);
//! ```
//!
//! ## Module Organization
//!
//! - [`activations`] - Activation functions (ReLU, Linear, Tanh, LeakyReLU)
//! - [`agent`] - The DQN agent and its epsilon-greedy policy
//! - [`checkpoint`] - Versioned on-disk training state
//! - [`config`] - YAML configuration of the agent and the trainer
//! - [`env`] - The environment interface
//! - [`envs`] - Built-in environments
//! - [`error`] - Error types and result handling
//! - [`layers`] - Dense layers with cached forward passes
//! - [`loss`] - Loss functions for training
//! - [`metrics`] - Score history and summary statistics
//! - [`network`] - The Q-value network
//! - [`optimizer`] - Optimization algorithms
//! - [`replay_buffer`] - Experience replay
//! - [`trainer`] - The training loop and evaluation mode

pub mod activations;
pub mod agent;
pub mod checkpoint;
pub mod config;
pub mod env;
pub mod envs;
pub mod error;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod optimizer;
pub mod replay_buffer;
pub mod trainer;

#[cfg(test)]
mod tests;
