//! # Activation Functions Module
//!
//! Element-wise non-linearities used by the dense layers of a [`QNetwork`](crate::network::QNetwork).
//!
//! - **ReLU**: `max(0, x)`, the default for hidden layers
//! - **Linear**: identity, used for the action-value output layer
//! - **Tanh**: smooth and bounded, handy for gradient checks
//! - **LeakyReLU**: ReLU with a small negative slope

pub mod functions;

pub use functions::Activation;
