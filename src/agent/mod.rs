//! # Reinforcement Learning Agents Module
//!
//! Value-based control for discrete action spaces.
//!
//! - [`policy`]: stable argmax and the epsilon-greedy decision rule
//! - [`DqnAgent`]: online/target estimator pair with the Double-Q learner
//!
//! ## Learner update
//!
//! For a sampled batch `(s, a, r, s', done)`:
//!
//! 1. `q_next_target = target(s')`
//! 2. Double DQN: `a* = argmax online(s')`, `q_next = q_next_target[a*]`;
//!    vanilla DQN: `q_next = max q_next_target`
//! 3. `y = r + gamma * q_next * (1 - done)`
//! 4. minimise `mean((online(s)[a] - y)^2)` with one optimizer step on the online network
//!
//! The target network is refreshed only by [`DqnAgent::sync_target`], a hard copy.

pub mod policy;

mod dqn;
pub use dqn::{DqnAgent, DqnAgentBuilder};
