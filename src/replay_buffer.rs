use ndarray::{Array1, Array2};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::{NavigatorError, Result};

/// One environment step: `(s, a, r, s', done)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: Array1<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_state: Array1<f32>,
    pub done: bool,
}

/// A mini-batch of transitions laid out as five row-aligned arrays.
///
/// Row `i` of every field comes from the same stored [`Transition`].
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub states: Array2<f32>,
    pub actions: Vec<usize>,
    pub rewards: Array1<f32>,
    pub next_states: Array2<f32>,
    /// `1.0` for terminal transitions, `0.0` otherwise
    pub dones: Array1<f32>,
}

impl Batch {
    /// Stack transitions into a batch. All states must have the same width.
    pub fn from_transitions<'a, I>(transitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Transition>,
    {
        let transitions: Vec<&Transition> = transitions.into_iter().collect();
        let batch_size = transitions.len();
        let state_size = transitions.first().map_or(0, |t| t.state.len());

        let mut states = Array2::zeros((batch_size, state_size));
        let mut next_states = Array2::zeros((batch_size, state_size));
        let mut actions = Vec::with_capacity(batch_size);
        let mut rewards = Array1::zeros(batch_size);
        let mut dones = Array1::zeros(batch_size);

        for (i, transition) in transitions.iter().enumerate() {
            if transition.state.len() != state_size || transition.next_state.len() != state_size {
                return Err(NavigatorError::dimension_mismatch(
                    format!("states of width {}", state_size),
                    format!(
                        "state width {} / next state width {}",
                        transition.state.len(),
                        transition.next_state.len()
                    ),
                ));
            }
            states.row_mut(i).assign(&transition.state);
            next_states.row_mut(i).assign(&transition.next_state);
            actions.push(transition.action);
            rewards[i] = transition.reward;
            dones[i] = if transition.done { 1.0 } else { 0.0 };
        }

        Ok(Batch {
            states,
            actions,
            rewards,
            next_states,
            dones,
        })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Fixed-capacity FIFO store of transitions with uniform sampling.
#[derive(Clone, Debug)]
pub struct ReplayBuffer {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        ReplayBuffer {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Store a transition, evicting the oldest one when the buffer is full.
    pub fn append(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Draw `batch_size` distinct transitions uniformly at random.
    ///
    /// Fails with [`NavigatorError::InsufficientData`] when fewer than
    /// `batch_size` transitions are stored.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Batch> {
        if batch_size > self.buffer.len() {
            return Err(NavigatorError::InsufficientData {
                requested: batch_size,
                available: self.buffer.len(),
            });
        }
        let indices = index::sample(rng, self.buffer.len(), batch_size);
        Batch::from_transitions(indices.into_iter().map(|i| &self.buffer[i]))
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stored transitions, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }
}
