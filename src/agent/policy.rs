use ndarray::ArrayView1;
use rand::Rng;

/// Index of the largest value; ties go to the lowest index.
///
/// NaN entries never win unless they come first. Returns `None` for an empty view.
pub fn argmax(values: ArrayView1<f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in values.iter().enumerate() {
        let replace = match best {
            None => true,
            Some((_, best_value)) => value > best_value,
        };
        if replace {
            best = Some((idx, value));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Epsilon-greedy decision rule over a fixed number of discrete actions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpsilonGreedy {
    pub epsilon: f32,
}

/// What [`EpsilonGreedy::decide`] chose to do for one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Take this uniformly drawn action
    Explore(usize),
    /// Evaluate the estimator and take its argmax
    Exploit,
}

impl EpsilonGreedy {
    pub fn new(epsilon: f32) -> Self {
        EpsilonGreedy {
            epsilon: epsilon.clamp(0.0, 1.0),
        }
    }

    /// Decide between exploring and exploiting before any value is computed,
    /// so the estimator is only queried when its output is used.
    pub fn decide<R: Rng + ?Sized>(&self, num_actions: usize, rng: &mut R) -> Decision {
        if num_actions > 0 && rng.gen::<f32>() < self.epsilon {
            Decision::Explore(rng.gen_range(0..num_actions))
        } else {
            Decision::Exploit
        }
    }
}
