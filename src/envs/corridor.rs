use ndarray::{array, Array1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::env::{Environment, ResetMode, StepOutcome};
use crate::error::{NavigatorError, Result};

pub const ACTION_LEFT: usize = 0;
pub const ACTION_RIGHT: usize = 1;
pub const ACTION_STAY: usize = 2;

const GOAL_REWARD: f32 = 1.0;
const STEP_PENALTY: f32 = -0.01;

/// One-dimensional corridor: walk from the middle to the goal at one of the ends.
///
/// Observation is `[position, goal]`, both scaled to `[0, 1]`.
#[derive(Clone, Debug)]
pub struct Corridor {
    brain_name: String,
    length: usize,
    max_steps: usize,
    position: usize,
    goal: usize,
    steps: usize,
    done: bool,
    rng: StdRng,
}

impl Corridor {
    pub const STATE_SIZE: usize = 2;
    pub const ACTION_SIZE: usize = 3;
    pub const DEFAULT_LENGTH: usize = 9;
    pub const DEFAULT_MAX_STEPS: usize = 50;

    pub fn new(
        brain_name: impl Into<String>,
        length: usize,
        max_steps: usize,
        seed: u64,
    ) -> Result<Self> {
        if length < 3 {
            return Err(NavigatorError::invalid_parameter(
                "length",
                "corridor needs at least 3 cells",
            ));
        }
        if max_steps == 0 {
            return Err(NavigatorError::invalid_parameter("max_steps", "must be positive"));
        }
        Ok(Corridor {
            brain_name: brain_name.into(),
            length,
            max_steps,
            position: length / 2,
            goal: length - 1,
            steps: 0,
            done: true,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    fn observation(&self) -> Array1<f32> {
        let scale = (self.length - 1) as f32;
        array![self.position as f32 / scale, self.goal as f32 / scale]
    }

    fn check_brain(&self, brain: &str) -> Result<()> {
        if brain != self.brain_name {
            return Err(NavigatorError::Environment(format!(
                "unknown brain '{}', this environment serves '{}'",
                brain, self.brain_name
            )));
        }
        Ok(())
    }
}

impl Environment for Corridor {
    fn reset(&mut self, brain: &str, _mode: ResetMode) -> Result<Array1<f32>> {
        self.check_brain(brain)?;
        self.position = self.length / 2;
        self.goal = if self.rng.gen::<bool>() { self.length - 1 } else { 0 };
        self.steps = 0;
        self.done = false;
        Ok(self.observation())
    }

    fn step(&mut self, brain: &str, action: usize) -> Result<StepOutcome> {
        self.check_brain(brain)?;
        if self.done {
            return Err(NavigatorError::Environment(
                "step called on a finished episode; reset first".to_string(),
            ));
        }
        match action {
            ACTION_LEFT => self.position = self.position.saturating_sub(1),
            ACTION_RIGHT => self.position = (self.position + 1).min(self.length - 1),
            ACTION_STAY => {}
            _ => {
                return Err(NavigatorError::InvalidAction {
                    action,
                    num_actions: Self::ACTION_SIZE,
                })
            }
        }
        self.steps += 1;

        let reached = self.position == self.goal;
        let reward = if reached { GOAL_REWARD } else { STEP_PENALTY };
        self.done = reached || self.steps >= self.max_steps;

        Ok(StepOutcome {
            reward,
            next_state: self.observation(),
            done: self.done,
        })
    }
}
