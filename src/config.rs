//! Configuration of the agent and of the [`Trainer`](crate::trainer::Trainer).
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

use crate::error::{NavigatorError, Result};
use crate::layers::DenseLayer;
use crate::optimizer::{Adam, OptimizerWrapper, SGD};

/// Which step counter drives the target-network sync cadence.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncScope {
    /// Total environment steps over the whole training run, resumes included.
    #[default]
    Global,

    /// Steps within the current episode; the counter restarts on every reset.
    Episode,
}

/// Optimizer used for the online network.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Adam {
        beta1: f32,
        beta2: f32,
        epsilon: f32,
        weight_decay: f32,
    },
    Sgd {
        weight_decay: f32,
    },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Adam {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay: 0.0,
        }
    }
}

impl OptimizerConfig {
    /// Fresh optimizer state sized for `layers`.
    pub fn build(&self, layers: &[DenseLayer]) -> OptimizerWrapper {
        match *self {
            OptimizerConfig::Adam {
                beta1,
                beta2,
                epsilon,
                weight_decay,
            } => OptimizerWrapper::Adam(
                Adam::new(layers, beta1, beta2, epsilon).weight_decay(weight_decay),
            ),
            OptimizerConfig::Sgd { weight_decay } => {
                OptimizerWrapper::SGD(SGD::new().weight_decay(weight_decay))
            }
        }
    }

    pub fn weight_decay(&self) -> f32 {
        match *self {
            OptimizerConfig::Adam { weight_decay, .. } => weight_decay,
            OptimizerConfig::Sgd { weight_decay } => weight_decay,
        }
    }
}

/// Shape of the value estimator and learner options.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct AgentConfig {
    /// Width of the observation vector.
    pub state_size: usize,

    /// Number of discrete actions.
    pub action_size: usize,

    /// Widths of the hidden layers (ReLU).
    pub hidden_layers: Vec<usize>,

    /// Double DQN bootstrap instead of the vanilla max.
    pub double_dqn: bool,

    pub optimizer: OptimizerConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            state_size: 2,
            action_size: 3,
            hidden_layers: vec![64, 64],
            double_dqn: true,
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Full layer sizes, input and output included.
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.hidden_layers.len() + 2);
        sizes.push(self.state_size);
        sizes.extend_from_slice(&self.hidden_layers);
        sizes.push(self.action_size);
        sizes
    }
}

/// Configuration of the training loop.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct TrainerConfig {
    /// Training horizon in episodes.
    pub n_episodes: usize,

    /// Exploration rate of a fresh run.
    pub eps_start: f32,

    /// Multiplicative epsilon decay applied after every episode.
    pub eps_decay_rate: f32,

    /// Lower bound of epsilon.
    pub eps_final: f32,

    /// Interval of target-network syncs in environment steps.
    pub target_update_interval: usize,

    /// Counter the sync interval is measured on.
    pub target_sync_scope: SyncScope,

    /// Discount factor.
    pub gamma: f32,

    pub learning_rate: f32,

    pub batch_size: usize,

    /// Learning starts once the buffer holds more than this many transitions.
    /// Defaults to twice the batch size.
    pub replay_start_size: Option<usize>,

    /// Maximum number of transitions retained.
    pub buffer_capacity: usize,

    /// Number of trailing episodes averaged for the convergence check.
    pub window: usize,

    /// Average score at which the task counts as solved.
    pub target_score: f32,

    /// Interval of checkpoint saves in episodes.
    pub save_interval: usize,

    /// Interval of progress reports in episodes.
    pub report_interval: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            n_episodes: 1000,
            eps_start: 1.0,
            eps_decay_rate: 0.995,
            eps_final: 0.01,
            target_update_interval: 4,
            target_sync_scope: SyncScope::Global,
            gamma: 1.0,
            learning_rate: 5e-4,
            batch_size: 16,
            replay_start_size: None,
            buffer_capacity: 1000,
            window: 100,
            target_score: 13.0,
            save_interval: 100,
            report_interval: 50,
        }
    }
}

impl TrainerConfig {
    /// Sets the number of training episodes.
    pub fn n_episodes(mut self, v: usize) -> Self {
        self.n_episodes = v;
        self
    }

    /// Sets the initial epsilon.
    pub fn eps_start(mut self, v: f32) -> Self {
        self.eps_start = v;
        self
    }

    /// Sets the epsilon decay rate and floor.
    pub fn eps_schedule(mut self, decay_rate: f32, eps_final: f32) -> Self {
        self.eps_decay_rate = decay_rate;
        self.eps_final = eps_final;
        self
    }

    /// Sets the interval of target syncs in environment steps.
    pub fn target_update_interval(mut self, v: usize) -> Self {
        self.target_update_interval = v;
        self
    }

    /// Sets the counter the target sync interval is measured on.
    pub fn target_sync_scope(mut self, v: SyncScope) -> Self {
        self.target_sync_scope = v;
        self
    }

    pub fn gamma(mut self, v: f32) -> Self {
        self.gamma = v;
        self
    }

    pub fn learning_rate(mut self, v: f32) -> Self {
        self.learning_rate = v;
        self
    }

    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the warm-up threshold in transitions.
    pub fn replay_start_size(mut self, v: usize) -> Self {
        self.replay_start_size = Some(v);
        self
    }

    pub fn buffer_capacity(mut self, v: usize) -> Self {
        self.buffer_capacity = v;
        self
    }

    /// Sets the trailing window and the score that counts as solved.
    pub fn convergence(mut self, window: usize, target_score: f32) -> Self {
        self.window = window;
        self.target_score = target_score;
        self
    }

    /// Sets the interval of checkpoint saves in episodes.
    pub fn save_interval(mut self, v: usize) -> Self {
        self.save_interval = v;
        self
    }

    /// Sets the interval of progress reports in episodes.
    pub fn report_interval(mut self, v: usize) -> Self {
        self.report_interval = v;
        self
    }

    /// Warm-up threshold with the default applied.
    pub fn effective_replay_start_size(&self) -> usize {
        self.replay_start_size.unwrap_or(self.batch_size * 2)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("n_episodes", self.n_episodes),
            ("target_update_interval", self.target_update_interval),
            ("batch_size", self.batch_size),
            ("buffer_capacity", self.buffer_capacity),
            ("window", self.window),
            ("save_interval", self.save_interval),
            ("report_interval", self.report_interval),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(NavigatorError::Config(format!("{} must be positive", name)));
        }
        for (name, v) in [
            ("eps_start", self.eps_start),
            ("eps_final", self.eps_final),
            ("gamma", self.gamma),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(NavigatorError::Config(format!(
                    "{} must lie in [0, 1], got {}",
                    name, v
                )));
            }
        }
        if !(self.eps_decay_rate > 0.0 && self.eps_decay_rate <= 1.0) {
            return Err(NavigatorError::Config(format!(
                "eps_decay_rate must lie in (0, 1], got {}",
                self.eps_decay_rate
            )));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(NavigatorError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        let replay_start = self.effective_replay_start_size();
        if replay_start < self.batch_size {
            return Err(NavigatorError::Config(format!(
                "replay_start_size ({}) must be at least batch_size ({})",
                replay_start, self.batch_size
            )));
        }
        if replay_start >= self.buffer_capacity {
            warn!(
                "replay_start_size ({}) is not below buffer_capacity ({}); learning will never start",
                replay_start, self.buffer_capacity
            );
        }
        Ok(())
    }
}

/// Top-level configuration file.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct Config {
    /// Seed of the single RNG behind weight init, exploration and sampling.
    /// Unset means seeded from entropy.
    pub seed: Option<u64>,

    /// Name of the agent brain the environment is addressed with.
    pub brain_name: String,

    /// Checkpoint file used for resume and persistence.
    pub checkpoint_path: PathBuf,

    pub agent: AgentConfig,

    pub trainer: TrainerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: None,
            brain_name: "BananaBrain".to_string(),
            checkpoint_path: PathBuf::from("dqn_checkpoint.bin"),
            agent: AgentConfig::default(),
            trainer: TrainerConfig::default(),
        }
    }
}

impl Config {
    /// Settings for the bundled [`Corridor`](crate::envs::Corridor) environment.
    ///
    /// A perfect corridor episode scores just under the goal reward, so the
    /// convergence target sits at 0.9 instead of the default 13.0.
    pub fn corridor() -> Self {
        Self {
            brain_name: "CorridorBrain".to_string(),
            trainer: TrainerConfig::default()
                .eps_schedule(0.99, 0.01)
                .convergence(100, 0.9),
            ..Self::default()
        }
    }

    /// Constructs [`Config`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let config = serde_yaml::from_reader(rdr)?;
        Ok(config)
    }

    /// Saves [`Config`] as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.agent.state_size == 0 || self.agent.action_size == 0 {
            return Err(NavigatorError::Config(
                "state_size and action_size must be positive".to_string(),
            ));
        }
        if self.agent.hidden_layers.iter().any(|&width| width == 0) {
            return Err(NavigatorError::Config(
                "hidden layer widths must be positive".to_string(),
            ));
        }
        let weight_decay = self.agent.optimizer.weight_decay();
        if !(weight_decay >= 0.0 && weight_decay.is_finite()) {
            return Err(NavigatorError::Config(format!(
                "weight_decay must be non-negative, got {}",
                weight_decay
            )));
        }
        self.trainer.validate()
    }
}
