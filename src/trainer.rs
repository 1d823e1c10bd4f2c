//! Episode controller: rollout, replay, learning cadence, target sync,
//! exploration schedule, convergence and checkpointing.
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::agent::{DqnAgent, DqnAgentBuilder};
use crate::checkpoint::Checkpoint;
use crate::config::{Config, SyncScope, TrainerConfig};
use crate::env::{Environment, ResetMode};
use crate::error::{NavigatorError, Result};
use crate::metrics::ScoreHistory;
use crate::replay_buffer::{ReplayBuffer, Transition};

/// Terminal state of a call to [`Trainer::train`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    /// The restored checkpoint already beat the target score; nothing ran.
    AlreadySolved,

    /// The trailing average reached the target score.
    Converged,

    /// The episode budget ran out first.
    ExhaustedEpisodes,
}

/// Summary of a training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub status: TrainingStatus,

    /// Epoch the run started from (0 for a fresh run).
    pub start_epoch: usize,

    /// Number of completed episodes at the end of the run.
    pub final_epoch: usize,

    /// Trailing average score at the end of the run.
    pub average_score: Option<f32>,

    /// Full score history, restored episodes included.
    pub scores: Vec<f32>,
}

impl TrainingReport {
    /// Writes the report as pretty-printed JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

/// Owns the agent, the replay buffer and the RNG for one training session.
pub struct Trainer {
    config: TrainerConfig,
    brain_name: String,
    checkpoint_path: PathBuf,
    agent: DqnAgent,
    buffer: ReplayBuffer,
    rng: StdRng,
    epsilon: f32,
    epoch: usize,
    total_steps: u64,
    scores: ScoreHistory,
}

impl Trainer {
    /// Build the agent, buffer and RNG described by `config`.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let agent = DqnAgentBuilder::new()
            .layer_sizes(&config.agent.layer_sizes())
            .optimizer(config.agent.optimizer.clone())
            .use_double_dqn(config.agent.double_dqn)
            .build(&mut rng)?;
        Self::from_parts(
            config.trainer.clone(),
            agent,
            rng,
            config.brain_name.clone(),
            config.checkpoint_path.clone(),
        )
    }

    /// Assemble a trainer around an existing agent.
    pub fn from_parts(
        config: TrainerConfig,
        agent: DqnAgent,
        rng: StdRng,
        brain_name: impl Into<String>,
        checkpoint_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        config.validate()?;
        let buffer = ReplayBuffer::new(config.buffer_capacity);
        let epsilon = config.eps_start;
        Ok(Trainer {
            config,
            brain_name: brain_name.into(),
            checkpoint_path: checkpoint_path.into(),
            agent,
            buffer,
            rng,
            epsilon,
            epoch: 0,
            total_steps: 0,
            scores: ScoreHistory::new(),
        })
    }

    pub fn agent(&self) -> &DqnAgent {
        &self.agent
    }

    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Number of completed episodes.
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn scores(&self) -> &ScoreHistory {
        &self.scores
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    /// Trailing average over the configured window.
    pub fn average_score(&self) -> Option<f32> {
        self.scores.trailing_average(self.config.window)
    }

    /// Capture the current training state.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            epoch: self.epoch as u64,
            epsilon: self.epsilon,
            total_steps: self.total_steps,
            online: self.agent.online().snapshot(),
            optimizer: self.agent.optimizer().clone(),
            score_history: self.scores.clone(),
        }
    }

    /// Replace the training state with `checkpoint`.
    ///
    /// Parameters are validated against the agent's architecture first; on
    /// error nothing is changed.
    pub fn restore(&mut self, checkpoint: Checkpoint) -> Result<()> {
        let epoch = usize::try_from(checkpoint.epoch).map_err(|_| {
            NavigatorError::invalid_parameter("epoch", "checkpoint epoch does not fit in usize")
        })?;
        self.agent.restore(&checkpoint.online, checkpoint.optimizer)?;
        self.epoch = epoch;
        self.epsilon = checkpoint.epsilon;
        self.total_steps = checkpoint.total_steps;
        self.scores = checkpoint.score_history;
        Ok(())
    }

    pub fn save_checkpoint(&self) -> Result<()> {
        self.checkpoint().save(&self.checkpoint_path)?;
        info!(
            "Model saved in {} after {} epochs",
            self.checkpoint_path.display(),
            self.epoch
        );
        Ok(())
    }

    /// Restore from the checkpoint file if there is one.
    ///
    /// Returns whether a checkpoint was loaded. A missing file means a cold
    /// start; an unreadable one is an error.
    pub fn resume(&mut self) -> Result<bool> {
        match Checkpoint::load(&self.checkpoint_path)? {
            Some(checkpoint) => {
                self.restore(checkpoint)?;
                info!(
                    "Loaded existing model ended at epoch: {} with average score of {:8.2}",
                    self.epoch,
                    self.average_score().unwrap_or(f32::NAN)
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Train until the trailing average reaches the target score or the
    /// episode budget is used up.
    pub fn train<E: Environment>(&mut self, env: &mut E) -> Result<TrainingReport> {
        if self.resume()? {
            if let Some(average) = self.average_score() {
                if average > self.config.target_score {
                    info!(
                        "Score of the current model {:8.2} is already higher than the target score {}!",
                        average, self.config.target_score
                    );
                    return Ok(self.report(TrainingStatus::AlreadySolved, self.epoch));
                }
            }
        }

        let start_epoch = self.epoch;
        let mut status = TrainingStatus::ExhaustedEpisodes;
        while self.epoch < self.config.n_episodes {
            self.epoch += 1;

            let score = self.run_episode(env)?;
            self.scores.push(score);
            self.epsilon = self
                .config
                .eps_final
                .max(self.config.eps_decay_rate * self.epsilon);

            let average = self.average_score().unwrap_or(score);
            if average >= self.config.target_score {
                info!("Epoch: {:04}, average score: {:8.2}", self.epoch, average);
                status = TrainingStatus::Converged;
                break;
            }

            if self.epoch % self.config.report_interval == 0 {
                if let Some(summary) = self.scores.summary(self.config.window) {
                    info!(
                        "Epoch: {:04}, average score: {:8.2} (std {:.2}, min {:.2}, max {:.2}), epsilon {:.3}",
                        self.epoch, summary.mean, summary.std, summary.min, summary.max, self.epsilon
                    );
                }
            }

            if self.epoch % self.config.save_interval == 0 {
                self.save_checkpoint()?;
            }
        }

        if status == TrainingStatus::Converged || self.epoch > start_epoch {
            self.save_checkpoint()?;
        }

        Ok(self.report(status, start_epoch))
    }

    /// Run one greedy evaluation episode and return its cumulative reward.
    ///
    /// Nothing is stored and no parameter changes.
    pub fn play<E: Environment>(&self, env: &mut E) -> Result<f32> {
        let mut state = env.reset(&self.brain_name, ResetMode::Evaluate)?;
        let mut score = 0.0;
        loop {
            let action = self.agent.greedy_action(state.view())?;
            let outcome = env.step(&self.brain_name, action)?;
            score += outcome.reward;
            state = outcome.next_state;
            if outcome.done {
                break;
            }
        }
        info!("Final score is: {}", score);
        Ok(score)
    }

    fn run_episode<E: Environment>(&mut self, env: &mut E) -> Result<f32> {
        let replay_start_size = self.config.effective_replay_start_size();
        let mut state = env.reset(&self.brain_name, ResetMode::Train)?;
        let mut score = 0.0;
        let mut episode_steps: u64 = 0;

        loop {
            episode_steps += 1;
            self.total_steps += 1;

            let action = self.agent.act(state.view(), self.epsilon, &mut self.rng)?;
            let outcome = env.step(&self.brain_name, action)?;
            self.buffer.append(Transition {
                state,
                action,
                reward: outcome.reward,
                next_state: outcome.next_state.clone(),
                done: outcome.done,
            });

            if self.buffer.len() > replay_start_size {
                let batch = self.buffer.sample(self.config.batch_size, &mut self.rng)?;
                self.agent
                    .learn(&batch, self.config.gamma, self.config.learning_rate)?;
            }

            let sync_counter = match self.config.target_sync_scope {
                SyncScope::Global => self.total_steps,
                SyncScope::Episode => episode_steps,
            };
            if sync_counter % self.config.target_update_interval as u64 == 0 {
                self.agent.sync_target()?;
                debug!("target network synced at step {}", self.total_steps);
            }

            score += outcome.reward;
            state = outcome.next_state;
            if outcome.done {
                break;
            }
        }

        Ok(score)
    }

    fn report(&self, status: TrainingStatus, start_epoch: usize) -> TrainingReport {
        TrainingReport {
            status,
            start_epoch,
            final_epoch: self.epoch,
            average_score: self.average_score(),
            scores: self.scores.as_slice().to_vec(),
        }
    }
}
