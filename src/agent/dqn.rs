use log::debug;
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;

use super::policy::{argmax, Decision, EpsilonGreedy};
use crate::activations::Activation;
use crate::config::OptimizerConfig;
use crate::error::{NavigatorError, Result};
use crate::loss::{Loss, Mse};
use crate::network::{Parameters, QNetwork};
use crate::optimizer::{Optimizer, OptimizerWrapper};
use crate::replay_buffer::Batch;

/// Deep Q-Network agent with an online/target estimator pair.
///
/// - the online network is trained by gradient descent and drives action selection
/// - the target network is only ever overwritten by [`sync_target`](Self::sync_target)
/// - with Double DQN enabled the online network picks the bootstrap action and the
///   target network evaluates it
///
/// # Example
///
/// ```rust
/// use navigator::agent::DqnAgentBuilder;
/// use navigator::replay_buffer::{ReplayBuffer, Transition};
/// use ndarray::array;
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let mut rng = StdRng::seed_from_u64(7);
/// let mut agent = DqnAgentBuilder::new()
///     .layer_sizes(&[2, 16, 3])
///     .use_double_dqn(true)
///     .build(&mut rng)
///     .unwrap();
///
/// let mut buffer = ReplayBuffer::new(100);
/// let state = array![0.1, -0.2];
/// let action = agent.act(state.view(), 1.0, &mut rng).unwrap();
/// buffer.append(Transition {
///     state,
///     action,
///     reward: 1.0,
///     next_state: array![0.2, -0.1],
///     done: false,
/// });
///
/// let batch = buffer.sample(1, &mut rng).unwrap();
/// let loss = agent.learn(&batch, 0.99, 5e-4).unwrap();
/// assert!(loss.is_finite());
/// agent.sync_target().unwrap();
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DqnAgent {
    online: QNetwork,
    target: QNetwork,
    optimizer: OptimizerWrapper,
    use_double_dqn: bool,
    train_steps: usize,
}

impl DqnAgent {
    /// Wrap `online` into an agent. The target network starts as an exact copy.
    pub fn new(online: QNetwork, optimizer: OptimizerWrapper, use_double_dqn: bool) -> Self {
        let target = online.clone();
        DqnAgent {
            online,
            target,
            optimizer,
            use_double_dqn,
            train_steps: 0,
        }
    }

    /// Assemble an agent from an explicit online/target pair.
    pub fn from_networks(
        online: QNetwork,
        target: QNetwork,
        optimizer: OptimizerWrapper,
        use_double_dqn: bool,
    ) -> Result<Self> {
        let shapes = |net: &QNetwork| -> Vec<(usize, usize)> {
            net.layers()
                .iter()
                .map(|layer| (layer.input_size(), layer.output_size()))
                .collect()
        };
        if shapes(&online) != shapes(&target) {
            return Err(NavigatorError::dimension_mismatch(
                format!("{:?}", shapes(&online)),
                format!("{:?}", shapes(&target)),
            ));
        }
        Ok(DqnAgent {
            online,
            target,
            optimizer,
            use_double_dqn,
            train_steps: 0,
        })
    }

    pub fn online(&self) -> &QNetwork {
        &self.online
    }

    pub fn target(&self) -> &QNetwork {
        &self.target
    }

    pub fn optimizer(&self) -> &OptimizerWrapper {
        &self.optimizer
    }

    pub fn use_double_dqn(&self) -> bool {
        self.use_double_dqn
    }

    pub fn set_use_double_dqn(&mut self, use_double_dqn: bool) {
        self.use_double_dqn = use_double_dqn;
    }

    /// Number of learner updates applied since construction
    pub fn train_steps(&self) -> usize {
        self.train_steps
    }

    pub fn state_size(&self) -> usize {
        self.online.state_size()
    }

    pub fn action_size(&self) -> usize {
        self.online.action_size()
    }

    /// Action values of the online network for one state.
    pub fn q_values(&self, state: ArrayView1<f32>) -> Result<Array1<f32>> {
        self.online.predict(state)
    }

    /// Action with the highest online value; ties go to the lowest index.
    pub fn greedy_action(&self, state: ArrayView1<f32>) -> Result<usize> {
        let q_values = self.q_values(state)?;
        argmax(q_values.view())
            .ok_or_else(|| NavigatorError::dimension_mismatch("at least one action", "none"))
    }

    /// Select an action using the epsilon-greedy policy.
    ///
    /// `epsilon = 0` is the pure greedy policy used for evaluation.
    pub fn act<R: Rng + ?Sized>(
        &self,
        state: ArrayView1<f32>,
        epsilon: f32,
        rng: &mut R,
    ) -> Result<usize> {
        if state.len() != self.state_size() {
            return Err(NavigatorError::dimension_mismatch(
                format!("state of width {}", self.state_size()),
                format!("state of width {}", state.len()),
            ));
        }
        match EpsilonGreedy::new(epsilon).decide(self.action_size(), rng) {
            Decision::Explore(action) => Ok(action),
            Decision::Exploit => self.greedy_action(state),
        }
    }

    /// Bootstrapped TD targets `r + gamma * q_next * (1 - done)` for every row.
    ///
    /// Terminal rows are exactly the reward. No gradient flows through here: the
    /// targets are plain values.
    pub fn td_targets(&self, batch: &Batch, gamma: f32) -> Result<Array1<f32>> {
        self.validate_batch(batch)?;

        let q_next_target = self.target.predict_batch(batch.next_states.view())?;
        let q_next: Array1<f32> = if self.use_double_dqn {
            let q_next_online = self.online.predict_batch(batch.next_states.view())?;
            q_next_online
                .outer_iter()
                .zip(q_next_target.outer_iter())
                .map(|(online_row, target_row)| {
                    let best_action = argmax(online_row).unwrap_or(0);
                    target_row[best_action]
                })
                .collect()
        } else {
            q_next_target
                .outer_iter()
                .map(|row| row.fold(f32::NEG_INFINITY, |max, &val| max.max(val)))
                .collect()
        };

        let targets = batch
            .rewards
            .iter()
            .zip(batch.dones.iter())
            .zip(q_next.iter())
            .map(|((&reward, &done), &next)| {
                if done > 0.5 {
                    reward
                } else {
                    reward + gamma * next
                }
            })
            .collect();
        Ok(targets)
    }

    /// One gradient step on the online network; returns the MSE loss before the step.
    pub fn learn(&mut self, batch: &Batch, gamma: f32, learning_rate: f32) -> Result<f32> {
        let targets = self.td_targets(batch, gamma)?;

        let pass = self.online.forward_train(batch.states.view())?;
        let outputs = pass.outputs();
        let q_expected: Array1<f32> = batch
            .actions
            .iter()
            .enumerate()
            .map(|(i, &action)| outputs[[i, action]])
            .collect();

        let loss = Mse.compute(q_expected.view(), targets.view());
        let q_gradient = Mse.gradient(q_expected.view(), targets.view());

        // Only the taken action's output receives gradient.
        let mut output_gradient = Array2::zeros(outputs.dim());
        for (i, &action) in batch.actions.iter().enumerate() {
            output_gradient[[i, action]] = q_gradient[i];
        }

        let gradients = self.online.backward(&pass, output_gradient.view())?;
        self.optimizer
            .step(self.online.layers_mut(), &gradients, learning_rate)?;
        self.train_steps += 1;
        debug!("learn step {}: loss {:.6}", self.train_steps, loss);

        Ok(loss)
    }

    /// Overwrite the target network with a snapshot of the online network.
    pub fn sync_target(&mut self) -> Result<()> {
        let snapshot = self.online.snapshot();
        self.target.assign(&snapshot)
    }

    /// Load online parameters and optimizer state, e.g. from a checkpoint.
    /// The target network mirrors the restored online network.
    ///
    /// Both the parameters and the optimizer state must fit this agent's
    /// architecture; on mismatch nothing is changed.
    pub fn restore(&mut self, parameters: &Parameters, optimizer: OptimizerWrapper) -> Result<()> {
        optimizer.check_layers(self.online.layers())?;
        self.online.assign(parameters)?;
        self.target.assign(parameters)?;
        self.optimizer = optimizer;
        Ok(())
    }

    fn validate_batch(&self, batch: &Batch) -> Result<()> {
        if batch.is_empty() {
            return Err(NavigatorError::EmptyBatch);
        }
        let rows = batch.len();
        if batch.states.nrows() != rows
            || batch.next_states.nrows() != rows
            || batch.rewards.len() != rows
            || batch.dones.len() != rows
        {
            return Err(NavigatorError::dimension_mismatch(
                format!("{} rows in every batch array", rows),
                format!(
                    "{}/{}/{}/{} rows",
                    batch.states.nrows(),
                    batch.rewards.len(),
                    batch.next_states.nrows(),
                    batch.dones.len()
                ),
            ));
        }
        let state_size = self.state_size();
        if batch.states.ncols() != state_size || batch.next_states.ncols() != state_size {
            return Err(NavigatorError::dimension_mismatch(
                format!("states of width {}", state_size),
                format!("states of width {}", batch.states.ncols()),
            ));
        }
        let num_actions = self.action_size();
        if let Some(&action) = batch.actions.iter().find(|&&a| a >= num_actions) {
            return Err(NavigatorError::InvalidAction {
                action,
                num_actions,
            });
        }
        Ok(())
    }
}

/// Builder pattern for DqnAgent
pub struct DqnAgentBuilder {
    layer_sizes: Vec<usize>,
    activations: Option<Vec<Activation>>,
    optimizer: OptimizerConfig,
    use_double_dqn: bool,
}

impl DqnAgentBuilder {
    pub fn new() -> Self {
        DqnAgentBuilder {
            layer_sizes: vec![],
            activations: None,
            optimizer: OptimizerConfig::default(),
            use_double_dqn: true,
        }
    }

    pub fn layer_sizes(mut self, sizes: &[usize]) -> Self {
        self.layer_sizes = sizes.to_vec();
        self
    }

    pub fn activations(mut self, activations: &[Activation]) -> Self {
        self.activations = Some(activations.to_vec());
        self
    }

    pub fn optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn use_double_dqn(mut self, use_double: bool) -> Self {
        self.use_double_dqn = use_double;
        self
    }

    /// Initialise the networks from `rng` and assemble the agent.
    pub fn build<R: Rng + ?Sized>(self, rng: &mut R) -> Result<DqnAgent> {
        let online = match &self.activations {
            Some(activations) => QNetwork::new(&self.layer_sizes, activations, rng)?,
            None => QNetwork::mlp(&self.layer_sizes, rng)?,
        };
        let optimizer = self.optimizer.build(online.layers());
        Ok(DqnAgent::new(online, optimizer, self.use_double_dqn))
    }
}

impl Default for DqnAgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
