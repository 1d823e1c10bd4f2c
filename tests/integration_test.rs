use ndarray::{array, Array1};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

use navigator::{
    checkpoint::{Checkpoint, CHECKPOINT_VERSION},
    config::{AgentConfig, Config, SyncScope, TrainerConfig},
    env::{Environment, ResetMode, StepOutcome},
    envs::corridor::{Corridor, ACTION_LEFT, ACTION_RIGHT},
    error::{NavigatorError, Result},
    metrics::ScoreHistory,
    trainer::{Trainer, TrainingStatus},
};

const BRAIN: &str = "TestBrain";

/// Fixed-length episodes paying a constant reward per step.
struct ScriptedEnv {
    episode_len: usize,
    reward: f32,
    step: usize,
    resets: usize,
    evaluations: usize,
    fail_at_step: Option<usize>,
}

impl ScriptedEnv {
    fn new(episode_len: usize, reward: f32) -> Self {
        ScriptedEnv {
            episode_len,
            reward,
            step: 0,
            resets: 0,
            evaluations: 0,
            fail_at_step: None,
        }
    }

    fn observation(&self) -> Array1<f32> {
        array![self.step as f32 / self.episode_len as f32, 0.5]
    }
}

impl Environment for ScriptedEnv {
    fn reset(&mut self, brain: &str, mode: ResetMode) -> Result<Array1<f32>> {
        assert_eq!(brain, BRAIN);
        self.step = 0;
        self.resets += 1;
        if mode == ResetMode::Evaluate {
            self.evaluations += 1;
        }
        Ok(self.observation())
    }

    fn step(&mut self, _brain: &str, action: usize) -> Result<StepOutcome> {
        assert!(action < 2);
        self.step += 1;
        if self.fail_at_step == Some(self.step) {
            return Err(NavigatorError::Environment("simulator crashed".to_string()));
        }
        Ok(StepOutcome {
            reward: self.reward,
            next_state: self.observation(),
            done: self.step >= self.episode_len,
        })
    }
}

fn config(checkpoint: &Path) -> Config {
    Config {
        seed: Some(17),
        brain_name: BRAIN.to_string(),
        checkpoint_path: checkpoint.to_path_buf(),
        agent: AgentConfig {
            state_size: 2,
            action_size: 2,
            hidden_layers: vec![8],
            ..AgentConfig::default()
        },
        trainer: TrainerConfig::default()
            .n_episodes(20)
            .batch_size(4)
            .convergence(5, 100.0)
            .save_interval(1000)
            .report_interval(5),
    }
}

/// Write a checkpoint for the architecture in `config` with the given history.
fn seed_checkpoint(config: &Config, scores: Vec<f32>) {
    let trainer = Trainer::new(config).unwrap();
    let mut checkpoint = trainer.checkpoint();
    checkpoint.epoch = scores.len() as u64;
    checkpoint.epsilon = 0.2;
    checkpoint.score_history = ScoreHistory::from(scores);
    checkpoint.save(&config.checkpoint_path).unwrap();
}

#[test]
fn test_converges_and_saves() {
    let dir = tempdir().unwrap();
    let mut config = config(&dir.path().join("agent.bin"));
    config.trainer = config.trainer.convergence(5, 9.5);
    let mut env = ScriptedEnv::new(10, 1.0);

    let mut trainer = Trainer::new(&config).unwrap();
    let report = trainer.train(&mut env).unwrap();

    assert_eq!(report.status, TrainingStatus::Converged);
    assert_eq!(report.start_epoch, 0);
    assert_eq!(report.final_epoch, 1);
    assert_eq!(report.scores, vec![10.0]);

    let saved = Checkpoint::load(&config.checkpoint_path).unwrap().unwrap();
    assert_eq!(saved.epoch, 1);
    assert_eq!(saved.score_history.as_slice(), &[10.0]);
    assert_eq!(saved.online, trainer.agent().online().snapshot());
}

#[test]
fn test_exhausts_episode_budget() {
    let dir = tempdir().unwrap();
    let config = config(&dir.path().join("agent.bin"));
    let mut env = ScriptedEnv::new(10, 0.1);

    let mut trainer = Trainer::new(&config).unwrap();
    let report = trainer.train(&mut env).unwrap();

    assert_eq!(report.status, TrainingStatus::ExhaustedEpisodes);
    assert_eq!(report.final_epoch, 20);
    assert_eq!(env.resets, 20);
    assert_eq!(trainer.total_steps(), 200);
    assert_eq!(trainer.buffer().len(), 200);
    // Learning starts once the buffer holds more than 2 * batch_size transitions.
    assert_eq!(trainer.agent().train_steps(), 200 - 8);
    assert!(config.checkpoint_path.exists());
}

#[test]
fn test_epsilon_decays_to_floor() {
    let dir = tempdir().unwrap();
    let mut config = config(&dir.path().join("agent.bin"));
    config.trainer = config.trainer.eps_schedule(0.5, 0.1).n_episodes(3);
    let mut env = ScriptedEnv::new(3, 0.0);

    let mut trainer = Trainer::new(&config).unwrap();
    trainer.train(&mut env).unwrap();
    // 1.0 -> 0.5 -> 0.25 -> 0.125
    assert!((trainer.epsilon() - 0.125).abs() < 1e-6);

    let mut config = config.clone();
    config.checkpoint_path = dir.path().join("other.bin");
    config.trainer = config.trainer.n_episodes(10);
    let mut trainer = Trainer::new(&config).unwrap();
    trainer.train(&mut env).unwrap();
    assert!((trainer.epsilon() - 0.1).abs() < 1e-6);
}

#[test]
fn test_resume_continues_from_checkpoint() {
    let dir = tempdir().unwrap();
    let mut config = config(&dir.path().join("agent.bin"));
    config.trainer = config.trainer.n_episodes(51).convergence(100, 9.5);
    seed_checkpoint(&config, vec![0.0; 50]);

    let mut env = ScriptedEnv::new(10, 1.0);
    let mut trainer = Trainer::new(&config).unwrap();
    let report = trainer.train(&mut env).unwrap();

    assert_eq!(report.status, TrainingStatus::ExhaustedEpisodes);
    assert_eq!(report.start_epoch, 50);
    assert_eq!(report.final_epoch, 51);
    assert_eq!(report.scores.len(), 51);
    assert_eq!(env.resets, 1);
    // Restored epsilon decays once more.
    assert!((trainer.epsilon() - 0.2 * 0.995).abs() < 1e-6);

    let saved = Checkpoint::load(&config.checkpoint_path).unwrap().unwrap();
    assert_eq!(saved.epoch, 51);
}

#[test]
fn test_resume_restores_exact_state() {
    let dir = tempdir().unwrap();
    let config = config(&dir.path().join("agent.bin"));
    let scores: Vec<f32> = (0..50).map(|i| i as f32 * 0.1).collect();
    seed_checkpoint(&config, scores.clone());
    let saved = Checkpoint::load(&config.checkpoint_path).unwrap().unwrap();

    let mut trainer = Trainer::new(&config).unwrap();
    assert!(trainer.resume().unwrap());
    assert_eq!(trainer.epoch(), 50);
    assert_eq!(trainer.epsilon(), 0.2);
    assert_eq!(trainer.scores().as_slice(), scores.as_slice());
    assert_eq!(
        trainer.average_score(),
        ScoreHistory::from(scores).trailing_average(config.trainer.window)
    );
    assert_eq!(trainer.agent().online().snapshot(), saved.online);
    assert_eq!(trainer.agent().target(), trainer.agent().online());
    assert_eq!(trainer.checkpoint(), saved);
}

#[test]
fn test_resume_without_checkpoint_is_cold_start() {
    let dir = tempdir().unwrap();
    let config = config(&dir.path().join("missing.bin"));
    let mut trainer = Trainer::new(&config).unwrap();
    assert!(!trainer.resume().unwrap());
    assert_eq!(trainer.epoch(), 0);
    assert_eq!(trainer.epsilon(), 1.0);
}

#[test]
fn test_already_solved_checkpoint_runs_nothing() {
    let dir = tempdir().unwrap();
    let mut config = config(&dir.path().join("agent.bin"));
    config.trainer = config.trainer.convergence(5, 9.5);
    seed_checkpoint(&config, vec![10.0; 5]);
    let before = fs::read(&config.checkpoint_path).unwrap();

    let mut env = ScriptedEnv::new(10, 1.0);
    let mut trainer = Trainer::new(&config).unwrap();
    let report = trainer.train(&mut env).unwrap();

    assert_eq!(report.status, TrainingStatus::AlreadySolved);
    assert_eq!(report.final_epoch, 5);
    assert_eq!(env.resets, 0);
    assert_eq!(fs::read(&config.checkpoint_path).unwrap(), before);
}

#[test]
fn test_finished_run_is_idempotent() {
    let dir = tempdir().unwrap();
    let mut config = config(&dir.path().join("agent.bin"));
    config.trainer = config.trainer.n_episodes(5);
    seed_checkpoint(&config, vec![0.0; 5]);
    let before = fs::read(&config.checkpoint_path).unwrap();

    let mut env = ScriptedEnv::new(10, 0.0);
    let mut trainer = Trainer::new(&config).unwrap();
    let report = trainer.train(&mut env).unwrap();

    assert_eq!(report.status, TrainingStatus::ExhaustedEpisodes);
    assert_eq!(report.start_epoch, 5);
    assert_eq!(report.final_epoch, 5);
    assert_eq!(env.resets, 0);
    assert_eq!(fs::read(&config.checkpoint_path).unwrap(), before);
}

#[test]
fn test_corrupt_checkpoint_is_fatal() {
    let dir = tempdir().unwrap();
    let config = config(&dir.path().join("agent.bin"));
    fs::write(&config.checkpoint_path, b"definitely not a checkpoint").unwrap();

    let mut env = ScriptedEnv::new(10, 1.0);
    let mut trainer = Trainer::new(&config).unwrap();
    assert!(matches!(
        trainer.train(&mut env),
        Err(NavigatorError::CorruptCheckpoint { .. })
    ));
    assert_eq!(env.resets, 0);
}

#[test]
fn test_future_checkpoint_version_is_fatal() {
    let dir = tempdir().unwrap();
    let config = config(&dir.path().join("agent.bin"));
    seed_checkpoint(&config, vec![0.0; 3]);
    let mut bytes = fs::read(&config.checkpoint_path).unwrap();
    bytes[4..8].copy_from_slice(&(CHECKPOINT_VERSION + 1).to_le_bytes());
    fs::write(&config.checkpoint_path, bytes).unwrap();

    let mut trainer = Trainer::new(&config).unwrap();
    assert!(matches!(
        trainer.resume(),
        Err(NavigatorError::UnsupportedVersion { .. })
    ));
}

#[test]
fn test_checkpoint_for_other_architecture_is_rejected() {
    let dir = tempdir().unwrap();
    let config = config(&dir.path().join("agent.bin"));
    seed_checkpoint(&config, vec![0.0; 3]);

    let mut wider = config.clone();
    wider.agent.hidden_layers = vec![16];
    let mut trainer = Trainer::new(&wider).unwrap();
    assert!(matches!(
        trainer.resume(),
        Err(NavigatorError::DimensionMismatch { .. })
    ));
    assert_eq!(trainer.epoch(), 0);
}

#[test]
fn test_optimizer_state_for_other_architecture_is_rejected() {
    let dir = tempdir().unwrap();
    let config = config(&dir.path().join("agent.bin"));

    // Parameters fit, but the Adam moments belong to a three-action network.
    let mut three_actions = config.clone();
    three_actions.agent.action_size = 3;
    let mut checkpoint = Trainer::new(&config).unwrap().checkpoint();
    checkpoint.epoch = 4;
    checkpoint.optimizer = Trainer::new(&three_actions).unwrap().agent().optimizer().clone();
    checkpoint.save(&config.checkpoint_path).unwrap();

    let mut trainer = Trainer::new(&config).unwrap();
    let before = trainer.agent().clone();
    assert!(matches!(
        trainer.resume(),
        Err(NavigatorError::DimensionMismatch { .. })
    ));
    assert_eq!(trainer.epoch(), 0);
    assert_eq!(trainer.agent(), &before);
}

#[test]
fn test_environment_errors_propagate() {
    let dir = tempdir().unwrap();
    let config = config(&dir.path().join("agent.bin"));
    let mut env = ScriptedEnv::new(10, 1.0);
    env.fail_at_step = Some(4);

    let mut trainer = Trainer::new(&config).unwrap();
    assert!(matches!(
        trainer.train(&mut env),
        Err(NavigatorError::Environment(_))
    ));
}

#[test]
fn test_sync_scopes_count_differently() {
    // 3-step episodes with a sync interval of 4: the global counter syncs at
    // steps 4 and 8, the per-episode counter never reaches 4.
    let dir = tempdir().unwrap();
    let mut config = config(&dir.path().join("agent.bin"));
    config.trainer = config
        .trainer
        .n_episodes(3)
        .replay_start_size(4)
        .target_sync_scope(SyncScope::Episode);
    let mut env = ScriptedEnv::new(3, 1.0);

    let mut trainer = Trainer::new(&config).unwrap();
    trainer.train(&mut env).unwrap();
    assert!(trainer.agent().train_steps() > 0);
    assert_ne!(trainer.agent().online(), trainer.agent().target());

    let mut config = config.clone();
    config.checkpoint_path = dir.path().join("global.bin");
    config.trainer = config.trainer.target_sync_scope(SyncScope::Global).n_episodes(4);
    let mut trainer = Trainer::new(&config).unwrap();
    trainer.train(&mut env).unwrap();
    // The last step (12) learns first and then syncs.
    assert_eq!(trainer.agent().online(), trainer.agent().target());
}

#[test]
fn test_same_seed_same_run() {
    let dir = tempdir().unwrap();
    let mut first = config(&dir.path().join("a.bin"));
    first.trainer = first.trainer.n_episodes(4);
    let mut second = first.clone();
    second.checkpoint_path = dir.path().join("b.bin");

    let mut trainer_a = Trainer::new(&first).unwrap();
    let mut trainer_b = Trainer::new(&second).unwrap();
    trainer_a.train(&mut ScriptedEnv::new(6, 0.3)).unwrap();
    trainer_b.train(&mut ScriptedEnv::new(6, 0.3)).unwrap();
    assert_eq!(trainer_a.agent().online(), trainer_b.agent().online());
}

#[test]
fn test_play_is_greedy_and_side_effect_free() {
    let dir = tempdir().unwrap();
    let config = config(&dir.path().join("agent.bin"));
    let trainer = Trainer::new(&config).unwrap();
    let online_before = trainer.agent().online().clone();

    let mut env = ScriptedEnv::new(10, 1.0);
    let score = trainer.play(&mut env).unwrap();

    assert_eq!(score, 10.0);
    assert_eq!(env.evaluations, 1);
    assert!(trainer.buffer().is_empty());
    assert_eq!(trainer.agent().online(), &online_before);
}

#[test]
fn test_report_exports_json() {
    let dir = tempdir().unwrap();
    let mut config = config(&dir.path().join("agent.bin"));
    config.trainer = config.trainer.n_episodes(2);
    let mut trainer = Trainer::new(&config).unwrap();
    let report = trainer.train(&mut ScriptedEnv::new(4, 0.5)).unwrap();

    let path = dir.path().join("report.json");
    report.save_json(&path).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["status"], "exhausted_episodes");
    assert_eq!(json["final_epoch"], 2);
    assert_eq!(json["scores"].as_array().unwrap().len(), 2);
}

#[test]
fn test_config_yaml_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    let config = config(&dir.path().join("agent.bin"));
    config.save(&path).unwrap();
    assert_eq!(Config::load(&path).unwrap(), config);
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempdir().unwrap();
    let mut config = config(&dir.path().join("agent.bin"));
    config.trainer.gamma = 1.5;
    assert!(matches!(
        Trainer::new(&config),
        Err(NavigatorError::Config(_))
    ));

    let mut config = config.clone();
    config.trainer.gamma = 0.99;
    config.trainer.target_update_interval = 0;
    assert!(Trainer::new(&config).is_err());
}

#[test]
fn test_trains_on_corridor() {
    let dir = tempdir().unwrap();
    let mut config = Config {
        seed: Some(3),
        checkpoint_path: dir.path().join("corridor.bin"),
        ..Config::default()
    };
    config.agent.hidden_layers = vec![16];
    config.trainer = config.trainer.n_episodes(5).convergence(100, 10.0);

    let mut env = Corridor::new(config.brain_name.clone(), 5, 20, 0).unwrap();
    let mut trainer = Trainer::new(&config).unwrap();
    let report = trainer.train(&mut env).unwrap();
    assert_eq!(report.final_epoch, 5);
    assert!(trainer.play(&mut env).unwrap().is_finite());
}

#[test]
fn test_corridor_preset_target_is_reachable() {
    let config = Config::corridor();
    config.validate().unwrap();
    assert_eq!(config.agent.state_size, Corridor::STATE_SIZE);
    assert_eq!(config.agent.action_size, Corridor::ACTION_SIZE);

    // Walking straight at the goal is the best any policy can do.
    let mut env = Corridor::new(
        config.brain_name.clone(),
        Corridor::DEFAULT_LENGTH,
        Corridor::DEFAULT_MAX_STEPS,
        0,
    )
    .unwrap();
    let mut scores = ScoreHistory::new();
    for _ in 0..config.trainer.window {
        let mut state = env.reset(&config.brain_name, ResetMode::Evaluate).unwrap();
        let mut score = 0.0;
        loop {
            let action = if state[1] > 0.5 { ACTION_RIGHT } else { ACTION_LEFT };
            let outcome = env.step(&config.brain_name, action).unwrap();
            score += outcome.reward;
            state = outcome.next_state;
            if outcome.done {
                break;
            }
        }
        scores.push(score);
    }
    let best = scores.trailing_average(config.trainer.window).unwrap();
    assert!(best >= config.trainer.target_score, "best average {}", best);
}
