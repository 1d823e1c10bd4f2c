use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use navigator::{config::Config, envs::Corridor, trainer::Trainer};

/// Train and evaluate a Double DQN agent on the corridor environment
#[derive(Parser, Debug)]
#[command(name = "navigator", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the corridor configuration as YAML
    InitConfig {
        /// Destination file
        path: PathBuf,
    },

    /// Train the agent, resuming from the checkpoint if one exists
    Train {
        /// YAML configuration; the corridor preset is used if omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Overrides the checkpoint path of the configuration
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Overrides the number of training episodes
        #[arg(short, long)]
        episodes: Option<usize>,

        /// Write the training report as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Run one greedy episode with the checkpointed agent
    Play {
        /// YAML configuration; the corridor preset is used if omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Overrides the checkpoint path of the configuration
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>, checkpoint: Option<PathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::corridor(),
    };
    if let Some(checkpoint) = checkpoint {
        config.checkpoint_path = checkpoint;
    }
    Ok(config)
}

fn corridor(config: &Config) -> Result<Corridor> {
    let seed = config.seed.unwrap_or(0);
    Ok(Corridor::new(
        config.brain_name.clone(),
        Corridor::DEFAULT_LENGTH,
        Corridor::DEFAULT_MAX_STEPS,
        seed,
    )?)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::InitConfig { path } => {
            Config::corridor().save(&path)?;
            info!("Corridor config written to {}", path.display());
        }
        Command::Train {
            config,
            checkpoint,
            episodes,
            report,
        } => {
            let mut config = load_config(config.as_ref(), checkpoint)?;
            if let Some(episodes) = episodes {
                config.trainer.n_episodes = episodes;
            }
            let mut env = corridor(&config)?;
            let mut trainer = Trainer::new(&config)?;
            let result = trainer.train(&mut env)?;
            info!(
                "Training finished: {:?} at epoch {}",
                result.status, result.final_epoch
            );
            if let Some(path) = report {
                result.save_json(&path)?;
                info!("Report written to {}", path.display());
            }
        }
        Command::Play { config, checkpoint } => {
            let config = load_config(config.as_ref(), checkpoint)?;
            let mut env = corridor(&config)?;
            let mut trainer = Trainer::new(&config)?;
            if !trainer.resume()? {
                bail!("no checkpoint at {}", config.checkpoint_path.display());
            }
            trainer.play(&mut env)?;
        }
    }

    Ok(())
}
