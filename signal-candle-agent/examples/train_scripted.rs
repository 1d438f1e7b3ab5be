use anyhow::Result;
use clap::{Parser, ValueEnum};
use signal_candle_agent::{
    dqn::{Dqn, DqnConfig, DqnModelConfig},
    linear::{LinearQ, LinearQConfig},
    mlp::{Mlp, MlpConfig},
    opt::OptimizerConfig,
};
use signal_core::{
    observation::ObservationBuilder,
    phase::N_ACTIONS,
    record::NullRecorder,
    replay_buffer::{ExperienceReplay, ExperienceReplayConfig},
    scripted::{ScriptedSimulator, ScriptedSimulatorConfig},
    Agent, Trainer, TrainerConfig,
};

const N_LIGHTS: usize = 2;
const N_DETECTORS_PER_LIGHT: usize = 4;
const LR: f64 = 0.01;
const DISCOUNT_FACTOR: f64 = 0.9;
const BATCH_SIZE: usize = 32;
const REPLAY_BUFFER_CAPACITY: usize = 100_000;
const MODEL_DIR: &str = "./signal-candle-agent/examples/model/train_scripted";

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AgentKind {
    Linear,
    Dqn,
}

/// Train traffic-light agents on the scripted simulator
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Model of the action values
    #[arg(short, long, value_enum, default_value_t = AgentKind::Linear)]
    agent: AgentKind,

    /// Number of episodes
    #[arg(short, long, default_value_t = 20)]
    episodes: usize,

    /// Trainer configuration in YAML, overrides the defaults
    #[arg(short, long)]
    config: Option<String>,
}

fn trainer_config(args: &Args) -> Result<TrainerConfig> {
    let config = match &args.config {
        Some(path) => TrainerConfig::load(path)?,
        None => TrainerConfig::default().max_steps(500).save_interval(10),
    };
    Ok(config.n_episodes(args.episodes).model_dir(MODEL_DIR))
}

fn state_dim(config: &TrainerConfig) -> usize {
    ObservationBuilder::new(
        N_LIGHTS,
        N_LIGHTS * N_DETECTORS_PER_LIGHT,
        config.history_len,
        config.detector_window,
        config.use_detectors,
    )
    .state_dim()
}

fn linear_agents(in_dim: usize) -> Vec<LinearQ> {
    (0..N_LIGHTS)
        .map(|i| {
            let config = LinearQConfig::default()
                .in_dim(in_dim)
                .n_actions(N_ACTIONS)
                .learning_rate(LR as f32)
                .discount_factor(DISCOUNT_FACTOR as f32)
                .seed(i as u64);
            LinearQ::build(&config)
        })
        .collect()
}

fn dqn_agents(in_dim: usize) -> Result<Vec<Dqn<Mlp>>> {
    (0..N_LIGHTS)
        .map(|i| {
            let model_config = DqnModelConfig::default()
                .q_config(MlpConfig::new(in_dim, vec![], N_ACTIONS))
                .opt_config(OptimizerConfig::default().learning_rate(LR));
            let config = DqnConfig::default()
                .model_config(model_config)
                .batch_size(BATCH_SIZE)
                .discount_factor(DISCOUNT_FACTOR)
                .seed(i as u64);
            Dqn::build(&config)
        })
        .collect()
}

fn train<A: Agent<ExperienceReplay>>(
    config: TrainerConfig,
    agents: Vec<A>,
    capacity: usize,
) -> Result<()> {
    let sim = ScriptedSimulator::build(&ScriptedSimulatorConfig::default().n_lights(N_LIGHTS));
    let replay_buffer_config = ExperienceReplayConfig::default()
        .capacity(capacity)
        .seed(config.seed);
    let mut trainer: Trainer<_, _, ExperienceReplay> =
        Trainer::build(config, sim, agents, &replay_buffer_config)?;
    let report = trainer.train(&mut NullRecorder)?;

    if let Some(last) = report.summaries.last() {
        println!(
            "{} episodes, {} steps; last episode: reward {:.2}, average waiting {:.1}, average emission {:.1}",
            report.state.episodes,
            report.state.env_steps,
            last.cumulative_reward,
            last.avg_waiting,
            last.avg_emission,
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = trainer_config(&args)?;
    let in_dim = state_dim(&config);

    match args.agent {
        // The linear model learns from the newest transition only
        AgentKind::Linear => train(config, linear_agents(in_dim), 1),
        AgentKind::Dqn => train(config, dqn_agents(in_dim)?, REPLAY_BUFFER_CAPACITY),
    }
}
