//! uplink-rl command-line front end.
//!
//! Usage:
//!   uplink-rl train --episodes 2500 --output q_table.json
//!   uplink-rl decide --table q_table.json 40 0.01 95 0.05 0.8
//!   uplink-rl scenarios --table q_table.json

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use uplink_rl::{
    derive_seed, evaluate_policy, run_scenarios, Decider, DecisionBasis, EnvConfig, GreedyPolicy,
    Observation, QTable, Quantizer, StaticPolicy, Trainer, TrainerConfig, Uplink,
};

/// Dual-uplink selection via tabular Q-learning
#[derive(Parser, Debug)]
#[command(name = "uplink-rl")]
#[command(about = "Train and query a dual-uplink Q-learning policy")]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a table and write it as JSON
    Train(TrainArgs),
    /// Decide one observation against a saved table
    Decide(DecideArgs),
    /// Run the canonical scenarios against a saved table
    Scenarios {
        /// Saved table
        #[arg(short, long, default_value = "q_table.json")]
        table: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct TrainArgs {
    /// Training episodes
    #[arg(long, default_value = "2500")]
    episodes: usize,

    #[arg(long, default_value = "0.1")]
    alpha: f64,

    #[arg(long, default_value = "0.97")]
    gamma: f64,

    #[arg(long, default_value = "1.0")]
    epsilon_start: f64,

    #[arg(long, default_value = "0.10")]
    epsilon_min: f64,

    #[arg(long, default_value = "0.999")]
    epsilon_decay: f64,

    /// Steps per episode
    #[arg(long, default_value = "50")]
    episode_len: usize,

    #[arg(long, default_value = "42")]
    seed: u64,

    /// Progress log cadence in episodes (0 disables)
    #[arg(long, default_value = "100")]
    log_every: usize,

    /// Episodes for the greedy vs always-A comparison
    #[arg(long, default_value = "200")]
    compare_episodes: usize,

    /// Output table
    #[arg(short, long, default_value = "q_table.json")]
    output: PathBuf,
}

#[derive(clap::Args, Debug)]
struct DecideArgs {
    /// Saved table
    #[arg(short, long, default_value = "q_table.json")]
    table: PathBuf,

    /// Uplink A latency (ms)
    a_latency_ms: f64,
    /// Uplink A loss fraction
    a_loss: f64,
    /// Uplink B latency (ms)
    b_latency_ms: f64,
    /// Uplink B loss fraction
    b_loss: f64,
    /// Voice share of demand
    voice_share: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Command::Train(args) => train(args),
        Command::Decide(args) => decide(args),
        Command::Scenarios { table } => scenarios(&table),
    }
}

fn train(args: TrainArgs) -> Result<()> {
    let cfg = TrainerConfig {
        episodes: args.episodes,
        alpha: args.alpha,
        gamma: args.gamma,
        epsilon_start: args.epsilon_start,
        epsilon_min: args.epsilon_min,
        epsilon_decay: args.epsilon_decay,
        episode_len: args.episode_len,
        seed: args.seed,
        log_every: args.log_every,
        ..TrainerConfig::default()
    };

    let report = Trainer::new(cfg, Quantizer::default())
        .context("invalid training configuration")?
        .train()?;
    info!(
        "Greedy eval over {} episodes: {:.3}",
        cfg.eval_episodes, report.greedy_mean
    );

    // Both policies see the same link trajectory under a shared seed.
    let eval_cfg = EnvConfig::default()
        .with_seed(derive_seed(args.seed, "compare"))
        .with_episode_len(args.episode_len);
    let mut greedy = GreedyPolicy::new(&report.table, &report.quantizer)?;
    let learned = evaluate_policy(&mut greedy, eval_cfg, args.compare_episodes)?;
    let always_a = evaluate_policy(&mut StaticPolicy(Uplink::A), eval_cfg, args.compare_episodes)?;
    info!(
        "Learned greedy mean {:.3} (B share {:.1}%), always-A mean {:.3}",
        learned.mean_return,
        100.0 * learned.pick_rate(Uplink::B),
        always_a.mean_return
    );
    if learned.mean_return <= always_a.mean_return {
        warn!("Learned policy does not beat always-A; consider more episodes");
    }

    report
        .table
        .save_json(&args.output, &report.quantizer)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(
        "Saved {} states ({} visited) to {:?}",
        report.table.states(),
        report.table.visited_states(),
        args.output
    );
    Ok(())
}

fn load_decider(path: &Path) -> Result<Decider> {
    let quantizer = Quantizer::default();
    let table = QTable::load_json(path, &quantizer)
        .with_context(|| format!("loading table {}", path.display()))?;
    Ok(Decider::new(table, quantizer)?)
}

fn decide(args: DecideArgs) -> Result<()> {
    let decider = load_decider(&args.table)?;
    let obs = Observation::new(
        args.a_latency_ms,
        args.a_loss,
        args.b_latency_ms,
        args.b_loss,
        args.voice_share,
    );
    let d = decider.decide(&obs);

    println!("state    {}", d.state);
    println!("Q        A={:.4} B={:.4}", d.values[0], d.values[1]);
    if let Some(probes) = d.lookahead {
        println!(
            "probe    A={:.4} B={:.4}",
            probes.a.reward, probes.b.reward
        );
    }
    let basis = match d.basis {
        DecisionBasis::Table => "table",
        DecisionBasis::Lookahead => "lookahead",
    };
    println!("chosen   {} ({basis})", d.chosen);
    Ok(())
}

fn scenarios(path: &Path) -> Result<()> {
    let decider = load_decider(path)?;
    let mut failed = 0usize;
    for o in run_scenarios(&decider) {
        let verdict = match o.passed() {
            Some(true) => "ok",
            Some(false) => {
                failed += 1;
                "FAIL"
            }
            None => "-",
        };
        println!(
            "{:<18} {:<10} {:<9?} [{verdict}] {}",
            o.scenario.name, o.decision.chosen, o.decision.basis, o.scenario.description
        );
    }
    if failed > 0 {
        anyhow::bail!("{failed} scenario(s) chose the wrong uplink");
    }
    Ok(())
}
