//! Tabular Q-learning over [`LinkEnv`].
//!
//! Off-policy TD control with epsilon-greedy exploration:
//!
//! ```text
//! a      = random with prob. epsilon, else argmax_a Q[s, a]   (ties -> A)
//! target = r + gamma * max_a' Q[s', a']
//! Q[s,a] += alpha * (target - Q[s,a])
//! ```
//!
//! Epsilon decays multiplicatively once per episode and is floored at
//! `epsilon_min`. The exploration RNG is separate from the environment's and is
//! derived from the same seed, so a run is fully reproducible from
//! [`TrainerConfig::seed`].
//!
//! Table magnitudes are not bounded; with `alpha`/`gamma` in range the values
//! stay near `reward / (1 - gamma)`.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::policy::{evaluate_on, GreedyPolicy};
use crate::stable_hash::derive_seed;
use crate::{
    Decider, EnvConfig, Error, LinkEnv, QTable, Quantizer, Result, Uplink,
};

// ============================================================================
// Configuration
// ============================================================================

/// Trainer configuration. Defaults reproduce the reference training run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainerConfig {
    /// Training episodes (>= 1).
    pub episodes: usize,
    /// Learning rate in `(0, 1]`.
    pub alpha: f64,
    /// Discount factor in `(0, 1]`.
    pub gamma: f64,
    /// Initial exploration rate in `[0, 1]`.
    pub epsilon_start: f64,
    /// Exploration floor in `[0, epsilon_start]`.
    pub epsilon_min: f64,
    /// Per-episode multiplicative decay in `(0, 1]`.
    pub epsilon_decay: f64,
    /// Steps per episode (>= 1).
    pub episode_len: usize,
    /// Seeds both the environment and the exploration stream.
    pub seed: u64,
    /// Greedy evaluation episodes run after training (>= 1).
    pub eval_episodes: usize,
    /// Progress log cadence in episodes; `0` disables progress lines.
    pub log_every: usize,
    /// Episodes in the rolling average reported by progress lines.
    pub return_window: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            episodes: 2500,
            alpha: 0.1,
            gamma: 0.97,
            epsilon_start: 1.0,
            epsilon_min: 0.10,
            epsilon_decay: 0.999,
            episode_len: 50,
            seed: 42,
            eval_episodes: 20,
            log_every: 100,
            return_window: 50,
        }
    }
}

impl TrainerConfig {
    pub fn with_episodes(mut self, episodes: usize) -> Self {
        self.episodes = episodes;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Environment configuration implied by this trainer config.
    pub fn env_config(&self) -> EnvConfig {
        EnvConfig::default()
            .with_seed(self.seed)
            .with_episode_len(self.episode_len)
    }

    /// Reject out-of-range parameters before any episode runs.
    pub fn validate(&self) -> Result<()> {
        if self.episodes == 0 {
            return Err(Error::config("episodes must be positive"));
        }
        if self.episode_len == 0 {
            return Err(Error::config("episode_len must be positive"));
        }
        if self.eval_episodes == 0 {
            return Err(Error::config("eval_episodes must be positive"));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(Error::config(format!("alpha must be in (0, 1], got {}", self.alpha)));
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(Error::config(format!("gamma must be in (0, 1], got {}", self.gamma)));
        }
        if !(self.epsilon_start.is_finite() && (0.0..=1.0).contains(&self.epsilon_start)) {
            return Err(Error::config(format!(
                "epsilon_start must be in [0, 1], got {}",
                self.epsilon_start
            )));
        }
        if !(self.epsilon_min.is_finite()
            && self.epsilon_min >= 0.0
            && self.epsilon_min <= self.epsilon_start)
        {
            return Err(Error::config(format!(
                "epsilon_min must be in [0, epsilon_start], got {}",
                self.epsilon_min
            )));
        }
        if !(self.epsilon_decay.is_finite()
            && self.epsilon_decay > 0.0
            && self.epsilon_decay <= 1.0)
        {
            return Err(Error::config(format!(
                "epsilon_decay must be in (0, 1], got {}",
                self.epsilon_decay
            )));
        }
        Ok(())
    }
}

/// Multiplicative epsilon decay with a floor.
///
/// The value never increases and never drops below the floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonSchedule {
    value: f64,
    min: f64,
    decay: f64,
}

impl EpsilonSchedule {
    pub fn new(start: f64, min: f64, decay: f64) -> Self {
        Self {
            value: start.max(min),
            min,
            decay,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn floor(&self) -> f64 {
        self.min
    }

    /// Apply one episode's decay and return the new value.
    pub fn step(&mut self) -> f64 {
        self.value = (self.value * self.decay).max(self.min);
        self.value
    }
}

/// Rolling mean over the most recent episode returns.
#[derive(Debug, Clone)]
struct ReturnWindow {
    cap: usize,
    buf: VecDeque<f64>,
}

impl ReturnWindow {
    fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            buf: VecDeque::new(),
        }
    }

    fn push(&mut self, r: f64) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(r);
    }

    fn mean(&self) -> f64 {
        if self.buf.is_empty() {
            0.0
        } else {
            self.buf.iter().sum::<f64>() / self.buf.len() as f64
        }
    }
}

// ============================================================================
// Trainer
// ============================================================================

/// Output of [`Trainer::train`].
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub table: QTable,
    pub quantizer: Quantizer,
    /// Undiscounted return of each training episode.
    pub episode_returns: Vec<f64>,
    /// Epsilon used during each training episode.
    pub epsilon_trace: Vec<f64>,
    /// Mean greedy return over `eval_episodes` after training.
    pub greedy_mean: f64,
}

impl TrainingReport {
    /// Decision procedure over the learned table.
    pub fn decider(&self) -> Result<Decider> {
        Decider::new(self.table.clone(), self.quantizer.clone())
    }
}

/// Owns the environment, the exploration RNG, and the table while training.
#[derive(Debug, Clone)]
pub struct Trainer {
    cfg: TrainerConfig,
    quantizer: Quantizer,
    env: LinkEnv,
    explore_rng: StdRng,
    table: QTable,
    epsilon: EpsilonSchedule,
    episodes_run: usize,
}

impl Trainer {
    /// Validate `cfg` and set up a zeroed table shaped for `quantizer`.
    pub fn new(cfg: TrainerConfig, quantizer: Quantizer) -> Result<Self> {
        cfg.validate()?;
        let env = LinkEnv::new(cfg.env_config())?;
        let table = QTable::for_quantizer(&quantizer);
        Ok(Self {
            explore_rng: StdRng::seed_from_u64(derive_seed(cfg.seed, "explore")),
            epsilon: EpsilonSchedule::new(cfg.epsilon_start, cfg.epsilon_min, cfg.epsilon_decay),
            cfg,
            quantizer,
            env,
            table,
            episodes_run: 0,
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.cfg
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    /// Current exploration rate.
    pub fn epsilon(&self) -> f64 {
        self.epsilon.value()
    }

    pub fn episodes_run(&self) -> usize {
        self.episodes_run
    }

    fn select_action(&mut self, state: usize) -> Uplink {
        let u: f64 = self.explore_rng.random();
        if u < self.epsilon.value() {
            if self.explore_rng.random_range(0..Uplink::COUNT) == 0 {
                Uplink::A
            } else {
                Uplink::B
            }
        } else {
            self.table.best_action(state)
        }
    }

    /// Run one training episode and decay epsilon. Returns the episode's total reward.
    pub fn run_episode(&mut self) -> Result<f64> {
        let obs = self.env.reset(None);
        let mut s = self.quantizer.quantize(&obs);
        let mut total = 0.0;

        for _ in 0..self.cfg.episode_len {
            let a = self.select_action(s);
            let out = self.env.step(a)?;
            let s2 = self.quantizer.quantize(&out.observation);

            let target = out.reward + self.cfg.gamma * self.table.max_value(s2);
            let q = self.table.get_mut(s, a);
            *q += self.cfg.alpha * (target - *q);

            total += out.reward;
            s = s2;
            if out.done() {
                break;
            }
        }

        self.episodes_run += 1;
        self.epsilon.step();
        debug!(episode = self.episodes_run, total, epsilon = self.epsilon.value(), "episode done");
        Ok(total)
    }

    /// Mean return of `runs` purely greedy episodes on the trainer's environment.
    ///
    /// Diagnostic only; it advances the environment's RNG but never touches the table.
    pub fn greedy_eval(&mut self, runs: usize) -> Result<f64> {
        let mut policy = GreedyPolicy::new_unchecked(&self.table, &self.quantizer);
        let summary = evaluate_on(&mut self.env, &mut policy, runs)?;
        Ok(summary.mean_return)
    }

    /// Run all configured episodes, then the greedy evaluation.
    pub fn train(mut self) -> Result<TrainingReport> {
        let episodes = self.cfg.episodes;
        info!(
            episodes,
            alpha = self.cfg.alpha,
            gamma = self.cfg.gamma,
            states = self.quantizer.total_states(),
            seed = self.cfg.seed,
            "starting Q-learning"
        );

        let mut episode_returns = Vec::with_capacity(episodes);
        let mut epsilon_trace = Vec::with_capacity(episodes);
        let mut window = ReturnWindow::new(self.cfg.return_window);

        for ep in 1..=episodes {
            epsilon_trace.push(self.epsilon.value());
            let r = self.run_episode()?;
            episode_returns.push(r);
            window.push(r);

            if self.cfg.log_every > 0 && ep % self.cfg.log_every == 0 {
                info!(
                    episode = ep,
                    episodes,
                    avg_return = window.mean(),
                    epsilon = self.epsilon.value(),
                    "training progress"
                );
            }
        }

        let greedy_mean = self.greedy_eval(self.cfg.eval_episodes)?;
        info!(
            greedy_mean,
            runs = self.cfg.eval_episodes,
            visited_states = self.table.visited_states(),
            "greedy evaluation"
        );

        Ok(TrainingReport {
            table: self.table,
            quantizer: self.quantizer,
            episode_returns,
            epsilon_trace,
            greedy_mean,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn small() -> TrainerConfig {
        TrainerConfig {
            episodes: 30,
            episode_len: 10,
            eval_episodes: 3,
            ..TrainerConfig::default()
        }
    }

    #[test]
    fn defaults_validate() {
        assert!(TrainerConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        let bad = [
            TrainerConfig { episodes: 0, ..small() },
            TrainerConfig { episode_len: 0, ..small() },
            TrainerConfig { eval_episodes: 0, ..small() },
            TrainerConfig { alpha: 0.0, ..small() },
            TrainerConfig { alpha: 1.5, ..small() },
            TrainerConfig { gamma: 0.0, ..small() },
            TrainerConfig { gamma: f64::NAN, ..small() },
            TrainerConfig { epsilon_start: 1.2, ..small() },
            TrainerConfig { epsilon_min: -0.1, ..small() },
            TrainerConfig { epsilon_start: 0.05, epsilon_min: 0.1, ..small() },
            TrainerConfig { epsilon_decay: 0.0, ..small() },
            TrainerConfig { epsilon_decay: 1.01, ..small() },
        ];
        for cfg in bad {
            assert!(
                matches!(Trainer::new(cfg, Quantizer::default()), Err(Error::Config(_))),
                "accepted {cfg:?}"
            );
        }
    }

    #[test]
    fn training_is_reproducible_under_seed() {
        let a = Trainer::new(small(), Quantizer::default()).unwrap().train().unwrap();
        let b = Trainer::new(small(), Quantizer::default()).unwrap().train().unwrap();
        assert_eq!(a.table, b.table);
        assert_eq!(a.episode_returns, b.episode_returns);
        assert_eq!(a.greedy_mean, b.greedy_mean);
    }

    #[test]
    fn different_seeds_learn_different_tables() {
        let a = Trainer::new(small().with_seed(1), Quantizer::default()).unwrap().train().unwrap();
        let b = Trainer::new(small().with_seed(2), Quantizer::default()).unwrap().train().unwrap();
        assert_ne!(a.table, b.table);
    }

    #[test]
    fn episode_updates_visited_rows() {
        let mut t = Trainer::new(small(), Quantizer::default()).unwrap();
        assert_eq!(t.table().visited_states(), 0);
        t.run_episode().unwrap();
        assert!(t.table().visited_states() > 0);
        assert_eq!(t.episodes_run(), 1);
        assert!(t.table().values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn greedy_eval_does_not_modify_table() {
        let mut t = Trainer::new(small(), Quantizer::default()).unwrap();
        t.run_episode().unwrap();
        let before = t.table().clone();
        let m = t.greedy_eval(2).unwrap();
        assert!(m.is_finite());
        assert_eq!(&before, t.table());
    }

    #[test]
    fn single_step_update_moves_alpha_toward_target() {
        // One step per episode: next state value is still zero, so Q = alpha * r.
        let cfg = TrainerConfig {
            episodes: 1,
            episode_len: 1,
            epsilon_start: 0.0,
            epsilon_min: 0.0,
            ..TrainerConfig::default()
        };
        let mut t = Trainer::new(cfg, Quantizer::default()).unwrap();
        let r = t.run_episode().unwrap();
        let nonzero: Vec<f64> = t.table().values().iter().copied().filter(|v| *v != 0.0).collect();
        assert_eq!(nonzero.len(), 1);
        assert!((nonzero[0] - 0.1 * r).abs() < 1e-12);
    }

    #[test]
    fn rolling_window_keeps_the_most_recent_returns() {
        let mut w = ReturnWindow::new(2);
        assert_eq!(w.mean(), 0.0);
        w.push(1.0);
        w.push(3.0);
        w.push(5.0);
        assert_eq!(w.mean(), 4.0);
    }

    proptest! {
        #[test]
        fn epsilon_is_monotone_and_floored(
            start in 0.0f64..=1.0,
            floor_frac in 0.0f64..=1.0,
            decay in 0.01f64..=1.0,
            steps in 1usize..500,
        ) {
            let floor = start * floor_frac;
            let mut e = EpsilonSchedule::new(start, floor, decay);
            let mut prev = e.value();
            for _ in 0..steps {
                let v = e.step();
                prop_assert!(v <= prev);
                prop_assert!(v >= floor);
                prev = v;
            }
        }
    }
}
