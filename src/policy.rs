//! Unified `UplinkPolicy` trait and episode evaluation.
//!
//! The greedy table policy, the static baselines, and the [`Decider`][crate::Decider]
//! all share one method: `choose(observation) -> Uplink`. This trait makes that
//! explicit so evaluation code can run any of them against the same seeded
//! episodes and compare mean returns.
//!
//! Because the environment's trajectory does not depend on the actions taken,
//! evaluating two policies with the same `EnvConfig` seed compares them on
//! identical link conditions.

use crate::{EnvConfig, Error, LinkEnv, Observation, QTable, Quantizer, Result, Uplink};

/// A rule mapping one observation to one uplink.
///
/// # Example
///
/// ```rust
/// use uplink_rl::{evaluate_policy, EnvConfig, StaticPolicy, Uplink, UplinkPolicy};
///
/// fn run<P: UplinkPolicy>(policy: &mut P) -> f64 {
///     let cfg = EnvConfig::default().with_seed(7);
///     evaluate_policy(policy, cfg, 5).unwrap().mean_return
/// }
///
/// let a = run(&mut StaticPolicy(Uplink::A));
/// let b = run(&mut StaticPolicy(Uplink::B));
/// assert!(a.is_finite() && b.is_finite());
/// ```
pub trait UplinkPolicy {
    fn choose(&mut self, obs: &Observation) -> Uplink;
}

impl<P: UplinkPolicy + ?Sized> UplinkPolicy for &mut P {
    fn choose(&mut self, obs: &Observation) -> Uplink {
        (**self).choose(obs)
    }
}

/// Always route over the same uplink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPolicy(pub Uplink);

impl UplinkPolicy for StaticPolicy {
    fn choose(&mut self, _obs: &Observation) -> Uplink {
        self.0
    }
}

/// Pure table argmax (ties to [`Uplink::A`]); no exploration, no lookahead.
#[derive(Debug, Clone, Copy)]
pub struct GreedyPolicy<'a> {
    table: &'a QTable,
    quantizer: &'a Quantizer,
}

impl<'a> GreedyPolicy<'a> {
    /// Fails with [`Error::TableShapeMismatch`] if `table` does not fit `quantizer`.
    pub fn new(table: &'a QTable, quantizer: &'a Quantizer) -> Result<Self> {
        table.check_shape(quantizer)?;
        Ok(Self::new_unchecked(table, quantizer))
    }

    pub(crate) fn new_unchecked(table: &'a QTable, quantizer: &'a Quantizer) -> Self {
        Self { table, quantizer }
    }
}

impl UplinkPolicy for GreedyPolicy<'_> {
    fn choose(&mut self, obs: &Observation) -> Uplink {
        self.table.best_action(self.quantizer.quantize(obs))
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Result of one full episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeOutcome {
    pub total_reward: f64,
    pub steps: usize,
    /// Steps routed over A and B, by action index.
    pub picks: [u64; 2],
}

/// Aggregate over evaluated episodes.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EvalSummary {
    pub episodes: usize,
    pub mean_return: f64,
    pub min_return: f64,
    pub max_return: f64,
    /// Steps routed over A and B, by action index.
    pub picks: [u64; 2],
}

impl EvalSummary {
    /// Fraction of evaluated steps routed over `uplink`.
    pub fn pick_rate(&self, uplink: Uplink) -> f64 {
        let total = self.picks[0] + self.picks[1];
        if total == 0 {
            0.0
        } else {
            self.picks[uplink.index()] as f64 / total as f64
        }
    }
}

/// Reset `env` and drive it with `policy` until the episode ends.
pub fn run_episode<P: UplinkPolicy + ?Sized>(
    env: &mut LinkEnv,
    policy: &mut P,
) -> Result<EpisodeOutcome> {
    let mut obs = env.reset(None);
    let mut out = EpisodeOutcome {
        total_reward: 0.0,
        steps: 0,
        picks: [0, 0],
    };
    loop {
        let uplink = policy.choose(&obs);
        let step = env.step(uplink)?;
        out.total_reward += step.reward;
        out.steps += 1;
        out.picks[uplink.index()] += 1;
        obs = step.observation;
        if step.done() {
            return Ok(out);
        }
    }
}

/// Run `episodes` consecutive episodes on `env`.
pub(crate) fn evaluate_on<P: UplinkPolicy + ?Sized>(
    env: &mut LinkEnv,
    policy: &mut P,
    episodes: usize,
) -> Result<EvalSummary> {
    if episodes == 0 {
        return Err(Error::config("evaluation needs at least one episode"));
    }
    let mut sum = 0.0;
    let mut min_return = f64::INFINITY;
    let mut max_return = f64::NEG_INFINITY;
    let mut picks = [0u64; 2];
    for _ in 0..episodes {
        let ep = run_episode(env, policy)?;
        sum += ep.total_reward;
        min_return = min_return.min(ep.total_reward);
        max_return = max_return.max(ep.total_reward);
        picks[0] += ep.picks[0];
        picks[1] += ep.picks[1];
    }
    Ok(EvalSummary {
        episodes,
        mean_return: sum / episodes as f64,
        min_return,
        max_return,
        picks,
    })
}

/// Evaluate `policy` over `episodes` episodes of a fresh environment built from `env_cfg`.
///
/// With `env_cfg.seed` set, the result is reproducible and directly comparable
/// across policies.
pub fn evaluate_policy<P: UplinkPolicy + ?Sized>(
    policy: &mut P,
    env_cfg: EnvConfig,
    episodes: usize,
) -> Result<EvalSummary> {
    let mut env = LinkEnv::new(env_cfg)?;
    evaluate_on(&mut env, policy, episodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EnvConfig {
        EnvConfig::default().with_seed(17).with_episode_len(20)
    }

    #[test]
    fn static_policy_routes_every_step_over_its_link() {
        let s = evaluate_policy(&mut StaticPolicy(Uplink::B), cfg(), 3).unwrap();
        assert_eq!(s.picks, [0, 60]);
        assert_eq!(s.pick_rate(Uplink::B), 1.0);
        assert!(s.min_return <= s.mean_return && s.mean_return <= s.max_return);
    }

    #[test]
    fn zero_table_greedy_matches_always_a() {
        let q = Quantizer::default();
        let t = QTable::for_quantizer(&q);
        let mut greedy = GreedyPolicy::new(&t, &q).unwrap();
        let g = evaluate_policy(&mut greedy, cfg(), 4).unwrap();
        let a = evaluate_policy(&mut StaticPolicy(Uplink::A), cfg(), 4).unwrap();
        assert_eq!(g, a);
    }

    #[test]
    fn greedy_policy_rejects_mismatched_table() {
        let q = Quantizer::default();
        let t = QTable::zeros(10);
        assert!(matches!(
            GreedyPolicy::new(&t, &q),
            Err(Error::TableShapeMismatch { .. })
        ));
    }

    #[test]
    fn zero_episodes_is_a_config_error() {
        assert!(matches!(
            evaluate_policy(&mut StaticPolicy(Uplink::A), cfg(), 0),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn evaluation_is_deterministic_under_seed() {
        let a = evaluate_policy(&mut StaticPolicy(Uplink::A), cfg(), 5).unwrap();
        let b = evaluate_policy(&mut StaticPolicy(Uplink::A), cfg(), 5).unwrap();
        assert_eq!(a, b);
    }
}
