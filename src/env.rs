//! Dual-uplink link environment.
//!
//! [`LinkEnv`] owns one gateway's observation and its own seedable RNG. Each
//! [`LinkEnv::step`] routes the whole step's demand over the chosen uplink,
//! scores the delivery, and then evolves *both* links and the voice share
//! independently of the action taken. Because the number of random draws per
//! step never depends on the action, two environments with the same seed see
//! the same state trajectory whatever policy drives them.
//!
//! ```text
//! let mut env = LinkEnv::new(EnvConfig::default().with_seed(42))?;
//! let obs = env.reset(None);
//! let out = env.step(Uplink::A)?;   // reward, next observation, truncation
//! ```
//!
//! The one-step lookahead used by the decision procedure goes through
//! [`simulate_one_step`] / [`probe_step`], which build a disposable environment
//! so no caller-owned state is touched.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::{Error, Observation, Result, Uplink};

// ============================================================================
// Model constants
// ============================================================================

/// Reward per unit of delivered voice traffic.
pub const VOICE_GAIN: f64 = 0.08;
/// Reward per unit of delivered bulk traffic.
pub const BULK_GAIN: f64 = 0.015;
/// Quality penalty per millisecond of serving-link latency (before voice weighting).
pub const LATENCY_PENALTY: f64 = 0.02;
/// Quality penalty per unit of serving-link loss fraction (before voice weighting).
pub const LOSS_PENALTY: f64 = 12.0;
/// Serving-link loss above which the step counts as a near-outage.
pub const OUTAGE_LOSS: f64 = 0.4;
/// Flat penalty applied on a near-outage step.
pub const OUTAGE_PENALTY: f64 = 2.0;

const LATENCY_BOUNDS: (f64, f64) = (10.0, 200.0);
const LOSS_BOUNDS: (f64, f64) = (0.0, 0.2);
const SPIKE_BOUNDS: (f64, f64) = (0.0, 1.0);
const SPIKE_LOSS: f64 = 0.5;
const SPIKE_PROB_A: f64 = 0.03;
const SPIKE_PROB_B: f64 = 0.04;

// ============================================================================
// Configuration
// ============================================================================

/// Capacity and metering of one uplink.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkProfile {
    /// Maximum throughput units deliverable per step.
    pub capacity: f64,
    /// Cost per delivered throughput unit.
    pub cost_per_unit: f64,
}

impl LinkProfile {
    /// Fixed-line primary: 100 units, free.
    pub const PRIMARY: LinkProfile = LinkProfile {
        capacity: 100.0,
        cost_per_unit: 0.0,
    };
    /// Cellular backup: 30 units, 0.005 per unit.
    pub const BACKUP: LinkProfile = LinkProfile {
        capacity: 30.0,
        cost_per_unit: 0.005,
    };
}

/// Environment construction parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnvConfig {
    /// Steps per episode before truncation (must be >= 1).
    pub episode_len: usize,
    /// RNG seed. `None` seeds from the operating system (non-reproducible).
    pub seed: Option<u64>,
    /// Total demand per step, split into voice and bulk by the voice share.
    pub total_demand: f64,
    pub uplink_a: LinkProfile,
    pub uplink_b: LinkProfile,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            episode_len: 50,
            seed: None,
            total_demand: 50.0,
            uplink_a: LinkProfile::PRIMARY,
            uplink_b: LinkProfile::BACKUP,
        }
    }
}

impl EnvConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_episode_len(mut self, episode_len: usize) -> Self {
        self.episode_len = episode_len;
        self
    }

    /// Profile of one uplink.
    pub fn profile(&self, uplink: Uplink) -> LinkProfile {
        match uplink {
            Uplink::A => self.uplink_a,
            Uplink::B => self.uplink_b,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.episode_len == 0 {
            return Err(Error::config("episode_len must be positive"));
        }
        if !(self.total_demand.is_finite() && self.total_demand >= 0.0) {
            return Err(Error::config("total_demand must be finite and non-negative"));
        }
        for (name, p) in [("uplink_a", self.uplink_a), ("uplink_b", self.uplink_b)] {
            if !(p.capacity.is_finite() && p.capacity >= 0.0) {
                return Err(Error::config(format!(
                    "{name} capacity must be finite and non-negative"
                )));
            }
            if !(p.cost_per_unit.is_finite() && p.cost_per_unit >= 0.0) {
                return Err(Error::config(format!(
                    "{name} cost_per_unit must be finite and non-negative"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Delivery and reward
// ============================================================================

/// Traffic actually carried in one step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Delivery {
    pub voice: f64,
    pub bulk: f64,
}

impl Delivery {
    pub fn total(&self) -> f64 {
        self.voice + self.bulk
    }
}

/// Serve voice first, then bulk, never exceeding `capacity`.
///
/// Negative inputs are treated as zero.
pub fn delivery(voice_demand: f64, bulk_demand: f64, capacity: f64) -> Delivery {
    let capacity = capacity.max(0.0);
    let voice = voice_demand.max(0.0).min(capacity);
    let remaining = (capacity - voice).max(0.0);
    let bulk = bulk_demand.max(0.0).min(remaining);
    Delivery { voice, bulk }
}

/// Additive components of a step reward.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RewardBreakdown {
    pub voice_gain: f64,
    pub bulk_gain: f64,
    /// Latency/loss penalty, weighted up by the voice share.
    pub quality_penalty: f64,
    pub link_cost: f64,
    /// [`OUTAGE_PENALTY`] when the serving link's loss exceeds [`OUTAGE_LOSS`], else 0.
    pub outage_penalty: f64,
}

impl RewardBreakdown {
    pub fn total(&self) -> f64 {
        (self.voice_gain + self.bulk_gain)
            - self.quality_penalty
            - self.link_cost
            - self.outage_penalty
    }
}

/// Diagnostics for one step; observability only.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepInfo {
    pub voice_delivered: f64,
    pub bulk_delivered: f64,
    /// Latency of the serving uplink.
    pub latency_ms: f64,
    /// Loss of the serving uplink.
    pub loss: f64,
    pub uplink: Uplink,
    pub breakdown: RewardBreakdown,
}

/// Score routing all demand over `uplink` from state `obs`.
///
/// Pure: depends only on its arguments.
pub fn score_step(cfg: &EnvConfig, obs: &Observation, uplink: Uplink) -> (f64, StepInfo) {
    let voice_share = obs.voice_share;
    let total = cfg.total_demand;
    let voice_demand = total * voice_share;
    let bulk_demand = total - voice_demand;

    let link = obs.link(uplink);
    let profile = cfg.profile(uplink);
    let d = delivery(voice_demand, bulk_demand, profile.capacity);

    let breakdown = RewardBreakdown {
        voice_gain: VOICE_GAIN * d.voice,
        bulk_gain: BULK_GAIN * d.bulk,
        quality_penalty: (LATENCY_PENALTY * link.latency_ms + LOSS_PENALTY * link.loss)
            * (1.0 + voice_share),
        link_cost: profile.cost_per_unit * d.total(),
        outage_penalty: if link.loss > OUTAGE_LOSS && total > 0.0 {
            OUTAGE_PENALTY
        } else {
            0.0
        },
    };

    let info = StepInfo {
        voice_delivered: d.voice,
        bulk_delivered: d.bulk,
        latency_ms: link.latency_ms,
        loss: link.loss,
        uplink,
        breakdown,
    };
    (breakdown.total(), info)
}

// ============================================================================
// Environment
// ============================================================================

/// Result of [`LinkEnv::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepResult {
    /// State after evolution.
    pub observation: Observation,
    pub reward: f64,
    /// Always `false`: the model has no absorbing state.
    pub terminated: bool,
    /// `true` once the episode length is reached.
    pub truncated: bool,
    pub info: StepInfo,
}

impl StepResult {
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Stateful episode environment.
#[derive(Debug, Clone)]
pub struct LinkEnv {
    cfg: EnvConfig,
    rng: StdRng,
    state: Option<Observation>,
    t: usize,
}

impl LinkEnv {
    /// Validate `cfg` and seed the environment's RNG.
    pub fn new(cfg: EnvConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self::build(cfg))
    }

    fn build(cfg: EnvConfig) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            cfg,
            rng,
            state: None,
            t: 0,
        }
    }

    pub fn config(&self) -> &EnvConfig {
        &self.cfg
    }

    /// Current observation, if the environment has been reset or injected.
    pub fn state(&self) -> Option<&Observation> {
        self.state.as_ref()
    }

    /// Steps taken in the current episode.
    pub fn steps(&self) -> usize {
        self.t
    }

    /// Reseed the RNG.
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Start a new episode, reseeding first if `seed` is given.
    pub fn reset(&mut self, seed: Option<u64>) -> Observation {
        if let Some(seed) = seed {
            self.seed(seed);
        }
        self.t = 0;
        let obs = self.sample_initial();
        self.state = Some(obs);
        obs
    }

    /// Overwrite the current state; used for one-step lookahead probes.
    pub fn inject(&mut self, obs: Observation) {
        self.state = Some(obs);
    }

    /// Route this step's demand over `uplink`, then evolve the links.
    pub fn step(&mut self, uplink: Uplink) -> Result<StepResult> {
        let s = self.state.ok_or(Error::NotReset)?;
        Ok(self.advance(s, uplink))
    }

    /// Integer-action form of [`LinkEnv::step`].
    pub fn step_index(&mut self, action: usize) -> Result<StepResult> {
        let uplink = Uplink::from_index(action)?;
        self.step(uplink)
    }

    fn advance(&mut self, s: Observation, uplink: Uplink) -> StepResult {
        let (reward, info) = score_step(&self.cfg, &s, uplink);
        self.t += 1;
        let truncated = self.t >= self.cfg.episode_len;
        let next = self.evolve(&s);
        self.state = Some(next);
        StepResult {
            observation: next,
            reward,
            terminated: false,
            truncated,
            info,
        }
    }

    fn sample_initial(&mut self) -> Observation {
        let a_latency_ms = self.rng.random_range(20.0..60.0);
        let b_latency_ms = self.rng.random_range(40.0..120.0);
        let a_loss = self.rng.random_range(0.0..0.03);
        let b_loss = self.rng.random_range(0.01..0.08);
        let voice_share = self.rng.random_range(0.2..0.6);
        Observation {
            a_latency_ms,
            a_loss,
            b_latency_ms,
            b_loss,
            voice_share,
        }
    }

    fn noise(&mut self, sigma: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        z * sigma
    }

    fn evolve_latency(&mut self, lat: f64) -> f64 {
        let target = self.rng.random_range(20.0..150.0);
        let x = 0.9 * lat + 0.1 * target + self.noise(5.0);
        x.clamp(LATENCY_BOUNDS.0, LATENCY_BOUNDS.1)
    }

    fn evolve_loss(&mut self, loss: f64) -> f64 {
        let target = self.rng.random_range(0.0..0.1);
        let x = 0.9 * loss + 0.1 * target + self.noise(0.005);
        x.clamp(LOSS_BOUNDS.0, LOSS_BOUNDS.1)
    }

    fn evolve_voice(&mut self, share: f64) -> f64 {
        let target = self.rng.random_range(0.0..1.0);
        let x = 0.95 * share + 0.05 * target + self.noise(0.02);
        x.clamp(0.0, 1.0)
    }

    fn maybe_spike(&mut self, loss: f64, p: f64) -> f64 {
        let u: f64 = self.rng.random();
        if u < p {
            (loss + SPIKE_LOSS).clamp(SPIKE_BOUNDS.0, SPIKE_BOUNDS.1)
        } else {
            loss
        }
    }

    // Draw order is fixed: it defines the seeded trajectory.
    fn evolve(&mut self, s: &Observation) -> Observation {
        let a_latency_ms = self.evolve_latency(s.a_latency_ms);
        let b_latency_ms = self.evolve_latency(s.b_latency_ms);
        let a_loss = self.evolve_loss(s.a_loss);
        let b_loss = self.evolve_loss(s.b_loss);
        let voice_share = self.evolve_voice(s.voice_share);
        let a_loss = self.maybe_spike(a_loss, SPIKE_PROB_A);
        let b_loss = self.maybe_spike(b_loss, SPIKE_PROB_B);
        Observation {
            a_latency_ms,
            a_loss,
            b_latency_ms,
            b_loss,
            voice_share,
        }
    }
}

// ============================================================================
// One-step lookahead
// ============================================================================

/// Immediate reward and diagnostics of one probe.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepProbe {
    pub reward: f64,
    pub info: StepInfo,
}

/// Step a disposable environment once from `obs` and report the immediate reward.
///
/// The probe environment is built from `cfg` and seeded with `seed`; it is dropped
/// afterwards, so nothing outside this call observes the step.
pub fn probe_step(cfg: &EnvConfig, obs: &Observation, uplink: Uplink, seed: u64) -> Result<StepProbe> {
    cfg.validate()?;
    Ok(probe_validated(cfg, obs, uplink, seed))
}

pub(crate) fn probe_validated(
    cfg: &EnvConfig,
    obs: &Observation,
    uplink: Uplink,
    seed: u64,
) -> StepProbe {
    let mut env = LinkEnv::build(EnvConfig {
        seed: Some(seed),
        ..*cfg
    });
    let out = env.advance(*obs, uplink);
    StepProbe {
        reward: out.reward,
        info: out.info,
    }
}

/// Immediate reward of routing over `uplink` from `obs`, under the default model.
pub fn simulate_one_step(obs: &Observation, uplink: Uplink, seed: u64) -> f64 {
    probe_validated(&EnvConfig::default(), obs, uplink, seed).reward
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn env(seed: u64) -> LinkEnv {
        LinkEnv::new(EnvConfig::default().with_seed(seed)).unwrap()
    }

    #[test]
    fn reset_draws_from_initial_ranges() {
        let mut e = env(1);
        for _ in 0..200 {
            let o = e.reset(None);
            assert!((20.0..60.0).contains(&o.a_latency_ms));
            assert!((40.0..120.0).contains(&o.b_latency_ms));
            assert!((0.0..0.03).contains(&o.a_loss));
            assert!((0.01..0.08).contains(&o.b_loss));
            assert!((0.2..0.6).contains(&o.voice_share));
            assert_eq!(e.steps(), 0);
        }
    }

    #[test]
    fn step_before_reset_fails() {
        let mut e = env(0);
        assert!(matches!(e.step(Uplink::A), Err(Error::NotReset)));
    }

    #[test]
    fn step_index_rejects_invalid_action() {
        let mut e = env(0);
        e.reset(None);
        assert!(matches!(e.step_index(2), Err(Error::InvalidAction(2))));
        // Rejected action does not advance the episode.
        assert_eq!(e.steps(), 0);
        assert!(e.step_index(1).is_ok());
    }

    #[test]
    fn truncates_at_episode_len_and_never_terminates() {
        let mut e = LinkEnv::new(EnvConfig::default().with_seed(3).with_episode_len(5)).unwrap();
        e.reset(None);
        for i in 1..=5 {
            let out = e.step(Uplink::A).unwrap();
            assert!(!out.terminated);
            assert_eq!(out.truncated, i == 5, "step {i}");
        }
    }

    #[test]
    fn zero_episode_len_is_a_config_error() {
        let cfg = EnvConfig::default().with_episode_len(0);
        assert!(matches!(LinkEnv::new(cfg), Err(Error::Config(_))));
    }

    #[test]
    fn reward_matches_hand_computation() {
        let cfg = EnvConfig::default();
        let obs = Observation::from([40.0, 0.01, 95.0, 0.05, 0.8]);

        // A: voice 40, bulk 10, penalty (0.8 + 0.12) * 1.8
        let (ra, ia) = score_step(&cfg, &obs, Uplink::A);
        let expected_a = 0.08 * 40.0 + 0.015 * 10.0 - (0.02 * 40.0 + 12.0 * 0.01) * 1.8;
        assert!((ra - expected_a).abs() < 1e-9, "ra={ra}");
        assert!((ia.voice_delivered - 40.0).abs() < 1e-9);
        assert!((ia.bulk_delivered - 10.0).abs() < 1e-9);

        // B: voice capped at 30, no bulk, metered.
        let (rb, ib) = score_step(&cfg, &obs, Uplink::B);
        let expected_b = 0.08 * 30.0 - (0.02 * 95.0 + 12.0 * 0.05) * 1.8 - 0.005 * 30.0;
        assert!((rb - expected_b).abs() < 1e-9, "rb={rb}");
        assert_eq!(ib.bulk_delivered, 0.0);
        assert_eq!(ib.uplink, Uplink::B);
    }

    #[test]
    fn outage_penalty_applies_above_threshold_only() {
        let cfg = EnvConfig::default();
        let healthy = Observation::from([50.0, 0.02, 40.0, 0.40, 0.6]);
        let outage = Observation::from([50.0, 0.02, 40.0, 0.41, 0.6]);
        let (_, h) = score_step(&cfg, &healthy, Uplink::B);
        let (_, o) = score_step(&cfg, &outage, Uplink::B);
        assert_eq!(h.breakdown.outage_penalty, 0.0);
        assert_eq!(o.breakdown.outage_penalty, OUTAGE_PENALTY);
    }

    #[test]
    fn probe_leaves_caller_environment_untouched() {
        let mut e = env(11);
        let start = e.reset(None);
        let before = e.clone().step(Uplink::A).unwrap();

        let _ = simulate_one_step(&start, Uplink::B, 0);
        let _ = probe_step(e.config(), &start, Uplink::A, 99).unwrap();

        let after = e.step(Uplink::A).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn probe_reward_equals_step_reward_from_same_state() {
        let mut e = env(5);
        let s = e.reset(None);
        let probe = probe_step(e.config(), &s, Uplink::B, 1234).unwrap();
        let out = e.step(Uplink::B).unwrap();
        assert_eq!(probe.reward, out.reward);
        assert_eq!(probe.info, out.info);
    }

    #[test]
    fn trajectory_is_independent_of_actions() {
        let mut a = env(21);
        let mut b = env(21);
        a.reset(None);
        b.reset(None);
        for i in 0..40 {
            let oa = a.step(Uplink::A).unwrap();
            let ob = b.step(if i % 3 == 0 { Uplink::B } else { Uplink::A }).unwrap();
            assert_eq!(oa.observation, ob.observation);
        }
    }

    proptest! {
        #[test]
        fn delivery_is_capacity_capped(
            voice in 0.0f64..200.0,
            bulk in 0.0f64..200.0,
            capacity in 0.0f64..200.0,
        ) {
            let d = delivery(voice, bulk, capacity);
            prop_assert!(d.voice <= voice);
            prop_assert!(d.bulk <= bulk);
            prop_assert!(d.voice >= 0.0 && d.bulk >= 0.0);
            prop_assert!(d.total() <= capacity + 1e-9, "total={} cap={}", d.total(), capacity);
        }
    }
}
