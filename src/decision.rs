//! Greedy decision procedure with a one-step lookahead fallback.
//!
//! A learned table is trusted only where it actually distinguishes the two
//! uplinks. When the two values for the current state are (nearly) equal, or
//! both still sit at their zero initialisation, the [`Decider`] instead scores
//! both uplinks by their immediate reward on isolated probe environments and
//! picks the better one (ties to [`Uplink::A`]).
//!
//! Every call returns a [`Decision`] envelope recording the state index, the
//! two table values, which basis was used, and the probes (when run), so a
//! decision can be logged or replayed without re-deriving anything.

use tracing::debug;

use crate::env::{probe_validated, StepProbe};
use crate::{EnvConfig, Observation, QTable, Quantizer, Result, Uplink, UplinkPolicy};

/// Absolute gap below which two action values count as tied.
pub const TIE_EPS: f64 = 1e-6;
/// Magnitude below which an action value counts as never updated.
pub const UNTRAINED_EPS: f64 = 1e-7;

/// Whether a table row is too flat to decide from.
pub fn needs_lookahead(values: [f64; 2]) -> bool {
    let [a, b] = values;
    (a - b).abs() < TIE_EPS || (a.abs() < UNTRAINED_EPS && b.abs() < UNTRAINED_EPS)
}

/// How a decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DecisionBasis {
    /// Strict argmax of the learned row.
    Table,
    /// Immediate-reward comparison on isolated probe environments.
    Lookahead,
}

/// Typed audit notes attached to a decision.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DecisionNote {
    /// The row separated the uplinks by `gap`.
    TableArgmax { gap: f64 },
    /// Learned values differ by less than [`TIE_EPS`].
    TiedValues { gap: f64 },
    /// Both values are still at their zero initialisation.
    UntrainedState,
    /// The probes' immediate rewards were equal; A was kept.
    LookaheadTieToA,
}

/// Probe results for both uplinks from the same injected state.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lookahead {
    pub a: StepProbe,
    pub b: StepProbe,
}

impl Lookahead {
    /// `A` if `r_A >= r_B`, else `B`.
    pub fn preferred(&self) -> Uplink {
        if self.a.reward >= self.b.reward {
            Uplink::A
        } else {
            Uplink::B
        }
    }
}

/// One decision in an audit-friendly envelope.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decision {
    pub chosen: Uplink,
    /// Quantized state index the row was read from.
    pub state: usize,
    /// `[Q(s, A), Q(s, B)]`.
    pub values: [f64; 2],
    pub basis: DecisionBasis,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub lookahead: Option<Lookahead>,
    pub notes: Vec<DecisionNote>,
}

/// Read-only decision procedure over a trained table.
///
/// ```rust
/// use uplink_rl::{Decider, DecisionBasis, Observation, QTable, Quantizer, Uplink};
///
/// let q = Quantizer::default();
/// let decider = Decider::new(QTable::for_quantizer(&q), q).unwrap();
///
/// // B's loss is past the outage threshold; an untrained table falls back to lookahead.
/// let d = decider.decide(&Observation::new(50.0, 0.02, 40.0, 0.60, 0.6));
/// assert_eq!(d.chosen, Uplink::A);
/// assert_eq!(d.basis, DecisionBasis::Lookahead);
/// ```
#[derive(Debug, Clone)]
pub struct Decider {
    table: QTable,
    quantizer: Quantizer,
    env_cfg: EnvConfig,
    probe_seed: u64,
}

impl Decider {
    /// Fails with [`crate::Error::TableShapeMismatch`] if `table` does not fit `quantizer`.
    pub fn new(table: QTable, quantizer: Quantizer) -> Result<Self> {
        table.check_shape(&quantizer)?;
        Ok(Self {
            table,
            quantizer,
            env_cfg: EnvConfig::default(),
            probe_seed: 0,
        })
    }

    /// Use `cfg`'s link model for the lookahead probes.
    pub fn with_env_config(mut self, cfg: EnvConfig) -> Result<Self> {
        cfg.validate()?;
        self.env_cfg = cfg;
        Ok(self)
    }

    /// Seed for the probe environments. Rewards depend only on the injected
    /// state, so this changes nothing observable in a [`Decision`].
    pub fn with_probe_seed(mut self, seed: u64) -> Self {
        self.probe_seed = seed;
        self
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    /// Probe both uplinks from `obs` on fresh environments.
    pub fn lookahead(&self, obs: &Observation) -> Lookahead {
        Lookahead {
            a: probe_validated(&self.env_cfg, obs, Uplink::A, self.probe_seed),
            b: probe_validated(&self.env_cfg, obs, Uplink::B, self.probe_seed),
        }
    }

    pub fn decide(&self, obs: &Observation) -> Decision {
        let state = self.quantizer.quantize(obs);
        let values = self.table.row(state);
        let gap = (values[0] - values[1]).abs();

        if !needs_lookahead(values) {
            let chosen = if values[1] > values[0] {
                Uplink::B
            } else {
                Uplink::A
            };
            return Decision {
                chosen,
                state,
                values,
                basis: DecisionBasis::Table,
                lookahead: None,
                notes: vec![DecisionNote::TableArgmax { gap }],
            };
        }

        let mut notes = Vec::with_capacity(2);
        if values[0].abs() < UNTRAINED_EPS && values[1].abs() < UNTRAINED_EPS {
            notes.push(DecisionNote::UntrainedState);
        } else {
            notes.push(DecisionNote::TiedValues { gap });
        }

        let probes = self.lookahead(obs);
        if probes.a.reward == probes.b.reward {
            notes.push(DecisionNote::LookaheadTieToA);
        }
        let chosen = probes.preferred();
        debug!(
            state,
            q_a = values[0],
            q_b = values[1],
            r_a = probes.a.reward,
            r_b = probes.b.reward,
            %chosen,
            "lookahead fallback"
        );

        Decision {
            chosen,
            state,
            values,
            basis: DecisionBasis::Lookahead,
            lookahead: Some(probes),
            notes,
        }
    }
}

impl UplinkPolicy for Decider {
    fn choose(&mut self, obs: &Observation) -> Uplink {
        self.decide(obs).chosen
    }
}
