//! `uplink-rl`: dual-uplink gateway selection learned by tabular Q-learning.
//!
//! A gateway with two outbound paths picks, once per decision interval, which
//! uplink carries all traffic:
//!
//! - **A**: primary, 100 units of capacity, free.
//! - **B**: backup, 30 units of capacity, metered at 0.005 per unit.
//!
//! Traffic is split into latency-sensitive voice and elastic bulk. Voice is
//! worth more, suffers more from latency and loss, and is served first.
//!
//! **Components (leaf first):**
//! - [`LinkEnv`]: seedable link/traffic simulator with `reset` / `step`, plus the
//!   pure lookahead primitives [`simulate_one_step`] and [`probe_step`].
//! - [`Quantizer`]: fixed bucket edges, mixed-radix flat state index, and the
//!   edge fingerprint that ties a table to its configuration.
//! - [`QTable`]: flat `states × 2` value arena with shape validation and (feature
//!   `serde`) JSON snapshots.
//! - [`Trainer`]: epsilon-greedy Q-learning producing a [`TrainingReport`].
//! - [`Decider`]: greedy table lookup with a one-step lookahead fallback on tied
//!   or untrained rows, returning an audit-friendly [`Decision`].
//! - [`UplinkPolicy`] / [`evaluate_policy`]: common interface for the greedy,
//!   static, and decider policies, evaluated over seeded episodes.
//!
//! **Determinism:** every environment owns its own `StdRng`, and the trainer's
//! exploration stream is derived from the same seed. No global RNG is used, so
//! a run is reproducible from [`TrainerConfig::seed`].
//!
//! # Example
//!
//! ```rust
//! use uplink_rl::{Observation, Quantizer, Trainer, TrainerConfig};
//!
//! let cfg = TrainerConfig::default().with_episodes(50);
//! let report = Trainer::new(cfg, Quantizer::default()).unwrap().train().unwrap();
//!
//! let decider = report.decider().unwrap();
//! let d = decider.decide(&Observation::new(40.0, 0.01, 95.0, 0.05, 0.8));
//! println!("{} via {:?}", d.chosen, d.basis);
//! ```
//!
//! **Non-goals:**
//! - Not a general RL framework: one environment, one algorithm, two actions.
//! - The link model is illustrative, not a calibrated network simulator.

#![forbid(unsafe_code)]

mod error;
pub use error::*;

mod observation;
pub use observation::*;

mod stable_hash;
pub use stable_hash::*;

mod quantize;
pub use quantize::*;

mod env;
pub use env::*;

mod table;
pub use table::*;

mod policy;
pub use policy::*;

mod trainer;
pub use trainer::*;

mod decision;
pub use decision::*;

mod scenario;
pub use scenario::*;
