//! Tabular action-value store.
//!
//! [`QTable`] is a flat arena of `states × 2` values in row-major order: the row
//! for state `s` is `values[2s..2s + 2]`, indexed by [`Uplink::index`]. Rows are
//! addressed by [`Quantizer::quantize`], so a table is only meaningful together
//! with the bucket configuration it was trained under.
//!
//! # Persistence (feature `serde`)
//!
//! ```rust,no_run
//! # #[cfg(feature = "serde")]
//! # {
//! use uplink_rl::{QTable, Quantizer};
//!
//! let q = Quantizer::default();
//! let table = QTable::for_quantizer(&q);
//! table.save_json("q_table.json", &q).unwrap();
//!
//! // Loading validates snapshot version, edge fingerprint, and row count.
//! let restored = QTable::load_json("q_table.json", &q).unwrap();
//! assert_eq!(restored, table);
//! # }
//! ```

use crate::{Error, Quantizer, Result, Uplink};

/// Current on-disk snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Dense `states × 2` value table.
#[derive(Debug, Clone, PartialEq)]
pub struct QTable {
    states: usize,
    values: Vec<f64>,
}

impl QTable {
    /// All-zero table with `states` rows.
    pub fn zeros(states: usize) -> Self {
        Self {
            states,
            values: vec![0.0; states * Uplink::COUNT],
        }
    }

    /// All-zero table shaped for `quantizer`.
    pub fn for_quantizer(quantizer: &Quantizer) -> Self {
        Self::zeros(quantizer.total_states())
    }

    /// Build from explicit rows.
    pub fn from_rows(rows: Vec<[f64; 2]>) -> Self {
        let states = rows.len();
        let values = rows.into_iter().flatten().collect();
        Self { states, values }
    }

    /// Row count.
    pub fn states(&self) -> usize {
        self.states
    }

    /// Flat row-major values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Fail with [`Error::TableShapeMismatch`] unless the row count matches `quantizer`.
    pub fn check_shape(&self, quantizer: &Quantizer) -> Result<()> {
        let expected = quantizer.total_states();
        if self.states != expected {
            return Err(Error::TableShapeMismatch {
                expected,
                found: self.states,
            });
        }
        Ok(())
    }

    /// Both action values for `state`.
    ///
    /// # Panics
    ///
    /// If `state >= self.states()`.
    pub fn row(&self, state: usize) -> [f64; 2] {
        let i = state * Uplink::COUNT;
        [self.values[i], self.values[i + 1]]
    }

    pub fn get(&self, state: usize, uplink: Uplink) -> f64 {
        self.values[state * Uplink::COUNT + uplink.index()]
    }

    pub fn get_mut(&mut self, state: usize, uplink: Uplink) -> &mut f64 {
        &mut self.values[state * Uplink::COUNT + uplink.index()]
    }

    /// Greedy action for `state`; exact ties go to [`Uplink::A`].
    pub fn best_action(&self, state: usize) -> Uplink {
        let [a, b] = self.row(state);
        if b > a {
            Uplink::B
        } else {
            Uplink::A
        }
    }

    /// `max_a Q(state, a)`.
    pub fn max_value(&self, state: usize) -> f64 {
        let [a, b] = self.row(state);
        a.max(b)
    }

    /// Rows with at least one non-zero entry.
    pub fn visited_states(&self) -> usize {
        self.values
            .chunks_exact(Uplink::COUNT)
            .filter(|r| r.iter().any(|v| *v != 0.0))
            .count()
    }
}

// ============================================================================
// Snapshot / persistence
// ============================================================================

/// Serializable form of a [`QTable`] plus the bucket configuration it was trained under.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TableSnapshot {
    pub version: u32,
    pub edges: crate::BucketEdges,
    /// [`crate::BucketEdges::fingerprint`] at save time.
    pub fingerprint: u64,
    pub states: usize,
    pub actions: usize,
    /// Row-major values, `states * actions` long.
    pub values: Vec<f64>,
}

impl QTable {
    /// Capture the table together with `quantizer`'s edge configuration.
    pub fn snapshot(&self, quantizer: &Quantizer) -> TableSnapshot {
        TableSnapshot {
            version: SNAPSHOT_VERSION,
            edges: quantizer.edges().clone(),
            fingerprint: quantizer.fingerprint(),
            states: self.states,
            actions: Uplink::COUNT,
            values: self.values.clone(),
        }
    }

    /// Restore a table, validating it against the live `quantizer`.
    ///
    /// Checks, in order: snapshot version, action count and value length, row
    /// count ([`Error::TableShapeMismatch`]), edge fingerprint ([`Error::EdgeMismatch`]).
    /// A mismatched table is never reshaped.
    pub fn from_snapshot(snap: TableSnapshot, quantizer: &Quantizer) -> Result<Self> {
        if snap.version != SNAPSHOT_VERSION {
            return Err(Error::SnapshotVersion(snap.version));
        }
        if snap.actions != Uplink::COUNT {
            return Err(Error::config(format!(
                "snapshot has {} actions, expected {}",
                snap.actions,
                Uplink::COUNT
            )));
        }
        if snap.states.checked_mul(snap.actions) != Some(snap.values.len()) {
            return Err(Error::config(format!(
                "snapshot declares {} rows but carries {} values",
                snap.states,
                snap.values.len()
            )));
        }
        let table = QTable {
            states: snap.states,
            values: snap.values,
        };
        table.check_shape(quantizer)?;
        let expected = quantizer.fingerprint();
        if snap.fingerprint != expected || snap.edges.fingerprint() != expected {
            return Err(Error::EdgeMismatch {
                expected,
                found: snap.fingerprint,
            });
        }
        Ok(table)
    }
}

#[cfg(feature = "serde")]
impl QTable {
    /// Write a JSON snapshot to `path`.
    pub fn save_json(&self, path: impl AsRef<std::path::Path>, quantizer: &Quantizer) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer(writer, &self.snapshot(quantizer))?;
        Ok(())
    }

    /// Read and validate a JSON snapshot from `path`.
    pub fn load_json(path: impl AsRef<std::path::Path>, quantizer: &Quantizer) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let snap: TableSnapshot = serde_json::from_reader(std::io::BufReader::new(file))?;
        Self::from_snapshot(snap, quantizer)
    }
}
