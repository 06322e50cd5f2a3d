//! Fixed-edge state quantization.
//!
//! Each observation dimension is bucketed against a static, strictly increasing
//! edge array, and the five bucket coordinates are packed row-major into one
//! flat index (mixed radix). The flat index addresses a row of the value table.
//!
//! Encoding and its inverse live on [`Quantizer`] together with the edge
//! fingerprint, so a table can always be checked against the configuration
//! that produced it.

use crate::stable_hash::stable_hash_f64_groups;
use crate::{Error, Observation, Result};

/// Bucket edges shared by training and decision.
///
/// Latency edges apply to both uplinks, as do loss edges. An empty edge array
/// yields a single bucket for that dimension.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BucketEdges {
    pub latency_ms: Vec<f64>,
    pub loss: Vec<f64>,
    pub voice_share: Vec<f64>,
}

impl Default for BucketEdges {
    fn default() -> Self {
        Self {
            latency_ms: vec![70.0, 120.0],
            loss: vec![0.02, 0.08],
            voice_share: vec![0.3],
        }
    }
}

impl BucketEdges {
    /// Edge arrays in observation-dimension order.
    pub fn per_dimension(&self) -> [&[f64]; Observation::DIMS] {
        [
            self.latency_ms.as_slice(),
            self.loss.as_slice(),
            self.latency_ms.as_slice(),
            self.loss.as_slice(),
            self.voice_share.as_slice(),
        ]
    }

    /// Reject non-finite or non-increasing edges.
    pub fn validate(&self) -> Result<()> {
        for (name, edges) in [
            ("latency_ms", &self.latency_ms),
            ("loss", &self.loss),
            ("voice_share", &self.voice_share),
        ] {
            if edges.iter().any(|e| !e.is_finite()) {
                return Err(Error::config(format!("{name} edges must be finite")));
            }
            if edges.windows(2).any(|w| w[0] >= w[1]) {
                return Err(Error::config(format!(
                    "{name} edges must be strictly increasing"
                )));
            }
        }
        Ok(())
    }

    /// Stable fingerprint of the configuration.
    pub fn fingerprint(&self) -> u64 {
        stable_hash_f64_groups(
            0,
            &[
                self.latency_ms.as_slice(),
                self.loss.as_slice(),
                self.voice_share.as_slice(),
            ],
        )
    }
}

/// Bucket index of `x`: the number of edges `<= x`.
///
/// Values below the first edge land in bucket 0, values at or above the last
/// edge in the last bucket. NaN compares false against every edge and lands in
/// bucket 0.
#[inline]
pub fn bucket(edges: &[f64], x: f64) -> usize {
    edges.partition_point(|&e| e <= x)
}

/// Observation → flat state index.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantizer {
    edges: BucketEdges,
    radix: [usize; Observation::DIMS],
    strides: [usize; Observation::DIMS],
    total: usize,
    fingerprint: u64,
}

impl Default for Quantizer {
    fn default() -> Self {
        // The default edges are known-valid and tiny.
        Self::from_checked(BucketEdges::default())
    }
}

impl Quantizer {
    /// Build a quantizer, validating the edges and the resulting state count.
    pub fn new(edges: BucketEdges) -> Result<Self> {
        edges.validate()?;
        let total = edges
            .per_dimension()
            .iter()
            .try_fold(1usize, |acc, e| acc.checked_mul(e.len() + 1))
            .ok_or_else(|| Error::config("bucket configuration overflows the state space"))?;
        let q = Self::from_checked(edges);
        debug_assert_eq!(q.total, total);
        Ok(q)
    }

    /// Caller guarantees the edges are valid and the state count fits in `usize`.
    fn from_checked(edges: BucketEdges) -> Self {
        let dims = edges.per_dimension();
        let mut radix = [1usize; Observation::DIMS];
        for (r, e) in radix.iter_mut().zip(dims.iter()) {
            *r = e.len() + 1;
        }
        // Row-major: the last dimension varies fastest.
        let mut strides = [1usize; Observation::DIMS];
        for d in (0..Observation::DIMS - 1).rev() {
            strides[d] = strides[d + 1] * radix[d + 1];
        }
        let total = strides[0] * radix[0];
        let fingerprint = edges.fingerprint();
        Self {
            edges,
            radix,
            strides,
            total,
            fingerprint,
        }
    }

    pub fn edges(&self) -> &BucketEdges {
        &self.edges
    }

    /// Bucket count per dimension.
    pub fn radix(&self) -> [usize; Observation::DIMS] {
        self.radix
    }

    /// Number of discrete states (product of [`Quantizer::radix`]).
    pub fn total_states(&self) -> usize {
        self.total
    }

    /// Fingerprint of the edge configuration this quantizer was built from.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Per-dimension bucket coordinates.
    pub fn bucket_coords(&self, obs: &Observation) -> [usize; Observation::DIMS] {
        let xs = obs.to_array();
        let dims = self.edges.per_dimension();
        let mut out = [0usize; Observation::DIMS];
        for d in 0..Observation::DIMS {
            out[d] = bucket(dims[d], xs[d]);
        }
        out
    }

    /// Flat state index of `obs`. Always in `[0, total_states)`.
    pub fn quantize(&self, obs: &Observation) -> usize {
        let coords = self.bucket_coords(obs);
        coords
            .iter()
            .zip(self.strides.iter())
            .map(|(c, s)| c * s)
            .sum()
    }

    /// Pack bucket coordinates; `None` if any coordinate is out of range.
    pub fn encode(&self, coords: [usize; Observation::DIMS]) -> Option<usize> {
        let mut idx = 0usize;
        for d in 0..Observation::DIMS {
            if coords[d] >= self.radix[d] {
                return None;
            }
            idx += coords[d] * self.strides[d];
        }
        Some(idx)
    }

    /// Unpack a flat index into bucket coordinates; `None` if out of range.
    pub fn decode(&self, index: usize) -> Option<[usize; Observation::DIMS]> {
        if index >= self.total {
            return None;
        }
        let mut rem = index;
        let mut out = [0usize; Observation::DIMS];
        for d in 0..Observation::DIMS {
            out[d] = rem / self.strides[d];
            rem %= self.strides[d];
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_layout_has_162_states() {
        let q = Quantizer::default();
        assert_eq!(q.radix(), [3, 3, 3, 3, 2]);
        assert_eq!(q.total_states(), 162);
        assert_eq!(Quantizer::new(BucketEdges::default()).unwrap(), q);
    }

    #[test]
    fn edge_values_land_in_the_upper_bucket() {
        let edges = [70.0, 120.0];
        assert_eq!(bucket(&edges, 69.999), 0);
        assert_eq!(bucket(&edges, 70.0), 1);
        assert_eq!(bucket(&edges, 120.0), 2);
        assert_eq!(bucket(&edges, f64::NAN), 0);
        assert_eq!(bucket(&[], 5.0), 0);
    }

    #[test]
    fn known_observation_index() {
        let q = Quantizer::default();
        // coords: lat 40 -> 0, loss 0.01 -> 0, lat 95 -> 1, loss 0.05 -> 1, voice 0.8 -> 1
        let obs = Observation::from([40.0, 0.01, 95.0, 0.05, 0.8]);
        assert_eq!(q.bucket_coords(&obs), [0, 0, 1, 1, 1]);
        assert_eq!(q.quantize(&obs), 6 + 2 + 1);
    }

    #[test]
    fn rejects_unsorted_or_non_finite_edges() {
        let unsorted = BucketEdges {
            latency_ms: vec![120.0, 70.0],
            ..BucketEdges::default()
        };
        assert!(matches!(Quantizer::new(unsorted), Err(Error::Config(_))));

        let dup = BucketEdges {
            voice_share: vec![0.3, 0.3],
            ..BucketEdges::default()
        };
        assert!(matches!(Quantizer::new(dup), Err(Error::Config(_))));

        let nan = BucketEdges {
            loss: vec![f64::NAN],
            ..BucketEdges::default()
        };
        assert!(matches!(Quantizer::new(nan), Err(Error::Config(_))));
    }

    #[test]
    fn empty_edges_collapse_a_dimension() {
        let q = Quantizer::new(BucketEdges {
            latency_ms: vec![],
            loss: vec![],
            voice_share: vec![],
        })
        .unwrap();
        assert_eq!(q.total_states(), 1);
        assert_eq!(q.quantize(&Observation::from([500.0, 2.0, -1.0, 0.5, 9.0])), 0);
    }

    #[test]
    fn fingerprint_tracks_edges() {
        let a = BucketEdges::default();
        let mut b = a.clone();
        b.voice_share = vec![0.5];
        assert_eq!(a.fingerprint(), BucketEdges::default().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(idx in 0usize..162) {
            let q = Quantizer::default();
            let coords = q.decode(idx).unwrap();
            prop_assert_eq!(q.encode(coords), Some(idx));
        }

        #[test]
        fn quantize_matches_encode_of_coords(
            a_lat in -50.0f64..400.0,
            a_loss in -0.5f64..1.5,
            b_lat in -50.0f64..400.0,
            b_loss in -0.5f64..1.5,
            voice in -0.5f64..1.5,
        ) {
            let q = Quantizer::default();
            let obs = Observation::new(a_lat, a_loss, b_lat, b_loss, voice);
            let idx = q.quantize(&obs);
            prop_assert!(idx < q.total_states());
            prop_assert_eq!(q.encode(q.bucket_coords(&obs)), Some(idx));
        }
    }
}
