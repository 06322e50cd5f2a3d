//! Observation and action types shared by every component.

use std::fmt;

use crate::{Error, Result};

/// One of the two outbound paths the gateway can route through.
///
/// The discriminant doubles as the action index used by the value table:
/// `A = 0`, `B = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Uplink {
    /// Primary, high-capacity, free uplink.
    #[default]
    A,
    /// Backup, low-capacity, metered uplink.
    B,
}

impl Uplink {
    /// Number of actions.
    pub const COUNT: usize = 2;

    /// Both uplinks in action-index order.
    pub const ALL: [Uplink; 2] = [Uplink::A, Uplink::B];

    /// Action index (`0` or `1`).
    pub fn index(self) -> usize {
        match self {
            Uplink::A => 0,
            Uplink::B => 1,
        }
    }

    /// Inverse of [`Uplink::index`]; anything else is [`Error::InvalidAction`].
    pub fn from_index(action: usize) -> Result<Self> {
        match action {
            0 => Ok(Uplink::A),
            1 => Ok(Uplink::B),
            other => Err(Error::InvalidAction(other)),
        }
    }
}

impl TryFrom<usize> for Uplink {
    type Error = Error;

    fn try_from(action: usize) -> Result<Self> {
        Uplink::from_index(action)
    }
}

impl fmt::Display for Uplink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uplink::A => f.write_str("uplink A"),
            Uplink::B => f.write_str("uplink B"),
        }
    }
}

/// Quality of a single uplink at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkQuality {
    pub latency_ms: f64,
    pub loss: f64,
}

/// Gateway state as seen by the policy.
///
/// Field order matches the quantizer's dimension order and the array form
/// returned by [`Observation::to_array`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Observation {
    /// Uplink A latency in milliseconds, `[10, 200]`.
    pub a_latency_ms: f64,
    /// Uplink A packet-loss fraction; nominally `[0, 0.2]`, up to `1` during a spike.
    pub a_loss: f64,
    /// Uplink B latency in milliseconds, `[10, 200]`.
    pub b_latency_ms: f64,
    /// Uplink B packet-loss fraction; nominally `[0, 0.2]`, up to `1` during a spike.
    pub b_loss: f64,
    /// Fraction of demand that is latency-sensitive voice, `[0, 1]`.
    pub voice_share: f64,
}

impl Observation {
    /// Number of observation dimensions.
    pub const DIMS: usize = 5;

    pub fn new(
        a_latency_ms: f64,
        a_loss: f64,
        b_latency_ms: f64,
        b_loss: f64,
        voice_share: f64,
    ) -> Self {
        Self {
            a_latency_ms,
            a_loss,
            b_latency_ms,
            b_loss,
            voice_share,
        }
    }

    /// `[a_latency, a_loss, b_latency, b_loss, voice_share]`.
    pub fn to_array(&self) -> [f64; 5] {
        [
            self.a_latency_ms,
            self.a_loss,
            self.b_latency_ms,
            self.b_loss,
            self.voice_share,
        ]
    }

    /// Latency and loss of one uplink.
    pub fn link(&self, uplink: Uplink) -> LinkQuality {
        match uplink {
            Uplink::A => LinkQuality {
                latency_ms: self.a_latency_ms,
                loss: self.a_loss,
            },
            Uplink::B => LinkQuality {
                latency_ms: self.b_latency_ms,
                loss: self.b_loss,
            },
        }
    }
}

impl From<[f64; 5]> for Observation {
    fn from(v: [f64; 5]) -> Self {
        Self::new(v[0], v[1], v[2], v[3], v[4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uplink_index_round_trips() {
        for u in Uplink::ALL {
            assert_eq!(Uplink::from_index(u.index()).unwrap(), u);
        }
    }

    #[test]
    fn out_of_range_action_is_rejected() {
        assert!(matches!(Uplink::try_from(2), Err(Error::InvalidAction(2))));
        assert!(matches!(
            Uplink::from_index(usize::MAX),
            Err(Error::InvalidAction(_))
        ));
    }

    #[test]
    fn array_form_preserves_dimension_order() {
        let obs = Observation::from([40.0, 0.01, 95.0, 0.05, 0.8]);
        assert_eq!(obs.to_array(), [40.0, 0.01, 95.0, 0.05, 0.8]);
        assert_eq!(obs.link(Uplink::B).latency_ms, 95.0);
        assert_eq!(obs.link(Uplink::A).loss, 0.01);
    }
}
