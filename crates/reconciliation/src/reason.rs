use serde::{Deserialize, Serialize};

/// Reason code attached to a reconciliation line with a non-zero variance.
///
/// Legality depends on the variance sign: a surplus (proposed above system)
/// only accepts gain reasons, a deficit only accepts loss reasons.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Stock discovered that the system did not know about.
    Found,
    /// Previously picked stock returned to its bin.
    ReturnToStock,
    /// Stock damaged beyond sale.
    Damaged,
    /// Stock missing from its bin.
    Missing,
    /// Stock past its expiry date.
    Expired,
}

impl ReasonCode {
    pub fn is_gain(self) -> bool {
        matches!(self, ReasonCode::Found | ReasonCode::ReturnToStock)
    }

    pub fn is_loss(self) -> bool {
        matches!(
            self,
            ReasonCode::Damaged | ReasonCode::Missing | ReasonCode::Expired
        )
    }

    /// True when this code is legal for a line whose variance has the given
    /// sign. Zero-variance lines accept any code (it is stored but unused).
    pub fn allows_variance(self, variance: i64) -> bool {
        match variance.cmp(&0) {
            core::cmp::Ordering::Greater => self.is_gain(),
            core::cmp::Ordering::Less => self.is_loss(),
            core::cmp::Ordering::Equal => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_codes_reject_negative_variance() {
        assert!(ReasonCode::Found.allows_variance(5));
        assert!(!ReasonCode::Found.allows_variance(-5));
        assert!(ReasonCode::ReturnToStock.allows_variance(1));
    }

    #[test]
    fn loss_codes_reject_positive_variance() {
        assert!(ReasonCode::Damaged.allows_variance(-5));
        assert!(!ReasonCode::Damaged.allows_variance(5));
        assert!(ReasonCode::Missing.allows_variance(-1));
        assert!(ReasonCode::Expired.allows_variance(-1));
    }

    #[test]
    fn zero_variance_accepts_any_code() {
        assert!(ReasonCode::Found.allows_variance(0));
        assert!(ReasonCode::Damaged.allows_variance(0));
    }
}
