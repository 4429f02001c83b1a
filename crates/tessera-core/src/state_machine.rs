use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// The nine states of a bond lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BondStatus {
    /// Registered, terms still being drafted.
    Draft,
    /// Terms approved by governance.
    Approved,
    /// Open for subscription.
    Offering,
    /// Subscriptions fully funded.
    Funded,
    /// Issued and accruing.
    Active,
    /// Reached maturity date. Only settlement (redemption) may follow.
    Matured,
    /// Principal returned. Final state.
    Redeemed,
    /// Event of default declared. Final state.
    Defaulted,
    /// Withdrawn before activation. Final state.
    Cancelled,
}

impl BondStatus {
    pub const ALL: [BondStatus; 9] = [
        Self::Draft,
        Self::Approved,
        Self::Offering,
        Self::Funded,
        Self::Active,
        Self::Matured,
        Self::Redeemed,
        Self::Defaulted,
        Self::Cancelled,
    ];

    /// Whether the bond has left the live part of its lifecycle.
    ///
    /// `Matured` counts as terminal: it can no longer be defaulted or
    /// cancelled, although the settlement edge to `Redeemed` stays open.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Matured | Self::Redeemed | Self::Defaulted | Self::Cancelled
        )
    }

    /// Statuses reachable from this one in a single step.
    pub fn allowed_targets(&self) -> &'static [BondStatus] {
        match self {
            Self::Draft => &[Self::Approved, Self::Cancelled],
            Self::Approved => &[Self::Offering, Self::Cancelled],
            Self::Offering => &[Self::Funded, Self::Cancelled],
            Self::Funded => &[Self::Active, Self::Cancelled],
            Self::Active => &[Self::Matured, Self::Defaulted],
            Self::Matured => &[Self::Redeemed],
            Self::Redeemed | Self::Defaulted | Self::Cancelled => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::Offering => "offering",
            Self::Funded => "funded",
            Self::Active => "active",
            Self::Matured => "matured",
            Self::Redeemed => "redeemed",
            Self::Defaulted => "defaulted",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BondStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BondStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::InvalidStatus(s.to_string()))
    }
}

/// Validates bond status changes against the adjacency table.
///
/// Valid transitions:
/// - Draft → Approved | Cancelled
/// - Approved → Offering | Cancelled
/// - Offering → Funded | Cancelled
/// - Funded → Active | Cancelled
/// - Active → Matured | Defaulted
/// - Matured → Redeemed
pub struct BondStateMachine;

impl BondStateMachine {
    /// Validate a move from `current` to `target`.
    /// Returns the new status on success.
    pub fn transition(current: BondStatus, target: BondStatus) -> Result<BondStatus, CoreError> {
        if !current.allowed_targets().contains(&target) {
            return Err(CoreError::InvalidStateTransition {
                from: current,
                to: target,
            });
        }

        tracing::debug!(from = %current, to = %target, "bond state transition");
        Ok(target)
    }

    /// Check if a transition is valid without performing it.
    pub fn can_transition(current: BondStatus, target: BondStatus) -> bool {
        current.allowed_targets().contains(&target)
    }
}
