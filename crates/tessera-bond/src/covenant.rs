//! Financial covenants and breach tracking.
//!
//! A covenant holds an observed metric on one side of a threshold. Each
//! observation on the wrong side opens a [`Breach`]; breaches stay open
//! until cured or waived.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tessera_core::{BondId, BreachId, CovenantId};

use crate::error::BondError;

/// Default days allowed to cure a breach.
pub const DEFAULT_CURE_DEADLINE_DAYS: u32 = 30;

/// Deviation, as a fraction of the threshold, above which a breach is material.
pub const MATERIAL_BREACH_RATIO: f64 = 0.10;

/// Distance from the threshold, as a fraction of it, that counts as a warning.
pub const WARNING_BUFFER_RATIO: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovenantKind {
    /// Debt service coverage ratio.
    Dscr,
    /// Loan to value.
    Ltv,
    Concentration,
    Reserve,
    Reporting,
    Insurance,
    Custom,
}

/// Which side of the threshold is compliant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CovenantDirection {
    /// The metric must stay at or above the threshold.
    Above,
    /// The metric must stay at or below the threshold.
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckFrequency {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Quarterly,
}

impl CheckFrequency {
    pub fn days(&self) -> i64 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
            Self::Monthly => 30,
            Self::Quarterly => 90,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CovenantStatus {
    Compliant,
    /// Compliant, but within the warning buffer of the threshold.
    Warning,
    Breach,
    Waived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreachSeverity {
    Warning,
    Material,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum BreachState {
    Open,
    Cured { at: DateTime<Utc> },
    Waived { at: DateTime<Utc>, by: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breach {
    pub id: BreachId,
    pub detected_at: DateTime<Utc>,
    pub observed: f64,
    pub threshold: f64,
    pub severity: BreachSeverity,
    pub cure_deadline: DateTime<Utc>,
    pub state: BreachState,
}

impl Breach {
    pub fn is_open(&self) -> bool {
        matches!(self.state, BreachState::Open)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovenantParams {
    pub kind: CovenantKind,
    pub description: String,
    pub threshold: f64,
    pub direction: CovenantDirection,
    #[serde(default)]
    pub frequency: CheckFrequency,
    #[serde(default)]
    pub cure_deadline_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Covenant {
    pub id: CovenantId,
    pub bond_id: BondId,
    pub kind: CovenantKind,
    pub description: String,
    pub threshold: f64,
    pub direction: CovenantDirection,
    pub frequency: CheckFrequency,
    /// Last observed value; `None` until the first check.
    pub current_value: Option<f64>,
    pub status: CovenantStatus,
    pub cure_deadline_days: u32,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub next_check_due: DateTime<Utc>,
    pub breaches: Vec<Breach>,
}

/// Outcome of a single covenant check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovenantCheck {
    pub covenant_id: CovenantId,
    pub observed: f64,
    pub status: CovenantStatus,
    /// Signed headroom; negative means the threshold was crossed.
    pub headroom: f64,
    /// Compliant, but within the warning buffer of the threshold.
    pub warning: bool,
    /// The breach opened by this check, if any.
    pub breach: Option<Breach>,
}

impl Covenant {
    pub(crate) fn new(bond_id: BondId, params: CovenantParams) -> Result<Self, BondError> {
        if !params.threshold.is_finite() {
            return Err(BondError::InvalidParams("covenant threshold must be finite".into()));
        }
        let now = Utc::now();
        Ok(Self {
            id: CovenantId::new(),
            bond_id,
            kind: params.kind,
            description: params.description,
            threshold: params.threshold,
            direction: params.direction,
            frequency: params.frequency,
            current_value: None,
            status: CovenantStatus::Compliant,
            cure_deadline_days: params.cure_deadline_days.unwrap_or(DEFAULT_CURE_DEADLINE_DAYS),
            last_checked_at: None,
            next_check_due: now + Duration::days(params.frequency.days()),
            breaches: Vec::new(),
        })
    }

    /// Signed distance from the threshold, positive on the compliant side.
    pub fn headroom(&self, observed: f64) -> f64 {
        match self.direction {
            CovenantDirection::Above => observed - self.threshold,
            CovenantDirection::Below => self.threshold - observed,
        }
    }

    pub fn open_breaches(&self) -> impl Iterator<Item = &Breach> {
        self.breaches.iter().filter(|b| b.is_open())
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.next_check_due < now
    }

    pub(crate) fn check(&mut self, observed: f64) -> Result<CovenantCheck, BondError> {
        if !observed.is_finite() {
            return Err(BondError::InvalidParams("observed value must be finite".into()));
        }
        let now = Utc::now();
        self.current_value = Some(observed);
        self.last_checked_at = Some(now);
        self.next_check_due = now + Duration::days(self.frequency.days());

        let headroom = self.headroom(observed);
        let breach = if headroom < 0.0 {
            let severity = if headroom.abs() > self.threshold.abs() * MATERIAL_BREACH_RATIO {
                BreachSeverity::Material
            } else {
                BreachSeverity::Warning
            };
            let breach = Breach {
                id: BreachId::new(),
                detected_at: now,
                observed,
                threshold: self.threshold,
                severity,
                cure_deadline: Duration::try_days(i64::from(self.cure_deadline_days))
                    .and_then(|days| now.checked_add_signed(days))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
                state: BreachState::Open,
            };
            self.breaches.push(breach.clone());
            Some(breach)
        } else {
            None
        };

        let warning = breach.is_none() && headroom < self.threshold.abs() * WARNING_BUFFER_RATIO;

        // A good reading does not close breaches; only a cure or waiver does.
        self.status = if self.open_breaches().next().is_some() {
            CovenantStatus::Breach
        } else if self.status == CovenantStatus::Waived {
            CovenantStatus::Waived
        } else if warning {
            CovenantStatus::Warning
        } else {
            CovenantStatus::Compliant
        };

        Ok(CovenantCheck {
            covenant_id: self.id,
            observed,
            status: self.status,
            headroom,
            warning,
            breach,
        })
    }

    fn open_breach_mut(&mut self, breach_id: BreachId) -> Result<&mut Breach, BondError> {
        let covenant_id = self.id;
        let breach = self
            .breaches
            .iter_mut()
            .find(|b| b.id == breach_id)
            .ok_or(BondError::UnknownBreach {
                covenant_id,
                breach_id,
            })?;
        if !breach.is_open() {
            return Err(BondError::BreachAlreadyCured(breach_id));
        }
        Ok(breach)
    }

    pub(crate) fn cure(&mut self, breach_id: BreachId) -> Result<(), BondError> {
        self.open_breach_mut(breach_id)?.state = BreachState::Cured { at: Utc::now() };
        if self.open_breaches().next().is_none() {
            self.status = CovenantStatus::Compliant;
        }
        Ok(())
    }

    pub(crate) fn waive(&mut self, breach_id: BreachId, waived_by: &str) -> Result<(), BondError> {
        self.open_breach_mut(breach_id)?.state = BreachState::Waived {
            at: Utc::now(),
            by: waived_by.to_string(),
        };
        if self.open_breaches().next().is_none() {
            self.status = CovenantStatus::Waived;
        }
        Ok(())
    }
}
