use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;

/// Number of fractional digits carried by [`Amount`].
pub const AMOUNT_DECIMALS: u32 = 6;

const SCALE: u128 = 1_000_000;

/// Non-negative fixed-point quantity with six fractional digits.
///
/// Stored as micro-units in a `u128`. One XRP drop is exactly one
/// micro-unit; Stellar stroops carry one more digit (see the ledger codecs).
/// Serialises as a decimal string and accepts either a decimal string or a
/// whole integer when deserialising.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "AmountRepr", into = "String")]
pub struct Amount(u128);

#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Text(String),
    Whole(u64),
}

impl TryFrom<AmountRepr> for Amount {
    type Error = CoreError;

    fn try_from(repr: AmountRepr) -> Result<Self, Self::Error> {
        match repr {
            AmountRepr::Text(s) => Amount::parse(&s),
            AmountRepr::Whole(w) => Ok(Amount::from_whole(w)),
        }
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Build from raw micro-units.
    pub const fn from_units(units: u128) -> Self {
        Self(units)
    }

    /// Build from a whole number of units (no fractional part).
    pub fn from_whole(whole: u64) -> Self {
        Self(whole as u128 * SCALE)
    }

    /// Raw micro-units.
    pub fn units(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parse a plain decimal string such as `"1000"` or `"0.25"`.
    ///
    /// Signs, exponents and more than six fractional digits are rejected.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let s = s.trim();
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));

        let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !digits(whole) || !digits(frac) {
            return Err(CoreError::InvalidAmount(format!("not a decimal amount: {:?}", s)));
        }
        if frac.len() > AMOUNT_DECIMALS as usize {
            return Err(CoreError::InvalidAmount(format!(
                "{} has more than {} fractional digits",
                s, AMOUNT_DECIMALS
            )));
        }

        let whole: u128 = whole.parse().map_err(|_| CoreError::AmountOverflow)?;
        let frac_units: u128 = if frac.is_empty() {
            0
        } else {
            let raw: u128 = frac.parse().map_err(|_| CoreError::AmountOverflow)?;
            raw * 10u128.pow(AMOUNT_DECIMALS - frac.len() as u32)
        };

        whole
            .checked_mul(SCALE)
            .and_then(|w| w.checked_add(frac_units))
            .map(Self)
            .ok_or(CoreError::AmountOverflow)
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Self(self.0.saturating_add(other.0))
    }

    /// Divide into `parts`, truncating to the nearest micro-unit.
    pub fn checked_div(self, parts: u32) -> Option<Amount> {
        self.0.checked_div(parts as u128).map(Self)
    }

    /// Multiply by another fixed-point quantity (e.g. a unit price),
    /// truncating the result to micro-units.
    pub fn checked_mul(self, factor: Amount) -> Option<Amount> {
        self.0.checked_mul(factor.0).map(|p| Self(p / SCALE))
    }

    /// Render with exactly `decimals` fractional digits, truncating when
    /// `decimals` is below the native precision.
    pub fn to_fixed(&self, decimals: u32) -> String {
        let whole = self.0 / SCALE;
        let frac = format!("{:06}", self.0 % SCALE);
        if decimals == 0 {
            return whole.to_string();
        }
        let mut frac: String = frac.chars().take(decimals as usize).collect();
        while frac.len() < decimals as usize {
            frac.push('0');
        }
        format!("{}.{}", whole, frac)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let frac = self.0 % SCALE;
        if frac == 0 {
            write!(f, "{}", whole)
        } else {
            let frac = format!("{:06}", frac);
            write!(f, "{}.{}", whole, frac.trim_end_matches('0'))
        }
    }
}

impl std::str::FromStr for Amount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Ledger networks this workspace prepares transactions for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    Xrpl,
    Stellar,
}

impl LedgerKind {
    /// Code of the network's native asset.
    pub fn native_code(&self) -> &'static str {
        match self {
            Self::Xrpl => "XRP",
            Self::Stellar => "XLM",
        }
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xrpl => write!(f, "xrpl"),
            Self::Stellar => write!(f, "stellar"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkEnvironment {
    #[default]
    Testnet,
    Mainnet,
}

impl fmt::Display for NetworkEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Testnet => write!(f, "testnet"),
            Self::Mainnet => write!(f, "mainnet"),
        }
    }
}

/// A concrete ledger network: kind plus environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerNetwork {
    pub kind: LedgerKind,
    pub environment: NetworkEnvironment,
}

impl LedgerNetwork {
    pub fn new(kind: LedgerKind, environment: NetworkEnvironment) -> Self {
        Self { kind, environment }
    }

    pub fn xrpl_testnet() -> Self {
        Self::new(LedgerKind::Xrpl, NetworkEnvironment::Testnet)
    }

    pub fn stellar_testnet() -> Self {
        Self::new(LedgerKind::Stellar, NetworkEnvironment::Testnet)
    }
}

impl fmt::Display for LedgerNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.environment)
    }
}

/// An asset on a ledger. Assets without an issuer are the network's native
/// asset; everything else is an issued currency (IOU / credit asset).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl Asset {
    pub fn native(kind: LedgerKind) -> Self {
        Self {
            code: kind.native_code().to_string(),
            issuer: None,
        }
    }

    pub fn issued(code: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            issuer: Some(issuer.into()),
        }
    }

    pub fn is_native(&self) -> bool {
        self.issuer.is_none()
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.issuer {
            Some(issuer) => write!(f, "{}:{}", self.code, issuer),
            None => write!(f, "{}", self.code),
        }
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new time-ordered id (UUID v7).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a bond.
    BondId
);
uuid_id!(
    /// Unique identifier for a bond participant.
    ParticipantId
);
uuid_id!(
    /// Unique identifier for a covenant attached to a bond.
    CovenantId
);
uuid_id!(
    /// Unique identifier for a recorded covenant breach.
    BreachId
);
