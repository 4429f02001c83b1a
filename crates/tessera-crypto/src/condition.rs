//! PREIMAGE-SHA-256 crypto-conditions (RFC draft `draft-thomas-crypto-conditions`,
//! type 0), the form accepted by XRPL escrows.
//!
//! Condition:   `A0 25 80 20 <sha256(preimage)> 81 01 <preimage length>`
//! Fulfillment: `A0 <len+2> 80 <len> <preimage>`
//!
//! Only the condition may be published. The fulfillment is a secret: it is
//! zeroized on drop, redacted from `Debug`, and must go straight to the
//! secure store.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::hashing::{sha256, Hash};

/// Length of generated preimages.
pub const PREIMAGE_LEN: usize = 32;

const TAG_PREIMAGE_SHA256: u8 = 0xA0;
const TAG_FINGERPRINT: u8 = 0x80;
const TAG_COST: u8 = 0x81;
const CONDITION_LEN: usize = 39;

/// A DER-encoded PREIMAGE-SHA-256 fulfillment.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Fulfillment {
    der: Vec<u8>,
}

impl Fulfillment {
    /// Wrap a raw preimage.
    pub fn from_preimage(preimage: &[u8]) -> Result<Self, CryptoError> {
        // Short-form DER lengths only.
        if preimage.is_empty() || preimage.len() > 125 {
            return Err(CryptoError::MalformedFulfillment);
        }
        let mut der = Vec::with_capacity(preimage.len() + 4);
        der.push(TAG_PREIMAGE_SHA256);
        der.push(preimage.len() as u8 + 2);
        der.push(TAG_FINGERPRINT);
        der.push(preimage.len() as u8);
        der.extend_from_slice(preimage);
        Ok(Self { der })
    }

    /// Parse an upper- or lower-case hex fulfillment.
    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        let der = hex::decode(encoded).map_err(|_| CryptoError::InvalidHex("fulfillment"))?;
        let well_formed = der.len() >= 5
            && der[0] == TAG_PREIMAGE_SHA256
            && der[1] as usize == der.len() - 2
            && der[2] == TAG_FINGERPRINT
            && der[3] as usize == der.len() - 4;
        if !well_formed {
            let mut der = der;
            der.zeroize();
            return Err(CryptoError::MalformedFulfillment);
        }
        Ok(Self { der })
    }

    /// The secret preimage.
    pub fn preimage(&self) -> &[u8] {
        &self.der[4..]
    }

    /// Upper-case hex of the DER encoding. Handle with care.
    pub fn expose_hex(&self) -> String {
        hex::encode_upper(&self.der)
    }

    /// Derive the matching condition (upper-case hex).
    pub fn condition(&self) -> String {
        let fingerprint = sha256(self.preimage());
        let mut der = Vec::with_capacity(CONDITION_LEN);
        der.extend_from_slice(&[TAG_PREIMAGE_SHA256, 0x25, TAG_FINGERPRINT, 0x20]);
        der.extend_from_slice(&fingerprint);
        der.extend_from_slice(&[TAG_COST, 0x01, self.preimage().len() as u8]);
        hex::encode_upper(der)
    }
}

impl fmt::Debug for Fulfillment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Fulfillment(<redacted>)")
    }
}

impl Serialize for Fulfillment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.expose_hex())
    }
}

impl<'de> Deserialize<'de> for Fulfillment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut encoded = String::deserialize(deserializer)?;
        let parsed = Fulfillment::from_hex(&encoded).map_err(serde::de::Error::custom);
        encoded.zeroize();
        parsed
    }
}

/// A freshly generated condition / fulfillment pair.
#[derive(Debug, Clone)]
pub struct EscrowCondition {
    /// Upper-case hex DER condition. Safe to publish.
    pub condition: String,
    /// Secret fulfillment. Hand to the secure store immediately.
    pub fulfillment: Fulfillment,
}

/// Generate a PREIMAGE-SHA-256 condition from 32 bytes of OS randomness.
pub fn generate_condition() -> EscrowCondition {
    let mut preimage = [0u8; PREIMAGE_LEN];
    OsRng.fill_bytes(&mut preimage);

    let fulfillment = Fulfillment {
        der: {
            let mut der = Vec::with_capacity(PREIMAGE_LEN + 4);
            der.extend_from_slice(&[TAG_PREIMAGE_SHA256, 0x22, TAG_FINGERPRINT, 0x20]);
            der.extend_from_slice(&preimage);
            der
        },
    };
    preimage.zeroize();

    let condition = fulfillment.condition();
    tracing::debug!(condition = %condition, "crypto-condition generated");
    EscrowCondition {
        condition,
        fulfillment,
    }
}

/// Extract the SHA-256 fingerprint committed to by a condition.
pub fn condition_fingerprint(condition: &str) -> Result<Hash, CryptoError> {
    let der = hex::decode(condition).map_err(|_| CryptoError::InvalidHex("condition"))?;
    if der.len() != CONDITION_LEN {
        return Err(CryptoError::MalformedCondition(format!(
            "expected {} bytes, got {}",
            CONDITION_LEN,
            der.len()
        )));
    }
    if der[..4] != [TAG_PREIMAGE_SHA256, 0x25, TAG_FINGERPRINT, 0x20] || der[36..38] != [TAG_COST, 0x01] {
        return Err(CryptoError::MalformedCondition(
            "not a PREIMAGE-SHA-256 condition".into(),
        ));
    }
    let mut fingerprint = [0u8; 32];
    fingerprint.copy_from_slice(&der[4..36]);
    Ok(fingerprint)
}

/// Whether `fulfillment` satisfies `condition`.
///
/// Both the fingerprint and the declared cost (preimage length) must match.
pub fn verify_fulfillment(condition: &str, fulfillment: &Fulfillment) -> bool {
    match hex::decode(condition) {
        Ok(der) if der.len() == CONDITION_LEN => {
            condition_fingerprint(condition)
                .map(|fp| fp == sha256(fulfillment.preimage()))
                .unwrap_or(false)
                && der[38] as usize == fulfillment.preimage().len()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_pair_verifies() {
        let pair = generate_condition();
        assert!(verify_fulfillment(&pair.condition, &pair.fulfillment));
        assert_eq!(
            condition_fingerprint(&pair.condition).unwrap(),
            sha256(pair.fulfillment.preimage())
        );
    }

    #[test]
    fn test_encoding_layout() {
        let pair = generate_condition();
        assert_eq!(pair.condition.len(), CONDITION_LEN * 2);
        assert!(pair.condition.starts_with("A0258020"));
        assert!(pair.condition.ends_with("810120"));

        let fulfillment = pair.fulfillment.expose_hex();
        assert_eq!(fulfillment.len(), (PREIMAGE_LEN + 4) * 2);
        assert!(fulfillment.starts_with("A0228020"));
        assert_eq!(pair.condition, pair.condition.to_uppercase());
    }

    #[test]
    fn test_fulfillments_are_unique() {
        let a = generate_condition();
        let b = generate_condition();
        assert_ne!(a.fulfillment.expose_hex(), b.fulfillment.expose_hex());
        assert_ne!(a.condition, b.condition);
    }

    #[test]
    fn test_wrong_fulfillment_rejected() {
        let a = generate_condition();
        let b = generate_condition();
        assert!(!verify_fulfillment(&a.condition, &b.fulfillment));
    }

    #[test]
    fn test_debug_is_redacted() {
        let pair = generate_condition();
        let rendered = format!("{:?}", pair);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&pair.fulfillment.expose_hex()));
    }

    #[test]
    fn test_from_hex_roundtrip() {
        let pair = generate_condition();
        let parsed = Fulfillment::from_hex(&pair.fulfillment.expose_hex()).unwrap();
        assert_eq!(parsed, pair.fulfillment);
        assert_eq!(parsed.condition(), pair.condition);
    }

    #[test]
    fn test_from_hex_rejects_malformed() {
        assert!(matches!(
            Fulfillment::from_hex("zz"),
            Err(CryptoError::InvalidHex(_))
        ));
        assert!(matches!(
            Fulfillment::from_hex("A0038001"),
            Err(CryptoError::MalformedFulfillment)
        ));
    }

    #[test]
    fn test_known_preimage() {
        // Empty-ish fixtures are not allowed; use a fixed 32-byte preimage.
        let fulfillment = Fulfillment::from_preimage(&[0u8; 32]).unwrap();
        let expected_fp = sha256(&[0u8; 32]);
        assert_eq!(condition_fingerprint(&fulfillment.condition()).unwrap(), expected_fp);
        assert!(Fulfillment::from_preimage(&[]).is_err());
    }

    #[test]
    fn test_fingerprint_rejects_other_types() {
        let pair = generate_condition();
        let tampered = format!("A1{}", &pair.condition[2..]);
        assert!(condition_fingerprint(&tampered).is_err());
        assert!(!verify_fulfillment(&tampered, &pair.fulfillment));
    }

    #[test]
    fn test_serde_uses_hex() {
        let pair = generate_condition();
        let json = serde_json::to_string(&pair.fulfillment).unwrap();
        assert_eq!(json, format!("\"{}\"", pair.fulfillment.expose_hex()));
        let back: Fulfillment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pair.fulfillment);
    }
}
