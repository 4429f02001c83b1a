//! XRPL codec: shapes [`TxPayload`]s into unsigned XRPL transaction JSON
//! and converts between ledger-native and Tessera representations.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};
use tessera_core::{Amount, LedgerKind};

use crate::error::LedgerError;
use crate::types::{LedgerAmount, Memo, TxPayload};

/// 2000-01-01T00:00:00Z as a Unix timestamp.
pub const RIPPLE_EPOCH: i64 = 946_684_800;

/// Default transaction cost in drops.
pub const DEFAULT_FEE_DROPS: &str = "12";

/// Render an XRP amount as a drops string. One drop is one micro-unit.
pub fn xrp_to_drops(xrp: Amount) -> String {
    xrp.units().to_string()
}

pub fn drops_to_xrp(drops: &str) -> Result<Amount, LedgerError> {
    drops
        .trim()
        .parse::<u128>()
        .map(Amount::from_units)
        .map_err(|_| LedgerError::MalformedResponse(format!("invalid drops amount: {:?}", drops)))
}

/// Seconds since the Ripple epoch.
pub fn to_ripple_time(at: DateTime<Utc>) -> Result<u32, LedgerError> {
    let seconds = at.timestamp() - RIPPLE_EPOCH;
    u32::try_from(seconds)
        .map_err(|_| LedgerError::InvalidPayload(format!("{} is outside the Ripple epoch range", at)))
}

pub fn ripple_time_to_iso(ripple_time: u32) -> String {
    Utc.timestamp_opt(ripple_time as i64 + RIPPLE_EPOCH, 0)
        .single()
        .unwrap_or_default()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Upper-case hex of the UTF-8 bytes of `text`.
pub fn hex_encode(text: &str) -> String {
    hex::encode_upper(text.as_bytes())
}

pub fn hex_decode(encoded: &str) -> Result<String, LedgerError> {
    let bytes = hex::decode(encoded)
        .map_err(|e| LedgerError::MalformedResponse(format!("invalid hex: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|_| LedgerError::MalformedResponse("hex does not decode to UTF-8".into()))
}

fn amount_json(amount: &LedgerAmount) -> Result<Value, LedgerError> {
    match &amount.asset.issuer {
        None if amount.asset.code == LedgerKind::Xrpl.native_code() => {
            Ok(Value::String(xrp_to_drops(amount.value)))
        }
        None => Err(LedgerError::InvalidPayload(format!(
            "{} has no issuer and is not the XRPL native asset",
            amount.asset.code
        ))),
        Some(issuer) => Ok(json!({
            "currency": amount.asset.code,
            "issuer": issuer,
            "value": amount.value.to_string(),
        })),
    }
}

fn memos_json(memos: &[Memo]) -> Value {
    Value::Array(
        memos
            .iter()
            .map(|memo| {
                json!({
                    "Memo": {
                        "MemoType": hex_encode(&memo.memo_type),
                        "MemoData": hex_encode(&memo.memo_data),
                    }
                })
            })
            .collect(),
    )
}

/// Encode a payload as an unsigned XRPL transaction (no Sequence or Fee).
pub fn encode(payload: &TxPayload) -> Result<Value, LedgerError> {
    let mut tx = Map::new();
    tx.insert("TransactionType".into(), json!(payload.kind()));
    tx.insert("Account".into(), json!(payload.account()));

    let memos: &[Memo] = match payload {
        TxPayload::EscrowCreate(escrow) => {
            tx.insert("Destination".into(), json!(escrow.destination));
            tx.insert("Amount".into(), json!(xrp_to_drops(escrow.amount)));
            tx.insert("FinishAfter".into(), json!(to_ripple_time(escrow.finish_after)?));
            tx.insert("CancelAfter".into(), json!(to_ripple_time(escrow.cancel_after)?));
            if let Some(condition) = &escrow.condition {
                tx.insert("Condition".into(), json!(condition));
            }
            &escrow.memos[..]
        }
        TxPayload::EscrowFinish(finish) => {
            tx.insert("Owner".into(), json!(finish.owner));
            tx.insert("OfferSequence".into(), json!(finish.offer_sequence));
            if let (Some(condition), Some(fulfillment)) = (&finish.condition, &finish.fulfillment) {
                tx.insert("Condition".into(), json!(condition));
                tx.insert("Fulfillment".into(), json!(fulfillment.expose_hex()));
            }
            &[]
        }
        TxPayload::EscrowCancel(cancel) => {
            tx.insert("Owner".into(), json!(cancel.owner));
            tx.insert("OfferSequence".into(), json!(cancel.offer_sequence));
            &[]
        }
        TxPayload::Payment(payment) => {
            tx.insert("Destination".into(), json!(payment.destination));
            tx.insert("Amount".into(), amount_json(&payment.amount)?);
            &payment.memos[..]
        }
        TxPayload::OfferCreate(offer) => {
            tx.insert("TakerPays".into(), amount_json(&offer.taker_pays)?);
            tx.insert("TakerGets".into(), amount_json(&offer.taker_gets)?);
            if offer.flags != 0 {
                tx.insert("Flags".into(), json!(offer.flags));
            }
            &offer.memos[..]
        }
        TxPayload::OfferCancel(cancel) => {
            tx.insert("OfferSequence".into(), json!(cancel.offer_sequence));
            &[]
        }
        TxPayload::TrustSet(trust) => {
            tx.insert("LimitAmount".into(), amount_json(&trust.limit)?);
            &[]
        }
    };

    if !memos.is_empty() {
        tx.insert("Memos".into(), memos_json(memos));
    }
    Ok(Value::Object(tx))
}
