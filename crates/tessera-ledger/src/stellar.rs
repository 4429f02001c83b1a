//! Stellar codec. Payments, offers and trust lines; Stellar has no native escrow
//! primitive matching XRPL's, so the escrow payloads are rejected, as are
//! sequence-addressed offer cancels.

use serde_json::{json, Value};
use tessera_core::{Amount, LedgerKind};
use tessera_crypto::sha256;

use crate::error::LedgerError;
use crate::types::{LedgerAmount, Memo, OfferCreate, TxPayload};

/// Stroops per lumen.
pub const STROOPS_PER_UNIT: i64 = 10_000_000;

/// Amount precision on Stellar.
pub const STELLAR_DECIMALS: u32 = 7;

/// Default base fee in stroops.
pub const DEFAULT_BASE_FEE: &str = "100";

pub fn to_stroops(amount: Amount) -> Result<i64, LedgerError> {
    amount
        .units()
        .checked_mul(10)
        .and_then(|s| i64::try_from(s).ok())
        .ok_or_else(|| LedgerError::InvalidPayload(format!("{} exceeds the Stellar amount range", amount)))
}

/// Convert stroops to an [`Amount`], truncating the seventh decimal.
pub fn from_stroops(stroops: i64) -> Result<Amount, LedgerError> {
    u128::try_from(stroops)
        .map(|s| Amount::from_units(s / 10))
        .map_err(|_| LedgerError::MalformedResponse(format!("negative stroop amount: {}", stroops)))
}

fn asset_json(amount: &LedgerAmount) -> Result<Value, LedgerError> {
    match &amount.asset.issuer {
        None if amount.asset.code == LedgerKind::Stellar.native_code() => Ok(json!("native")),
        None => Err(LedgerError::InvalidPayload(format!(
            "{} has no issuer and is not the Stellar native asset",
            amount.asset.code
        ))),
        Some(issuer) => Ok(json!({ "code": amount.asset.code, "issuer": issuer })),
    }
}

fn amount_string(amount: &LedgerAmount) -> Result<String, LedgerError> {
    to_stroops(amount.value)?;
    Ok(amount.value.to_fixed(STELLAR_DECIMALS))
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Price of `selling` in units of `buying`, as a reduced n/d pair.
fn price_ratio(buying: Amount, selling: Amount) -> Result<Value, LedgerError> {
    let divisor = gcd(buying.units(), selling.units()).max(1);
    let n = buying.units() / divisor;
    let d = selling.units() / divisor;
    match (i32::try_from(n), i32::try_from(d)) {
        (Ok(n), Ok(d)) => Ok(json!({ "n": n, "d": d })),
        _ => Err(LedgerError::InvalidPayload(format!(
            "price {}/{} cannot be expressed as a 32-bit ratio",
            buying, selling
        ))),
    }
}

fn offer_operation(offer: &OfferCreate) -> Result<Value, LedgerError> {
    let passive = offer.flags & OfferCreate::FLAG_PASSIVE != 0;
    let mut op = json!({
        "type": if passive { "create_passive_sell_offer" } else { "manage_sell_offer" },
        "selling": asset_json(&offer.taker_gets)?,
        "buying": asset_json(&offer.taker_pays)?,
        "amount": amount_string(&offer.taker_gets)?,
        "price": price_ratio(offer.taker_pays.value, offer.taker_gets.value)?,
    });
    if !passive {
        op["offer_id"] = json!("0");
    }
    Ok(op)
}

// Stellar carries a single memo; its data is committed as a hash.
fn memo_json(memos: &[Memo]) -> Value {
    match memos.first() {
        Some(memo) => json!({
            "type": "hash",
            "value": hex::encode(sha256(memo.memo_data.as_bytes())),
        }),
        None => json!({ "type": "none" }),
    }
}

/// Encode a payload as an unsigned Stellar transaction (no sequence or fee).
pub fn encode(payload: &TxPayload) -> Result<Value, LedgerError> {
    let (operation, memos) = match payload {
        TxPayload::Payment(payment) => (
            json!({
                "type": "payment",
                "destination": payment.destination,
                "asset": asset_json(&payment.amount)?,
                "amount": amount_string(&payment.amount)?,
            }),
            &payment.memos[..],
        ),
        TxPayload::OfferCreate(offer) => (offer_operation(offer)?, &offer.memos[..]),
        TxPayload::TrustSet(trust) => (
            json!({
                "type": "change_trust",
                "line": asset_json(&trust.limit)?,
                "limit": amount_string(&trust.limit)?,
            }),
            &[][..],
        ),
        // Stellar offers are cancelled by id and asset pair, not by sequence.
        TxPayload::EscrowCreate(_)
        | TxPayload::EscrowFinish(_)
        | TxPayload::EscrowCancel(_)
        | TxPayload::OfferCancel(_) => {
            return Err(LedgerError::Unsupported {
                network: LedgerKind::Stellar,
                kind: payload.kind(),
            });
        }
    };

    Ok(json!({
        "source_account": payload.account(),
        "operations": [operation],
        "memo": memo_json(memos),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EscrowCancel, OfferCancel, Payment, TrustSet};
    use tessera_core::Asset;

    fn xlm(value: &str) -> LedgerAmount {
        LedgerAmount::new(Amount::parse(value).unwrap(), Asset::native(LedgerKind::Stellar))
    }

    fn usd(value: &str) -> LedgerAmount {
        LedgerAmount::new(Amount::parse(value).unwrap(), Asset::issued("USD", "GISSUER"))
    }

    #[test]
    fn test_stroop_conversion() {
        assert_eq!(to_stroops(Amount::from_whole(1)).unwrap(), STROOPS_PER_UNIT);
        assert_eq!(to_stroops(Amount::parse("0.000001").unwrap()).unwrap(), 10);
        assert_eq!(from_stroops(25_000_000).unwrap(), Amount::parse("2.5").unwrap());
        assert_eq!(from_stroops(15).unwrap(), Amount::from_units(1));
        assert!(from_stroops(-1).is_err());
        assert!(to_stroops(Amount::from_units(u128::MAX / 10)).is_err());
    }

    #[test]
    fn test_encode_payment() {
        let payload: TxPayload = Payment::new("GSOURCE", "GDEST", xlm("12.5"), vec![Memo::new("t", "d")])
            .unwrap()
            .into();
        let tx = encode(&payload).unwrap();
        assert_eq!(tx["source_account"], "GSOURCE");
        assert_eq!(tx["operations"][0]["type"], "payment");
        assert_eq!(tx["operations"][0]["asset"], "native");
        assert_eq!(tx["operations"][0]["amount"], "12.5000000");
        assert_eq!(tx["memo"]["type"], "hash");
        assert_eq!(tx["memo"]["value"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn test_encode_offer_as_sell_offer() {
        // Taker pays 50 USD and gets 100 XLM: the account sells 100 XLM at 0.5.
        let payload: TxPayload = OfferCreate::new("GTRADER", usd("50"), xlm("100"), 0, vec![])
            .unwrap()
            .into();
        let tx = encode(&payload).unwrap();
        let op = &tx["operations"][0];
        assert_eq!(op["type"], "manage_sell_offer");
        assert_eq!(op["selling"], "native");
        assert_eq!(op["buying"]["code"], "USD");
        assert_eq!(op["amount"], "100.0000000");
        assert_eq!(op["price"]["n"], 1);
        assert_eq!(op["price"]["d"], 2);
        assert_eq!(tx["memo"]["type"], "none");
    }

    #[test]
    fn test_passive_flag_maps_to_passive_offer() {
        let payload: TxPayload =
            OfferCreate::new("GTRADER", usd("1"), xlm("3"), OfferCreate::FLAG_PASSIVE, vec![])
                .unwrap()
                .into();
        let tx = encode(&payload).unwrap();
        assert_eq!(tx["operations"][0]["type"], "create_passive_sell_offer");
        assert!(tx["operations"][0].get("offer_id").is_none());
    }

    #[test]
    fn test_encode_trust_set_as_change_trust() {
        let payload: TxPayload = TrustSet::new("GHOLDER", usd("1000")).unwrap().into();
        let tx = encode(&payload).unwrap();
        let op = &tx["operations"][0];
        assert_eq!(op["type"], "change_trust");
        assert_eq!(op["line"]["code"], "USD");
        assert_eq!(op["limit"], "1000.0000000");
    }

    #[test]
    fn test_escrow_unsupported() {
        let payload: TxPayload = EscrowCancel::new("GA", "GB", 1).unwrap().into();
        match encode(&payload) {
            Err(LedgerError::Unsupported { network, kind }) => {
                assert_eq!(network, LedgerKind::Stellar);
                assert_eq!(kind, "EscrowCancel");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_offer_cancel_unsupported() {
        let payload: TxPayload = OfferCancel::new("GTRADER", 7).unwrap().into();
        assert!(matches!(
            encode(&payload),
            Err(LedgerError::Unsupported { kind: "OfferCancel", .. })
        ));
    }

    #[test]
    fn test_unrepresentable_price_rejected() {
        let payload: TxPayload = OfferCreate::new(
            "GTRADER",
            usd("4000"),
            xlm("0.000001"),
            0,
            vec![],
        )
        .unwrap()
        .into();
        assert!(matches!(encode(&payload), Err(LedgerError::InvalidPayload(_))));
    }
}
