//! Pre-trade risk gate.
//!
//! All mutable state sits behind one mutex per controller. Events are
//! emitted after the lock is released.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tessera_core::{Amount, EventBus, Subscription};

use crate::events::TradingEvent;
use crate::types::{Order, Pair, Side};

fn default_max_position_pct() -> f64 {
    0.10
}

fn default_max_daily_volume() -> Amount {
    Amount::from_whole(5_000_000)
}

fn default_stop_loss_pct() -> f64 {
    0.05
}

fn default_circuit_breaker_pct() -> f64 {
    0.10
}

/// Fixed risk limits. Percentages are fractions (0.10 = 10%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_max_position_pct")]
    pub max_position_pct: f64,
    #[serde(default = "default_max_daily_volume")]
    pub max_daily_volume: Amount,
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,
    #[serde(default = "default_circuit_breaker_pct")]
    pub circuit_breaker_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_pct: default_max_position_pct(),
            max_daily_volume: default_max_daily_volume(),
            stop_loss_pct: default_stop_loss_pct(),
            circuit_breaker_pct: default_circuit_breaker_pct(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RiskRejection {
    #[error("trading halted — circuit breaker triggered")]
    Halted,

    #[error("daily volume limit exceeded: {projected} > {limit}")]
    DailyVolumeExceeded { projected: Amount, limit: Amount },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskDecision {
    Allowed,
    Rejected(RiskRejection),
}

impl RiskDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn into_result(self) -> Result<(), RiskRejection> {
        match self {
            Self::Allowed => Ok(()),
            Self::Rejected(rejection) => Err(rejection),
        }
    }
}

/// Point-in-time copy of the controller state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskSnapshot {
    pub daily_volume: Amount,
    pub halted: bool,
    pub halt_reason: Option<String>,
    /// Net position per pair in micro-units; negative is short.
    pub positions: Vec<(Pair, i128)>,
}

#[derive(Default)]
struct RiskState {
    daily_volume: Amount,
    positions: HashMap<Pair, i128>,
    halted: Option<String>,
}

impl RiskState {
    fn evaluate(&self, amount: Amount, limit: Amount) -> RiskDecision {
        if self.halted.is_some() {
            return RiskDecision::Rejected(RiskRejection::Halted);
        }
        let projected = self
            .daily_volume
            .checked_add(amount)
            .unwrap_or(Amount::from_units(u128::MAX));
        if projected > limit {
            return RiskDecision::Rejected(RiskRejection::DailyVolumeExceeded { projected, limit });
        }
        RiskDecision::Allowed
    }
}

fn signed_units(amount: Amount) -> i128 {
    i128::try_from(amount.units()).unwrap_or(i128::MAX)
}

pub struct RiskController {
    config: RiskConfig,
    state: Mutex<RiskState>,
    events: EventBus<TradingEvent>,
}

impl RiskController {
    pub fn new(config: RiskConfig) -> Self {
        Self::with_events(config, EventBus::new())
    }

    /// Publish on an existing bus, e.g. the one owned by the trading engine.
    pub fn with_events(config: RiskConfig, events: EventBus<TradingEvent>) -> Self {
        Self {
            config,
            state: Mutex::new(RiskState::default()),
            events,
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus<TradingEvent> {
        &self.events
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&TradingEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(observer)
    }

    fn state(&self) -> MutexGuard<'_, RiskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gate an order on its total amount. Halting is checked first, then
    /// the daily volume limit.
    pub fn check_order(&self, order: &Order) -> RiskDecision {
        let decision = self.state().evaluate(order.amount, self.config.max_daily_volume);
        self.report(order, &decision);
        decision
    }

    /// Check and, if allowed, book the order's volume without releasing
    /// the lock in between.
    pub fn check_and_record(&self, order: &Order) -> RiskDecision {
        let (decision, daily_volume) = {
            let mut state = self.state();
            let decision = state.evaluate(order.amount, self.config.max_daily_volume);
            if decision.is_allowed() {
                state.daily_volume = state.daily_volume.saturating_add(order.amount);
            }
            (decision, state.daily_volume)
        };
        self.report(order, &decision);
        if decision.is_allowed() {
            self.events.emit(&TradingEvent::VolumeRecorded {
                amount: order.amount,
                daily_volume,
            });
        }
        decision
    }

    fn report(&self, order: &Order, decision: &RiskDecision) {
        if let RiskDecision::Rejected(rejection) = decision {
            tracing::warn!(order_id = %order.id, amount = %order.amount, "Order rejected: {}", rejection);
            self.events.emit(&TradingEvent::OrderRejected {
                order_id: order.id,
                reason: rejection.to_string(),
            });
        }
    }

    /// Book executed volume against today's limit.
    pub fn record_execution(&self, amount: Amount) {
        let daily_volume = {
            let mut state = self.state();
            state.daily_volume = state.daily_volume.saturating_add(amount);
            state.daily_volume
        };
        tracing::debug!(amount = %amount, daily_volume = %daily_volume, "Execution recorded");
        self.events.emit(&TradingEvent::VolumeRecorded { amount, daily_volume });
    }

    /// Book a fill: adds to daily volume and moves the pair's net position.
    pub fn record_fill(&self, pair: &Pair, side: Side, amount: Amount) {
        let (daily_volume, position) = {
            let mut guard = self.state();
            let state = &mut *guard;
            state.daily_volume = state.daily_volume.saturating_add(amount);
            let delta = signed_units(amount);
            let position = state.positions.entry(pair.clone()).or_insert(0);
            *position = match side {
                Side::Buy => position.saturating_add(delta),
                Side::Sell => position.saturating_sub(delta),
            };
            (state.daily_volume, *position)
        };
        tracing::debug!(pair = %pair, side = %side, amount = %amount, position, "Fill recorded");
        self.events.emit(&TradingEvent::VolumeRecorded { amount, daily_volume });
        self.events.emit(&TradingEvent::FillRecorded {
            pair: pair.clone(),
            side,
            amount,
            position,
        });
    }

    /// Halt all trading until [`clear_circuit_breaker`](Self::clear_circuit_breaker).
    pub fn trigger_circuit_breaker(&self, reason: &str) {
        self.state().halted = Some(reason.to_string());
        tracing::error!(reason = %reason, "Circuit breaker triggered, trading halted");
        self.events.emit(&TradingEvent::CircuitBreakerTriggered {
            reason: reason.to_string(),
        });
    }

    pub fn clear_circuit_breaker(&self) {
        let was_halted = self.state().halted.take().is_some();
        if was_halted {
            tracing::info!("Circuit breaker cleared");
            self.events.emit(&TradingEvent::CircuitBreakerCleared);
        }
    }

    pub fn reset_daily(&self) {
        let previous_volume = std::mem::take(&mut self.state().daily_volume);
        tracing::info!(previous_volume = %previous_volume, "Daily volume reset");
        self.events.emit(&TradingEvent::DailyReset { previous_volume });
    }

    pub fn is_halted(&self) -> bool {
        self.state().halted.is_some()
    }

    pub fn halt_reason(&self) -> Option<String> {
        self.state().halted.clone()
    }

    pub fn daily_volume(&self) -> Amount {
        self.state().daily_volume
    }

    /// Net position in micro-units; negative is short.
    pub fn position(&self, pair: &Pair) -> i128 {
        self.state().positions.get(pair).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> RiskSnapshot {
        let state = self.state();
        let mut positions: Vec<(Pair, i128)> =
            state.positions.iter().map(|(p, n)| (p.clone(), *n)).collect();
        positions.sort_by_key(|(p, _)| p.to_string());
        RiskSnapshot {
            daily_volume: state.daily_volume,
            halted: state.halted.is_some(),
            halt_reason: state.halted.clone(),
            positions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Strategy;
    use std::sync::Arc;
    use tessera_core::{Asset, LedgerKind};

    fn pair() -> Pair {
        Pair::new(Asset::native(LedgerKind::Xrpl), Asset::issued("USD", "rIssuer"))
    }

    fn order(amount: u64) -> Order {
        Order::new(Strategy::Twap, Side::Buy, pair(), "rTrader", Amount::from_whole(amount))
    }

    fn controller() -> RiskController {
        RiskController::new(RiskConfig::default())
    }

    #[test]
    fn test_daily_volume_example() {
        let risk = controller();
        risk.record_execution(Amount::from_whole(4_800_000));

        let decision = risk.check_order(&order(300_000));
        assert!(matches!(
            &decision,
            RiskDecision::Rejected(RiskRejection::DailyVolumeExceeded { projected, limit })
                if *projected == Amount::from_whole(5_100_000) && *limit == Amount::from_whole(5_000_000)
        ));
        assert_eq!(
            decision.into_result().unwrap_err().to_string(),
            "daily volume limit exceeded: 5100000 > 5000000"
        );

        assert!(risk.check_order(&order(100_000)).is_allowed());
        assert_eq!(risk.daily_volume(), Amount::from_whole(4_800_000));
    }

    #[test]
    fn test_limit_is_inclusive() {
        let risk = controller();
        assert!(risk.check_order(&order(5_000_000)).is_allowed());
        assert!(!risk.check_order(&order(5_000_001)).is_allowed());
    }

    #[test]
    fn test_halt_rejects_everything() {
        let risk = controller();
        risk.trigger_circuit_breaker("oracle divergence");
        assert!(risk.is_halted());
        assert_eq!(risk.halt_reason().as_deref(), Some("oracle divergence"));

        let decision = risk.check_order(&order(0));
        assert_eq!(decision, RiskDecision::Rejected(RiskRejection::Halted));
        assert_eq!(
            RiskRejection::Halted.to_string(),
            "trading halted — circuit breaker triggered"
        );

        // Daily reset does not lift a halt.
        risk.reset_daily();
        assert!(risk.is_halted());

        risk.clear_circuit_breaker();
        assert!(risk.check_order(&order(0)).is_allowed());
    }

    #[test]
    fn test_halt_checked_before_volume() {
        let risk = controller();
        risk.record_execution(Amount::from_whole(5_000_000));
        risk.trigger_circuit_breaker("manual");
        assert_eq!(
            risk.check_order(&order(1)),
            RiskDecision::Rejected(RiskRejection::Halted)
        );
    }

    #[test]
    fn test_check_and_record_books_only_when_allowed() {
        let risk = controller();
        assert!(risk.check_and_record(&order(3_000_000)).is_allowed());
        assert!(!risk.check_and_record(&order(3_000_000)).is_allowed());
        assert_eq!(risk.daily_volume(), Amount::from_whole(3_000_000));

        risk.reset_daily();
        assert_eq!(risk.daily_volume(), Amount::ZERO);
    }

    #[test]
    fn test_record_fill_tracks_signed_position() {
        let risk = controller();
        risk.record_fill(&pair(), Side::Buy, Amount::from_whole(100));
        risk.record_fill(&pair(), Side::Sell, Amount::from_whole(250));
        assert_eq!(risk.position(&pair()), -(Amount::from_whole(150).units() as i128));
        assert_eq!(risk.daily_volume(), Amount::from_whole(350));

        let snapshot = risk.snapshot();
        assert_eq!(snapshot.positions.len(), 1);
        assert!(!snapshot.halted);
    }

    #[test]
    fn test_state_changes_emit_events() {
        let risk = controller();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let seen = Arc::clone(&seen);
            risk.subscribe(move |e: &TradingEvent| seen.lock().unwrap().push(e.clone()))
        };

        risk.record_execution(Amount::from_whole(10));
        risk.trigger_circuit_breaker("drawdown");
        let _ = risk.check_order(&order(1));
        risk.clear_circuit_breaker();
        risk.clear_circuit_breaker();
        risk.reset_daily();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert!(matches!(seen[0], TradingEvent::VolumeRecorded { .. }));
        assert!(matches!(&seen[1], TradingEvent::CircuitBreakerTriggered { reason } if reason == "drawdown"));
        assert!(matches!(seen[2], TradingEvent::OrderRejected { .. }));
        assert!(matches!(seen[3], TradingEvent::CircuitBreakerCleared));
        assert!(matches!(seen[4], TradingEvent::DailyReset { previous_volume } if previous_volume == Amount::from_whole(10)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_check_and_record_is_atomic() {
        let risk = Arc::new(controller());
        let mut handles = Vec::new();
        for _ in 0..20 {
            let risk = Arc::clone(&risk);
            handles.push(tokio::spawn(async move { risk.check_and_record(&order(1_000_000)).is_allowed() }));
        }
        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 5);
        assert_eq!(risk.daily_volume(), Amount::from_whole(5_000_000));
    }
}
