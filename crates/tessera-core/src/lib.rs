pub mod error;
pub mod types;
pub mod state_machine;
pub mod events;
pub mod audit;

pub use audit::{AuditEvent, AuditTrail, Auditable};
pub use error::{CoreError, ErrorClass};
pub use events::{EventBus, Subscription};
pub use state_machine::{BondStateMachine, BondStatus};
pub use types::{
    Amount, Asset, BondId, BreachId, CovenantId, LedgerKind, LedgerNetwork, NetworkEnvironment,
    ParticipantId,
};
