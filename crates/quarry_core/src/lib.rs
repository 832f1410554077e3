//! `quarry_core`: deterministic quarry extraction simulation.
//!
//! No IO, no network. All randomness via the passed-in Rng.

pub mod catalog;
mod commands;
pub mod destination;
mod engine;
pub mod hazard;
mod id;
pub mod ledger;
mod node;
pub mod pool;
pub mod reservation;
pub mod resolver;
pub(crate) mod task;
mod types;
pub mod yields;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use destination::select_destination;
pub use engine::tick;
pub use id::generate_world_id;
pub use ledger::DepletionLedger;
pub use node::NodeExtraction;
pub use pool::{PoolEntry, RefinedPool};
pub use reservation::{ReservationError, ReservationTable};
pub use resolver::{resolve_reward, CollectionRolls};
pub use task::{strike_duration, ticks_between_strikes, CollectOutcome};
pub use types::*;

pub(crate) fn emit(counters: &mut Counters, tick: u64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope { id, tick, event }
}

#[cfg(test)]
mod tests;
