use rand::Rng;

use crate::commands::apply_commands;
use crate::task::advance_task;
use crate::{AgentId, CommandEnvelope, EventEnvelope, EventLevel, GameContent, GameState};

/// Advance the simulation by one tick.
///
/// Order of operations:
/// 1. Apply commands scheduled for this tick.
/// 2. Advance every active extraction task by one step, in agent-id order.
/// 3. Increment tick counter.
///
/// Returns all events produced this tick.
pub fn tick(
    state: &mut GameState,
    commands: &[CommandEnvelope],
    content: &GameContent,
    rng: &mut impl Rng,
    event_level: EventLevel,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();

    apply_commands(state, commands, content, &mut events);
    advance_tasks(state, content, rng, event_level, &mut events);

    state.meta.tick += 1;
    events
}

fn advance_tasks(
    state: &mut GameState,
    content: &GameContent,
    rng: &mut impl Rng,
    event_level: EventLevel,
    events: &mut Vec<EventEnvelope>,
) {
    // Sorted so reservation races resolve the same way on every run.
    let mut agent_ids: Vec<AgentId> = state.tasks.keys().cloned().collect();
    agent_ids.sort();

    for agent_id in agent_ids {
        advance_task(state, &agent_id, content, rng, event_level, events);
    }
}
