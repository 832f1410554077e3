use super::*;
use crate::test_fixtures::{base_content, base_state, colony, make_rng};
use rand_chacha::ChaCha8Rng;


// --- Shared test helpers ------------------------------------------------

/// Content with junk disabled so every extraction draws from the pool.
fn clean_content() -> GameContent {
    let mut content = base_content();
    content.constants.junk_chance_pct = 0.0;
    content
}

fn node_id() -> NodeId {
    NodeId("node_test".to_string())
}

fn ada() -> AgentId {
    AgentId("agent_0001".to_string())
}

fn bram() -> AgentId {
    AgentId("agent_0002".to_string())
}

fn envelope(state: &GameState, command: Command) -> CommandEnvelope {
    CommandEnvelope {
        id: CommandId(format!("cmd_{:06}", state.counters.next_command_id)),
        issued_by: colony(),
        issued_tick: state.meta.tick,
        execute_at_tick: state.meta.tick,
        command,
    }
}

fn start_command(state: &GameState, agent: &AgentId) -> CommandEnvelope {
    envelope(
        state,
        Command::StartExtraction {
            agent: agent.clone(),
            node: node_id(),
        },
    )
}

/// Tick until no tasks remain (or `max_ticks` pass), collecting every event.
fn run_until_idle(
    state: &mut GameState,
    content: &GameContent,
    rng: &mut ChaCha8Rng,
    max_ticks: u64,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    for _ in 0..max_ticks {
        if state.tasks.is_empty() {
            break;
        }
        events.extend(tick(state, &[], content, rng, EventLevel::Normal));
    }
    events
}

/// Start a task for `agent` and run it to completion.
fn run_cycle(
    state: &mut GameState,
    content: &GameContent,
    rng: &mut ChaCha8Rng,
    agent: &AgentId,
) -> Vec<EventEnvelope> {
    let cmd = start_command(state, agent);
    let mut events = tick(state, &[cmd], content, rng, EventLevel::Normal);
    events.extend(run_until_idle(state, content, rng, 500));
    events
}

fn ended_with(events: &[EventEnvelope], agent: &AgentId) -> Option<(ExtractionState, EndReason)> {
    events.iter().rev().find_map(|e| match &e.event {
        Event::TaskEnded {
            agent: a,
            state,
            reason,
            ..
        } if a == agent => Some((*state, *reason)),
        _ => None,
    })
}

fn extracted_item(events: &[EventEnvelope]) -> Option<ItemId> {
    events.iter().find_map(|e| match &e.event {
        Event::ResourcesExtracted { item, .. } => Some(item.clone()),
        _ => None,
    })
}
