//! Per-agent extraction task: travel, strike, collect, reserve, deliver.
//!
//! One call to [`advance_task`] moves a task through at most one state.
//! Preconditions (node present, not exhausted, not forbidden) are checked on
//! every call, whatever the state.

use rand::Rng;
use tracing::debug;

use crate::destination::{cell_has_room, select_destination};
use crate::{
    AgentId, AgentState, Cell, Constants, EndReason, Event, EventEnvelope, EventLevel,
    ExtractionState, ExtractionTask, GameContent, GameState, Injury, ItemId, ItemState, NodeId,
    ResourceRequest, StoragePriority, TaskId,
};

/// Placeholder countdown that forces a re-seed on the first strike tick.
const UNSEEDED_STRIKE: i64 = -1000;
const MIN_MINING_SPEED: f32 = 0.01;

/// What a collection event decided for the rest of the task.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectOutcome {
    /// A sinkhole opened; the agent is hurt and the task ends.
    Hazard { item: ItemId },
    /// Only rubble came up; nothing worth hauling.
    Rubble { item: ItemId },
    /// Auto-haul is off; the item stays where it spawned.
    LeftInPlace { item: ItemId },
    /// Nothing can take the item; it stays where it spawned.
    NoDestination { item: ItemId },
    Haul { item: ItemId, destination: Cell },
}

/// Mining speed used for strike cadence. Non-player agents get a floor.
fn effective_mining_speed(agent: &AgentState, constants: &Constants) -> f32 {
    let speed = if agent.is_player_controlled {
        agent.mining_speed
    } else {
        agent.mining_speed.max(constants.non_player_min_mining_speed)
    };
    speed.max(MIN_MINING_SPEED)
}

/// Total ticks spent striking before collection.
pub fn strike_duration(mining_speed: f32, constants: &Constants) -> u64 {
    let average = constants.strike_ticks_average;
    let min = average
        .saturating_sub(constants.strike_ticks_variance)
        .max(constants.strike_ticks_floor);
    let max = (average + constants.strike_ticks_variance).max(min);
    let raw = average as f32 / mining_speed.max(MIN_MINING_SPEED);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let ticks = raw.clamp(min as f32, max as f32) as u64;
    ticks.max(1)
}

/// Ticks between cosmetic strikes at the given speed.
pub fn ticks_between_strikes(mining_speed: f32, constants: &Constants) -> i64 {
    #[allow(clippy::cast_possible_truncation)]
    let ticks = (constants.base_ticks_between_strikes / mining_speed.max(MIN_MINING_SPEED)).round()
        as i64;
    ticks.max(1)
}

/// Build a new task for `agent` at `node`. Travel is skipped when the agent
/// already stands on the node's work cell.
pub fn new_task(
    state: &mut GameState,
    agent: &AgentId,
    node: &NodeId,
    content: &GameContent,
) -> Option<ExtractionTask> {
    let agent_pos = state.agents.get(agent)?.position;
    let node_pos = state.nodes.get(node)?.position;
    let id = TaskId(format!("task_{:06}", state.counters.next_task_id));
    state.counters.next_task_id += 1;
    Some(ExtractionTask {
        id,
        agent: agent.clone(),
        node: node.clone(),
        state: ExtractionState::Traveling,
        started_tick: state.meta.tick,
        travel_ticks_remaining: if agent_pos == node_pos {
            0
        } else {
            content.constants.travel_ticks
        },
        strike_ticks_remaining: 0,
        ticks_until_next_strike: UNSEEDED_STRIKE,
        produced_item: None,
        destination: None,
        haul_ticks_remaining: 0,
    })
}

/// Why the task can no longer continue, checked before every step.
fn abort_reason(state: &GameState, task: &ExtractionTask) -> Option<EndReason> {
    let Some(agent) = state.agents.get(&task.agent) else {
        return Some(EndReason::AgentMissing);
    };
    let Some(node) = state.nodes.get(&task.node) else {
        return Some(EndReason::NodeMissing);
    };
    if node.is_exhausted() {
        return Some(EndReason::NodeExhausted);
    }
    if node.forbidden || node.faction != agent.faction {
        return Some(EndReason::NodeForbidden);
    }
    None
}

/// End a task: release its claims and announce the terminal state.
/// Already-spawned items and committed depletion stay as they are.
pub(crate) fn finish_task(
    state: &mut GameState,
    task: &mut ExtractionTask,
    reason: EndReason,
    events: &mut Vec<EventEnvelope>,
) {
    state.reservations.release_all(&task.agent);
    task.state = reason.terminal_state();
    events.push(crate::emit(
        &mut state.counters,
        state.meta.tick,
        Event::TaskEnded {
            agent: task.agent.clone(),
            node: task.node.clone(),
            state: task.state,
            reason,
        },
    ));
}

/// Advance the task held by `agent_id` by one tick. Terminal tasks are
/// removed from the state.
pub(crate) fn advance_task(
    state: &mut GameState,
    agent_id: &AgentId,
    content: &GameContent,
    rng: &mut impl Rng,
    event_level: EventLevel,
    events: &mut Vec<EventEnvelope>,
) {
    let Some(mut task) = state.tasks.remove(agent_id) else {
        return;
    };

    if let Some(reason) = abort_reason(state, &task) {
        finish_task(state, &mut task, reason, events);
        return;
    }

    match task.state {
        ExtractionState::Traveling => tick_travel(state, &mut task, content, events),
        ExtractionState::Striking => tick_strike(state, &mut task, content, event_level, events),
        ExtractionState::Collecting => collect(state, &mut task, content, rng, events),
        ExtractionState::ReservingItem => reserve_item(state, &mut task, event_level, events),
        ExtractionState::ReservingDestination => {
            reserve_destination(state, &mut task, content, event_level, events);
        }
        ExtractionState::Delivering => tick_delivery(state, &mut task, content, events),
        ExtractionState::Done | ExtractionState::Failed => {}
    }

    if !task.state.is_terminal() {
        state.tasks.insert(agent_id.clone(), task);
    }
}

fn tick_travel(
    state: &mut GameState,
    task: &mut ExtractionTask,
    content: &GameContent,
    events: &mut Vec<EventEnvelope>,
) {
    let Some(agent) = state.agents.get(&task.agent) else {
        return;
    };
    // A blocked agent simply never arrives; the host cancels the task.
    if agent.blocked {
        return;
    }
    if task.travel_ticks_remaining > 0 {
        task.travel_ticks_remaining -= 1;
        if task.travel_ticks_remaining > 0 {
            return;
        }
    }

    let Some(node_pos) = state.nodes.get(&task.node).map(|n| n.position) else {
        return;
    };
    let speed = match state.agents.get_mut(&task.agent) {
        Some(agent) => {
            agent.position = node_pos;
            effective_mining_speed(agent, &content.constants)
        }
        None => return,
    };

    task.state = ExtractionState::Striking;
    task.strike_ticks_remaining = strike_duration(speed, &content.constants);
    task.ticks_until_next_strike = UNSEEDED_STRIKE;

    events.push(crate::emit(
        &mut state.counters,
        state.meta.tick,
        Event::AgentArrived {
            agent: task.agent.clone(),
            node: task.node.clone(),
        },
    ));
}

fn tick_strike(
    state: &mut GameState,
    task: &mut ExtractionTask,
    content: &GameContent,
    event_level: EventLevel,
    events: &mut Vec<EventEnvelope>,
) {
    let constants = &content.constants;
    let Some(agent) = state.agents.get_mut(&task.agent) else {
        return;
    };
    agent.mining_xp += constants.mining_xp_per_tick;
    let speed = effective_mining_speed(agent, constants);

    if task.ticks_until_next_strike < -100 {
        task.ticks_until_next_strike = ticks_between_strikes(speed, constants);
    }
    task.ticks_until_next_strike -= 1;
    if task.ticks_until_next_strike <= 0 {
        task.ticks_until_next_strike = ticks_between_strikes(speed, constants);
        if event_level == EventLevel::Debug {
            events.push(crate::emit(
                &mut state.counters,
                state.meta.tick,
                Event::StrikeLanded {
                    agent: task.agent.clone(),
                    node: task.node.clone(),
                },
            ));
        }
    }

    task.strike_ticks_remaining = task.strike_ticks_remaining.saturating_sub(1);
    if task.strike_ticks_remaining == 0 {
        task.state = ExtractionState::Collecting;
    }
}

fn spawn_item(state: &mut GameState, reward: &crate::RewardDescriptor, at: Cell) -> ItemId {
    let id = ItemId(format!("item_{:06}", state.counters.next_item_id));
    state.counters.next_item_id += 1;
    state.items.insert(
        id.clone(),
        ItemState {
            id: id.clone(),
            material: reward.material.clone(),
            quantity: reward.quantity,
            condition: reward.condition,
            quality: reward.quality,
            position: at,
            haulable: false,
            storage: StoragePriority::Unstored,
        },
    );
    id
}

/// Resolve the single collection event and decide what happens next.
fn collect(
    state: &mut GameState,
    task: &mut ExtractionTask,
    content: &GameContent,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) {
    let current_tick = state.meta.tick;
    let Some((agent_pos, agent_name, mining_yield)) = state
        .agents
        .get(&task.agent)
        .map(|a| (a.position, a.name.clone(), a.mining_yield))
    else {
        return;
    };
    let difficulty = state.difficulty;

    let Some(node) = state.nodes.get_mut(&task.node) else {
        return;
    };
    // The mode is read here, so a change made mid-strike applies to this event.
    let request = ResourceRequest::from(node.mode());
    let extraction = node.extract(
        request,
        mining_yield,
        difficulty,
        &mut state.pool,
        content,
        rng,
    );
    let remaining_percent = node.remaining_percent();
    let auto_haul = node.auto_haul;

    if let Some(agent) = state.agents.get_mut(&task.agent) {
        agent.records.cells_mined += 1;
    }

    let reward = extraction.reward;
    let item_id = spawn_item(state, &reward, agent_pos);
    task.produced_item = Some(item_id.clone());

    events.push(crate::emit(
        &mut state.counters,
        current_tick,
        Event::ResourcesExtracted {
            agent: task.agent.clone(),
            node: task.node.clone(),
            item: item_id.clone(),
            reward: reward.clone(),
            remaining_percent,
        },
    ));
    if let Some(hint) = reward.hint() {
        events.push(crate::emit(
            &mut state.counters,
            current_tick,
            Event::PresentationHint {
                item: item_id.clone(),
                hint,
            },
        ));
    }
    if extraction.became_exhausted {
        events.push(crate::emit(
            &mut state.counters,
            current_tick,
            Event::NodeDepleted {
                node: task.node.clone(),
            },
        ));
    }

    let outcome = if let Some(damage) = extraction.hazard_damage {
        debug!(agent = %task.agent, node = %task.node, damage, "sinkhole opened under agent");
        events.push(crate::emit(
            &mut state.counters,
            current_tick,
            Event::HazardTriggered {
                node: task.node.clone(),
                agent: task.agent.clone(),
                agent_name,
                damage,
            },
        ));
        CollectOutcome::Hazard { item: item_id }
    } else if reward.material == content.constants.rubble_material {
        CollectOutcome::Rubble { item: item_id }
    } else if !auto_haul {
        CollectOutcome::LeftInPlace { item: item_id }
    } else {
        plan_haul(state, task, item_id, content)
    };

    apply_collect_outcome(state, task, outcome, content, events);
}

/// Mark the item haulable and look for somewhere to put it.
fn plan_haul(
    state: &mut GameState,
    task: &ExtractionTask,
    item_id: ItemId,
    content: &GameContent,
) -> CollectOutcome {
    let haulable = state
        .items
        .get(&item_id)
        .and_then(|item| content.material(&item.material))
        .is_some_and(crate::MaterialDef::haulable);
    if let Some(item) = state.items.get_mut(&item_id) {
        item.haulable = haulable;
    }

    let destination = match (
        state.nodes.get(&task.node),
        state.items.get(&item_id),
        state.agents.get(&task.agent),
    ) {
        (Some(node), Some(item), Some(agent)) => {
            select_destination(state, node, item, agent, content)
        }
        _ => None,
    };
    match destination {
        Some(destination) => CollectOutcome::Haul {
            item: item_id,
            destination,
        },
        None => CollectOutcome::NoDestination { item: item_id },
    }
}

fn apply_collect_outcome(
    state: &mut GameState,
    task: &mut ExtractionTask,
    outcome: CollectOutcome,
    content: &GameContent,
    events: &mut Vec<EventEnvelope>,
) {
    let current_tick = state.meta.tick;
    match outcome {
        CollectOutcome::Hazard { .. } => {
            let amount = content.constants.hazard_injury_amount;
            if let Some(agent) = state.agents.get_mut(&task.agent) {
                agent.injuries.push(Injury {
                    amount,
                    tick: current_tick,
                });
            }
            events.push(crate::emit(
                &mut state.counters,
                current_tick,
                Event::AgentInjured {
                    agent: task.agent.clone(),
                    amount,
                },
            ));
            finish_task(state, task, EndReason::Hazard, events);
        }
        CollectOutcome::Rubble { .. } => finish_task(state, task, EndReason::Rubble, events),
        CollectOutcome::LeftInPlace { .. } => {
            finish_task(state, task, EndReason::AutoHaulDisabled, events);
        }
        CollectOutcome::NoDestination { item } => {
            events.push(crate::emit(
                &mut state.counters,
                current_tick,
                Event::NoDestination {
                    agent: task.agent.clone(),
                    item,
                },
            ));
            finish_task(state, task, EndReason::NoDestination, events);
        }
        CollectOutcome::Haul { destination, .. } => {
            task.destination = Some(destination);
            task.state = ExtractionState::ReservingItem;
        }
    }
}

fn contended(
    state: &mut GameState,
    task: &ExtractionTask,
    err: &crate::ReservationError,
    event_level: EventLevel,
    events: &mut Vec<EventEnvelope>,
) {
    debug!(agent = %task.agent, %err, "reservation contended, retrying next tick");
    if event_level == EventLevel::Debug {
        events.push(crate::emit(
            &mut state.counters,
            state.meta.tick,
            Event::ReservationContended {
                agent: task.agent.clone(),
                reason: err.to_string(),
            },
        ));
    }
}

fn reserve_item(
    state: &mut GameState,
    task: &mut ExtractionTask,
    event_level: EventLevel,
    events: &mut Vec<EventEnvelope>,
) {
    let Some(item) = task.produced_item.clone() else {
        return;
    };
    match state.reservations.try_reserve_item(&item, &task.agent) {
        Ok(()) => task.state = ExtractionState::ReservingDestination,
        Err(err) => contended(state, task, &err, event_level, events),
    }
}

fn reserve_destination(
    state: &mut GameState,
    task: &mut ExtractionTask,
    content: &GameContent,
    event_level: EventLevel,
    events: &mut Vec<EventEnvelope>,
) {
    let (Some(item), Some(mut destination)) = (task.produced_item.clone(), task.destination)
    else {
        return;
    };

    // Another delivery may have filled the cell since it was chosen.
    let has_room = state
        .items
        .get(&item)
        .is_some_and(|i| cell_has_room(state, destination, i, content));
    if !has_room {
        let reselected = match (
            state.nodes.get(&task.node),
            state.items.get(&item),
            state.agents.get(&task.agent),
        ) {
            (Some(node), Some(i), Some(agent)) => select_destination(state, node, i, agent, content),
            _ => None,
        };
        let Some(cell) = reselected else {
            events.push(crate::emit(
                &mut state.counters,
                state.meta.tick,
                Event::NoDestination {
                    agent: task.agent.clone(),
                    item,
                },
            ));
            finish_task(state, task, EndReason::NoDestination, events);
            return;
        };
        destination = cell;
        task.destination = Some(cell);
    }

    match state.reservations.try_reserve_cell(destination, &task.agent) {
        Ok(()) => {
            task.state = ExtractionState::Delivering;
            task.haul_ticks_remaining = content.constants.haul_ticks;
            events.push(crate::emit(
                &mut state.counters,
                state.meta.tick,
                Event::HaulRequested {
                    agent: task.agent.clone(),
                    item,
                    destination,
                },
            ));
        }
        Err(err) => contended(state, task, &err, event_level, events),
    }
}

/// Storage priority of whatever owns `cell`, for the item placed there.
fn storage_priority_at(state: &GameState, cell: Cell) -> StoragePriority {
    state
        .zones
        .iter()
        .find(|zone| zone.cells.contains(&cell))
        .map(|zone| zone.priority)
        .or_else(|| {
            state
                .facilities
                .values()
                .any(|f| f.cells.contains(&cell))
                .then_some(StoragePriority::Normal)
        })
        .unwrap_or(StoragePriority::Unstored)
}

/// Move as much of `item_id` onto `stack_id` as the stack limit allows.
/// Returns true when some of the carried item is left over.
fn merge_into_stack(
    state: &mut GameState,
    item_id: &ItemId,
    stack_id: &ItemId,
    content: &GameContent,
) -> bool {
    let Some((material, quantity)) = state.items.get(item_id).map(|i| (i.material.clone(), i.quantity))
    else {
        return false;
    };
    let stack_limit = content
        .material(&material)
        .map_or(u32::MAX, |def| def.stack_limit);
    let moved = state.items.get_mut(stack_id).map_or(0, |stack| {
        let moved = stack_limit.saturating_sub(stack.quantity).min(quantity);
        stack.quantity += moved;
        moved
    });
    if moved == quantity {
        state.items.remove(item_id);
        return false;
    }
    if let Some(item) = state.items.get_mut(item_id) {
        item.quantity -= moved;
    }
    true
}

/// Carry the item; on arrival place it, merging into an existing stack.
/// Whatever the stack cannot hold stays on the cell as its own item.
fn tick_delivery(
    state: &mut GameState,
    task: &mut ExtractionTask,
    content: &GameContent,
    events: &mut Vec<EventEnvelope>,
) {
    task.haul_ticks_remaining = task.haul_ticks_remaining.saturating_sub(1);
    if task.haul_ticks_remaining > 0 {
        return;
    }
    let (Some(item_id), Some(destination)) = (task.produced_item.clone(), task.destination) else {
        finish_task(state, task, EndReason::Delivered, events);
        return;
    };

    let priority = storage_priority_at(state, destination);
    let material = state.items.get(&item_id).map(|i| i.material.clone());
    let existing = state
        .items
        .values()
        .find(|other| {
            other.id != item_id
                && other.position == destination
                && Some(&other.material) == material.as_ref()
        })
        .map(|other| other.id.clone());
    let leftover = match existing {
        Some(stack_id) => merge_into_stack(state, &item_id, &stack_id, content),
        None => state.items.contains_key(&item_id),
    };
    if leftover {
        if let Some(item) = state.items.get_mut(&item_id) {
            item.position = destination;
            item.storage = priority;
        }
    }
    if let Some(agent) = state.agents.get_mut(&task.agent) {
        agent.position = destination;
    }

    events.push(crate::emit(
        &mut state.counters,
        state.meta.tick,
        Event::ItemDelivered {
            agent: task.agent.clone(),
            item: item_id,
            destination,
        },
    ));
    finish_task(state, task, EndReason::Delivered, events);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::base_content;

    #[test]
    fn strike_duration_is_clamped() {
        let constants = &base_content().constants;
        // average 40, variance 10, floor 30
        assert_eq!(strike_duration(1.0, constants), 40);
        assert_eq!(strike_duration(4.0, constants), 30);
        assert_eq!(strike_duration(0.1, constants), 50);
    }

    #[test]
    fn strike_floor_wins_over_wide_variance() {
        let mut constants = base_content().constants;
        constants.strike_ticks_average = 20;
        constants.strike_ticks_variance = 15;
        assert_eq!(strike_duration(10.0, &constants), 30);
    }

    #[test]
    fn strike_cadence_scales_with_speed() {
        let constants = &base_content().constants;
        assert_eq!(ticks_between_strikes(1.0, constants), 12);
        assert_eq!(ticks_between_strikes(2.0, constants), 6);
        assert_eq!(ticks_between_strikes(0.0, constants), 1200);
    }
}
