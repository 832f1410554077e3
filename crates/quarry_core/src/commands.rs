use crate::task::{finish_task, new_task};
use crate::{
    AgentId, Command, CommandEnvelope, CommandId, EndReason, Event, EventEnvelope, GameContent,
    GameState, NodeId, RejectReason,
};

pub(crate) fn apply_commands(
    state: &mut GameState,
    commands: &[CommandEnvelope],
    content: &GameContent,
    events: &mut Vec<EventEnvelope>,
) {
    let current_tick = state.meta.tick;

    for envelope in commands {
        if envelope.execute_at_tick != current_tick {
            continue;
        }
        let outcome = match &envelope.command {
            Command::StartExtraction { agent, node } => {
                handle_start(state, envelope, agent, node, content, events)
            }
            Command::CancelExtraction { agent } => handle_cancel(state, agent, events),
            Command::SetMiningMode { node, mode } => {
                with_own_node(state, envelope, node, |state| {
                    let Some(n) = state.nodes.get_mut(node) else {
                        return;
                    };
                    if n.set_mode(*mode) {
                        events.push(crate::emit(
                            &mut state.counters,
                            current_tick,
                            Event::MiningModeChanged {
                                node: node.clone(),
                                mode: *mode,
                            },
                        ));
                    }
                })
            }
            Command::SetAutoHaul { node, enabled } => with_own_node(state, envelope, node, |state| {
                if let Some(n) = state.nodes.get_mut(node) {
                    n.auto_haul = *enabled;
                }
            }),
            Command::SetForbidden { node, forbidden } => {
                with_own_node(state, envelope, node, |state| {
                    if let Some(n) = state.nodes.get_mut(node) {
                        n.forbidden = *forbidden;
                    }
                })
            }
            Command::AssignOwner { node, agent } => handle_assign(state, envelope, node, agent),
            Command::UnassignOwner { node, agent } => {
                handle_unassign(state, envelope, node, agent, events)
            }
            Command::RemoveNode { node } => handle_remove(state, envelope, node, events),
        };

        if let Err(reason) = outcome {
            reject(state, &envelope.id, reason, events);
        }
    }
}

fn reject(
    state: &mut GameState,
    command: &CommandId,
    reason: RejectReason,
    events: &mut Vec<EventEnvelope>,
) {
    events.push(crate::emit(
        &mut state.counters,
        state.meta.tick,
        Event::CommandRejected {
            command: command.clone(),
            reason,
        },
    ));
}

/// Run `apply` if the node exists and belongs to the issuing faction.
fn with_own_node(
    state: &mut GameState,
    envelope: &CommandEnvelope,
    node: &NodeId,
    apply: impl FnOnce(&mut GameState),
) -> Result<(), RejectReason> {
    let Some(n) = state.nodes.get(node) else {
        return Err(RejectReason::UnknownNode);
    };
    if n.faction != envelope.issued_by {
        return Err(RejectReason::WrongFaction);
    }
    apply(state);
    Ok(())
}

fn handle_start(
    state: &mut GameState,
    envelope: &CommandEnvelope,
    agent_id: &AgentId,
    node_id: &NodeId,
    content: &GameContent,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), RejectReason> {
    let Some(agent) = state.agents.get(agent_id) else {
        return Err(RejectReason::UnknownAgent);
    };
    let Some(node) = state.nodes.get(node_id) else {
        return Err(RejectReason::UnknownNode);
    };
    if node.faction != envelope.issued_by || agent.faction != node.faction {
        return Err(RejectReason::WrongFaction);
    }
    if node.is_exhausted() {
        return Err(RejectReason::NodeExhausted);
    }
    if node.forbidden {
        return Err(RejectReason::NodeForbidden);
    }
    if !node.is_owner(agent_id) {
        return Err(RejectReason::NotOwner);
    }
    if state.tasks.contains_key(agent_id) {
        return Err(RejectReason::AgentBusy);
    }

    let Some(task) = new_task(state, agent_id, node_id, content) else {
        return Err(RejectReason::UnknownAgent);
    };
    let task_id = task.id.clone();
    state.tasks.insert(agent_id.clone(), task);
    events.push(crate::emit(
        &mut state.counters,
        state.meta.tick,
        Event::TaskStarted {
            agent: agent_id.clone(),
            node: node_id.clone(),
            task: task_id,
        },
    ));
    Ok(())
}

fn handle_cancel(
    state: &mut GameState,
    agent_id: &AgentId,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), RejectReason> {
    let Some(mut task) = state.tasks.remove(agent_id) else {
        return Err(RejectReason::NoActiveTask);
    };
    finish_task(state, &mut task, EndReason::Cancelled, events);
    Ok(())
}

fn handle_assign(
    state: &mut GameState,
    envelope: &CommandEnvelope,
    node_id: &NodeId,
    agent_id: &AgentId,
) -> Result<(), RejectReason> {
    let Some(agent_faction) = state.agents.get(agent_id).map(|a| a.faction.clone()) else {
        return Err(RejectReason::UnknownAgent);
    };
    let Some(node) = state.nodes.get_mut(node_id) else {
        return Err(RejectReason::UnknownNode);
    };
    if node.faction != envelope.issued_by || node.faction != agent_faction {
        return Err(RejectReason::WrongFaction);
    }
    if node.is_owner(agent_id) {
        return Err(RejectReason::AlreadyOwner);
    }
    #[allow(clippy::cast_possible_truncation)]
    let owner_count = node.owners.len() as u32;
    if owner_count >= node.profile.max_workers {
        return Err(RejectReason::OwnerLimitReached);
    }
    node.add_owner(agent_id.clone());
    Ok(())
}

/// Unassigning an agent also ends any task it has at that node.
fn handle_unassign(
    state: &mut GameState,
    envelope: &CommandEnvelope,
    node_id: &NodeId,
    agent_id: &AgentId,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), RejectReason> {
    let Some(node) = state.nodes.get_mut(node_id) else {
        return Err(RejectReason::UnknownNode);
    };
    if node.faction != envelope.issued_by {
        return Err(RejectReason::WrongFaction);
    }
    if !node.remove_owner(agent_id) {
        return Err(RejectReason::NotOwner);
    }
    if state
        .tasks
        .get(agent_id)
        .is_some_and(|task| &task.node == node_id)
    {
        if let Some(mut task) = state.tasks.remove(agent_id) {
            finish_task(state, &mut task, EndReason::Cancelled, events);
        }
    }
    Ok(())
}

fn handle_remove(
    state: &mut GameState,
    envelope: &CommandEnvelope,
    node_id: &NodeId,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), RejectReason> {
    let Some(node) = state.nodes.get(node_id) else {
        return Err(RejectReason::UnknownNode);
    };
    if node.faction != envelope.issued_by {
        return Err(RejectReason::WrongFaction);
    }

    let mut working: Vec<AgentId> = state
        .tasks
        .values()
        .filter(|task| &task.node == node_id)
        .map(|task| task.agent.clone())
        .collect();
    working.sort();

    let Some(node) = state.nodes.remove(node_id) else {
        return Err(RejectReason::UnknownNode);
    };
    for agent in working {
        if let Some(mut task) = state.tasks.remove(&agent) {
            finish_task(state, &mut task, EndReason::NodeMissing, events);
        }
    }

    events.push(crate::emit(
        &mut state.counters,
        state.meta.tick,
        Event::NodeRemoved {
            node: node_id.clone(),
            report: node.removal_report(),
        },
    ));
    Ok(())
}
