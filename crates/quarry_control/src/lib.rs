use quarry_core::{
    AgentId, AgentState, Command, CommandEnvelope, CommandId, ExtractionNode, FactionId,
    GameContent, GameState, NodeId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub trait CommandSource {
    fn generate_commands(
        &mut self,
        state: &GameState,
        content: &GameContent,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutopilotConfig {
    /// Injured agents sit out this many ticks before working again.
    pub rest_ticks_after_injury: u64,
    /// Tear down quarries once they are exhausted and idle.
    pub remove_exhausted: bool,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            rest_ticks_after_injury: 600,
            remove_exhausted: true,
        }
    }
}

/// Drives one faction's quarries automatically:
/// 1. Remove exhausted quarries nobody is working.
/// 2. Fill open owner slots with unassigned, rested agents.
/// 3. Send idle owners back to work.
pub struct AutopilotController {
    faction: FactionId,
    config: AutopilotConfig,
}

impl AutopilotController {
    pub fn new(faction: FactionId) -> Self {
        Self::with_config(faction, AutopilotConfig::default())
    }

    pub fn with_config(faction: FactionId, config: AutopilotConfig) -> Self {
        Self { faction, config }
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn make_cmd(
    faction: &FactionId,
    tick: u64,
    next_id: &mut u64,
    command: Command,
) -> CommandEnvelope {
    let cmd_id = CommandId(format!("cmd_{:06}", *next_id));
    *next_id += 1;
    CommandEnvelope {
        id: cmd_id,
        issued_by: faction.clone(),
        issued_tick: tick,
        execute_at_tick: tick,
        command,
    }
}

fn workable(node: &ExtractionNode) -> bool {
    !node.is_exhausted() && !node.forbidden
}

fn is_rested(agent: &AgentState, tick: u64, config: &AutopilotConfig) -> bool {
    agent
        .injuries
        .last()
        .is_none_or(|injury| tick >= injury.tick + config.rest_ticks_after_injury)
}

/// Our nodes sorted by id for determinism.
fn faction_nodes<'a>(state: &'a GameState, faction: &FactionId) -> Vec<&'a ExtractionNode> {
    let mut nodes: Vec<&ExtractionNode> = state
        .nodes
        .values()
        .filter(|n| &n.faction == faction)
        .collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    nodes
}

/// Rested agents of the faction that own no node, sorted by id.
fn unassigned_agents(state: &GameState, faction: &FactionId, config: &AutopilotConfig) -> Vec<AgentId> {
    let owned: HashSet<&AgentId> = state.nodes.values().flat_map(|n| n.owners.iter()).collect();
    let mut agents: Vec<AgentId> = state
        .agents
        .values()
        .filter(|a| &a.faction == faction && !owned.contains(&a.id))
        .filter(|a| is_rested(a, state.meta.tick, config))
        .map(|a| a.id.clone())
        .collect();
    agents.sort();
    agents
}

impl CommandSource for AutopilotController {
    fn generate_commands(
        &mut self,
        state: &GameState,
        _content: &GameContent,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope> {
        let tick = state.meta.tick;
        let mut commands = Vec::new();
        let mut free_agents = unassigned_agents(state, &self.faction, &self.config).into_iter();

        for node in faction_nodes(state, &self.faction) {
            let busy = state.tasks.values().any(|t| t.node == node.id);

            // Priority 1: clear away a spent quarry.
            if node.is_exhausted() {
                if self.config.remove_exhausted && !busy {
                    commands.push(make_cmd(
                        &self.faction,
                        tick,
                        next_command_id,
                        Command::RemoveNode {
                            node: node.id.clone(),
                        },
                    ));
                }
                continue;
            }
            if !workable(node) {
                continue;
            }

            // Priority 2: staff the quarry.
            let mut owners: Vec<AgentId> = node.owners.clone();
            let open_slots = (node.profile.max_workers as usize).saturating_sub(owners.len());
            for agent in free_agents.by_ref().take(open_slots) {
                commands.push(make_cmd(
                    &self.faction,
                    tick,
                    next_command_id,
                    Command::AssignOwner {
                        node: node.id.clone(),
                        agent: agent.clone(),
                    },
                ));
                owners.push(agent);
            }

            // Priority 3: idle owners start another extraction.
            for agent_id in owners {
                let Some(agent) = state.agents.get(&agent_id) else {
                    continue;
                };
                if state.tasks.contains_key(&agent_id) || !is_rested(agent, tick, &self.config) {
                    continue;
                }
                commands.push(start_command(
                    &self.faction,
                    tick,
                    next_command_id,
                    &agent_id,
                    &node.id,
                ));
            }
        }
        commands
    }
}

fn start_command(
    faction: &FactionId,
    tick: u64,
    next_id: &mut u64,
    agent: &AgentId,
    node: &NodeId,
) -> CommandEnvelope {
    make_cmd(
        faction,
        tick,
        next_id,
        Command::StartExtraction {
            agent: agent.clone(),
            node: node.clone(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::test_fixtures::{base_content, base_state, colony};
    use quarry_core::Injury;

    fn agent(id: &str) -> AgentId {
        AgentId(id.to_string())
    }

    #[test]
    fn test_idle_owners_get_start_commands() {
        let content = base_content();
        let state = base_state(&content);
        let mut autopilot = AutopilotController::new(colony());
        let mut next_id = 0;

        let commands = autopilot.generate_commands(&state, &content, &mut next_id);
        let started: Vec<&AgentId> = commands
            .iter()
            .filter_map(|c| match &c.command {
                Command::StartExtraction { agent, .. } => Some(agent),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec![&agent("agent_0001"), &agent("agent_0002")]);
        assert_eq!(next_id, 2);
    }

    #[test]
    fn test_injured_agent_rests() {
        let content = base_content();
        let mut state = base_state(&content);
        state
            .agents
            .get_mut(&agent("agent_0001"))
            .unwrap()
            .injuries
            .push(Injury {
                amount: 9.0,
                tick: 0,
            });
        let mut autopilot = AutopilotController::new(colony());
        let mut next_id = 0;

        let commands = autopilot.generate_commands(&state, &content, &mut next_id);
        assert!(!commands.iter().any(|c| matches!(
            &c.command,
            Command::StartExtraction { agent: a, .. } if a == &agent("agent_0001")
        )));

        state.meta.tick = 600;
        let commands = autopilot.generate_commands(&state, &content, &mut next_id);
        assert!(commands.iter().any(|c| matches!(
            &c.command,
            Command::StartExtraction { agent: a, .. } if a == &agent("agent_0001")
        )));
    }

    #[test]
    fn test_unowned_agents_are_assigned_up_to_limit() {
        let content = base_content();
        let mut state = base_state(&content);
        let node = state
            .nodes
            .get_mut(&NodeId("node_test".to_string()))
            .unwrap();
        node.owners.clear();
        node.profile.max_workers = 1;
        let mut autopilot = AutopilotController::new(colony());
        let mut next_id = 0;

        let commands = autopilot.generate_commands(&state, &content, &mut next_id);
        let assigned: Vec<&AgentId> = commands
            .iter()
            .filter_map(|c| match &c.command {
                Command::AssignOwner { agent, .. } => Some(agent),
                _ => None,
            })
            .collect();
        assert_eq!(assigned, vec![&agent("agent_0001")]);
    }

    #[test]
    fn test_injured_agents_are_not_assigned() {
        let content = base_content();
        let mut state = base_state(&content);
        state
            .nodes
            .get_mut(&NodeId("node_test".to_string()))
            .unwrap()
            .owners
            .clear();
        state
            .agents
            .get_mut(&agent("agent_0001"))
            .unwrap()
            .injuries
            .push(Injury {
                amount: 9.0,
                tick: 0,
            });
        let mut autopilot = AutopilotController::new(colony());
        let mut next_id = 0;

        let assigned = |commands: &[CommandEnvelope]| -> Vec<AgentId> {
            commands
                .iter()
                .filter_map(|c| match &c.command {
                    Command::AssignOwner { agent, .. } => Some(agent.clone()),
                    _ => None,
                })
                .collect()
        };
        let commands = autopilot.generate_commands(&state, &content, &mut next_id);
        assert_eq!(assigned(&commands), vec![agent("agent_0002")]);

        state.meta.tick = 600;
        let commands = autopilot.generate_commands(&state, &content, &mut next_id);
        assert_eq!(
            assigned(&commands),
            vec![agent("agent_0001"), agent("agent_0002")]
        );
    }

    #[test]
    fn test_exhausted_idle_node_is_removed() {
        let content = base_content();
        let mut state = base_state(&content);
        state
            .nodes
            .get_mut(&NodeId("node_test".to_string()))
            .unwrap()
            .ledger = quarry_core::DepletionLedger::restore(0.0, Some(2000), 1.0);
        let mut autopilot = AutopilotController::new(colony());
        let mut next_id = 0;

        let commands = autopilot.generate_commands(&state, &content, &mut next_id);
        assert_eq!(commands.len(), 1);
        assert!(matches!(commands[0].command, Command::RemoveNode { .. }));
    }

    #[test]
    fn test_other_factions_nodes_ignored() {
        let content = base_content();
        let state = base_state(&content);
        let mut autopilot = AutopilotController::new(FactionId("faction_raiders".to_string()));
        let mut next_id = 0;
        assert!(autopilot
            .generate_commands(&state, &content, &mut next_id)
            .is_empty());
    }
}
