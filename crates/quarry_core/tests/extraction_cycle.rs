use quarry_core::test_fixtures::{base_content, base_state, colony, make_rng};
use quarry_core::{
    tick, AgentId, Command, CommandEnvelope, CommandId, EndReason, Event, EventLevel,
    ExtractionState, GameContent, GameState, NodeId, RejectReason,
};

fn start(state: &GameState, agent: &str) -> CommandEnvelope {
    CommandEnvelope {
        id: CommandId(format!("cmd_{agent}_{}", state.meta.tick)),
        issued_by: colony(),
        issued_tick: state.meta.tick,
        execute_at_tick: state.meta.tick,
        command: Command::StartExtraction {
            agent: AgentId(agent.to_string()),
            node: NodeId("node_test".to_string()),
        },
    }
}

/// Keep both owners working until the node runs dry or `max_ticks` pass.
fn work_node(state: &mut GameState, content: &GameContent, max_ticks: u64) -> Vec<Event> {
    let mut rng = make_rng();
    let mut events = Vec::new();
    for _ in 0..max_ticks {
        let commands: Vec<CommandEnvelope> = ["agent_0001", "agent_0002"]
            .iter()
            .filter(|a| !state.tasks.contains_key(&AgentId((**a).to_string())))
            .map(|a| start(state, a))
            .collect();
        let out = tick(state, &commands, content, &mut rng, EventLevel::Normal);
        events.extend(out.into_iter().map(|e| e.event));
        let turned_away = events
            .iter()
            .any(|e| matches!(e, Event::CommandRejected { .. }));
        if state.nodes.values().all(|n| n.is_exhausted()) && state.tasks.is_empty() && turned_away
        {
            break;
        }
    }
    events
}

#[test]
fn test_node_works_down_to_exhaustion() {
    let mut content = base_content();
    content.constants.max_health = Some(12);
    let mut state = base_state(&content);

    let events = work_node(&mut state, &content, 5_000);

    let node = &state.nodes[&NodeId("node_test".to_string())];
    assert!(node.is_exhausted());
    assert!(state.tasks.is_empty());
    assert!(state.reservations.is_empty());

    let depleted = events
        .iter()
        .filter(|e| matches!(e, Event::NodeDepleted { .. }))
        .count();
    assert_eq!(depleted, 1);

    // Remaining capacity only ever goes down.
    let remaining: Vec<f32> = events
        .iter()
        .filter_map(|e| match e {
            Event::ResourcesExtracted {
                remaining_percent, ..
            } => Some(*remaining_percent),
            _ => None,
        })
        .collect();
    assert!(!remaining.is_empty());
    assert!(remaining.windows(2).all(|w| w[1] <= w[0]));
    assert!(remaining.last().is_some_and(|r| *r <= 0.0));

    // Exhaustion is reported as a rejection for new work.
    assert!(events.iter().any(|e| matches!(
        e,
        Event::CommandRejected {
            reason: RejectReason::NodeExhausted,
            ..
        }
    )));
}

#[test]
fn test_rubble_is_never_hauled() {
    let content = base_content();
    let mut state = base_state(&content);
    let rubble = content.constants.rubble_material.clone();

    let events = work_node(&mut state, &content, 2_000);

    let rubble_items: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::ResourcesExtracted { item, reward, .. } if reward.material == rubble => {
                Some(item.clone())
            }
            _ => None,
        })
        .collect();
    assert!(!rubble_items.is_empty(), "60% junk should produce some rubble");
    for item in &rubble_items {
        assert!(!events.iter().any(|e| matches!(
            e,
            Event::HaulRequested { item: hauled, .. } if hauled == item
        )));
    }
}

#[test]
fn test_every_task_reaches_a_terminal_state() {
    let content = base_content();
    let mut state = base_state(&content);

    let events = work_node(&mut state, &content, 1_000);

    let started = events
        .iter()
        .filter(|e| matches!(e, Event::TaskStarted { .. }))
        .count();
    let ended: Vec<(ExtractionState, EndReason)> = events
        .iter()
        .filter_map(|e| match e {
            Event::TaskEnded { state, reason, .. } => Some((*state, *reason)),
            _ => None,
        })
        .collect();
    assert_eq!(started, ended.len() + state.tasks.len());
    for (state, reason) in ended {
        assert_eq!(state, reason.terminal_state());
    }
}
