//! Destination search for a freshly produced item.
//!
//! Linked drop-off platforms are tried first, in link order and then cell
//! order. Raw stone chunks skip platforms. Otherwise the best general
//! stockpile wins: highest priority first, ties broken by zone id.

use crate::{
    AgentState, Cell, ExtractionNode, FactionId, GameContent, GameState, ItemState, MaterialKind,
};

/// The cell is empty or holds a stack of the same material with room left.
pub fn cell_has_room(state: &GameState, cell: Cell, item: &ItemState, content: &GameContent) -> bool {
    let stack_limit = content
        .material(&item.material)
        .map_or(1, |def| def.stack_limit);
    state
        .items
        .values()
        .filter(|other| other.id != item.id && other.position == cell)
        .all(|other| {
            other.material == item.material && other.quantity + item.quantity <= stack_limit
        })
}

/// A cell can take the item: not claimed by another agent and with room.
pub fn is_good_store_cell(
    state: &GameState,
    cell: Cell,
    item: &ItemState,
    agent: &AgentState,
    content: &GameContent,
) -> bool {
    if state
        .reservations
        .cell_holder(cell)
        .is_some_and(|holder| holder != &agent.id)
    {
        return false;
    }
    cell_has_room(state, cell, item, content)
}

fn usable_by(faction: &FactionId, accessible: bool, agent: &AgentState) -> bool {
    accessible && faction == &agent.faction
}

/// First free cell on a platform linked to `node`.
pub fn find_platform_cell(
    state: &GameState,
    node: &ExtractionNode,
    item: &ItemState,
    kind: MaterialKind,
    agent: &AgentState,
    content: &GameContent,
) -> Option<Cell> {
    node.linked_facilities
        .iter()
        .filter_map(|id| state.facilities.get(id))
        .filter(|facility| {
            facility.accepts.contains(&kind) && usable_by(&facility.faction, facility.accessible, agent)
        })
        .flat_map(|facility| facility.cells.iter().copied())
        .find(|&cell| is_good_store_cell(state, cell, item, agent, content))
}

/// First free cell in the best stockpile that beats the item's current priority.
pub fn find_best_storage_cell(
    state: &GameState,
    item: &ItemState,
    kind: MaterialKind,
    agent: &AgentState,
    content: &GameContent,
) -> Option<Cell> {
    let mut zones: Vec<_> = state
        .zones
        .iter()
        .filter(|zone| {
            zone.priority > item.storage
                && zone.accepts.contains(&kind)
                && usable_by(&zone.faction, zone.accessible, agent)
        })
        .collect();
    zones.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
    zones
        .into_iter()
        .flat_map(|zone| zone.cells.iter().copied())
        .find(|&cell| is_good_store_cell(state, cell, item, agent, content))
}

/// Where `item` should go, or `None` when nothing can take it.
pub fn select_destination(
    state: &GameState,
    node: &ExtractionNode,
    item: &ItemState,
    agent: &AgentState,
    content: &GameContent,
) -> Option<Cell> {
    let kind = content.material(&item.material)?.kind;
    let platform = if kind == MaterialKind::StoneChunk {
        None
    } else {
        find_platform_cell(state, node, item, kind, agent, content)
    };
    platform.or_else(|| find_best_storage_cell(state, item, kind, agent, content))
}
