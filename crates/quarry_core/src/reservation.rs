//! Exclusive claims on produced items and destination cells.
//!
//! These are the only mutual-exclusion points between tasks. A failed claim
//! is retryable: the caller keeps its state and tries again next tick.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AgentId, Cell, ItemId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReservationError {
    #[error("item {item} is already claimed by {holder}")]
    ItemClaimed { item: ItemId, holder: AgentId },
    #[error("cell {cell} is already claimed by {holder}")]
    CellClaimed { cell: Cell, holder: AgentId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellClaim {
    pub cell: Cell,
    pub holder: AgentId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReservationTable {
    items: AHashMap<ItemId, AgentId>,
    cells: Vec<CellClaim>,
}

impl ReservationTable {
    /// Claim `item` for `agent`. Re-claiming one's own item succeeds.
    pub fn try_reserve_item(&mut self, item: &ItemId, agent: &AgentId) -> Result<(), ReservationError> {
        match self.items.get(item) {
            Some(holder) if holder != agent => Err(ReservationError::ItemClaimed {
                item: item.clone(),
                holder: holder.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                self.items.insert(item.clone(), agent.clone());
                Ok(())
            }
        }
    }

    /// Claim `cell` for `agent`. Re-claiming one's own cell succeeds.
    pub fn try_reserve_cell(&mut self, cell: Cell, agent: &AgentId) -> Result<(), ReservationError> {
        match self.cell_holder(cell) {
            Some(holder) if holder != agent => Err(ReservationError::CellClaimed {
                cell,
                holder: holder.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                self.cells.push(CellClaim {
                    cell,
                    holder: agent.clone(),
                });
                Ok(())
            }
        }
    }

    pub fn item_holder(&self, item: &ItemId) -> Option<&AgentId> {
        self.items.get(item)
    }

    pub fn cell_holder(&self, cell: Cell) -> Option<&AgentId> {
        self.cells
            .iter()
            .find(|claim| claim.cell == cell)
            .map(|claim| &claim.holder)
    }

    /// Drop every claim held by `agent`.
    pub fn release_all(&mut self, agent: &AgentId) {
        self.items.retain(|_, holder| holder != agent);
        self.cells.retain(|claim| &claim.holder != agent);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(s: &str) -> AgentId {
        AgentId(s.to_string())
    }

    #[test]
    fn second_agent_cannot_claim_held_item() {
        let mut table = ReservationTable::default();
        let item = ItemId("item_0001".to_string());
        table.try_reserve_item(&item, &agent("a")).unwrap();
        assert!(table.try_reserve_item(&item, &agent("a")).is_ok());
        let err = table.try_reserve_item(&item, &agent("b")).unwrap_err();
        assert_eq!(
            err,
            ReservationError::ItemClaimed {
                item: item.clone(),
                holder: agent("a")
            }
        );
    }

    #[test]
    fn release_frees_cells_for_others() {
        let mut table = ReservationTable::default();
        let cell = Cell::new(3, 4);
        table.try_reserve_cell(cell, &agent("a")).unwrap();
        assert!(table.try_reserve_cell(cell, &agent("b")).is_err());
        table.release_all(&agent("a"));
        assert!(table.is_empty());
        assert!(table.try_reserve_cell(cell, &agent("b")).is_ok());
    }

    #[test]
    fn error_message_names_holder() {
        let err = ReservationError::CellClaimed {
            cell: Cell::new(1, 2),
            holder: agent("agent_0002"),
        };
        assert_eq!(err.to_string(), "cell (1, 2) is already claimed by agent_0002");
    }
}
