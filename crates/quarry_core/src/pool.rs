//! Shared refined-resource pool drawn from when a node mines resources.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::MaterialId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolEntry {
    pub material: MaterialId,
    /// Relative draw weight. Zero disables the entry.
    pub commonality: f32,
    /// Finite stock; `None` never runs out.
    pub remaining: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefinedPool {
    pub entries: Vec<PoolEntry>,
}

impl RefinedPool {
    pub fn new(entries: Vec<PoolEntry>) -> Self {
        Self { entries }
    }

    fn drawable(entry: &PoolEntry) -> bool {
        entry.commonality > 0.0 && entry.remaining != Some(0)
    }

    pub fn is_empty(&self) -> bool {
        !self.entries.iter().any(Self::drawable)
    }

    /// Draw one material weighted by commonality, consuming finite stock.
    /// Returns `None` when nothing is drawable.
    pub fn take_one(&mut self, rng: &mut impl Rng) -> Option<MaterialId> {
        let candidates: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| Self::drawable(e))
            .map(|(idx, _)| idx)
            .collect();
        let weights = candidates.iter().map(|&idx| self.entries[idx].commonality);
        let dist = WeightedIndex::new(weights).ok()?;
        let entry = &mut self.entries[candidates[dist.sample(rng)]];
        if let Some(remaining) = entry.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(entry.material.clone())
    }
}
