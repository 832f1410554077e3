//! Material catalog derivation from the terrain under a node.
//!
//! Runs once when a node is established. The result is stored on the node and
//! never re-derived, even if a list turns out empty.

use rand::seq::SliceRandom;
use rand::Rng;
use smallvec::SmallVec;
use tracing::warn;

use crate::{GameContent, MaterialCatalog, MaterialId};

const TERRAIN_SUFFIXES: [&str; 3] = ["_RoughHewn", "_Rough", "_Smooth"];
const MOD_PREFIXES: [&str; 2] = ["GU_", "AB_"];

/// Used when neither the footprint nor the surrounding world names a known rock.
pub const VANILLA_ROCK_TYPES: [&str; 5] = ["Sandstone", "Limestone", "Granite", "Marble", "Slate"];

/// Extract the rock type from a natural-stone terrain identifier.
///
/// `Granite_Rough` → `Granite`, `AB_Obsidian_Smooth` → `Obsidian`.
/// Returns `None` for terrain that is not raw stone (soil, floors, water).
pub fn rock_type_from_terrain(terrain: &str) -> Option<&str> {
    let stripped = TERRAIN_SUFFIXES
        .iter()
        .find_map(|suffix| terrain.strip_suffix(suffix))?;
    let rock = MOD_PREFIXES
        .iter()
        .fold(stripped, |rock, prefix| rock.strip_prefix(prefix).unwrap_or(rock));
    (!rock.is_empty()).then_some(rock)
}

fn is_known_rock(rock: &str, content: &GameContent) -> bool {
    content.rock_types.iter().any(|r| r.id == rock)
}

/// Rock types found under the footprint, falling back to the world's natural
/// rocks and finally to the vanilla set. Deduplicated, first-seen order.
pub fn rock_types_under(
    terrain_cells: &[String],
    world_rock_types: &[String],
    content: &GameContent,
) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for rock in terrain_cells
        .iter()
        .filter_map(|t| rock_type_from_terrain(t))
        .filter(|rock| is_known_rock(rock, content))
    {
        if !found.iter().any(|r| r == rock) {
            found.push(rock.to_string());
        }
    }
    if !found.is_empty() {
        return found;
    }

    for rock in world_rock_types {
        if is_known_rock(rock, content) && !found.contains(rock) {
            found.push(rock.clone());
        }
    }
    if found.is_empty() {
        warn!("no valid rock types under node or in world, using vanilla rocks");
        found = VANILLA_ROCK_TYPES.iter().map(ToString::to_string).collect();
    }
    found
}

impl MaterialCatalog {
    /// Build chunk and block lists from rock type ids.
    pub fn from_rock_types(rock_types: &[String], content: &GameContent) -> Self {
        let mut chunk_types: SmallVec<[MaterialId; 4]> = SmallVec::new();
        let mut block_types: SmallVec<[MaterialId; 4]> = SmallVec::new();
        for def in rock_types
            .iter()
            .filter_map(|rock| content.rock_types.iter().find(|r| &r.id == rock))
        {
            if let Some(chunk) = &def.chunk {
                if content.material(chunk).is_some() && !chunk_types.contains(chunk) {
                    chunk_types.push(chunk.clone());
                }
            }
            if let Some(blocks) = &def.blocks {
                if content.material(blocks).is_some() && !block_types.contains(blocks) {
                    block_types.push(blocks.clone());
                }
            }
        }
        Self {
            chunk_types,
            block_types,
            junk_type: content.constants.rubble_material.clone(),
        }
    }

    pub fn random_chunk(&self, rng: &mut impl Rng) -> Option<&MaterialId> {
        self.chunk_types.choose(rng)
    }

    pub fn random_block(&self, rng: &mut impl Rng) -> Option<&MaterialId> {
        self.block_types.choose(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::base_content;

    #[test]
    fn strips_suffixes_and_mod_prefixes() {
        assert_eq!(rock_type_from_terrain("Granite_Rough"), Some("Granite"));
        assert_eq!(rock_type_from_terrain("Marble_RoughHewn"), Some("Marble"));
        assert_eq!(rock_type_from_terrain("Slate_Smooth"), Some("Slate"));
        assert_eq!(rock_type_from_terrain("AB_Granite_Rough"), Some("Granite"));
        assert_eq!(rock_type_from_terrain("GU_Marble_Smooth"), Some("Marble"));
        assert_eq!(rock_type_from_terrain("Soil"), None);
        assert_eq!(rock_type_from_terrain("_Rough"), None);
    }

    #[test]
    fn footprint_rocks_win_over_world_rocks() {
        let content = base_content();
        let terrain = vec![
            "Granite_Rough".to_string(),
            "Soil".to_string(),
            "Granite_Smooth".to_string(),
            "Unobtainium_Rough".to_string(),
        ];
        let rocks = rock_types_under(&terrain, &["Marble".to_string()], &content);
        assert_eq!(rocks, vec!["Granite".to_string()]);
    }

    #[test]
    fn falls_back_to_world_then_vanilla() {
        let content = base_content();
        let soil = vec!["Soil".to_string()];
        let rocks = rock_types_under(&soil, &["Marble".to_string()], &content);
        assert_eq!(rocks, vec!["Marble".to_string()]);

        let rocks = rock_types_under(&soil, &[], &content);
        assert_eq!(rocks.len(), VANILLA_ROCK_TYPES.len());
    }

    #[test]
    fn catalog_deduplicates_and_skips_unknown_materials() {
        let content = base_content();
        let rocks = vec![
            "Granite".to_string(),
            "Granite".to_string(),
            "Marble".to_string(),
        ];
        let catalog = MaterialCatalog::from_rock_types(&rocks, &content);
        assert_eq!(catalog.chunk_types.len(), 2);
        assert_eq!(catalog.block_types.len(), 2);
        assert_eq!(catalog.junk_type, content.constants.rubble_material);
    }
}
