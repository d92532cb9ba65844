//! Archetype catalog snapshot

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::db::BuildingStore;
use crate::error::Result;
use crate::models::{Category, ComponentArchetype};

pub const RIDGE_BOARD: &str = "Ridge board";
pub const TOP_FLOOR_CEILING: &str = "Top floor ceiling";

/// Roof structures that never get a top floor ceiling on top of them
pub const TOP_FLOOR_CEILING_EXCLUDED: [&str; 3] = [RIDGE_BOARD, "Flat wood", "Flat concrete"];

pub fn is_flat_roof(archetype: &ComponentArchetype) -> bool {
    archetype.name.starts_with("Flat")
}

/// Roof structures appended after the draw rather than drawn themselves
pub fn is_augmentation(archetype: &ComponentArchetype) -> bool {
    archetype.name == RIDGE_BOARD || archetype.name == TOP_FLOOR_CEILING
}

/// Immutable view of every archetype, loaded once per batch.
#[derive(Debug, Clone, Default)]
pub struct ArchetypeCatalog {
    by_category: BTreeMap<Category, Vec<ComponentArchetype>>,
}

impl ArchetypeCatalog {
    pub fn load(store: &dyn BuildingStore) -> Result<Self> {
        let mut by_category = BTreeMap::new();
        for category in Category::ALL {
            let archetypes = store.get_archetypes(category)?;
            if archetypes.is_empty() {
                warn!(category = %category, "No archetypes in catalog");
            }
            by_category.insert(category, archetypes);
        }

        let catalog = Self { by_category };
        for archetype in catalog.without_pitch_window() {
            warn!(archetype = archetype.id, name = %archetype.name, "Roof structure has no pitch window, never assigned");
        }
        if catalog.is_empty() {
            warn!("Archetype catalog is empty, every link will be null");
        } else {
            debug!(archetypes = catalog.len(), "Archetype catalog loaded");
        }
        Ok(catalog)
    }

    /// Drawable roof structures missing either pitch bound.
    pub fn without_pitch_window(&self) -> impl Iterator<Item = &ComponentArchetype> {
        self.archetypes_of(Category::RoofStructure)
            .iter()
            .filter(|a| !is_augmentation(a) && (a.min_pitch.is_none() || a.max_pitch.is_none()))
    }

    pub fn from_archetypes(archetypes: impl IntoIterator<Item = ComponentArchetype>) -> Self {
        let mut by_category: BTreeMap<Category, Vec<ComponentArchetype>> = BTreeMap::new();
        for archetype in archetypes {
            by_category.entry(archetype.category).or_default().push(archetype);
        }
        for list in by_category.values_mut() {
            list.sort_by_key(|a| a.id);
        }
        Self { by_category }
    }

    /// Archetypes of a category, ordered by id.
    pub fn archetypes_of(&self, category: Category) -> &[ComponentArchetype] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get(&self, id: i64) -> Option<&ComponentArchetype> {
        self.by_category.values().flatten().find(|a| a.id == id)
    }

    pub fn find_by_name(&self, category: Category, name: &str) -> Option<&ComponentArchetype> {
        self.archetypes_of(category).iter().find(|a| a.name == name)
    }

    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archetype(id: i64, category: Category, name: &str) -> ComponentArchetype {
        ComponentArchetype {
            id,
            category,
            name: name.to_string(),
            applicable_codes: Vec::new(),
            min_year: 1850,
            max_year: 2030,
            min_pitch: None,
            max_pitch: None,
        }
    }

    #[test]
    fn test_archetypes_grouped_and_sorted() {
        let catalog = ArchetypeCatalog::from_archetypes([
            archetype(3, Category::Floor, "Timber joists"),
            archetype(1, Category::Floor, "Hollow core"),
            archetype(2, Category::Foundation, "Strip"),
        ]);
        let floors: Vec<i64> = catalog.archetypes_of(Category::Floor).iter().map(|a| a.id).collect();
        assert_eq!(floors, vec![1, 3]);
        assert!(catalog.archetypes_of(Category::RoofCover).is_empty());
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get(2).unwrap().name, "Strip");
    }

    #[test]
    fn test_roof_structures_without_pitch_window_are_flagged() {
        let mut rafters = archetype(1, Category::RoofStructure, "Rafters");
        rafters.min_pitch = Some(15.0);
        rafters.max_pitch = Some(60.0);
        let mut half_open = archetype(2, Category::RoofStructure, "Trusses");
        half_open.min_pitch = Some(5.0);
        let catalog = ArchetypeCatalog::from_archetypes([
            rafters,
            half_open,
            archetype(3, Category::RoofStructure, RIDGE_BOARD),
            archetype(4, Category::Floor, "Hollow core"),
        ]);
        let flagged: Vec<i64> = catalog.without_pitch_window().map(|a| a.id).collect();
        assert_eq!(flagged, vec![2]);
    }

    #[test]
    fn test_load_from_empty_store() {
        let store = crate::db::SqliteStore::open_in_memory().unwrap();
        let catalog = ArchetypeCatalog::load(&store).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.without_pitch_window().count(), 0);
    }

    #[test]
    fn test_roof_name_helpers() {
        assert!(is_flat_roof(&archetype(1, Category::RoofStructure, "Flat wood")));
        assert!(!is_flat_roof(&archetype(2, Category::RoofStructure, "Rafters")));
        assert!(is_augmentation(&archetype(3, Category::RoofStructure, RIDGE_BOARD)));
        assert!(is_augmentation(&archetype(4, Category::RoofStructure, TOP_FLOOR_CEILING)));
        let catalog = ArchetypeCatalog::from_archetypes([archetype(3, Category::RoofStructure, RIDGE_BOARD)]);
        assert_eq!(catalog.find_by_name(Category::RoofStructure, RIDGE_BOARD).unwrap().id, 3);
    }
}
