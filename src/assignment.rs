//! Archetype assignment
//!
//! Each category is configured by how its candidate pool is filtered
//! ([`Applicability`]); selection from the pool is the same for every
//! category: a uniform draw among archetypes whose year window contains the
//! construction year, falling back to archetypes that went out of use before
//! it, then to archetypes introduced after it.

use std::fmt;

use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, info, warn};

use crate::catalog::{self, ArchetypeCatalog, RIDGE_BOARD, TOP_FLOOR_CEILING, TOP_FLOOR_CEILING_EXCLUDED};
use crate::db::BuildingStore;
use crate::error::Result;
use crate::geometry;
use crate::models::{BuildingComponentLink, BuildingRecord, Category, ComponentArchetype, LinkRole};

/// How a category narrows its archetypes down for one building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    /// Archetype codes must contain the reported facade material
    FacadeCode,
    /// Archetype codes must contain the reported roof cover material
    RoofCode,
    /// Estimated roof pitch must fall in the archetype's pitch window
    Pitch,
    Unconstrained,
}

impl Applicability {
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::ExteriorWall => Applicability::FacadeCode,
            Category::RoofCover => Applicability::RoofCode,
            Category::RoofStructure => Applicability::Pitch,
            Category::Floor | Category::InteriorWall | Category::GroundSlab | Category::Foundation => {
                Applicability::Unconstrained
            }
        }
    }

    pub fn admits(self, archetype: &ComponentArchetype, building: &BuildingRecord) -> bool {
        match self {
            Applicability::FacadeCode => fits_code(archetype, building.facade_material_code),
            Applicability::RoofCode => fits_code(archetype, building.roof_material_code),
            Applicability::Pitch => {
                if catalog::is_augmentation(archetype) {
                    return false;
                }
                let pitch = building_pitch(building);
                match (archetype.min_pitch, archetype.max_pitch) {
                    (Some(min), Some(max)) => min <= pitch && pitch <= max,
                    _ => false,
                }
            }
            Applicability::Unconstrained => true,
        }
    }
}

/// An empty code set fits any building, including one with no reported code.
fn fits_code(archetype: &ComponentArchetype, reported: Option<i32>) -> bool {
    archetype.applicable_codes.is_empty()
        || reported.is_some_and(|code| archetype.applicable_codes.contains(&code))
}

fn building_pitch(building: &BuildingRecord) -> f64 {
    building
        .geometry
        .map(|g| g.roof_pitch)
        .unwrap_or_else(|| geometry::roof_pitch(building.roof_material_code))
}

/// Candidate archetypes for one building.
pub fn candidate_pool<'a>(
    archetypes: &'a [ComponentArchetype],
    applicability: Applicability,
    building: &BuildingRecord,
) -> Vec<&'a ComponentArchetype> {
    archetypes
        .iter()
        .filter(|a| applicability.admits(a, building))
        .collect()
}

/// Where a construction year falls relative to an archetype's period of use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearBucket {
    Valid,
    /// The archetype went out of use before the building was built
    Late,
    /// The archetype came into use after the building was built
    Early,
}

pub fn year_bucket(archetype: &ComponentArchetype, year: i32) -> YearBucket {
    if year > archetype.max_year {
        YearBucket::Late
    } else if year < archetype.min_year {
        YearBucket::Early
    } else {
        YearBucket::Valid
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection<'a> {
    Chosen(&'a ComponentArchetype, YearBucket),
    NoConstructionYear,
    NoCandidate,
}

impl<'a> Selection<'a> {
    pub fn archetype(&self) -> Option<&'a ComponentArchetype> {
        match *self {
            Selection::Chosen(archetype, _) => Some(archetype),
            _ => None,
        }
    }
}

/// Draw one archetype from `pool` for a building built in `year`.
pub fn select_archetype<'a, R: Rng + ?Sized>(
    pool: &[&'a ComponentArchetype],
    year: Option<i32>,
    rng: &mut R,
) -> Selection<'a> {
    let Some(year) = year else {
        return Selection::NoConstructionYear;
    };

    for bucket in [YearBucket::Valid, YearBucket::Late, YearBucket::Early] {
        let choices: Vec<&'a ComponentArchetype> = pool
            .iter()
            .copied()
            .filter(|a| year_bucket(a, year) == bucket)
            .collect();
        if let Some(archetype) = choices.choose(rng).copied() {
            return Selection::Chosen(archetype, bucket);
        }
    }
    Selection::NoCandidate
}

/// Outcome counts of one category's assignment pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentReport {
    pub category: Option<Category>,
    pub valid: usize,
    pub late: usize,
    pub early: usize,
    pub no_year: usize,
    pub no_candidate: usize,
    pub ridge_boards: usize,
    pub top_floor_ceilings: usize,
}

impl AssignmentReport {
    fn record(&mut self, selection: &Selection<'_>) {
        match selection {
            Selection::Chosen(_, YearBucket::Valid) => self.valid += 1,
            Selection::Chosen(_, YearBucket::Late) => self.late += 1,
            Selection::Chosen(_, YearBucket::Early) => self.early += 1,
            Selection::NoConstructionYear => self.no_year += 1,
            Selection::NoCandidate => self.no_candidate += 1,
        }
    }

    pub fn assigned(&self) -> usize {
        self.valid + self.late + self.early
    }
}

impl fmt::Display for AssignmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.category.map(Category::as_str).unwrap_or("-");
        write!(
            f,
            "{:<16} assigned {:>6} (valid {}, late {}, early {}), no year {}, no candidate {}",
            name, self.assigned(), self.valid, self.late, self.early, self.no_year, self.no_candidate
        )?;
        if self.ridge_boards > 0 || self.top_floor_ceilings > 0 {
            write!(
                f,
                ", ridge boards {}, top floor ceilings {}",
                self.ridge_boards, self.top_floor_ceilings
            )?;
        }
        Ok(())
    }
}

/// Pick a primary archetype for every building in one category.
pub fn assign_category<R: Rng + ?Sized>(
    buildings: &[BuildingRecord],
    catalog: &ArchetypeCatalog,
    category: Category,
    rng: &mut R,
) -> (Vec<BuildingComponentLink>, AssignmentReport) {
    let archetypes = catalog.archetypes_of(category);
    let applicability = Applicability::for_category(category);
    let mut report = AssignmentReport {
        category: Some(category),
        ..Default::default()
    };

    let mut links = Vec::with_capacity(buildings.len());
    for building in buildings {
        let pool = candidate_pool(archetypes, applicability, building);
        let selection = select_archetype(&pool, building.construction_year, rng);
        report.record(&selection);

        match selection {
            Selection::Chosen(archetype, bucket) => {
                debug!(building = %building.id, category = %category, archetype = archetype.id, ?bucket, "Assigned");
            }
            Selection::NoCandidate => {
                warn!(building = %building.id, category = %category, "No valid archetype");
            }
            Selection::NoConstructionYear => {}
        }

        links.push(BuildingComponentLink {
            building_id: building.id.clone(),
            category,
            role: LinkRole::Primary,
            archetype_id: selection.archetype().map(|a| a.id),
        });
    }

    (links, report)
}

/// Append ridge board and top floor ceiling links for pitched roof structures.
pub fn augment_roof_structures(
    links: &mut Vec<BuildingComponentLink>,
    catalog: &ArchetypeCatalog,
    report: &mut AssignmentReport,
) {
    let ridge_board = catalog.find_by_name(Category::RoofStructure, RIDGE_BOARD);
    let top_floor_ceiling = catalog.find_by_name(Category::RoofStructure, TOP_FLOOR_CEILING);
    if ridge_board.is_none() {
        warn!("Catalog has no '{}' roof structure, skipping", RIDGE_BOARD);
    }
    if top_floor_ceiling.is_none() {
        warn!("Catalog has no '{}' roof structure, skipping", TOP_FLOOR_CEILING);
    }

    let mut extra = Vec::new();
    for link in links.iter().filter(|l| l.role == LinkRole::Primary) {
        let Some(assigned) = link.archetype_id.and_then(|id| catalog.get(id)) else {
            continue;
        };

        if let Some(ridge) = ridge_board {
            if !catalog::is_flat_roof(assigned) {
                extra.push(BuildingComponentLink {
                    building_id: link.building_id.clone(),
                    category: Category::RoofStructure,
                    role: LinkRole::RidgeBoard,
                    archetype_id: Some(ridge.id),
                });
                report.ridge_boards += 1;
            }
        }

        if let Some(ceiling) = top_floor_ceiling {
            if !TOP_FLOOR_CEILING_EXCLUDED.contains(&assigned.name.as_str()) {
                extra.push(BuildingComponentLink {
                    building_id: link.building_id.clone(),
                    category: Category::RoofStructure,
                    role: LinkRole::TopFloorCeiling,
                    archetype_id: Some(ceiling.id),
                });
                report.top_floor_ceilings += 1;
            }
        }
    }
    links.extend(extra);
}

/// Assign one category and replace its stored links.
pub fn run_category_pass<R: Rng + ?Sized>(
    store: &mut dyn BuildingStore,
    buildings: &[BuildingRecord],
    catalog: &ArchetypeCatalog,
    category: Category,
    rng: &mut R,
) -> Result<AssignmentReport> {
    let (mut links, mut report) = assign_category(buildings, catalog, category, rng);
    if category == Category::RoofStructure {
        augment_roof_structures(&mut links, catalog, &mut report);
    }

    store.replace_component_links(category, &links)?;

    info!(
        category = %category,
        assigned = report.assigned(),
        late = report.late,
        early = report.early,
        no_year = report.no_year,
        no_candidate = report.no_candidate,
        "Assignment pass complete"
    );
    Ok(report)
}

/// Assign every category in turn against one catalog snapshot.
pub fn run_assignment_pass<R: Rng + ?Sized>(
    store: &mut dyn BuildingStore,
    categories: &[Category],
    rng: &mut R,
) -> Result<Vec<AssignmentReport>> {
    let catalog = ArchetypeCatalog::load(store)?;
    let buildings = store.get_all_buildings()?;

    let mut reports = Vec::with_capacity(categories.len());
    for &category in categories {
        reports.push(run_category_pass(store, &buildings, &catalog, category, rng)?);
    }
    Ok(reports)
}
