//! Batch sequencing: geometry, then assignment per category, then aggregation

use std::fmt;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use crate::assignment::{self, AssignmentReport};
use crate::calculator::{self, AggregationReport};
use crate::config::EstimatorConfig;
use crate::db::BuildingStore;
use crate::error::Result;
use crate::geometry::{self, GeometryReport};
use crate::models::Category;

/// Random source for archetype draws. Seeded runs are reproducible.
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub geometry: GeometryReport,
    pub assignments: Vec<AssignmentReport>,
    pub aggregation: AggregationReport,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Geometry ===")?;
        writeln!(
            f,
            "{} buildings, {} without internal wall estimate",
            self.geometry.buildings, self.geometry.without_int_walls
        )?;
        writeln!(f)?;
        writeln!(f, "=== Assignment ===")?;
        for report in &self.assignments {
            writeln!(f, "{}", report)?;
        }
        writeln!(f)?;
        write!(f, "{}", self.aggregation)
    }
}

/// Run every stage in order. A failing stage aborts the run; stages already
/// committed keep their output.
pub fn run_all(store: &mut dyn BuildingStore, cfg: &EstimatorConfig) -> Result<RunReport> {
    cfg.validate()?;
    let mut rng = make_rng(cfg.seed);

    info!(seed = ?cfg.seed, "Starting full run");
    let geometry = geometry::run_geometry_pass(store, cfg)?;
    let assignments = assignment::run_assignment_pass(store, &Category::ALL, &mut rng)?;
    let aggregation = calculator::calculate_material_quantities(store, cfg)?;

    Ok(RunReport {
        geometry,
        assignments,
        aggregation,
    })
}
