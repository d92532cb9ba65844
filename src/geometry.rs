//! Geometry estimation from register attributes
//!
//! Everything here is a pure function of a building's reported attributes
//! and the estimator constants. The pass at the bottom recomputes every
//! building and overwrites whatever was stored before.

use tracing::{debug, info};

use crate::config::EstimatorConfig;
use crate::db::BuildingStore;
use crate::error::Result;
use crate::models::{BuildingRecord, DerivedGeometry};

/// Usage codes whose internal wall area scales linearly with floor area
const BUCKET_A_CODES: [i32; 18] = [
    110, 120, 121, 122, 130, 131, 132, 325, 510, 520, 521, 522, 523, 529, 530, 540, 585, 590,
];

const BUCKET_B_CODES: [i32; 23] = [
    140, 150, 160, 185, 190, 320, 321, 322, 324, 329, 390, 410, 411, 412, 413, 414, 415, 419, 531,
    532, 533, 534, 539,
];

const BUCKET_C_CODES: [i32; 3] = [323, 416, 535];

/// Internal wall regression bucket for a usage code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageBucket {
    /// Housing and institutions
    A,
    /// Commerce, offices, industry
    B,
    /// Agricultural and utility buildings
    C,
}

pub fn usage_bucket(usage_code: Option<i32>) -> Option<UsageBucket> {
    let code = usage_code?;
    if BUCKET_A_CODES.contains(&code) {
        Some(UsageBucket::A)
    } else if BUCKET_B_CODES.contains(&code) || (420..490).contains(&code) {
        Some(UsageBucket::B)
    } else if (210..319).contains(&code) || BUCKET_C_CODES.contains(&code) {
        Some(UsageBucket::C)
    } else {
        None
    }
}

/// Storey count, treating a reported zero as unknown.
fn storeys(building: &BuildingRecord) -> Option<i32> {
    building.floor_count.filter(|&n| n > 0)
}

/// Gross floor area summed over storeys, falling back to the footprint.
pub fn floor_area(building: &BuildingRecord) -> f64 {
    building.total_floor_area.unwrap_or(building.footprint_area)
}

/// Area of one storey.
pub fn side_area(building: &BuildingRecord) -> f64 {
    match (building.total_floor_area, storeys(building)) {
        (Some(total), Some(n)) => total / f64::from(n),
        _ => building.footprint_area,
    }
}

/// Perimeter of a rectangular plan of the storey area, elongated by `space_efficiency`.
pub fn perimeter(building: &BuildingRecord, space_efficiency: f64) -> f64 {
    2.0 * side_area(building).sqrt() * (space_efficiency + 1.0 / space_efficiency)
}

/// Roof pitch in degrees guessed from the reported roof cover material.
pub fn roof_pitch(roof_material_code: Option<i32>) -> f64 {
    match roof_material_code {
        Some(2 | 6) => 10.0,
        Some(3 | 5 | 10) => 40.0,
        Some(4 | 90) => 35.0,
        Some(7) => 20.0,
        _ => 1.0,
    }
}

pub fn roof_surface(footprint_area: f64, pitch_degrees: f64) -> f64 {
    footprint_area / pitch_degrees.to_radians().cos()
}

pub fn effective_height(building: &BuildingRecord, floor_height: f64) -> f64 {
    match storeys(building) {
        Some(n) => floor_height * f64::from(n),
        None => floor_height,
    }
}

pub fn volume(building: &BuildingRecord, floor_height: f64) -> f64 {
    floor_height * floor_area(building)
}

pub fn external_surface(building: &BuildingRecord, cfg: &EstimatorConfig) -> f64 {
    building.footprint_area
        + perimeter(building, cfg.space_efficiency)
            * effective_height(building, cfg.default_floor_height)
}

/// Compactness index: envelope area over volume^(2/3). None for empty volumes.
pub fn compactness_index(building: &BuildingRecord, cfg: &EstimatorConfig) -> Option<f64> {
    let volume = volume(building, cfg.default_floor_height);
    if volume <= 0.0 {
        return None;
    }
    Some(external_surface(building, cfg) / volume.powf(2.0 / 3.0))
}

/// Load-bearing internal wall area.
pub fn int_wall_surface_lb(building: &BuildingRecord) -> Option<f64> {
    let area = floor_area(building);
    match usage_bucket(building.usage_code)? {
        UsageBucket::A => Some(0.222 * area),
        UsageBucket::B => Some(area * (0.4063 + 0.00003489 * area)),
        UsageBucket::C => Some(area * 0.1),
    }
}

/// Non-load-bearing internal wall area. Bucket B needs a compactness index.
pub fn int_wall_surface_nlb(building: &BuildingRecord, icomp: Option<f64>) -> Option<f64> {
    let area = floor_area(building);
    match usage_bucket(building.usage_code)? {
        UsageBucket::A => Some(0.37 * area),
        UsageBucket::B => icomp.map(|ic| area * (0.1803 + 0.0883 * ic)),
        UsageBucket::C => Some(area * 0.15),
    }
}

pub fn estimate(building: &BuildingRecord, cfg: &EstimatorConfig) -> DerivedGeometry {
    let pitch = roof_pitch(building.roof_material_code);
    let icomp = compactness_index(building, cfg);

    DerivedGeometry {
        perimeter: perimeter(building, cfg.space_efficiency),
        roof_pitch: pitch,
        roof_surface: roof_surface(building.footprint_area, pitch),
        effective_height: effective_height(building, cfg.default_floor_height),
        icomp,
        int_wall_surface_lb: int_wall_surface_lb(building),
        int_wall_surface_nlb: int_wall_surface_nlb(building, icomp),
    }
}

/// Outcome of a geometry pass
#[derive(Debug, Default)]
pub struct GeometryReport {
    pub buildings: usize,
    pub without_int_walls: usize,
}

/// Recompute derived geometry for every building and write it back in one batch.
pub fn run_geometry_pass(store: &mut dyn BuildingStore, cfg: &EstimatorConfig) -> Result<GeometryReport> {
    let buildings = store.get_all_buildings()?;
    let mut report = GeometryReport::default();

    let updates: Vec<(String, DerivedGeometry)> = buildings
        .iter()
        .map(|b| {
            let derived = estimate(b, cfg);
            if derived.int_wall_surface_lb.is_none() || derived.int_wall_surface_nlb.is_none() {
                debug!(building = %b.id, usage_code = ?b.usage_code, "No internal wall estimate");
                report.without_int_walls += 1;
            }
            (b.id.clone(), derived)
        })
        .collect();

    store.upsert_building_geometry(&updates)?;
    report.buildings = updates.len();

    info!(
        buildings = report.buildings,
        without_int_walls = report.without_int_walls,
        "Geometry pass complete"
    );
    Ok(report)
}
