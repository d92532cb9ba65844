//! Demonstration catalog and building set

use tracing::info;

use crate::bom;
use crate::catalog::{RIDGE_BOARD, TOP_FLOOR_CEILING};
use crate::db::SqliteStore;
use crate::error::Result;
use crate::models::{
    BillOfMaterialsEdge, BuildingRecord, Category, ComponentArchetype, MaterialType, Product,
    Subcomponent, Unit,
};

const PRODUCTS: [(&str, &str, f64, MaterialType); 11] = [
    ("brick", "Solid clay brick", 1800.0, MaterialType::Clay),
    ("mortar", "Lime cement mortar", 1900.0, MaterialType::CementMortar),
    ("concrete", "Ready-mix concrete C25/30", 2400.0, MaterialType::Concrete),
    ("gravel", "Crushed gravel", 1700.0, MaterialType::Aggregates),
    ("gypsum", "Gypsum board", 900.0, MaterialType::GypsumPlaster),
    ("steel", "Structural steel", 7850.0, MaterialType::Metal),
    ("timber", "Sawn softwood", 500.0, MaterialType::Wood),
    ("wool", "Mineral wool", 30.0, MaterialType::Wool),
    ("glass", "Double glazing", 2500.0, MaterialType::Glass),
    ("felt", "Bitumen roofing felt", 1100.0, MaterialType::Other),
    ("foil", "PE vapour barrier", 920.0, MaterialType::Other),
];

// (id, category, name, codes, min_year, max_year, pitch window, subcomponent)
type ArchetypeRow = (
    i64,
    Category,
    &'static str,
    &'static [i32],
    i32,
    i32,
    Option<(f64, f64)>,
    &'static str,
);

const ARCHETYPES: [ArchetypeRow; 20] = [
    (1, Category::ExteriorWall, "Solid brick", &[1], 1850, 1930, None, "sc-solid-brick"),
    (2, Category::ExteriorWall, "Brick cavity wall", &[1], 1930, 1979, None, "sc-cavity"),
    (3, Category::ExteriorWall, "Insulated brick cavity", &[1], 1980, 2030, None, "sc-insulated-cavity"),
    (4, Category::ExteriorWall, "Concrete sandwich", &[2, 6], 1960, 2030, None, "sc-sandwich"),
    (5, Category::ExteriorWall, "Timber frame", &[4, 5], 1850, 2030, None, "sc-timber-frame"),
    (10, Category::RoofCover, "Clay tiles", &[5], 1850, 2030, None, "sc-clay-tiles"),
    (11, Category::RoofCover, "Bitumen felt", &[1, 2], 1900, 2030, None, "sc-felt"),
    (12, Category::RoofCover, "Steel sheet", &[6], 1960, 2030, None, "sc-steel-sheet"),
    (20, Category::RoofStructure, "Rafters", &[], 1850, 2030, Some((15.0, 60.0)), "sc-rafters"),
    (21, Category::RoofStructure, "Trusses", &[], 1960, 2030, Some((5.0, 45.0)), "sc-trusses"),
    (22, Category::RoofStructure, "Flat wood", &[], 1850, 2030, Some((0.0, 12.0)), "sc-flat-wood"),
    (23, Category::RoofStructure, "Flat concrete", &[], 1950, 2030, Some((0.0, 12.0)), "sc-flat-concrete"),
    (28, Category::RoofStructure, RIDGE_BOARD, &[], 1850, 2030, Some((0.0, 90.0)), "sc-ridge"),
    (29, Category::RoofStructure, TOP_FLOOR_CEILING, &[], 1850, 2030, Some((0.0, 90.0)), "sc-ceiling"),
    (30, Category::Floor, "Timber joist floor", &[], 1850, 1950, None, "sc-joist-floor"),
    (31, Category::Floor, "Hollow core slab", &[], 1950, 2030, None, "sc-hollow-core"),
    (40, Category::InteriorWall, "Brick partition", &[], 1850, 1960, None, "sc-brick-partition"),
    (41, Category::InteriorWall, "Gypsum stud wall", &[], 1960, 2030, None, "sc-stud-wall"),
    (50, Category::GroundSlab, "Concrete slab on gravel", &[], 1930, 2030, None, "sc-slab"),
    (60, Category::Foundation, "Strip foundation", &[], 1850, 2030, None, "sc-strip"),
];

pub const WINDOW_SUBCOMPONENT: (&str, &str) = ("sc-window", "Window - iBuildGreen");

// (subcomponent, product, amount per m2 (or m), unit)
const EDGES: [(&str, &str, f64, &str); 34] = [
    ("sc-solid-brick", "brick", 0.30, "M3"),
    ("sc-solid-brick", "mortar", 0.06, "M3"),
    ("sc-cavity", "brick", 0.20, "M3"),
    ("sc-cavity", "mortar", 0.04, "M3"),
    ("sc-cavity", "steel", 0.5, "KG"),
    ("sc-insulated-cavity", "brick", 0.20, "M3"),
    ("sc-insulated-cavity", "wool", 0.15, "M3"),
    ("sc-insulated-cavity", "foil", 1.0, "M2"),
    ("sc-sandwich", "concrete", 0.22, "M3"),
    ("sc-sandwich", "steel", 12.0, "KG"),
    ("sc-sandwich", "wool", 0.15, "M3"),
    ("sc-timber-frame", "timber", 0.05, "M3"),
    ("sc-timber-frame", "wool", 0.15, "M3"),
    ("sc-clay-tiles", "brick", 45.0, "KG"),
    ("sc-felt", "felt", 4.5, "KG"),
    ("sc-steel-sheet", "steel", 6.0, "KG"),
    ("sc-rafters", "timber", 0.03, "M3"),
    ("sc-trusses", "timber", 0.025, "M3"),
    ("sc-trusses", "steel", 0.3, "KG"),
    ("sc-flat-wood", "timber", 0.04, "M3"),
    ("sc-flat-concrete", "concrete", 0.2, "M3"),
    ("sc-ridge", "timber", 0.01, "M3"),
    ("sc-ceiling", "timber", 0.02, "M3"),
    ("sc-joist-floor", "timber", 0.04, "M3"),
    ("sc-hollow-core", "concrete", 0.12, "M3"),
    ("sc-brick-partition", "brick", 0.11, "M3"),
    ("sc-brick-partition", "mortar", 0.02, "M3"),
    ("sc-stud-wall", "gypsum", 20.0, "KG"),
    ("sc-stud-wall", "steel", 2.5, "KG"),
    ("sc-slab", "concrete", 0.1, "M3"),
    ("sc-slab", "gravel", 0.15, "M3"),
    ("sc-strip", "concrete", 0.08, "M3"),
    ("sc-strip", "9999", 3.0, "KG"),
    ("sc-window", "glass", 25.0, "KG"),
];

// (id, year, usage, footprint, total floor area, floors, facade code, roof code)
type BuildingRow = (
    &'static str,
    Option<i32>,
    Option<i32>,
    f64,
    Option<f64>,
    Option<i32>,
    Option<i32>,
    Option<i32>,
);

const BUILDINGS: [BuildingRow; 7] = [
    ("villa-1934", Some(1934), Some(120), 120.0, Some(180.0), Some(2), Some(1), Some(5)),
    ("terrace-1968", Some(1968), Some(130), 80.0, Some(160.0), Some(2), Some(1), Some(2)),
    ("flats-1975", Some(1975), Some(140), 600.0, Some(2400.0), Some(4), Some(6), Some(1)),
    ("office-2004", Some(2004), Some(320), 900.0, Some(3600.0), Some(4), Some(6), Some(6)),
    ("barn-1955", Some(1955), Some(213), 300.0, None, None, Some(5), Some(3)),
    ("cabin-1900", Some(1900), Some(510), 45.0, Some(45.0), Some(1), Some(5), Some(7)),
    ("unknown-year", None, Some(120), 95.0, Some(95.0), Some(1), Some(1), Some(5)),
];

/// Replace the catalog and buildings with the demonstration data set.
///
/// One edge deliberately points at a product id that is not in the catalog.
pub fn load_sample_data(store: &mut SqliteStore) -> Result<()> {
    for (id, name, density, material) in PRODUCTS {
        store.insert_product(&Product {
            id: id.to_string(),
            name: name.to_string(),
            density: Some(density),
            material_type: Some(material),
        })?;
    }

    store.insert_subcomponent(&Subcomponent {
        id: WINDOW_SUBCOMPONENT.0.to_string(),
        name: WINDOW_SUBCOMPONENT.1.to_string(),
    })?;

    for (id, category, name, codes, min_year, max_year, pitch, subcomponent) in ARCHETYPES {
        store.insert_archetype(&ComponentArchetype {
            id,
            category,
            name: name.to_string(),
            applicable_codes: codes.to_vec(),
            min_year,
            max_year,
            min_pitch: pitch.map(|p| p.0),
            max_pitch: pitch.map(|p| p.1),
        })?;
        store.insert_subcomponent(&Subcomponent {
            id: subcomponent.to_string(),
            name: name.to_string(),
        })?;
        store.link_subcomponent(id, subcomponent)?;
    }

    let edges: Vec<BillOfMaterialsEdge> = EDGES
        .iter()
        .enumerate()
        .map(|(i, (subcomponent, product, amount, unit))| BillOfMaterialsEdge {
            id: format!("edge-{:03}", i + 1),
            subcomponent_id: subcomponent.to_string(),
            product_id: product.to_string(),
            amount_per_unit: *amount,
            unit: Unit::from(*unit),
            lifespan: Some(60),
        })
        .collect();
    bom::import_bill_of_materials(store, &edges)?;

    for (id, year, usage, footprint, total, floors, facade, roof) in BUILDINGS {
        store.insert_building(&BuildingRecord {
            id: id.to_string(),
            construction_year: year,
            usage_code: usage,
            footprint_area: footprint,
            total_floor_area: total,
            floor_count: floors,
            facade_material_code: facade,
            roof_material_code: roof,
            geometry: None,
        })?;
    }

    info!(
        products = PRODUCTS.len(),
        archetypes = ARCHETYPES.len(),
        edges = edges.len(),
        buildings = BUILDINGS.len(),
        "Sample data loaded"
    );
    Ok(())
}
