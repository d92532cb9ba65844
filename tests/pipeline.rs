use std::collections::HashMap;

use stockmass::assignment;
use stockmass::bom::MissingReferences;
use stockmass::calculator;
use stockmass::catalog::ArchetypeCatalog;
use stockmass::config::EstimatorConfig;
use stockmass::db::{BuildingStore, MISSING_PRODUCT, SqliteStore};
use stockmass::geometry;
use stockmass::models::{
    BillOfMaterialsEdge, BuildingComponentLink, BuildingRecord, Category, ComponentArchetype,
    LinkRole, MaterialType, Product, Subcomponent, Unit,
};
use stockmass::pipeline;
use stockmass::sample;

fn seeded_config(seed: u64) -> EstimatorConfig {
    EstimatorConfig {
        seed: Some(seed),
        ..Default::default()
    }
}

fn sample_store() -> SqliteStore {
    let mut store = SqliteStore::open_in_memory().unwrap();
    sample::load_sample_data(&mut store).unwrap();
    store
}

fn primary_links(store: &SqliteStore) -> Vec<BuildingComponentLink> {
    store
        .get_component_links()
        .unwrap()
        .into_iter()
        .filter(|l| l.role == LinkRole::Primary)
        .collect()
}

#[test]
fn test_full_run_writes_one_primary_link_per_building_and_category() {
    let mut store = sample_store();
    let cfg = seeded_config(11);
    pipeline::run_all(&mut store, &cfg).unwrap();
    pipeline::run_all(&mut store, &cfg).unwrap();

    let buildings = store.get_all_buildings().unwrap();
    let links = primary_links(&store);
    assert_eq!(links.len(), buildings.len() * Category::ALL.len());

    let mut seen: HashMap<(String, Category), usize> = HashMap::new();
    for link in &links {
        *seen.entry((link.building_id.clone(), link.category)).or_default() += 1;
    }
    assert!(seen.values().all(|&n| n == 1));
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let mut first = sample_store();
    let mut second = sample_store();
    pipeline::run_all(&mut first, &seeded_config(5)).unwrap();
    pipeline::run_all(&mut second, &seeded_config(5)).unwrap();
    assert_eq!(first.get_component_links().unwrap(), second.get_component_links().unwrap());
}

#[test]
fn test_missing_construction_year_gives_null_links() {
    let mut store = sample_store();
    pipeline::run_all(&mut store, &seeded_config(3)).unwrap();

    let links: Vec<_> = store
        .get_component_links()
        .unwrap()
        .into_iter()
        .filter(|l| l.building_id == "unknown-year")
        .collect();
    assert_eq!(links.len(), Category::ALL.len());
    assert!(links.iter().all(|l| l.archetype_id.is_none()));
}

#[test]
fn test_assigned_archetypes_are_in_period_when_possible() {
    let mut store = sample_store();
    pipeline::run_all(&mut store, &seeded_config(21)).unwrap();

    let catalog = ArchetypeCatalog::load(&store).unwrap();
    let buildings: HashMap<String, BuildingRecord> = store
        .get_all_buildings()
        .unwrap()
        .into_iter()
        .map(|b| (b.id.clone(), b))
        .collect();

    for link in primary_links(&store) {
        let building = &buildings[&link.building_id];
        let Some(year) = building.construction_year else {
            continue;
        };
        let pool = assignment::candidate_pool(
            catalog.archetypes_of(link.category),
            assignment::Applicability::for_category(link.category),
            building,
        );
        let any_valid = pool.iter().any(|a| a.min_year <= year && year <= a.max_year);
        if any_valid {
            let chosen = catalog.get(link.archetype_id.unwrap()).unwrap();
            assert!(
                chosen.min_year <= year && year <= chosen.max_year,
                "{} {} got {}",
                link.building_id,
                link.category,
                chosen.name
            );
        }
    }
}

#[test]
fn test_pitched_roofs_get_ridge_board_and_ceiling() {
    let mut store = sample_store();
    pipeline::run_all(&mut store, &seeded_config(8)).unwrap();

    // Clay tiles at 40 degrees only fit rafters or trusses
    let roles: Vec<LinkRole> = store
        .get_component_links()
        .unwrap()
        .into_iter()
        .filter(|l| l.building_id == "villa-1934" && l.category == Category::RoofStructure)
        .map(|l| l.role)
        .collect();
    assert_eq!(
        roles,
        vec![LinkRole::Primary, LinkRole::RidgeBoard, LinkRole::TopFloorCeiling]
    );

    // Flat felt roof gets neither
    let flat: Vec<_> = store
        .get_component_links()
        .unwrap()
        .into_iter()
        .filter(|l| l.building_id == "flats-1975" && l.category == Category::RoofStructure)
        .collect();
    assert_eq!(flat.len(), 1);
}

#[test]
fn test_geometry_pass_is_idempotent() {
    let mut store = sample_store();
    let cfg = EstimatorConfig::default();
    geometry::run_geometry_pass(&mut store, &cfg).unwrap();
    let first = store.get_all_buildings().unwrap();
    geometry::run_geometry_pass(&mut store, &cfg).unwrap();
    assert_eq!(
        first.iter().map(|b| b.geometry).collect::<Vec<_>>(),
        store.get_all_buildings().unwrap().iter().map(|b| b.geometry).collect::<Vec<_>>()
    );
}

#[test]
fn test_utility_building_internal_walls() {
    let mut store = sample_store();
    geometry::run_geometry_pass(&mut store, &EstimatorConfig::default()).unwrap();
    let barn = store.get_building("barn-1955").unwrap().unwrap();
    let g = barn.geometry.unwrap();
    assert!((g.int_wall_surface_lb.unwrap() - 30.0).abs() < 1e-9);
    assert!((g.int_wall_surface_nlb.unwrap() - 45.0).abs() < 1e-9);
    assert_eq!(g.roof_pitch, 40.0);
}

#[test]
fn test_mass_summary_matches_reconciled_quantities() {
    let mut store = sample_store();
    pipeline::run_all(&mut store, &seeded_config(13)).unwrap();

    let products: HashMap<String, Product> = store
        .get_products()
        .unwrap()
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect();

    for building in store.get_all_buildings().unwrap() {
        let quantities = store.get_material_quantities(&building.id).unwrap();
        let reconciled: f64 = quantities
            .iter()
            .filter_map(|q| calculator::reconcile_mass(q, products.get(&q.product_id)))
            .sum();
        let summarized = store
            .get_mass_summary(&building.id)
            .unwrap()
            .map(|s| s.total())
            .unwrap_or(0.0);
        assert!(
            (reconciled - summarized).abs() <= 1e-6 * reconciled.max(1.0),
            "{}: {} vs {}",
            building.id,
            reconciled,
            summarized
        );
    }

    // Every building has glazing, even without an assigned facade
    let unknown = store.get_mass_summary("unknown-year").unwrap().unwrap();
    assert!(unknown.mass_of(MaterialType::Glass) > 0.0);
    assert_eq!(unknown.mass_of(MaterialType::Concrete), 0.0);
}

#[test]
fn test_aggregation_replaces_previous_results() {
    let mut store = sample_store();
    let cfg = seeded_config(2);
    pipeline::run_all(&mut store, &cfg).unwrap();
    let before = store.get_material_quantities("office-2004").unwrap().len();
    calculator::calculate_material_quantities(&mut store, &cfg).unwrap();
    assert_eq!(store.get_material_quantities("office-2004").unwrap().len(), before);
}

#[test]
fn test_aggregation_stubs_dangling_product() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    store
        .insert_building(&BuildingRecord {
            id: "b1".to_string(),
            construction_year: Some(1990),
            usage_code: Some(120),
            footprint_area: 100.0,
            ..Default::default()
        })
        .unwrap();
    store
        .insert_archetype(&ComponentArchetype {
            id: 1,
            category: Category::Foundation,
            name: "Strip foundation".to_string(),
            applicable_codes: Vec::new(),
            min_year: 1900,
            max_year: 2030,
            min_pitch: None,
            max_pitch: None,
        })
        .unwrap();
    store
        .insert_subcomponent(&Subcomponent {
            id: "s1".to_string(),
            name: "Strip".to_string(),
        })
        .unwrap();
    store.link_subcomponent(1, "s1").unwrap();

    // Written without healing, as a drifting external import would leave it
    let edge = BillOfMaterialsEdge {
        id: "e1".to_string(),
        subcomponent_id: "s1".to_string(),
        product_id: "9999".to_string(),
        amount_per_unit: 2.0,
        unit: Unit::Kilogram,
        lifespan: None,
    };
    store
        .replace_bill_of_materials(&MissingReferences::default(), &[edge.clone()])
        .unwrap();

    let cfg = seeded_config(1);
    let report = pipeline::run_all(&mut store, &cfg).unwrap();
    assert_eq!(report.aggregation.stub_products, 1);

    let stub = store
        .get_products()
        .unwrap()
        .into_iter()
        .find(|p| p.id == "9999")
        .unwrap();
    assert_eq!(stub.name, MISSING_PRODUCT);
    assert_eq!(store.get_all_edges().unwrap(), vec![edge]);

    // The stub has no material type, so its kilograms land in "other"
    let summary = store.get_mass_summary("b1").unwrap().unwrap();
    assert!((summary.mass_of(MaterialType::Other) - 200.0).abs() < 1e-9);
}

#[test]
fn test_results_survive_reopening_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stock.db");
    {
        let mut store = SqliteStore::open(&path).unwrap();
        sample::load_sample_data(&mut store).unwrap();
        pipeline::run_all(&mut store, &seeded_config(4)).unwrap();
    }
    let store = SqliteStore::open(&path).unwrap();
    let summary = store.get_mass_summary("villa-1934").unwrap().unwrap();
    assert!(summary.total() > 0.0);
    assert!(summary.mass_of(MaterialType::Clay) > 0.0);
}
