//! Material quantity calculation
//!
//! Expands every assigned archetype into product quantities scaled by a
//! geometric driver for its building element, then rolls the quantities up
//! into mass per material category.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::{debug, info, warn};

use crate::bom;
use crate::config::EstimatorConfig;
use crate::db::BuildingStore;
use crate::error::Result;
use crate::geometry;
use crate::models::{
    BillOfMaterialsEdge, BuildingComponentLink, BuildingRecord, DerivedGeometry, Element,
    MaterialMassSummary, MaterialQuantity, MaterialType, Product, ResultLine, Unit,
};

/// Amount of building element (m2, or m for ridge boards) one unit of bill of materials covers.
pub fn driver(
    element: Element,
    building: &BuildingRecord,
    geometry: &DerivedGeometry,
    cfg: &EstimatorConfig,
) -> Option<f64> {
    let facade = geometry.perimeter * geometry.effective_height;
    let footprint = building.footprint_area;

    match element {
        Element::ExteriorWall => Some(facade * (1.0 - cfg.window_wall_ratio)),
        Element::Window => Some(facade * cfg.window_wall_ratio),
        Element::InteriorWall => {
            Some(geometry.int_wall_surface_lb? + geometry.int_wall_surface_nlb?)
        }
        Element::RoofCover | Element::RoofStructure => Some(geometry.roof_surface),
        Element::RidgeBoard => Some(footprint.sqrt() * cfg.space_efficiency),
        Element::TopFloorCeiling => Some(footprint),
        Element::Floor => Some(match building.floor_count {
            Some(n) if n > 1 => footprint * f64::from(n - 1),
            _ => 0.0,
        }),
        Element::Foundation | Element::GroundSlab => Some(footprint),
    }
}

/// Product quantities for one element of one building.
pub fn expand(
    building_id: &str,
    element: Element,
    driver: f64,
    edges: &[BillOfMaterialsEdge],
) -> Vec<MaterialQuantity> {
    edges
        .iter()
        .map(|edge| MaterialQuantity {
            building_id: building_id.to_string(),
            element,
            product_id: edge.product_id.clone(),
            amount: driver * edge.amount_per_unit,
            unit: edge.unit.clone(),
        })
        .collect()
}

/// Mass in kg of a quantity, or None when its unit cannot be converted.
pub fn reconcile_mass(quantity: &MaterialQuantity, product: Option<&Product>) -> Option<f64> {
    match quantity.unit {
        Unit::Kilogram => Some(quantity.amount),
        Unit::CubicMetre => product?.density.map(|density| quantity.amount * density),
        Unit::Other(_) => None,
    }
}

fn material_of(product: Option<&Product>) -> MaterialType {
    product
        .and_then(|p| p.material_type)
        .unwrap_or(MaterialType::Other)
}

/// Sum reconciled masses by material category.
///
/// Returns the summary and the number of quantities left out because their
/// unit could not be converted to mass.
pub fn summarize(
    building_id: &str,
    quantities: &[MaterialQuantity],
    products: &HashMap<String, Product>,
) -> (MaterialMassSummary, usize) {
    let mut summary = MaterialMassSummary {
        building_id: building_id.to_string(),
        ..Default::default()
    };
    let mut unreconciled = 0;

    for quantity in quantities {
        let product = products.get(&quantity.product_id);
        match reconcile_mass(quantity, product) {
            Some(mass) => *summary.masses.entry(material_of(product)).or_default() += mass,
            None => unreconciled += 1,
        }
    }

    (summary, unreconciled)
}

/// Per-product view of a building's quantities.
pub fn result_lines(
    quantities: &[MaterialQuantity],
    products: &HashMap<String, Product>,
) -> Vec<ResultLine> {
    let mut lines: Vec<ResultLine> = quantities
        .iter()
        .map(|q| {
            let product = products.get(&q.product_id);
            ResultLine {
                element: q.element,
                product_name: product
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| q.product_id.clone()),
                mass: reconcile_mass(q, product),
                material_type: product.and_then(|p| p.material_type),
            }
        })
        .collect();
    lines.sort_by(|a, b| a.element.cmp(&b.element));
    lines
}

/// Outcome of an aggregation pass
#[derive(Debug, Default)]
pub struct AggregationReport {
    pub buildings: usize,
    pub quantities: usize,
    pub unreconciled: usize,
    pub stub_subcomponents: usize,
    pub stub_products: usize,
    pub geometry_recomputed: usize,
    pub total_mass: f64,
}

impl fmt::Display for AggregationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Aggregation Summary ===")?;
        writeln!(f, "Buildings:           {}", self.buildings)?;
        writeln!(f, "Product quantities:  {}", self.quantities)?;
        writeln!(f, "Unreconciled units:  {}", self.unreconciled)?;
        writeln!(
            f,
            "Stubs inserted:      {} subcomponents, {} products",
            self.stub_subcomponents, self.stub_products
        )?;
        if self.geometry_recomputed > 0 {
            writeln!(f, "Geometry recomputed: {}", self.geometry_recomputed)?;
        }
        writeln!(f, "Total mass:          {:.0} kg", self.total_mass)?;
        Ok(())
    }
}

/// Recompute every product quantity and mass summary from the stored links.
pub fn calculate_material_quantities(
    store: &mut dyn BuildingStore,
    cfg: &EstimatorConfig,
) -> Result<AggregationReport> {
    let mut report = AggregationReport::default();

    let healed = bom::heal_references(store)?;
    report.stub_subcomponents = healed.subcomponents.len();
    report.stub_products = healed.products.len();

    let products: HashMap<String, Product> = store
        .get_products()?
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect();

    let buildings = store.get_all_buildings()?;

    let mut links_by_building: HashMap<String, Vec<BuildingComponentLink>> = HashMap::new();
    for link in store.get_component_links()? {
        links_by_building
            .entry(link.building_id.clone())
            .or_default()
            .push(link);
    }

    let window_edges = match store.get_subcomponent_edges_by_name(&cfg.window_subcomponent)? {
        Some(edges) => edges,
        None => {
            warn!(subcomponent = %cfg.window_subcomponent, "Glazing subcomponent not found, windows omitted");
            Vec::new()
        }
    };

    let mut bill_cache: HashMap<i64, Vec<BillOfMaterialsEdge>> = HashMap::new();
    let mut quantities = Vec::new();
    let mut summaries = Vec::new();
    let mut gaps: BTreeMap<(String, String), usize> = BTreeMap::new();

    for building in &buildings {
        let geometry = match building.geometry {
            Some(g) => g,
            None => {
                report.geometry_recomputed += 1;
                geometry::estimate(building, cfg)
            }
        };

        let mut building_quantities = Vec::new();
        if let Some(d) = driver(Element::Window, building, &geometry, cfg) {
            building_quantities.extend(expand(&building.id, Element::Window, d, &window_edges));
        }

        for link in links_by_building.get(&building.id).into_iter().flatten() {
            let Some(archetype_id) = link.archetype_id else {
                continue;
            };
            let element = Element::for_link(link.category, link.role);
            let Some(d) = driver(element, building, &geometry, cfg) else {
                debug!(building = %building.id, element = %element, "No driver quantity, element skipped");
                continue;
            };

            if !bill_cache.contains_key(&archetype_id) {
                let edges = store.get_bill_of_materials(archetype_id)?;
                bill_cache.insert(archetype_id, edges);
            }
            building_quantities.extend(expand(&building.id, element, d, &bill_cache[&archetype_id]));
        }

        let (summary, unreconciled) = summarize(&building.id, &building_quantities, &products);
        if unreconciled > 0 {
            for q in &building_quantities {
                if reconcile_mass(q, products.get(&q.product_id)).is_none() {
                    *gaps
                        .entry((q.product_id.clone(), q.unit.as_str().to_string()))
                        .or_default() += 1;
                }
            }
        }

        report.unreconciled += unreconciled;
        report.total_mass += summary.total();
        report.quantities += building_quantities.len();
        quantities.extend(building_quantities);
        if !summary.masses.is_empty() {
            summaries.push(summary);
        }
    }

    for ((product, unit), count) in &gaps {
        warn!(product = %product, unit = %unit, count, "Quantity cannot be converted to mass, left out of summary");
    }

    store.replace_material_quantities(&quantities, &summaries)?;
    report.buildings = buildings.len();

    info!(
        buildings = report.buildings,
        quantities = report.quantities,
        unreconciled = report.unreconciled,
        total_mass_kg = report.total_mass,
        "Aggregation pass complete"
    );
    Ok(report)
}
