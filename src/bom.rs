//! Bill-of-materials reference healing
//!
//! Edges come from an external authoring tool and can outlive the products
//! or subcomponents they point at. Rather than rejecting such edges, the
//! missing ends are materialized as placeholder rows so the edge itself
//! survives intact.

use std::collections::{BTreeSet, HashSet};

use tracing::warn;

use crate::db::BuildingStore;
use crate::error::Result;
use crate::models::BillOfMaterialsEdge;

/// Ids referenced by edges but absent from the current catalog snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingReferences {
    pub subcomponents: Vec<String>,
    pub products: Vec<String>,
}

impl MissingReferences {
    pub fn is_empty(&self) -> bool {
        self.subcomponents.is_empty() && self.products.is_empty()
    }
}

/// Collect the dangling ends of `edges`, each id reported once, in id order.
pub fn find_missing(
    edges: &[BillOfMaterialsEdge],
    subcomponent_ids: &HashSet<String>,
    product_ids: &HashSet<String>,
) -> MissingReferences {
    let mut subcomponents = BTreeSet::new();
    let mut products = BTreeSet::new();

    for edge in edges {
        if !subcomponent_ids.contains(&edge.subcomponent_id) {
            subcomponents.insert(edge.subcomponent_id.clone());
        }
        if !product_ids.contains(&edge.product_id) {
            products.insert(edge.product_id.clone());
        }
    }

    MissingReferences {
        subcomponents: subcomponents.into_iter().collect(),
        products: products.into_iter().collect(),
    }
}

fn snapshot_missing(
    store: &dyn BuildingStore,
    edges: &[BillOfMaterialsEdge],
) -> Result<MissingReferences> {
    let subcomponent_ids = store.get_subcomponent_ids()?;
    let product_ids: HashSet<String> = store.get_products()?.into_iter().map(|p| p.id).collect();
    Ok(find_missing(edges, &subcomponent_ids, &product_ids))
}

fn log_missing(missing: &MissingReferences) {
    for id in &missing.subcomponents {
        warn!(subcomponent = %id, "Edge references unknown subcomponent, inserting stub");
    }
    for id in &missing.products {
        warn!(product = %id, "Edge references unknown product, inserting stub");
    }
}

/// Replace the stored edges with `edges`, stubbing any dangling reference first.
pub fn import_bill_of_materials(
    store: &mut dyn BuildingStore,
    edges: &[BillOfMaterialsEdge],
) -> Result<MissingReferences> {
    let missing = snapshot_missing(store, edges)?;
    log_missing(&missing);
    store.replace_bill_of_materials(&missing, edges)?;
    Ok(missing)
}

/// Stub every dangling reference among the stored edges.
pub fn heal_references(store: &mut dyn BuildingStore) -> Result<MissingReferences> {
    let edges = store.get_all_edges()?;
    let missing = snapshot_missing(store, &edges)?;
    if !missing.is_empty() {
        log_missing(&missing);
        store.insert_stub_entities(&missing)?;
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MISSING_PRODUCT, MISSING_SUBCOMPONENT, SqliteStore};
    use crate::models::{Product, Subcomponent, Unit};

    fn edge(id: &str, sub: &str, product: &str) -> BillOfMaterialsEdge {
        BillOfMaterialsEdge {
            id: id.to_string(),
            subcomponent_id: sub.to_string(),
            product_id: product.to_string(),
            amount_per_unit: 1.0,
            unit: Unit::Kilogram,
            lifespan: None,
        }
    }

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_find_missing_deduplicates() {
        let edges = [edge("e1", "s1", "p1"), edge("e2", "s2", "p2"), edge("e3", "s2", "p2")];
        let missing = find_missing(&edges, &ids(&["s1"]), &ids(&["p1"]));
        assert_eq!(missing.subcomponents, vec!["s2".to_string()]);
        assert_eq!(missing.products, vec!["p2".to_string()]);
    }

    #[test]
    fn test_nothing_missing() {
        let edges = [edge("e1", "s1", "p1")];
        assert!(find_missing(&edges, &ids(&["s1"]), &ids(&["p1"])).is_empty());
    }

    #[test]
    fn test_import_keeps_dangling_edges() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_subcomponent(&Subcomponent {
                id: "s1".to_string(),
                name: "Brick wall".to_string(),
            })
            .unwrap();
        store
            .insert_product(&Product {
                id: "p1".to_string(),
                name: "Brick".to_string(),
                density: Some(1800.0),
                material_type: None,
            })
            .unwrap();

        let edges = vec![edge("e1", "s1", "p1"), edge("e2", "s1", "9999"), edge("e3", "s7", "p1")];
        let missing = import_bill_of_materials(&mut store, &edges).unwrap();

        assert_eq!(missing.products, vec!["9999".to_string()]);
        assert_eq!(missing.subcomponents, vec!["s7".to_string()]);
        assert_eq!(store.get_all_edges().unwrap(), edges);

        let stub = store
            .get_products()
            .unwrap()
            .into_iter()
            .find(|p| p.id == "9999")
            .unwrap();
        assert_eq!(stub.name, MISSING_PRODUCT);
        assert!(store.get_subcomponent_ids().unwrap().contains("s7"));
        assert_ne!(MISSING_SUBCOMPONENT, MISSING_PRODUCT);
    }

    #[test]
    fn test_heal_is_noop_when_consistent() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert!(heal_references(&mut store).unwrap().is_empty());
    }
}
