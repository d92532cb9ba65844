//! Database schema and operations

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use crate::bom::MissingReferences;
use crate::error::Result;
use crate::models::{
    BillOfMaterialsEdge, BuildingComponentLink, BuildingRecord, Category, ComponentArchetype,
    DerivedGeometry, MaterialMassSummary, MaterialQuantity, MaterialType, Product, Subcomponent,
};

/// Stub names written for ids referenced by edges but absent from the catalog
pub const MISSING_SUBCOMPONENT: &str = "missing subcomponent";
pub const MISSING_PRODUCT: &str = "missing product";

/// The storage operations the estimation stages depend on.
///
/// Every `replace_*` and `upsert_*` call is one atomic unit: either the whole
/// batch is written or the previous contents are left untouched.
pub trait BuildingStore {
    fn get_all_buildings(&self) -> Result<Vec<BuildingRecord>>;

    /// Overwrite the derived geometry of the given buildings.
    fn upsert_building_geometry(&mut self, updates: &[(String, DerivedGeometry)]) -> Result<()>;

    fn get_archetypes(&self, category: Category) -> Result<Vec<ComponentArchetype>>;

    /// Delete every link of `category`, then write `links`.
    fn replace_component_links(
        &mut self,
        category: Category,
        links: &[BuildingComponentLink],
    ) -> Result<()>;

    fn get_component_links(&self) -> Result<Vec<BuildingComponentLink>>;

    /// Edges of every subcomponent making up an archetype.
    fn get_bill_of_materials(&self, archetype_id: i64) -> Result<Vec<BillOfMaterialsEdge>>;

    /// Edges of the subcomponent named `name`, or None if no such subcomponent exists.
    fn get_subcomponent_edges_by_name(&self, name: &str)
    -> Result<Option<Vec<BillOfMaterialsEdge>>>;

    fn get_all_edges(&self) -> Result<Vec<BillOfMaterialsEdge>>;

    fn get_subcomponent_ids(&self) -> Result<HashSet<String>>;

    fn get_products(&self) -> Result<Vec<Product>>;

    /// Insert placeholder rows for the given ids, leaving existing rows alone.
    fn insert_stub_entities(&mut self, missing: &MissingReferences) -> Result<()>;

    /// Insert stubs for `missing`, then replace every edge with `edges`.
    fn replace_bill_of_materials(
        &mut self,
        missing: &MissingReferences,
        edges: &[BillOfMaterialsEdge],
    ) -> Result<()>;

    /// Delete all quantity and summary rows, then write the new ones.
    fn replace_material_quantities(
        &mut self,
        quantities: &[MaterialQuantity],
        summaries: &[MaterialMassSummary],
    ) -> Result<()>;
}

/// Building store backed by a SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Insert or replace a building's register attributes.
    pub fn insert_building(&self, building: &BuildingRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO buildings (id, construction_year, usage_code, footprint_area, total_floor_area,
                                    floor_count, facade_material_code, roof_material_code)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                construction_year = excluded.construction_year,
                usage_code = excluded.usage_code,
                footprint_area = excluded.footprint_area,
                total_floor_area = excluded.total_floor_area,
                floor_count = excluded.floor_count,
                facade_material_code = excluded.facade_material_code,
                roof_material_code = excluded.roof_material_code",
            params![
                building.id,
                building.construction_year,
                building.usage_code,
                building.footprint_area,
                building.total_floor_area,
                building.floor_count,
                building.facade_material_code,
                building.roof_material_code,
            ],
        )?;
        Ok(())
    }

    pub fn get_building(&self, id: &str) -> Result<Option<BuildingRecord>> {
        let building = self
            .conn
            .query_row(
                &format!("SELECT {BUILDING_COLUMNS} FROM buildings WHERE id = ?1"),
                [id],
                building_from_row,
            )
            .optional()?;
        Ok(building)
    }

    /// Insert or replace an archetype together with its applicable codes.
    pub fn insert_archetype(&mut self, archetype: &ComponentArchetype) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO archetypes (id, category, name, min_year, max_year, min_pitch, max_pitch)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                archetype.id,
                archetype.category,
                archetype.name,
                archetype.min_year,
                archetype.max_year,
                archetype.min_pitch,
                archetype.max_pitch,
            ],
        )?;
        tx.execute("DELETE FROM archetype_codes WHERE archetype_id = ?1", [archetype.id])?;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO archetype_codes (archetype_id, code) VALUES (?1, ?2)")?;
            for code in &archetype.applicable_codes {
                stmt.execute(params![archetype.id, code])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_subcomponent(&self, subcomponent: &Subcomponent) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO subcomponents (id, name) VALUES (?1, ?2)",
            (&subcomponent.id, &subcomponent.name),
        )?;
        Ok(())
    }

    /// Record that an archetype is built from a subcomponent.
    pub fn link_subcomponent(&self, archetype_id: i64, subcomponent_id: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO archetype_subcomponents (archetype_id, subcomponent_id) VALUES (?1, ?2)",
            params![archetype_id, subcomponent_id],
        )?;
        Ok(())
    }

    pub fn insert_product(&self, product: &Product) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO products (id, name, density, material_type) VALUES (?1, ?2, ?3, ?4)",
            params![product.id, product.name, product.density, product.material_type],
        )?;
        Ok(())
    }

    pub fn get_material_quantities(&self, building_id: &str) -> Result<Vec<MaterialQuantity>> {
        let mut stmt = self.conn.prepare(
            "SELECT building_id, element, product_id, amount, unit
             FROM material_quantities
             WHERE building_id = ?1
             ORDER BY element, product_id",
        )?;

        let rows = stmt.query_map([building_id], |row| {
            Ok(MaterialQuantity {
                building_id: row.get(0)?,
                element: row.get(1)?,
                product_id: row.get(2)?,
                amount: row.get(3)?,
                unit: row.get(4)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Stored mass totals for one building, or None if it has no summary rows.
    pub fn get_mass_summary(&self, building_id: &str) -> Result<Option<MaterialMassSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT material_type, mass FROM material_mass_summary WHERE building_id = ?1",
        )?;

        let rows = stmt.query_map([building_id], |row| {
            Ok((row.get::<_, MaterialType>(0)?, row.get::<_, f64>(1)?))
        })?;

        let mut summary = MaterialMassSummary {
            building_id: building_id.to_string(),
            ..Default::default()
        };
        for row in rows {
            let (material, mass) = row?;
            summary.masses.insert(material, mass);
        }

        if summary.masses.is_empty() {
            Ok(None)
        } else {
            Ok(Some(summary))
        }
    }

    pub fn count_component_links(&self, category: Category) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM component_links WHERE category = ?1",
            [category],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Register attributes plus derived geometry
        CREATE TABLE IF NOT EXISTS buildings (
            id TEXT PRIMARY KEY,
            construction_year INTEGER,
            usage_code INTEGER,
            footprint_area REAL NOT NULL,
            total_floor_area REAL,
            floor_count INTEGER,
            facade_material_code INTEGER,
            roof_material_code INTEGER,
            perimeter REAL,
            roof_pitch REAL,
            roof_surface REAL,
            effective_height REAL,
            icomp REAL,
            int_wall_surface_lb REAL,
            int_wall_surface_nlb REAL
        );

        CREATE TABLE IF NOT EXISTS archetypes (
            id INTEGER PRIMARY KEY,
            category TEXT NOT NULL,
            name TEXT NOT NULL,
            min_year INTEGER NOT NULL,
            max_year INTEGER NOT NULL,
            min_pitch REAL,
            max_pitch REAL
        );

        -- Reported material codes an archetype fits
        CREATE TABLE IF NOT EXISTS archetype_codes (
            archetype_id INTEGER,
            code INTEGER,
            PRIMARY KEY (archetype_id, code)
        );

        CREATE TABLE IF NOT EXISTS subcomponents (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS archetype_subcomponents (
            archetype_id INTEGER,
            subcomponent_id TEXT,
            PRIMARY KEY (archetype_id, subcomponent_id)
        );

        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            density REAL,
            material_type TEXT
        );

        -- No foreign keys: imported edges may point at ids the catalog has dropped
        CREATE TABLE IF NOT EXISTS bom_edges (
            id TEXT PRIMARY KEY,
            subcomponent_id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            amount REAL NOT NULL,
            unit TEXT NOT NULL,
            lifespan INTEGER
        );

        CREATE TABLE IF NOT EXISTS component_links (
            building_id TEXT NOT NULL,
            category TEXT NOT NULL,
            role TEXT NOT NULL,
            archetype_id INTEGER,
            PRIMARY KEY (building_id, category, role)
        );

        CREATE TABLE IF NOT EXISTS material_quantities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            building_id TEXT NOT NULL,
            element TEXT NOT NULL,
            product_id TEXT NOT NULL,
            amount REAL NOT NULL,
            unit TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS material_mass_summary (
            building_id TEXT NOT NULL,
            material_type TEXT NOT NULL,
            mass REAL NOT NULL,
            PRIMARY KEY (building_id, material_type)
        );

        CREATE INDEX IF NOT EXISTS idx_archetypes_category ON archetypes(category);
        CREATE INDEX IF NOT EXISTS idx_bom_edges_subcomponent ON bom_edges(subcomponent_id);
        CREATE INDEX IF NOT EXISTS idx_material_quantities_building ON material_quantities(building_id);
        "#,
    )?;
    Ok(())
}

const BUILDING_COLUMNS: &str = "id, construction_year, usage_code, footprint_area, total_floor_area, \
     floor_count, facade_material_code, roof_material_code, perimeter, roof_pitch, roof_surface, \
     effective_height, icomp, int_wall_surface_lb, int_wall_surface_nlb";

fn building_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BuildingRecord> {
    let perimeter: Option<f64> = row.get(8)?;
    let geometry = match perimeter {
        Some(perimeter) => Some(DerivedGeometry {
            perimeter,
            roof_pitch: row.get(9)?,
            roof_surface: row.get(10)?,
            effective_height: row.get(11)?,
            icomp: row.get(12)?,
            int_wall_surface_lb: row.get(13)?,
            int_wall_surface_nlb: row.get(14)?,
        }),
        None => None,
    };

    Ok(BuildingRecord {
        id: row.get(0)?,
        construction_year: row.get(1)?,
        usage_code: row.get(2)?,
        footprint_area: row.get(3)?,
        total_floor_area: row.get(4)?,
        floor_count: row.get(5)?,
        facade_material_code: row.get(6)?,
        roof_material_code: row.get(7)?,
        geometry,
    })
}

fn edge_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BillOfMaterialsEdge> {
    Ok(BillOfMaterialsEdge {
        id: row.get(0)?,
        subcomponent_id: row.get(1)?,
        product_id: row.get(2)?,
        amount_per_unit: row.get(3)?,
        unit: row.get(4)?,
        lifespan: row.get(5)?,
    })
}

fn insert_stubs(conn: &Connection, missing: &MissingReferences) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO subcomponents (id, name) VALUES (?1, ?2)")?;
    for id in &missing.subcomponents {
        stmt.execute((id, MISSING_SUBCOMPONENT))?;
    }
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO products (id, name) VALUES (?1, ?2)")?;
    for id in &missing.products {
        stmt.execute((id, MISSING_PRODUCT))?;
    }
    Ok(())
}

impl BuildingStore for SqliteStore {
    fn get_all_buildings(&self) -> Result<Vec<BuildingRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {BUILDING_COLUMNS} FROM buildings ORDER BY id"))?;

        let rows = stmt.query_map([], building_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn upsert_building_geometry(&mut self, updates: &[(String, DerivedGeometry)]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE buildings
                 SET perimeter = ?2, roof_pitch = ?3, roof_surface = ?4, effective_height = ?5,
                     icomp = ?6, int_wall_surface_lb = ?7, int_wall_surface_nlb = ?8
                 WHERE id = ?1",
            )?;
            for (id, g) in updates {
                stmt.execute(params![
                    id,
                    g.perimeter,
                    g.roof_pitch,
                    g.roof_surface,
                    g.effective_height,
                    g.icomp,
                    g.int_wall_surface_lb,
                    g.int_wall_surface_nlb,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_archetypes(&self, category: Category) -> Result<Vec<ComponentArchetype>> {
        let mut codes: HashMap<i64, Vec<i32>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT c.archetype_id, c.code
                 FROM archetype_codes c
                 JOIN archetypes a ON a.id = c.archetype_id
                 WHERE a.category = ?1
                 ORDER BY c.code",
            )?;
            let rows = stmt.query_map([category], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i32>(1)?)))?;
            for row in rows {
                let (id, code) = row?;
                codes.entry(id).or_default().push(code);
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, category, name, min_year, max_year, min_pitch, max_pitch
             FROM archetypes
             WHERE category = ?1
             ORDER BY id",
        )?;

        let rows = stmt.query_map([category], |row| {
            Ok(ComponentArchetype {
                id: row.get(0)?,
                category: row.get(1)?,
                name: row.get(2)?,
                applicable_codes: Vec::new(),
                min_year: row.get(3)?,
                max_year: row.get(4)?,
                min_pitch: row.get(5)?,
                max_pitch: row.get(6)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            let mut archetype = row?;
            archetype.applicable_codes = codes.remove(&archetype.id).unwrap_or_default();
            results.push(archetype);
        }
        Ok(results)
    }

    fn replace_component_links(
        &mut self,
        category: Category,
        links: &[BuildingComponentLink],
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM component_links WHERE category = ?1", [category])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO component_links (building_id, category, role, archetype_id)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for link in links {
                stmt.execute(params![link.building_id, category, link.role, link.archetype_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_component_links(&self) -> Result<Vec<BuildingComponentLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT building_id, category, role, archetype_id
             FROM component_links
             ORDER BY building_id, category, role",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(BuildingComponentLink {
                building_id: row.get(0)?,
                category: row.get(1)?,
                role: row.get(2)?,
                archetype_id: row.get(3)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn get_bill_of_materials(&self, archetype_id: i64) -> Result<Vec<BillOfMaterialsEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.id, e.subcomponent_id, e.product_id, e.amount, e.unit, e.lifespan
             FROM bom_edges e
             JOIN archetype_subcomponents s ON s.subcomponent_id = e.subcomponent_id
             WHERE s.archetype_id = ?1
             ORDER BY e.id",
        )?;

        let rows = stmt.query_map([archetype_id], edge_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn get_subcomponent_edges_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Vec<BillOfMaterialsEdge>>> {
        let exists: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM subcomponents WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Ok(None);
        }

        let mut stmt = self.conn.prepare(
            "SELECT e.id, e.subcomponent_id, e.product_id, e.amount, e.unit, e.lifespan
             FROM bom_edges e
             JOIN subcomponents s ON s.id = e.subcomponent_id
             WHERE s.name = ?1
             ORDER BY e.id",
        )?;

        let rows = stmt.query_map([name], edge_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(Some(results))
    }

    fn get_all_edges(&self) -> Result<Vec<BillOfMaterialsEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subcomponent_id, product_id, amount, unit, lifespan FROM bom_edges ORDER BY id",
        )?;

        let rows = stmt.query_map([], edge_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn get_subcomponent_ids(&self) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM subcomponents")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut results = HashSet::new();
        for row in rows {
            results.insert(row?);
        }
        Ok(results)
    }

    fn get_products(&self) -> Result<Vec<Product>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, density, material_type FROM products ORDER BY id")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                Product {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    density: row.get(2)?,
                    material_type: None,
                },
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (mut product, material) = row?;
            product.material_type = match material {
                Some(raw) => match raw.parse::<MaterialType>() {
                    Ok(material) => Some(material),
                    Err(e) => {
                        warn!(product = %product.id, error = %e, "Treating product as 'other'");
                        Some(MaterialType::Other)
                    }
                },
                None => None,
            };
            results.push(product);
        }
        Ok(results)
    }

    fn insert_stub_entities(&mut self, missing: &MissingReferences) -> Result<()> {
        let tx = self.conn.transaction()?;
        insert_stubs(&tx, missing)?;
        tx.commit()?;
        Ok(())
    }

    fn replace_bill_of_materials(
        &mut self,
        missing: &MissingReferences,
        edges: &[BillOfMaterialsEdge],
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        insert_stubs(&tx, missing)?;
        tx.execute("DELETE FROM bom_edges", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO bom_edges (id, subcomponent_id, product_id, amount, unit, lifespan)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for edge in edges {
                stmt.execute(params![
                    edge.id,
                    edge.subcomponent_id,
                    edge.product_id,
                    edge.amount_per_unit,
                    edge.unit,
                    edge.lifespan,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn replace_material_quantities(
        &mut self,
        quantities: &[MaterialQuantity],
        summaries: &[MaterialMassSummary],
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            r#"
            DELETE FROM material_quantities;
            DELETE FROM material_mass_summary;
            "#,
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO material_quantities (building_id, element, product_id, amount, unit)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for q in quantities {
                stmt.execute(params![q.building_id, q.element, q.product_id, q.amount, q.unit])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO material_mass_summary (building_id, material_type, mass)
                 VALUES (?1, ?2, ?3)",
            )?;
            for summary in summaries {
                for (material, mass) in &summary.masses {
                    stmt.execute(params![summary.building_id, material, mass])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LinkRole, Unit};

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn link(building: &str, archetype: Option<i64>) -> BuildingComponentLink {
        BuildingComponentLink {
            building_id: building.to_string(),
            category: Category::Floor,
            role: LinkRole::Primary,
            archetype_id: archetype,
        }
    }

    #[test]
    fn test_schema_is_idempotent() {
        let s = store();
        init_schema(&s.conn).unwrap();
    }

    #[test]
    fn test_building_round_trip_without_geometry() {
        let s = store();
        let b = BuildingRecord {
            id: "b1".to_string(),
            construction_year: Some(1962),
            usage_code: Some(120),
            footprint_area: 140.0,
            floor_count: Some(2),
            ..Default::default()
        };
        s.insert_building(&b).unwrap();
        let loaded = s.get_building("b1").unwrap().unwrap();
        assert_eq!(loaded.construction_year, Some(1962));
        assert!(loaded.geometry.is_none());
        assert!(s.get_building("nope").unwrap().is_none());
    }

    #[test]
    fn test_archetype_codes_are_loaded() {
        let mut s = store();
        let a = ComponentArchetype {
            id: 7,
            category: Category::ExteriorWall,
            name: "Brick cavity".to_string(),
            applicable_codes: vec![1, 2],
            min_year: 1900,
            max_year: 1960,
            min_pitch: None,
            max_pitch: None,
        };
        s.insert_archetype(&a).unwrap();
        assert_eq!(s.get_archetypes(Category::ExteriorWall).unwrap(), vec![a]);
        assert!(s.get_archetypes(Category::Floor).unwrap().is_empty());
    }

    #[test]
    fn test_replace_component_links_drops_previous_batch() {
        let mut s = store();
        s.replace_component_links(Category::Floor, &[link("a", Some(1)), link("b", None)])
            .unwrap();
        s.replace_component_links(Category::Floor, &[link("a", Some(2)), link("b", Some(3))])
            .unwrap();
        assert_eq!(s.count_component_links(Category::Floor).unwrap(), 2);
        let links = s.get_component_links().unwrap();
        assert_eq!(links[0].archetype_id, Some(2));
    }

    #[test]
    fn test_failed_replace_keeps_previous_links() {
        let mut s = store();
        s.replace_component_links(Category::Floor, &[link("a", Some(1))]).unwrap();
        // Duplicate primary key aborts the whole batch
        let result = s.replace_component_links(Category::Floor, &[link("b", Some(2)), link("b", Some(2))]);
        assert!(result.is_err());
        let links = s.get_component_links().unwrap();
        assert_eq!(links, vec![link("a", Some(1))]);
    }

    #[test]
    fn test_failed_quantity_replace_keeps_previous_results() {
        use crate::models::Element;

        let quantity = |building: &str, amount: f64| MaterialQuantity {
            building_id: building.to_string(),
            element: Element::Foundation,
            product_id: "concrete".to_string(),
            amount,
            unit: Unit::Kilogram,
        };
        let summary = |building: &str, mass: f64| MaterialMassSummary {
            building_id: building.to_string(),
            masses: [(MaterialType::Concrete, mass)].into_iter().collect(),
        };

        let mut s = store();
        s.replace_material_quantities(&[quantity("a", 10.0)], &[summary("a", 10.0)])
            .unwrap();

        // Two summaries for one building collide on the primary key
        let result = s.replace_material_quantities(
            &[quantity("a", 99.0), quantity("b", 5.0)],
            &[summary("a", 99.0), summary("a", 99.0)],
        );
        assert!(result.is_err());

        assert_eq!(s.get_material_quantities("a").unwrap(), vec![quantity("a", 10.0)]);
        assert!(s.get_material_quantities("b").unwrap().is_empty());
        assert_eq!(s.get_mass_summary("a").unwrap(), Some(summary("a", 10.0)));
    }

    #[test]
    fn test_stub_insertion_keeps_existing_names() {
        let mut s = store();
        s.insert_product(&Product {
            id: "p1".to_string(),
            name: "Concrete C25".to_string(),
            density: Some(2400.0),
            material_type: Some(MaterialType::Concrete),
        })
        .unwrap();
        let missing = MissingReferences {
            subcomponents: vec!["s9".to_string()],
            products: vec!["p1".to_string(), "p9".to_string()],
        };
        s.insert_stub_entities(&missing).unwrap();

        let products = s.get_products().unwrap();
        assert_eq!(products[0].name, "Concrete C25");
        assert_eq!(products[1].name, MISSING_PRODUCT);
        assert!(s.get_subcomponent_ids().unwrap().contains("s9"));
    }

    #[test]
    fn test_window_edges_by_subcomponent_name() {
        let mut s = store();
        assert!(s.get_subcomponent_edges_by_name("Window").unwrap().is_none());

        s.insert_subcomponent(&Subcomponent {
            id: "w".to_string(),
            name: "Window".to_string(),
        })
        .unwrap();
        let edge = BillOfMaterialsEdge {
            id: "e1".to_string(),
            subcomponent_id: "w".to_string(),
            product_id: "glass".to_string(),
            amount_per_unit: 20.0,
            unit: Unit::Kilogram,
            lifespan: Some(30),
        };
        s.replace_bill_of_materials(&MissingReferences::default(), &[edge.clone()])
            .unwrap();
        assert_eq!(s.get_subcomponent_edges_by_name("Window").unwrap(), Some(vec![edge]));
    }
}
