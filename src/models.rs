//! Data models for buildings, archetypes and material results

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use crate::error::ParseEnumError;

/// A building as reported in the cadastral register, plus the geometry
/// derived for it by the estimator.
#[derive(Debug, Clone, Default)]
pub struct BuildingRecord {
    pub id: String,
    pub construction_year: Option<i32>,
    pub usage_code: Option<i32>,
    pub footprint_area: f64,
    pub total_floor_area: Option<f64>,
    pub floor_count: Option<i32>,
    pub facade_material_code: Option<i32>,
    pub roof_material_code: Option<i32>,
    pub geometry: Option<DerivedGeometry>,
}

/// Quantities estimated from the register attributes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DerivedGeometry {
    pub perimeter: f64,
    pub roof_pitch: f64, // degrees
    pub roof_surface: f64,
    pub effective_height: f64,
    pub icomp: Option<f64>,
    pub int_wall_surface_lb: Option<f64>,
    pub int_wall_surface_nlb: Option<f64>,
}

/// Component categories an archetype can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    ExteriorWall,
    RoofCover,
    RoofStructure,
    Floor,
    InteriorWall,
    GroundSlab,
    Foundation,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::ExteriorWall,
        Category::RoofCover,
        Category::RoofStructure,
        Category::Floor,
        Category::InteriorWall,
        Category::GroundSlab,
        Category::Foundation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::ExteriorWall => "ext_wall",
            Category::RoofCover => "roof_cover",
            Category::RoofStructure => "roof_structure",
            Category::Floor => "floor",
            Category::InteriorWall => "int_wall",
            Category::GroundSlab => "ground_slab",
            Category::Foundation => "foundation",
        }
    }
}

/// A cataloged construction type for one category.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentArchetype {
    pub id: i64,
    pub category: Category,
    pub name: String,
    /// Reported material codes this archetype fits. Empty means unconstrained.
    pub applicable_codes: Vec<i32>,
    pub min_year: i32,
    pub max_year: i32,
    /// Roof pitch window in degrees. A roof structure without both bounds is
    /// never a candidate.
    pub min_pitch: Option<f64>,
    pub max_pitch: Option<f64>,
}

/// Why a link exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkRole {
    /// The archetype drawn for the category
    Primary,
    RidgeBoard,
    TopFloorCeiling,
}

impl LinkRole {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkRole::Primary => "primary",
            LinkRole::RidgeBoard => "ridge_board",
            LinkRole::TopFloorCeiling => "top_floor_ceiling",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingComponentLink {
    pub building_id: String,
    pub category: Category,
    pub role: LinkRole,
    pub archetype_id: Option<i64>,
}

/// A building part, derived from the category and link role of the
/// archetype it was expanded from, or the glazing share of the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Element {
    ExteriorWall,
    Window,
    InteriorWall,
    RoofCover,
    RoofStructure,
    RidgeBoard,
    TopFloorCeiling,
    Floor,
    Foundation,
    GroundSlab,
}

impl Element {
    pub fn for_link(category: Category, role: LinkRole) -> Element {
        match (category, role) {
            (_, LinkRole::RidgeBoard) => Element::RidgeBoard,
            (_, LinkRole::TopFloorCeiling) => Element::TopFloorCeiling,
            (Category::ExteriorWall, _) => Element::ExteriorWall,
            (Category::RoofCover, _) => Element::RoofCover,
            (Category::RoofStructure, _) => Element::RoofStructure,
            (Category::Floor, _) => Element::Floor,
            (Category::InteriorWall, _) => Element::InteriorWall,
            (Category::GroundSlab, _) => Element::GroundSlab,
            (Category::Foundation, _) => Element::Foundation,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Element::ExteriorWall => "ext_wall",
            Element::Window => "window",
            Element::InteriorWall => "int_wall",
            Element::RoofCover => "roof_cover",
            Element::RoofStructure => "roof_structure",
            Element::RidgeBoard => "ridge_board",
            Element::TopFloorCeiling => "top_floor_ceiling",
            Element::Floor => "floor",
            Element::Foundation => "foundation",
            Element::GroundSlab => "ground_slab",
        }
    }
}

/// Quantity unit on a bill-of-materials edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Unit {
    Kilogram,
    CubicMetre,
    Other(String),
}

impl Unit {
    pub fn as_str(&self) -> &str {
        match self {
            Unit::Kilogram => "KG",
            Unit::CubicMetre => "M3",
            Unit::Other(raw) => raw,
        }
    }
}

impl From<&str> for Unit {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "KG" => Unit::Kilogram,
            "M3" => Unit::CubicMetre,
            _ => Unit::Other(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subcomponent {
    pub id: String,
    pub name: String,
}

/// A product line on a subcomponent's bill of materials.
#[derive(Debug, Clone, PartialEq)]
pub struct BillOfMaterialsEdge {
    pub id: String,
    pub subcomponent_id: String,
    pub product_id: String,
    pub amount_per_unit: f64,
    pub unit: Unit,
    pub lifespan: Option<i32>,
}

/// Fixed material categories used in the mass rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MaterialType {
    Clay,
    CementMortar,
    Concrete,
    Aggregates,
    GypsumPlaster,
    Metal,
    Wood,
    Wool,
    Glass,
    Other,
}

impl MaterialType {
    pub const ALL: [MaterialType; 10] = [
        MaterialType::Clay,
        MaterialType::CementMortar,
        MaterialType::Concrete,
        MaterialType::Aggregates,
        MaterialType::GypsumPlaster,
        MaterialType::Metal,
        MaterialType::Wood,
        MaterialType::Wool,
        MaterialType::Glass,
        MaterialType::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MaterialType::Clay => "clay",
            MaterialType::CementMortar => "cement_mortar",
            MaterialType::Concrete => "concrete",
            MaterialType::Aggregates => "aggregates",
            MaterialType::GypsumPlaster => "gypsum_plaster",
            MaterialType::Metal => "metal",
            MaterialType::Wood => "wood",
            MaterialType::Wool => "wool",
            MaterialType::Glass => "glass",
            MaterialType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub density: Option<f64>, // kg/m3
    pub material_type: Option<MaterialType>,
}

/// Raw quantity of one product in one building element, before unit reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialQuantity {
    pub building_id: String,
    pub element: Element,
    pub product_id: String,
    pub amount: f64,
    pub unit: Unit,
}

/// Per-building mass totals by material category (kg)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialMassSummary {
    pub building_id: String,
    pub masses: BTreeMap<MaterialType, f64>,
}

impl MaterialMassSummary {
    pub fn mass_of(&self, material: MaterialType) -> f64 {
        self.masses.get(&material).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.masses.values().sum()
    }
}

impl fmt::Display for MaterialMassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Material Summary: {} ===", self.building_id)?;
        for material in MaterialType::ALL {
            writeln!(f, "  {:<16} {:>14.1} kg", material.as_str(), self.mass_of(material))?;
        }
        writeln!(f, "  {}", "-".repeat(33))?;
        writeln!(f, "  {:<16} {:>14.1} kg", "total", self.total())?;
        Ok(())
    }
}

/// One line of the per-building result view
#[derive(Debug, Clone, PartialEq)]
pub struct ResultLine {
    pub element: Element,
    pub product_name: String,
    pub mass: Option<f64>,
    pub material_type: Option<MaterialType>,
}

macro_rules! text_enum {
    ($ty:ident, $kind:literal, [$($variant:ident),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_lowercase();
                [$($ty::$variant),+]
                    .into_iter()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| ParseEnumError::new($kind, s))
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum!(
    Category,
    "category",
    [ExteriorWall, RoofCover, RoofStructure, Floor, InteriorWall, GroundSlab, Foundation]
);
text_enum!(LinkRole, "link role", [Primary, RidgeBoard, TopFloorCeiling]);
text_enum!(
    Element,
    "element",
    [
        ExteriorWall,
        Window,
        InteriorWall,
        RoofCover,
        RoofStructure,
        RidgeBoard,
        TopFloorCeiling,
        Floor,
        Foundation,
        GroundSlab,
    ]
);
text_enum!(
    MaterialType,
    "material type",
    [Clay, CementMortar, Concrete, Aggregates, GypsumPlaster, Metal, Wood, Wool, Glass, Other]
);

impl ToSql for Unit {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Unit {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(Unit::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trips_through_text() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        assert!("balcony".parse::<Category>().is_err());
    }

    #[test]
    fn test_material_type_parse_ignores_case() {
        assert_eq!("Cement_mortar".parse::<MaterialType>().unwrap(), MaterialType::CementMortar);
        assert_eq!("GLASS".parse::<MaterialType>().unwrap(), MaterialType::Glass);
    }

    #[test]
    fn test_unit_parsing() {
        assert_eq!(Unit::from("kg"), Unit::Kilogram);
        assert_eq!(Unit::from("M3"), Unit::CubicMetre);
        assert_eq!(Unit::from("M2"), Unit::Other("M2".to_string()));
        assert_eq!(Unit::from("M2").as_str(), "M2");
    }

    #[test]
    fn test_element_for_augmentation_roles() {
        assert_eq!(
            Element::for_link(Category::RoofStructure, LinkRole::RidgeBoard),
            Element::RidgeBoard
        );
        assert_eq!(
            Element::for_link(Category::RoofStructure, LinkRole::Primary),
            Element::RoofStructure
        );
    }

    #[test]
    fn test_summary_display_lists_every_category() {
        let mut summary = MaterialMassSummary {
            building_id: "b1".to_string(),
            ..Default::default()
        };
        summary.masses.insert(MaterialType::Wood, 1500.0);
        let text = summary.to_string();
        for material in MaterialType::ALL {
            assert!(text.contains(material.as_str()));
        }
        assert!(text.contains("1500.0"));
    }
}
