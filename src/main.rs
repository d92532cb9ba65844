//! Building stock material estimator
//!
//! Sequences the estimation passes over a SQLite building database.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;

use stockmass::Error;
use stockmass::assignment;
use stockmass::calculator;
use stockmass::config::AppConfig;
use stockmass::db::{BuildingStore, SqliteStore};
use stockmass::geometry;
use stockmass::models::Category;
use stockmass::pipeline;
use stockmass::sample;

#[derive(Parser)]
#[command(name = "stockmass")]
#[command(about = "Estimate building material stocks from register data")]
struct Cli {
    /// Path to the SQLite database (overrides configuration)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Seed for archetype draws; omit for a fresh random run
    #[arg(long)]
    seed: Option<u64>,

    /// Log per-building decisions
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Load a small demonstration catalog and building set
    LoadSample,

    /// Estimate perimeter, roof and internal wall geometry for every building
    Geometry,

    /// Assign archetypes to every building
    Assign {
        /// Only reassign this category (e.g. "ext_wall", "roof_structure")
        #[arg(short, long)]
        category: Option<Category>,
    },

    /// Expand assigned archetypes into material quantities
    Aggregate,

    /// Run geometry, assignment and aggregation in order
    Run,

    /// Show material mass totals for a building
    Summary {
        /// Building ID
        id: String,
    },

    /// Show per-product results for a building
    Results {
        /// Building ID
        id: String,
    },

    /// List all buildings in the database
    ListBuildings,
}

fn require_building(store: &SqliteStore, id: &str) -> Result<()> {
    if store.get_building(id)?.is_none() {
        return Err(Error::UnknownBuilding(id.to_string()).into());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let mut config = AppConfig::load().context("Failed to load config")?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    if cli.seed.is_some() {
        config.estimator.seed = cli.seed;
    }
    let cfg = &config.estimator;

    let mut store = SqliteStore::open(&config.database)
        .with_context(|| format!("Failed to open {}", config.database.display()))?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", config.database.display());
        }

        Commands::LoadSample => {
            sample::load_sample_data(&mut store)?;
            println!("Sample data loaded successfully!");
        }

        Commands::Geometry => {
            let report = geometry::run_geometry_pass(&mut store, cfg)?;
            println!(
                "Geometry estimated for {} buildings ({} without internal wall estimate)",
                report.buildings, report.without_int_walls
            );
        }

        Commands::Assign { category } => {
            let categories = match category {
                Some(category) => vec![category],
                None => Category::ALL.to_vec(),
            };
            let mut rng = pipeline::make_rng(cfg.seed);
            let reports = assignment::run_assignment_pass(&mut store, &categories, &mut rng)?;
            for report in reports {
                println!("{}", report);
            }
            println!();
            for category in categories {
                println!(
                    "{:<16} {:>6} stored links",
                    category.as_str(),
                    store.count_component_links(category)?
                );
            }
        }

        Commands::Aggregate => {
            let report = calculator::calculate_material_quantities(&mut store, cfg)?;
            println!("{}", report);
        }

        Commands::Run => {
            let report = pipeline::run_all(&mut store, cfg)?;
            println!("{}", report);
        }

        Commands::Summary { id } => {
            require_building(&store, &id)?;
            match store.get_mass_summary(&id)? {
                Some(summary) => println!("{}", summary),
                None => println!("No material results for '{}'. Run 'aggregate' first.", id),
            }
        }

        Commands::Results { id } => {
            require_building(&store, &id)?;
            let quantities = store.get_material_quantities(&id)?;
            if quantities.is_empty() {
                println!("No material results for '{}'. Run 'aggregate' first.", id);
            } else {
                let products: HashMap<_, _> = store
                    .get_products()?
                    .into_iter()
                    .map(|p| (p.id.clone(), p))
                    .collect();
                println!("{:<18} {:<30} {:>12} {:<14}", "Element", "Product", "Mass (kg)", "Material");
                println!("{}", "-".repeat(77));
                for line in calculator::result_lines(&quantities, &products) {
                    let mass = line
                        .mass
                        .map(|m| format!("{:.1}", m))
                        .unwrap_or_else(|| "n/a".to_string());
                    let material = line.material_type.map(|m| m.as_str()).unwrap_or("-");
                    println!(
                        "{:<18} {:<30} {:>12} {:<14}",
                        line.element.as_str(),
                        line.product_name,
                        mass,
                        material
                    );
                }
            }
        }

        Commands::ListBuildings => {
            let buildings = store.get_all_buildings()?;
            if buildings.is_empty() {
                println!("No buildings in database. Run 'load-sample' first.");
            } else {
                println!(
                    "{:<16} {:>6} {:>6} {:>10} {:>7} {:>10}",
                    "Building", "Year", "Use", "Footprint", "Floors", "Perimeter"
                );
                println!("{}", "-".repeat(60));
                for b in buildings {
                    let year = b.construction_year.map(|y| y.to_string()).unwrap_or_default();
                    let usage = b.usage_code.map(|u| u.to_string()).unwrap_or_default();
                    let floors = b.floor_count.map(|n| n.to_string()).unwrap_or_default();
                    let perimeter = b
                        .geometry
                        .map(|g| format!("{:.1}", g.perimeter))
                        .unwrap_or_default();
                    println!(
                        "{:<16} {:>6} {:>6} {:>10.1} {:>7} {:>10}",
                        b.id, year, usage, b.footprint_area, floors, perimeter
                    );
                }
            }
        }
    }

    Ok(())
}
