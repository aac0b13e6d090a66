//! Dataload CLI - plan, load and export fixture datasets

use anyhow::Context;
use clap::{Parser, Subcommand};
use dataload::config::{self, DataloadConfig};
use dataload::ui;
use dataload::{format, Catalog, Fixture, FixtureOptions, LoadPlan, SqliteBackend, Source};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "dataload")]
#[command(version = "0.0.1")]
#[command(about = "Load typed test datasets into a database and tear them down again")]
#[command(long_about = r#"
Dataload reads datasets from a TOML fixture file and:
  • Orders them so referenced rows are saved first
  • Loads them into SQLite as one transaction
  • Unloads them in reverse order

Example usage:
  dataload plan --fixtures shop.toml OfferData
  dataload load --fixtures shop.toml --database test.db --schema schema.sql
  dataload export --fixtures shop.toml CategoryData
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default dataload.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Show the load order for datasets in a fixture file
    Plan {
        /// Fixture file (defaults to `fixtures` from the config)
        #[arg(short, long)]
        fixtures: Option<PathBuf>,

        /// Datasets to plan (all when omitted)
        datasets: Vec<String>,
    },

    /// Load datasets into a SQLite database
    Load {
        #[arg(short, long)]
        fixtures: Option<PathBuf>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// SQL to run before loading, e.g. CREATE TABLE statements
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Leave the loaded rows in place
        #[arg(short, long)]
        keep: bool,

        /// Print loaded rows as JSON instead of tables
        #[arg(long)]
        json: bool,

        datasets: Vec<String>,
    },

    /// Print datasets as JSON objects
    Export {
        #[arg(short, long)]
        fixtures: Option<PathBuf>,

        datasets: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let settings = config::load_config(Some(&config_path))?.unwrap_or_default();

    match cli.command {
        Commands::Init { force } => {
            let defaults = DataloadConfig {
                database: Some(config::default_database_path_in(Path::new(".")).display().to_string()),
                fixtures: Some("fixtures.toml".to_string()),
                ..Default::default()
            };
            config::write_config(&config_path, &defaults, force)?;
            ui::success(&format!("Wrote {}", config_path.display()));
        }

        Commands::Plan { fixtures, datasets } => {
            let catalog = read_catalog(fixtures, &settings)?;
            let requested = requested_names(&catalog, datasets);
            let plan = LoadPlan::build(&catalog, &requested)?;

            ui::header("Load plan");
            for (i, dataset) in plan.datasets.iter().enumerate() {
                ui::plan_step(i + 1, dataset.name(), &dataset.meta().references);
            }

            let datasets = plan.len().to_string();
            let rows = plan.row_count().to_string();
            let reuses = plan.shared_reuses.to_string();
            println!();
            println!(
                "{}",
                ui::stats_table(&[("Datasets", datasets.as_str()), ("Rows", rows.as_str()), ("Shared reuses", reuses.as_str())])
            );
        }

        Commands::Load {
            fixtures,
            database,
            schema,
            keep,
            json,
            datasets,
        } => {
            let catalog = read_catalog(fixtures, &settings)?;
            let requested = requested_names(&catalog, datasets);

            let database = database
                .or_else(|| settings.database.as_ref().map(PathBuf::from))
                .unwrap_or_else(|| config::default_database_path_in(Path::new(".")));
            config::ensure_db_dir(&database)?;
            ui::info("Database", &database.display().to_string());

            let backend = SqliteBackend::open(&database)?;
            if let Some(schema) = schema {
                let sql = std::fs::read_to_string(&schema)
                    .with_context(|| format!("reading schema {}", schema.display()))?;
                backend.execute_batch(&sql)?;
            }

            let options = FixtureOptions::from_config(&settings)?;
            let mut fixture = Fixture::new(backend).with_catalog(catalog).with_options(options);
            let sources: Vec<Source> = requested.iter().map(|n| Source::from(n.as_str())).collect();

            let mut data = fixture.data(&sources).guard();
            let superset = data.setup()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&dataload::convert::superset_to_json(superset))?);
            } else {
                for dataset in superset {
                    ui::section(dataset.name());
                    println!("{}", ui::dataset_table(dataset));
                }
            }

            if keep {
                data.disarm();
                ui::warn(&format!(
                    "Kept {} rows in {}",
                    data.records().len(),
                    database.display()
                ));
            } else {
                let cleared: Vec<(String, String)> = data
                    .records()
                    .iter()
                    .rev()
                    .map(|r| (r.dataset.clone(), r.row.clone()))
                    .collect();
                data.finish()?;
                if cli.verbose {
                    for (dataset, row) in &cleared {
                        ui::row_cleared(dataset, row);
                    }
                }
                ui::success(&format!("Loaded and unloaded {} rows", cleared.len()));
            }
        }

        Commands::Export { fixtures, datasets } => {
            let catalog = read_catalog(fixtures, &settings)?;
            let requested = requested_names(&catalog, datasets);

            let mut exported = serde_json::Map::new();
            for name in &requested {
                let dataset = catalog.dataset(name)?;
                let objects = dataload::convert::dataset_to_objects(dataset);
                exported.insert(name.clone(), serde_json::Value::Array(objects));
            }
            println!("{}", serde_json::to_string_pretty(&exported)?);
        }
    }

    Ok(())
}

fn read_catalog(fixtures: Option<PathBuf>, settings: &DataloadConfig) -> anyhow::Result<Catalog> {
    let path = fixtures
        .or_else(|| settings.fixtures.as_ref().map(PathBuf::from))
        .context("no fixture file given (use --fixtures or set `fixtures` in dataload.toml)")?;
    if !path.exists() {
        ui::error(&format!("Fixture file not found: {}", path.display()));
        anyhow::bail!("fixture file not found");
    }
    let catalog = format::load_catalog(&path)?;
    tracing::debug!("Read {} datasets from {}", catalog.len(), path.display());
    Ok(catalog)
}

fn requested_names(catalog: &Catalog, datasets: Vec<String>) -> Vec<String> {
    if !datasets.is_empty() {
        return datasets;
    }
    catalog.datasets().map(|d| d.name().to_string()).collect()
}
