//! Exposure Update - Entry Point
//!
//! Loads an exposure inventory and its reference data, runs one update
//! cycle and writes the merged exposure, transitions and loss document.
//! The three parts can also be written as separate documents.

use std::path::PathBuf;

use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use exposure_update::core::config::UpdateConfig;
use exposure_update::core::error::Result;
use exposure_update::exposure::document::load_exposure;
use exposure_update::fragility::document::load_fragility;
use exposure_update::intensity::document::load_intensity_points;
use exposure_update::intensity::{
    AliasIntensityProvider, IntensityProvider, StackedIntensityProvider,
};
use exposure_update::loss::document::load_loss;
use exposure_update::loss::LossEngine;
use exposure_update::schema::ConversionLibrary;
use exposure_update::update::output::{
    exposure_document, loss_document, merged_document, transitions_document, write_document,
};
use exposure_update::update::{ExposureUpdater, UpdateOutcome};

/// Update an exposure inventory with the damage caused by one hazard event
#[derive(Parser, Debug)]
#[command(name = "exposure_update")]
#[command(about = "Reallocate buildings across damage states and price the loss")]
struct Args {
    /// Exposure feature collection (GeoJSON-like)
    #[arg(long)]
    exposure: PathBuf,

    /// Point intensity document; later files win where fields overlap
    #[arg(long, required = true)]
    intensity: Vec<PathBuf>,

    /// Fragility document
    #[arg(long)]
    fragility: PathBuf,

    /// Loss document
    #[arg(long)]
    loss: PathBuf,

    /// Schema conversion documents (building class or damage state)
    #[arg(long)]
    conversions: Vec<PathBuf>,

    /// TOML run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the merged result; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,

    /// Also write the updated exposure on its own
    #[arg(long)]
    exposure_output: Option<PathBuf>,

    /// Also write the damage transitions on their own
    #[arg(long)]
    transitions_output: Option<PathBuf>,

    /// Also write the per-cell loss on its own
    #[arg(long)]
    loss_output: Option<PathBuf>,

    /// Schema for exposure cells that do not declare one
    #[arg(long)]
    schema: Option<String>,
}

fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("exposure_update=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => UpdateConfig::load(path)?,
        None => UpdateConfig::default(),
    };

    let cells = load_exposure(&args.exposure, args.schema.as_deref())?;
    tracing::info!("Loaded {} exposure cells from {:?}", cells.len(), args.exposure);

    let mut stacked = StackedIntensityProvider::new(Vec::new());
    for path in &args.intensity {
        stacked.push(Box::new(load_intensity_points(path, config.coverage_neighbors)?));
    }
    let mut intensity = AliasIntensityProvider::new(stacked);
    for (field, fallbacks) in &config.aliases {
        intensity = intensity.alias(field.clone(), fallbacks.iter().cloned());
    }
    let intensity: Box<dyn IntensityProvider> = Box::new(intensity);

    let fragility = load_fragility(&args.fragility)?;

    let loss = LossEngine::new(load_loss(&args.loss)?, config.loss_unit.clone());

    let mut updater = ExposureUpdater::new(intensity, fragility, loss, config.clone())?;
    if !args.conversions.is_empty() {
        let mut library = ConversionLibrary::new(config.matrix_row_tolerance);
        for path in &args.conversions {
            library.load_file(path)?;
        }
        updater = updater.with_mapper(library.into_mapper());
    }

    let outcomes = updater.update_all(&cells)?;

    let documents: [(Option<&PathBuf>, fn(&[UpdateOutcome]) -> Value); 3] = [
        (args.exposure_output.as_ref(), exposure_document),
        (args.transitions_output.as_ref(), transitions_document),
        (args.loss_output.as_ref(), loss_document),
    ];
    for (path, render) in documents {
        if let Some(path) = path {
            write_document(path, &render(&outcomes))?;
            tracing::info!("Wrote {:?}", path);
        }
    }

    match &args.output {
        Some(path) => {
            write_document(path, &merged_document(&outcomes))?;
            tracing::info!("Wrote {} cells to {:?}", outcomes.len(), path);
        }
        None => println!("{}", serde_json::to_string_pretty(&merged_document(&outcomes))?),
    }

    Ok(())
}
