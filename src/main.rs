//! # Legislator Records
//!
//! One-shot collection jobs that gather public records on legislators and
//! parties (French Senate and National Assembly, Brazilian Senate, CHES party
//! positions for France and the UK), reconcile them into one table per job and
//! write that table as a UTF-8 CSV.
//!
//! ## Usage
//!
//! ```sh
//! legislator_records fr-senate --filter-csv ./senmat.csv
//! legislator_records --output ./br.csv br-senate
//! ```
//!
//! ## Architecture
//!
//! Every collection follows the same pipeline:
//! 1. **Read**: fetch each source and decode it into flat records
//! 2. **Normalize**: canonical sex, dates and categorical codes
//! 3. **Join**: left-join auxiliary sources on normalized name keys
//! 4. **Expand**: one row per sub-item (mandates), list fields flattened
//! 5. **Export**: one CSV with a batch-wide column set

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod fetch;
mod models;
mod outputs;
mod pipeline;
mod readers;
mod scrapers;
mod utils;

use cli::{Cli, Collection};
use config::Settings;
use fetch::{Fetch, default_fetcher};
use models::Record;
use outputs::csv::CsvExporter;
use scrapers::{br_parties, br_senate, ches, fr_dep11, fr_dep17, fr_deputies, fr_senate};
use utils::ensure_writable_parent;

/// Default file name and export layout of a collection.
fn export_layout(collection: &Collection) -> (&'static str, CsvExporter) {
    match collection {
        Collection::FrSenate { .. } => (fr_senate::OUTPUT_NAME, CsvExporter::new(fr_senate::COLUMNS)),
        Collection::FrDeputies { .. } => (fr_deputies::OUTPUT_NAME, CsvExporter::new(fr_deputies::COLUMNS)),
        Collection::FrDep11 { .. } => (fr_dep11::OUTPUT_NAME, CsvExporter::new(fr_dep11::COLUMNS)),
        Collection::FrDep17 { .. } => (
            fr_dep17::OUTPUT_NAME,
            CsvExporter::new(fr_dep17::COLUMNS).dropping(fr_dep17::DROPPED),
        ),
        Collection::BrSenate => (br_senate::OUTPUT_NAME, CsvExporter::new(br_senate::COLUMNS)),
        Collection::BrParties => (br_parties::OUTPUT_NAME, CsvExporter::new(br_parties::COLUMNS)),
        Collection::Ches => (ches::OUTPUT_NAME, CsvExporter::new(ches::COLUMNS)),
    }
}

/// Run one collection to export-ready rows.
#[instrument(level = "info", skip_all, fields(collection = collection.name()))]
async fn run<F: Fetch>(collection: Collection, fetcher: &F, concurrency: usize) -> error::Result<Vec<Record>> {
    match collection {
        Collection::FrSenate { filter_csv } => fr_senate::collect(fetcher, filter_csv).await,
        Collection::FrDeputies { json_dump } => fr_deputies::collect(fetcher, json_dump).await,
        Collection::FrDep11 { table_html } => fr_dep11::collect(fetcher, table_html, concurrency).await,
        Collection::FrDep17 { table_html } => fr_dep17::collect(fetcher, table_html).await,
        Collection::BrSenate => br_senate::collect(fetcher, concurrency).await,
        Collection::BrParties => br_parties::collect(fetcher).await,
        Collection::Ches => ches::collect(fetcher, concurrency).await,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();

    // Parse CLI
    let args = Cli::parse();
    let collection_name = args.collection.name();
    info!(collection = collection_name, "legislator_records starting up");
    debug!(?args.config, ?args.output, "Parsed CLI arguments");

    let settings = match Settings::load(args.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to load settings");
            return Err(e.into());
        }
    };

    let (default_name, exporter) = export_layout(&args.collection);
    let output = settings.output_path(args.output.as_deref(), default_name);

    // Early check: fail before a long scrape if the CSV cannot be written
    if let Err(e) = ensure_writable_parent(&output).await {
        error!(
            path = %output.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let fetcher = default_fetcher(&settings.http)?;
    let rows = match run(args.collection, &fetcher, settings.http.concurrency).await {
        Ok(rows) => rows,
        Err(e) => {
            error!(collection = collection_name, error = %e, "Collection failed");
            return Err(e.into());
        }
    };

    let written = exporter.write(&rows, &output).await?;
    info!(
        collection = collection_name,
        rows = written,
        path = %output.display(),
        "Saved collection"
    );

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
