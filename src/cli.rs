//! Command-line interface definitions for the legislator records harvester.
//!
//! One subcommand per collection. Global options choose the settings file and
//! may override where the collection's CSV is written.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # French senators, biography sheet joined onto a local mandate extract
/// legislator_records fr-senate --filter-csv ./senmat.csv
///
/// # Brazilian Senate with a custom settings file and output path
/// legislator_records --config settings.yaml --output /tmp/br.csv br-senate
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file
    #[arg(short, long, global = true, env = "LEGREC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output CSV path (defaults to `<output_dir>/<collection file name>`)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub collection: Collection,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Collection {
    /// French senators 1999-2024 (data.senat.fr + local mandate extract)
    FrSenate {
        /// Mandate extract with one row per mandate (`senmat.csv`)
        #[arg(long)]
        filter_csv: PathBuf,
    },
    /// French deputies, full history (National Assembly open-data archive)
    FrDeputies {
        /// Also write the combined records, before renaming, as JSON
        #[arg(long)]
        json_dump: Option<PathBuf>,
    },
    /// Deputies of the 11th legislature
    FrDep11 {
        /// Saved multi-criteria search result page (table `#tablesorter0`)
        #[arg(long)]
        table_html: PathBuf,
    },
    /// Deputies of the 17th legislature
    FrDep17 {
        /// Saved multi-criteria search result page (first table)
        #[arg(long)]
        table_html: PathBuf,
    },
    /// Brazilian senators, legislatures 51 to 58
    BrSenate,
    /// Brazilian party abbreviations and full names
    BrParties,
    /// CHES party positions for France and the UK
    Ches,
}

impl Collection {
    /// Subcommand name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::FrSenate { .. } => "fr-senate",
            Collection::FrDeputies { .. } => "fr-deputies",
            Collection::FrDep11 { .. } => "fr-dep11",
            Collection::FrDep17 { .. } => "fr-dep17",
            Collection::BrSenate => "br-senate",
            Collection::BrParties => "br-parties",
            Collection::Ches => "ches",
        }
    }
}
