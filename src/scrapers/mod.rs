//! Collections: one module per data-collection job.
//!
//! Each collection reads its sources, runs them through the pipeline
//! (normalize, join, expand) and returns export-ready rows.
//!
//! # Supported Collections
//!
//! | Subcommand | Module | Sources | Output |
//! |------------|--------|---------|--------|
//! | `fr-senate` | [`fr_senate`] | local `senmat.csv` + data.senat.fr `.xls` | `FR_senators_all_1999_2024.csv` |
//! | `fr-deputies` | [`fr_deputies`] | National Assembly `.json.zip` archive | `FR_dep_combined.csv` |
//! | `fr-dep11` | [`fr_dep11`] | saved search table + profile pages | `FR_dep11_full.csv` |
//! | `fr-dep17` | [`fr_dep17`] | data.gouv.fr CSV + saved search table | `FR_dep17_full.csv` |
//! | `br-senate` | [`br_senate`] | senado.leg.br search, profiles, archives | `br_senate.csv` |
//! | `br-parties` | [`br_parties`] | senado.leg.br `por-partido` pages | `br_parties_data.csv` |
//! | `ches` | [`ches`] | chesdata.eu survey CSVs | `ches_parties_UK_FR.csv` |
//!
//! # Common Patterns
//!
//! Each collection module exports:
//! - `OUTPUT_NAME`: default CSV file name
//! - `COLUMNS`: leading export columns
//! - `collect(...)`: runs the collection, returns `Vec<Record>`
//!
//! Collections use:
//! - Bounded concurrent fetching through [`crate::fetch::fetch_all`]
//! - Graceful error handling (failed pages are logged and skipped; a missing
//!   primary source stops the run)

pub mod br_parties;
pub mod br_senate;
pub mod ches;
pub mod fr_dep11;
pub mod fr_dep17;
pub mod fr_deputies;
pub mod fr_senate;
