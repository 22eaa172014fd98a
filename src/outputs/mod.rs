//! Output writers.
//!
//! - [`csv`]: the CSV file every collection produces
//! - [`json`]: optional JSON dump of intermediate records
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── FR_senators_all_1999_2024.csv
//! ├── FR_dep_combined.csv
//! ├── FR_dep11_full.csv
//! ├── FR_dep17_full.csv
//! ├── br_senate.csv
//! ├── br_parties_data.csv
//! └── ches_parties_UK_FR.csv
//! ```

pub mod csv;
pub mod json;
