//! The record reconciliation pipeline shared by every collection.
//!
//! Stages run strictly in order for each collection:
//!
//! 1. a source reader ([`crate::readers`]) produces raw [`Record`](crate::models::Record)s
//! 2. [`normalize`] rewrites civility, dates and codes into canonical values
//! 3. [`join`] left-outer-joins secondary sources onto the primary one
//! 4. [`expand`] turns sub-item lists into long-format rows
//! 5. [`crate::outputs::csv`] writes the rows with a fixed column order

pub mod expand;
pub mod join;
pub mod normalize;
