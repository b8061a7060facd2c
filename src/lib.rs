//! coverforge: minimum-size subset selection for labeled datasets.
//!
//! Given a pool of items that each carry a set of text labels, this library
//! finds the smallest subset in which every frequent label still appears a
//! required number of times. The work is a binary set-cover program with
//! minimum multiplicity, solved by branch-and-bound over LP relaxations.

pub mod catalog;
pub mod cli;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod selection;
pub mod solver;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogOptions, Item};
pub use error::{CatalogError, ExportError, MaterializeError, SolverError};
pub use pipeline::{run, CurationConfig, CurationReport};
pub use solver::{BranchAndBound, CoverageSolver, SolveStatus, SolverSettings};
