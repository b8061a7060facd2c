//! Translates a catalog into the coverage integer program.

use std::collections::HashMap;

use tracing::info;

use crate::catalog::Catalog;

use super::{CoverageConstraint, Model};

/// Default minimum occurrence count for a label to require coverage.
pub const DEFAULT_THRESHOLD: usize = 250;

/// Default number of selected items that must carry each required label.
pub const DEFAULT_MINIMUM: u32 = 100;

/// Builds the coverage model for a catalog.
#[derive(Debug, Clone, Copy)]
pub struct CoverageModelBuilder {
    threshold: usize,
    minimum: u32,
}

impl Default for CoverageModelBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_MINIMUM)
    }
}

impl CoverageModelBuilder {
    /// # Arguments
    ///
    /// * `threshold` - Labels occurring at least this often get a constraint.
    /// * `minimum` - Right-hand side of every coverage constraint.
    pub fn new(threshold: usize, minimum: u32) -> Self {
        Self { threshold, minimum }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn minimum(&self) -> u32 {
        self.minimum
    }

    /// Builds one row per required label, in label-name order.
    ///
    /// A `minimum` larger than a label's carrier count is not rejected here;
    /// the solver reports the model infeasible.
    pub fn build(&self, catalog: &Catalog) -> Model {
        let required = catalog.labels().required(self.threshold);

        let mut carriers: HashMap<&str, Vec<usize>> =
            required.iter().map(|&label| (label, Vec::new())).collect();
        for (index, item) in catalog.items().iter().enumerate() {
            for label in &item.labels {
                if let Some(indices) = carriers.get_mut(label.as_str()) {
                    // items are visited in order, so a repeat is always the tail
                    if indices.last() != Some(&index) {
                        indices.push(index);
                    }
                }
            }
        }

        let constraints: Vec<CoverageConstraint> = required
            .iter()
            .map(|&label| {
                let indices = carriers.remove(label).unwrap_or_default();
                CoverageConstraint::new(label, indices, self.minimum)
            })
            .collect();

        info!(
            variables = catalog.len(),
            constraints = constraints.len(),
            threshold = self.threshold,
            minimum = self.minimum,
            "Built coverage model"
        );

        Model::new(catalog.len(), constraints)
    }
}
