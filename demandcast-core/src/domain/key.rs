//! EntityKey — identity of a single demand time series.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one demand series: product classification, legal entity,
/// warehouse/site, material, and base unit of measure.
///
/// Immutable once formed; used as the join key everywhere. Comparison and
/// set membership go through `canonical()`, which normalizes heterogeneous
/// source attributes to a single string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub classification: String,
    pub company: String,
    pub site: String,
    pub material: String,
    pub uom: String,
}

impl EntityKey {
    pub fn new(
        classification: impl Into<String>,
        company: impl Into<String>,
        site: impl Into<String>,
        material: impl Into<String>,
        uom: impl Into<String>,
    ) -> Self {
        Self {
            classification: classification.into(),
            company: company.into(),
            site: site.into(),
            material: material.into(),
            uom: uom.into(),
        }
    }

    /// Canonical string form: attributes joined with `_`, in key order.
    ///
    /// This is the `item_id` handed to the predictor and the membership key
    /// for the known/unknown and forecastable partitions.
    pub fn canonical(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            self.classification, self.company, self.site, self.material, self.uom
        )
    }

    /// Warehouse grouping key: (classification, company, site).
    ///
    /// ABC value-concentration ranks entities within this group, so the
    /// same material can rank differently per site.
    pub fn warehouse_group(&self) -> (String, String, String) {
        (
            self.classification.clone(),
            self.company.clone(),
            self.site.clone(),
        )
    }

    /// Named attribute lookup for caller-supplied routing filters.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match name {
            "classification" => Some(&self.classification),
            "company" => Some(&self.company),
            "site" => Some(&self.site),
            "material" => Some(&self.material),
            "uom" => Some(&self.uom),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}
