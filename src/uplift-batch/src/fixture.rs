//! JSON fixture describing collaborator state for offline replay runs.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use uplift_core::results::VariationCount;
use uplift_core::types::{Environment, Experiment};
use uplift_core::UpliftResult;

#[derive(Debug, Deserialize)]
pub struct Fixture {
    pub environments: Vec<Environment>,
    /// Experiments keyed by environment id.
    pub experiments: HashMap<String, Vec<Experiment>>,
    /// Evaluation counters returned for every query window.
    #[serde(default)]
    pub evaluation_counts: Vec<VariationCount>,
    /// Goal counters keyed by goal id.
    #[serde(default)]
    pub goal_counts: HashMap<String, Vec<VariationCount>>,
}

impl Fixture {
    pub fn load(path: &Path) -> UpliftResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
