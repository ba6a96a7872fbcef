use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::NetworkError;

/// Per-node table, keyed by node identifier
pub type NodeTable = BTreeMap<String, f64>;

/// Per-arc table, keyed by origin then destination
pub type ArcTable = BTreeMap<String, BTreeMap<String, f64>>;

/// Raw network description as read from a JSON file
///
/// Node sets keep their listed order; that order drives variable layout,
/// constraint order and report order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NetworkConfig {
    pub plants: Vec<String>,
    pub distribution_centers: Vec<String>,
    pub customers: Vec<String>,
    pub production_cost: NodeTable,
    #[serde(rename = "transportCostPlantToDC")]
    pub transport_cost_plant_to_dc: ArcTable,
    pub handling_cost: NodeTable,
    #[serde(rename = "transportCostDCToCustomer")]
    pub transport_cost_dc_to_customer: ArcTable,
    pub plant_capacity: NodeTable,
    pub dc_capacity: NodeTable,
    pub customer_demand: NodeTable,
}

impl NetworkConfig {
    /// Parse a config from JSON source text
    pub fn from_json_str(source: &str) -> Result<Self, NetworkError> {
        Self::parse(source, "<input>")
    }

    /// Read and parse a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NetworkError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| NetworkError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::parse(&source, &path.display().to_string())
    }

    fn parse(source: &str, origin: &str) -> Result<Self, NetworkError> {
        serde_json::from_str(source).map_err(|e| NetworkError::ParseError(origin.to_string(), e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, NetworkError> {
        serde_json::to_string_pretty(self).map_err(|e| NetworkError::SerializeError(e.to_string()))
    }
}

impl Default for NetworkConfig {
    /// The two plant, two DC, two customer sample network
    fn default() -> Self {
        Self {
            plants: names(&["Plant1", "Plant2"]),
            distribution_centers: names(&["DC1", "DC2"]),
            customers: names(&["Customer1", "Customer2"]),
            production_cost: node_table(&[("Plant1", 10.0), ("Plant2", 12.0)]),
            transport_cost_plant_to_dc: arc_table(&[
                ("Plant1", "DC1", 2.0),
                ("Plant1", "DC2", 4.0),
                ("Plant2", "DC1", 3.0),
                ("Plant2", "DC2", 1.0),
            ]),
            handling_cost: node_table(&[("DC1", 1.0), ("DC2", 1.5)]),
            transport_cost_dc_to_customer: arc_table(&[
                ("DC1", "Customer1", 5.0),
                ("DC1", "Customer2", 6.0),
                ("DC2", "Customer1", 4.0),
                ("DC2", "Customer2", 3.0),
            ]),
            plant_capacity: node_table(&[("Plant1", 1000.0), ("Plant2", 800.0)]),
            dc_capacity: node_table(&[("DC1", 1200.0), ("DC2", 1000.0)]),
            customer_demand: node_table(&[("Customer1", 600.0), ("Customer2", 500.0)]),
        }
    }
}

pub(crate) fn names(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn node_table(entries: &[(&str, f64)]) -> NodeTable {
    entries.iter().map(|&(k, v)| (k.to_string(), v)).collect()
}

pub(crate) fn arc_table(entries: &[(&str, &str, f64)]) -> ArcTable {
    let mut table = ArcTable::new();
    for &(origin, destination, value) in entries {
        table
            .entry(origin.to_string())
            .or_default()
            .insert(destination.to_string(), value);
    }
    table
}
