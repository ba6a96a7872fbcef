use std::collections::HashSet;

use tracing::warn;

use crate::config::{ArcTable, NetworkConfig, NodeTable};
use crate::error::NetworkError;

/// A validated network with dense tables indexed by node position
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    pub plants: Vec<String>,
    pub distribution_centers: Vec<String>,
    pub customers: Vec<String>,
    pub production_cost: Vec<f64>,
    pub plant_capacity: Vec<f64>,
    pub handling_cost: Vec<f64>,
    pub dc_capacity: Vec<f64>,
    pub customer_demand: Vec<f64>,
    /// Row-major `[plant][dc]`
    transport_plant_to_dc: Vec<f64>,
    /// Row-major `[dc][customer]`
    transport_dc_to_customer: Vec<f64>,
}

impl Network {
    /// Resolve every table entry the node sets imply, failing on the first
    /// missing or invalid one
    pub fn from_config(config: &NetworkConfig) -> Result<Self, NetworkError> {
        check_unique("plants", &config.plants)?;
        check_unique("distributionCenters", &config.distribution_centers)?;
        check_unique("customers", &config.customers)?;

        let plants = &config.plants;
        let dcs = &config.distribution_centers;
        let customers = &config.customers;

        warn_unknown_nodes("productionCost", &config.production_cost, plants);
        warn_unknown_nodes("plantCapacity", &config.plant_capacity, plants);
        warn_unknown_nodes("handlingCost", &config.handling_cost, dcs);
        warn_unknown_nodes("dcCapacity", &config.dc_capacity, dcs);
        warn_unknown_nodes("customerDemand", &config.customer_demand, customers);
        warn_unknown_arcs("transportCostPlantToDC", &config.transport_cost_plant_to_dc, plants, dcs);
        warn_unknown_arcs("transportCostDCToCustomer", &config.transport_cost_dc_to_customer, dcs, customers);

        let production_cost = resolve_nodes("productionCost", &config.production_cost, plants)?;
        let transport_plant_to_dc = resolve_arcs("transportCostPlantToDC", &config.transport_cost_plant_to_dc, plants, dcs)?;
        let handling_cost = resolve_nodes("handlingCost", &config.handling_cost, dcs)?;
        let transport_dc_to_customer =
            resolve_arcs("transportCostDCToCustomer", &config.transport_cost_dc_to_customer, dcs, customers)?;
        let plant_capacity = resolve_nodes("plantCapacity", &config.plant_capacity, plants)?;
        let dc_capacity = resolve_nodes("dcCapacity", &config.dc_capacity, dcs)?;
        let customer_demand = resolve_nodes("customerDemand", &config.customer_demand, customers)?;

        Ok(Self {
            plants: plants.clone(),
            distribution_centers: dcs.clone(),
            customers: customers.clone(),
            production_cost,
            plant_capacity,
            handling_cost,
            dc_capacity,
            customer_demand,
            transport_plant_to_dc,
            transport_dc_to_customer,
        })
    }

    pub fn num_plants(&self) -> usize {
        self.plants.len()
    }

    pub fn num_distribution_centers(&self) -> usize {
        self.distribution_centers.len()
    }

    pub fn num_customers(&self) -> usize {
        self.customers.len()
    }

    pub fn transport_cost_plant_to_dc(&self, plant: usize, dc: usize) -> f64 {
        self.transport_plant_to_dc[plant * self.num_distribution_centers() + dc]
    }

    pub fn transport_cost_dc_to_customer(&self, dc: usize, customer: usize) -> f64 {
        self.transport_dc_to_customer[dc * self.num_customers() + customer]
    }

    /// Production plus inbound transport for one unit on a plant to DC arc
    pub fn plant_to_dc_unit_cost(&self, plant: usize, dc: usize) -> f64 {
        self.production_cost[plant] + self.transport_cost_plant_to_dc(plant, dc)
    }

    /// Handling plus outbound transport for one unit on a DC to customer arc
    pub fn dc_to_customer_unit_cost(&self, dc: usize, customer: usize) -> f64 {
        self.handling_cost[dc] + self.transport_cost_dc_to_customer(dc, customer)
    }

    pub fn total_capacity(&self) -> f64 {
        self.plant_capacity.iter().sum()
    }

    pub fn total_demand(&self) -> f64 {
        self.customer_demand.iter().sum()
    }
}

fn check_unique(set: &'static str, ids: &[String]) -> Result<(), NetworkError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(NetworkError::DuplicateNode { set, id: id.clone() });
        }
    }
    Ok(())
}

fn checked(table: &'static str, key: String, value: f64) -> Result<f64, NetworkError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(NetworkError::InvalidValue { table, key, value })
    }
}

fn resolve_nodes(table: &'static str, entries: &NodeTable, ids: &[String]) -> Result<Vec<f64>, NetworkError> {
    ids.iter()
        .map(|id| {
            let value = *entries.get(id).ok_or_else(|| NetworkError::missing(table, id.clone()))?;
            checked(table, id.clone(), value)
        })
        .collect()
}

fn resolve_arcs(
    table: &'static str,
    entries: &ArcTable,
    origins: &[String],
    destinations: &[String],
) -> Result<Vec<f64>, NetworkError> {
    let mut dense = Vec::with_capacity(origins.len() * destinations.len());
    for origin in origins {
        for destination in destinations {
            let key = arc_key(origin, destination);
            let value = entries
                .get(origin)
                .and_then(|row| row.get(destination))
                .copied()
                .ok_or_else(|| NetworkError::missing(table, key.clone()))?;
            dense.push(checked(table, key, value)?);
        }
    }
    Ok(dense)
}

fn arc_key(origin: &str, destination: &str) -> String {
    format!("{} -> {}", origin, destination)
}

fn warn_unknown_nodes(table: &'static str, entries: &NodeTable, ids: &[String]) {
    for key in entries.keys().filter(|k| !ids.contains(*k)) {
        warn!(table, key = %key, "ignoring entry for unknown node");
    }
}

fn warn_unknown_arcs(table: &'static str, entries: &ArcTable, origins: &[String], destinations: &[String]) {
    for (origin, row) in entries {
        for destination in row.keys() {
            if !origins.contains(origin) || !destinations.contains(destination) {
                warn!(table, key = %arc_key(origin, destination), "ignoring entry for unknown arc");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_network_resolves() {
        let network = Network::from_config(&NetworkConfig::default()).unwrap();

        assert_eq!(network.num_plants(), 2);
        assert_eq!(network.num_distribution_centers(), 2);
        assert_eq!(network.num_customers(), 2);
        assert_eq!(network.transport_cost_plant_to_dc(1, 1), 1.0);
        assert_eq!(network.transport_cost_dc_to_customer(0, 1), 6.0);
        assert_eq!(network.plant_to_dc_unit_cost(0, 0), 12.0);
        assert_eq!(network.dc_to_customer_unit_cost(1, 0), 5.5);
        assert_eq!(network.total_capacity(), 1800.0);
        assert_eq!(network.total_demand(), 1100.0);
    }

    #[test]
    fn test_missing_arc_names_the_pair() {
        let mut config = NetworkConfig::default();
        config
            .transport_cost_plant_to_dc
            .get_mut("Plant1")
            .unwrap()
            .remove("DC2");

        let err = Network::from_config(&config).unwrap_err();

        assert_eq!(
            err,
            NetworkError::MissingEntry {
                table: "transportCostPlantToDC",
                key: "Plant1 -> DC2".to_string(),
            }
        );
        assert_eq!(err.to_string(), "Missing transportCostPlantToDC entry for Plant1 -> DC2");
    }

    #[test]
    fn test_missing_node_entry() {
        let mut config = NetworkConfig::default();
        config.customer_demand.remove("Customer2");

        let err = Network::from_config(&config).unwrap_err();

        assert_eq!(err, NetworkError::missing("customerDemand", "Customer2"));
    }

    #[test]
    fn test_missing_entry_for_added_node() {
        let mut config = NetworkConfig::default();
        config.distribution_centers.push("DC3".to_string());

        let err = Network::from_config(&config).unwrap_err();

        // Tables are resolved plant costs first, so the first gap is Plant1 -> DC3
        assert_eq!(err, NetworkError::missing("transportCostPlantToDC", "Plant1 -> DC3"));
    }

    #[test]
    fn test_negative_value_rejected() {
        let mut config = NetworkConfig::default();
        config.handling_cost.insert("DC1".to_string(), -1.0);

        let err = Network::from_config(&config).unwrap_err();

        assert!(matches!(err, NetworkError::InvalidValue { table: "handlingCost", .. }));
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let mut config = NetworkConfig::default();
        config.plants.push("Plant1".to_string());

        let err = Network::from_config(&config).unwrap_err();

        assert_eq!(
            err,
            NetworkError::DuplicateNode {
                set: "plants",
                id: "Plant1".to_string(),
            }
        );
    }

    #[test]
    fn test_extra_entries_are_ignored() {
        let mut config = NetworkConfig::default();
        config.production_cost.insert("Plant9".to_string(), 99.0);

        let network = Network::from_config(&config).unwrap();

        assert_eq!(network.production_cost, vec![10.0, 12.0]);
    }
}
