use chainflow_solver::{Analysis, ConstraintViolation, Solution, SolutionStatus};
use serde::Serialize;
use tracing::warn;

use crate::builder::FlowModel;
use crate::error::NetworkError;
use crate::network::Network;

/// Quantity shipped along one arc
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flow {
    pub origin: String,
    pub destination: String,
    pub quantity: f64,
}

/// Solver verdict mapped back onto the network
///
/// Flows are only present for an optimal status; `plant_to_dc` is
/// plant-major and `dc_to_customer` is DC-major, both in config order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSolution {
    pub status: SolutionStatus,
    pub objective_value: Option<f64>,
    pub plant_to_dc: Vec<Flow>,
    pub dc_to_customer: Vec<Flow>,
    /// Why the problem is infeasible, worst first
    pub violations: Vec<ConstraintViolation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
}

impl FlowSolution {
    pub(crate) fn from_lp(model: &FlowModel, solution: Solution) -> Result<Self, NetworkError> {
        match solution.status {
            SolutionStatus::Optimal => {}
            SolutionStatus::Infeasible | SolutionStatus::Unbounded => {
                return Ok(Self {
                    status: solution.status,
                    objective_value: None,
                    plant_to_dc: Vec::new(),
                    dc_to_customer: Vec::new(),
                    violations: solution.violations,
                    analysis: None,
                });
            }
            SolutionStatus::NotSolved | SolutionStatus::Error => {
                return Err(NetworkError::SolverFailure {
                    status: solution.status.to_string(),
                    message: solution.message.unwrap_or_default(),
                });
            }
        }

        let net = &model.network;
        let layout = model.layout;

        let mut plant_to_dc = Vec::with_capacity(layout.num_plant_to_dc());
        for (p, plant) in net.plants.iter().enumerate() {
            for (d, dc) in net.distribution_centers.iter().enumerate() {
                plant_to_dc.push(Flow {
                    origin: plant.clone(),
                    destination: dc.clone(),
                    quantity: solution.values[layout.plant_to_dc(p, d)],
                });
            }
        }

        let mut dc_to_customer = Vec::with_capacity(layout.num_dc_to_customer());
        for (d, dc) in net.distribution_centers.iter().enumerate() {
            for (c, customer) in net.customers.iter().enumerate() {
                dc_to_customer.push(Flow {
                    origin: dc.clone(),
                    destination: customer.clone(),
                    quantity: solution.values[layout.dc_to_customer(d, c)],
                });
            }
        }

        Ok(Self {
            status: solution.status,
            objective_value: Some(solution.objective_value),
            plant_to_dc,
            dc_to_customer,
            violations: Vec::new(),
            analysis: Some(solution.analysis),
        })
    }

    pub fn is_optimal(&self) -> bool {
        self.status.is_optimal()
    }

    /// Quantity on a named plant to DC arc
    pub fn plant_to_dc_flow(&self, plant: &str, dc: &str) -> Option<f64> {
        find_flow(&self.plant_to_dc, plant, dc)
    }

    /// Quantity on a named DC to customer arc
    pub fn dc_to_customer_flow(&self, dc: &str, customer: &str) -> Option<f64> {
        find_flow(&self.dc_to_customer, dc, customer)
    }

    pub fn flows(&self) -> impl Iterator<Item = &Flow> {
        self.plant_to_dc.iter().chain(&self.dc_to_customer)
    }

    pub fn plant_outflow(&self, plant: &str) -> f64 {
        self.plant_to_dc.iter().filter(|f| f.origin == plant).map(|f| f.quantity).sum()
    }

    pub fn dc_inflow(&self, dc: &str) -> f64 {
        self.plant_to_dc.iter().filter(|f| f.destination == dc).map(|f| f.quantity).sum()
    }

    pub fn dc_outflow(&self, dc: &str) -> f64 {
        self.dc_to_customer.iter().filter(|f| f.origin == dc).map(|f| f.quantity).sum()
    }

    pub fn customer_inflow(&self, customer: &str) -> f64 {
        self.dc_to_customer.iter().filter(|f| f.destination == customer).map(|f| f.quantity).sum()
    }

    /// Objective recomputed from the reported flows and the cost tables
    pub fn total_cost(&self, network: &Network) -> f64 {
        let nd = network.num_distribution_centers();
        let nc = network.num_customers();
        let inbound: f64 = self
            .plant_to_dc
            .iter()
            .enumerate()
            .map(|(i, f)| network.plant_to_dc_unit_cost(i / nd, i % nd) * f.quantity)
            .sum();
        let outbound: f64 = self
            .dc_to_customer
            .iter()
            .enumerate()
            .map(|(i, f)| network.dc_to_customer_unit_cost(i / nc, i % nc) * f.quantity)
            .sum();
        inbound + outbound
    }

    /// Recheck every network invariant against the reported flows
    ///
    /// Returns one message per broken invariant; empty when the solution
    /// holds or is not optimal.
    pub fn audit(&self, network: &Network, tolerance: f64) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.is_optimal() {
            return problems;
        }

        for f in self.flows().filter(|f| f.quantity < 0.0) {
            problems.push(format!("Flow from {} to {} is negative: {}", f.origin, f.destination, f.quantity));
        }

        let np = network.num_plants();
        let nd = network.num_distribution_centers();
        let nc = network.num_customers();
        if self.plant_to_dc.len() != np * nd || self.dc_to_customer.len() != nc * nd {
            problems.push(format!(
                "Solution has {} plant to DC and {} DC to customer flows, network expects {} and {}",
                self.plant_to_dc.len(),
                self.dc_to_customer.len(),
                np * nd,
                nd * nc
            ));
            for problem in &problems {
                warn!(%problem, "solution audit failed");
            }
            return problems;
        }

        // By dense position, not name: a plant and a DC may share an identifier
        let inbound = |p: usize, d: usize| self.plant_to_dc[p * nd + d].quantity;
        let outbound = |d: usize, c: usize| self.dc_to_customer[d * nc + c].quantity;

        for (p, plant) in network.plants.iter().enumerate() {
            let out: f64 = (0..nd).map(|d| inbound(p, d)).sum();
            if out > network.plant_capacity[p] + tolerance {
                problems.push(format!("{} ships {} over capacity {}", plant, out, network.plant_capacity[p]));
            }
        }

        for (d, dc) in network.distribution_centers.iter().enumerate() {
            let inflow: f64 = (0..np).map(|p| inbound(p, d)).sum();
            let outflow: f64 = (0..nc).map(|c| outbound(d, c)).sum();
            if inflow > network.dc_capacity[d] + tolerance {
                problems.push(format!("{} receives {} over capacity {}", dc, inflow, network.dc_capacity[d]));
            }
            if (inflow - outflow).abs() > tolerance {
                problems.push(format!("{} is unbalanced: {} in, {} out", dc, inflow, outflow));
            }
        }

        for (c, customer) in network.customers.iter().enumerate() {
            let inflow: f64 = (0..nd).map(|d| outbound(d, c)).sum();
            if inflow < network.customer_demand[c] - tolerance {
                problems.push(format!(
                    "{} receives {} below demand {}",
                    customer, inflow, network.customer_demand[c]
                ));
            }
        }

        let recomputed = self.total_cost(network);
        if let Some(reported) = self.objective_value {
            if (reported - recomputed).abs() > tolerance * (1.0 + recomputed.abs()) {
                problems.push(format!("Reported cost {} differs from recomputed {}", reported, recomputed));
            }
        }

        for problem in &problems {
            warn!(%problem, "solution audit failed");
        }
        problems
    }
}

fn find_flow(flows: &[Flow], origin: &str, destination: &str) -> Option<f64> {
    flows
        .iter()
        .find(|f| f.origin == origin && f.destination == destination)
        .map(|f| f.quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{arc_table, names, node_table, NetworkConfig};
    use chainflow_solver::Solver;

    const TOL: f64 = 1e-6;

    fn solve(config: &NetworkConfig) -> (FlowModel, FlowSolution) {
        let model = FlowModel::from_config(config).unwrap();
        let solution = model.solve(&Solver::new()).unwrap();
        (model, solution)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < TOL, "got {} (expected {})", actual, expected);
    }

    #[test]
    fn test_default_network_is_optimal() {
        let (model, solution) = solve(&NetworkConfig::default());

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!(solution.audit(&model.network, TOL).is_empty());

        // Customer1 is cheapest via Plant1 -> DC1, Customer2 via Plant2 -> DC2
        assert_close(solution.objective_value.unwrap(), 19550.0);
        assert_close(solution.plant_to_dc_flow("Plant1", "DC1").unwrap(), 600.0);
        assert_close(solution.plant_to_dc_flow("Plant2", "DC2").unwrap(), 500.0);
        assert_close(solution.dc_to_customer_flow("DC1", "Customer1").unwrap(), 600.0);
        assert_close(solution.dc_to_customer_flow("DC2", "Customer2").unwrap(), 500.0);
        assert_eq!(solution.plant_to_dc_flow("Plant1", "DC2"), Some(0.0));
        assert_eq!(solution.dc_to_customer_flow("DC1", "Customer2"), Some(0.0));

        let delivered: f64 = solution.dc_to_customer.iter().map(|f| f.quantity).sum();
        assert!(delivered >= 1100.0 - TOL);
        assert_close(solution.customer_inflow("Customer1"), 600.0);
        for dc in ["DC1", "DC2"] {
            assert_close(solution.dc_inflow(dc), solution.dc_outflow(dc));
        }
    }

    #[test]
    fn test_flows_follow_config_order() {
        let (_, solution) = solve(&NetworkConfig::default());

        let arcs: Vec<(&str, &str)> = solution
            .flows()
            .map(|f| (f.origin.as_str(), f.destination.as_str()))
            .collect();
        assert_eq!(
            arcs,
            vec![
                ("Plant1", "DC1"),
                ("Plant1", "DC2"),
                ("Plant2", "DC1"),
                ("Plant2", "DC2"),
                ("DC1", "Customer1"),
                ("DC1", "Customer2"),
                ("DC2", "Customer1"),
                ("DC2", "Customer2"),
            ]
        );
    }

    #[test]
    fn test_insufficient_plant_capacity_is_infeasible() {
        let mut config = NetworkConfig::default();
        config.plant_capacity.insert("Plant1".to_string(), 100.0);
        config.plant_capacity.insert("Plant2".to_string(), 100.0);

        let (_, solution) = solve(&config);

        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert!(solution.objective_value.is_none());
        assert!(solution.plant_to_dc.is_empty());
        assert!(solution.dc_to_customer.is_empty());
        assert!(
            solution
                .violations
                .iter()
                .any(|v| v.constraint.starts_with("Customer_Demand_"))
        );
    }

    #[test]
    fn test_free_logistics_costs_production_only() {
        let mut config = NetworkConfig::default();
        for table in [
            &mut config.transport_cost_plant_to_dc,
            &mut config.transport_cost_dc_to_customer,
        ] {
            for row in table.values_mut() {
                row.values_mut().for_each(|v| *v = 0.0);
            }
        }
        config.handling_cost.values_mut().for_each(|v| *v = 0.0);

        let (model, solution) = solve(&config);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!(solution.audit(&model.network, TOL).is_empty());

        let production_only = 10.0 * solution.plant_outflow("Plant1") + 12.0 * solution.plant_outflow("Plant2");
        assert_close(solution.objective_value.unwrap(), production_only);
        // Plant1 runs at capacity, Plant2 covers the remaining 100
        assert_close(solution.objective_value.unwrap(), 11200.0);
    }

    #[test]
    fn test_closed_dc_routes_everything_through_the_other() {
        let mut config = NetworkConfig::default();
        config.dc_capacity.insert("DC2".to_string(), 0.0);

        let (model, solution) = solve(&config);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!(solution.audit(&model.network, TOL).is_empty());
        for f in solution.flows().filter(|f| f.origin == "DC2" || f.destination == "DC2") {
            assert!(f.quantity.abs() < TOL, "{} -> {} carries {}", f.origin, f.destination, f.quantity);
        }
        assert_close(solution.dc_inflow("DC1"), 1100.0);
        assert_close(solution.objective_value.unwrap(), 20600.0);
    }

    #[test]
    fn test_closed_dc_without_spare_capacity_is_infeasible() {
        let mut config = NetworkConfig::default();
        config.dc_capacity.insert("DC2".to_string(), 0.0);
        config.dc_capacity.insert("DC1".to_string(), 1000.0);

        let (_, solution) = solve(&config);

        assert_eq!(solution.status, SolutionStatus::Infeasible);
    }

    #[test]
    fn test_iteration_limit_is_solver_failure() {
        let model = FlowModel::from_config(&NetworkConfig::default()).unwrap();

        let err = model.solve(&Solver::new().with_max_iterations(0)).unwrap_err();

        assert!(matches!(err, NetworkError::SolverFailure { ref status, .. } if status == "Not Solved"));
    }

    #[test]
    fn test_audit_flags_broken_balance() {
        let (model, mut solution) = solve(&NetworkConfig::default());
        solution.dc_to_customer[0].quantity += 10.0;

        let problems = solution.audit(&model.network, TOL);

        assert!(problems.iter().any(|p| p.contains("DC1 is unbalanced")));
        assert!(problems.iter().any(|p| p.contains("differs from recomputed")));
    }

    #[test]
    fn test_plant_and_dc_sharing_a_name_audit_clean() {
        let config = NetworkConfig {
            plants: names(&["Hub"]),
            distribution_centers: names(&["Hub"]),
            customers: names(&["Shop"]),
            production_cost: node_table(&[("Hub", 1.0)]),
            transport_cost_plant_to_dc: arc_table(&[("Hub", "Hub", 1.0)]),
            handling_cost: node_table(&[("Hub", 1.0)]),
            transport_cost_dc_to_customer: arc_table(&[("Hub", "Shop", 1.0)]),
            plant_capacity: node_table(&[("Hub", 100.0)]),
            dc_capacity: node_table(&[("Hub", 100.0)]),
            customer_demand: node_table(&[("Shop", 60.0)]),
        };

        let (model, solution) = solve(&config);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.audit(&model.network, TOL), Vec::<String>::new());
        assert_close(solution.plant_to_dc_flow("Hub", "Hub").unwrap(), 60.0);
        assert_close(solution.dc_to_customer_flow("Hub", "Shop").unwrap(), 60.0);
        assert_close(solution.plant_outflow("Hub"), 60.0);
        assert_close(solution.dc_inflow("Hub"), solution.dc_outflow("Hub"));
        assert_close(solution.objective_value.unwrap(), 240.0);
    }

    #[test]
    fn test_audit_rejects_solution_for_another_network() {
        let (_, solution) = solve(&NetworkConfig::default());
        let mut config = NetworkConfig::default();
        config.customers.pop();
        for row in config.transport_cost_dc_to_customer.values_mut() {
            row.remove("Customer2");
        }
        let smaller = Network::from_config(&config).unwrap();

        let problems = solution.audit(&smaller, TOL);

        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("network expects 4 and 2"), "{}", problems[0]);
    }
}
