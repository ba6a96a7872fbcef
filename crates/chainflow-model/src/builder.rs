use chainflow_solver::{ConstraintOp, LpProblem, Solver};
use tracing::{debug, info};

use crate::config::NetworkConfig;
use crate::error::NetworkError;
use crate::network::Network;
use crate::solution::FlowSolution;

/// Column positions of the flow variables
///
/// Plant to DC columns come first in plant-major order, then DC to customer
/// columns in DC-major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableLayout {
    plants: usize,
    distribution_centers: usize,
    customers: usize,
}

impl VariableLayout {
    pub fn for_network(network: &Network) -> Self {
        Self {
            plants: network.num_plants(),
            distribution_centers: network.num_distribution_centers(),
            customers: network.num_customers(),
        }
    }

    pub fn plant_to_dc(&self, plant: usize, dc: usize) -> usize {
        plant * self.distribution_centers + dc
    }

    pub fn dc_to_customer(&self, dc: usize, customer: usize) -> usize {
        self.num_plant_to_dc() + dc * self.customers + customer
    }

    pub fn num_plant_to_dc(&self) -> usize {
        self.plants * self.distribution_centers
    }

    pub fn num_dc_to_customer(&self) -> usize {
        self.distribution_centers * self.customers
    }

    pub fn len(&self) -> usize {
        self.num_plant_to_dc() + self.num_dc_to_customer()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Assembles the min-cost LP for a network
pub struct ModelBuilder<'a> {
    network: &'a Network,
    layout: VariableLayout,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(network: &'a Network) -> Self {
        Self {
            network,
            layout: VariableLayout::for_network(network),
        }
    }

    pub fn layout(&self) -> VariableLayout {
        self.layout
    }

    pub fn build(&self) -> LpProblem {
        let mut lp = LpProblem::new(self.variable_names());
        lp.set_objective(self.objective(), true);

        self.add_plant_capacity(&mut lp);
        self.add_customer_demand(&mut lp);
        self.add_dc_capacity(&mut lp);
        self.add_flow_balance(&mut lp);

        debug!(
            variables = lp.num_variables(),
            constraints = lp.num_constraints(),
            "built flow model"
        );
        lp
    }

    fn variable_names(&self) -> Vec<String> {
        let net = self.network;
        let mut names = Vec::with_capacity(self.layout.len());
        for plant in &net.plants {
            for dc in &net.distribution_centers {
                names.push(format!("Flow_Plant_to_DC_{}_{}", plant, dc));
            }
        }
        for dc in &net.distribution_centers {
            for customer in &net.customers {
                names.push(format!("Flow_DC_to_Customer_{}_{}", dc, customer));
            }
        }
        names
    }

    /// Production and inbound transport on plant arcs, handling and
    /// outbound transport on customer arcs
    fn objective(&self) -> Vec<f64> {
        let net = self.network;
        let mut costs = vec![0.0; self.layout.len()];
        for p in 0..net.num_plants() {
            for d in 0..net.num_distribution_centers() {
                costs[self.layout.plant_to_dc(p, d)] = net.plant_to_dc_unit_cost(p, d);
            }
        }
        for d in 0..net.num_distribution_centers() {
            for c in 0..net.num_customers() {
                costs[self.layout.dc_to_customer(d, c)] = net.dc_to_customer_unit_cost(d, c);
            }
        }
        costs
    }

    fn row(&self) -> Vec<f64> {
        vec![0.0; self.layout.len()]
    }

    fn add_plant_capacity(&self, lp: &mut LpProblem) {
        let net = self.network;
        for (p, plant) in net.plants.iter().enumerate() {
            let mut coeffs = self.row();
            for d in 0..net.num_distribution_centers() {
                coeffs[self.layout.plant_to_dc(p, d)] = 1.0;
            }
            lp.add_constraint(format!("Plant_Capacity_{}", plant), coeffs, ConstraintOp::Le, net.plant_capacity[p]);
        }
    }

    fn add_customer_demand(&self, lp: &mut LpProblem) {
        let net = self.network;
        for (c, customer) in net.customers.iter().enumerate() {
            let mut coeffs = self.row();
            for d in 0..net.num_distribution_centers() {
                coeffs[self.layout.dc_to_customer(d, c)] = 1.0;
            }
            lp.add_constraint(format!("Customer_Demand_{}", customer), coeffs, ConstraintOp::Ge, net.customer_demand[c]);
        }
    }

    fn add_dc_capacity(&self, lp: &mut LpProblem) {
        let net = self.network;
        for (d, dc) in net.distribution_centers.iter().enumerate() {
            let mut coeffs = self.row();
            for p in 0..net.num_plants() {
                coeffs[self.layout.plant_to_dc(p, d)] = 1.0;
            }
            lp.add_constraint(format!("DC_Capacity_{}", dc), coeffs, ConstraintOp::Le, net.dc_capacity[d]);
        }
    }

    /// Inflow minus outflow is zero at every DC
    fn add_flow_balance(&self, lp: &mut LpProblem) {
        let net = self.network;
        for (d, dc) in net.distribution_centers.iter().enumerate() {
            let mut coeffs = self.row();
            for p in 0..net.num_plants() {
                coeffs[self.layout.plant_to_dc(p, d)] = 1.0;
            }
            for c in 0..net.num_customers() {
                coeffs[self.layout.dc_to_customer(d, c)] = -1.0;
            }
            lp.add_constraint(format!("Flow_Balance_{}", dc), coeffs, ConstraintOp::Eq, 0.0);
        }
    }
}

/// A network together with its LP, ready to hand to the solver
#[derive(Debug, Clone)]
pub struct FlowModel {
    pub network: Network,
    pub layout: VariableLayout,
    pub lp_problem: LpProblem,
}

impl FlowModel {
    pub fn new(network: Network) -> Self {
        let builder = ModelBuilder::new(&network);
        let layout = builder.layout();
        let lp_problem = builder.build();
        Self {
            network,
            layout,
            lp_problem,
        }
    }

    /// Validate a config and build its model; nothing is solved on error
    pub fn from_config(config: &NetworkConfig) -> Result<Self, NetworkError> {
        Ok(Self::new(Network::from_config(config)?))
    }

    /// Run the solver and map its answer back onto the network's arcs
    pub fn solve(&self, solver: &Solver) -> Result<FlowSolution, NetworkError> {
        let solution = solver.solve(&self.lp_problem);
        info!(status = %solution.status, "solver finished");
        FlowSolution::from_lp(self, solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_model() -> FlowModel {
        FlowModel::from_config(&NetworkConfig::default()).unwrap()
    }

    #[test]
    fn test_layout_positions() {
        let model = default_model();
        let layout = model.layout;

        assert_eq!(layout.len(), 8);
        assert_eq!(layout.plant_to_dc(1, 0), 2);
        assert_eq!(layout.dc_to_customer(0, 0), 4);
        assert_eq!(layout.dc_to_customer(1, 1), 7);
        assert_eq!(model.lp_problem.variables[layout.plant_to_dc(0, 1)], "Flow_Plant_to_DC_Plant1_DC2");
        assert_eq!(model.lp_problem.variables[layout.dc_to_customer(1, 0)], "Flow_DC_to_Customer_DC2_Customer1");
    }

    #[test]
    fn test_objective_coefficients() {
        let model = default_model();

        // production + transport, then handling + transport
        assert_eq!(
            model.lp_problem.objective.coefficients,
            vec![12.0, 14.0, 15.0, 13.0, 6.0, 7.0, 5.5, 4.5]
        );
        assert!(model.lp_problem.objective.minimize);
    }

    #[test]
    fn test_constraint_families_in_order() {
        let model = default_model();
        let names: Vec<&str> = model.lp_problem.constraints.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(
            names,
            vec![
                "Plant_Capacity_Plant1",
                "Plant_Capacity_Plant2",
                "Customer_Demand_Customer1",
                "Customer_Demand_Customer2",
                "DC_Capacity_DC1",
                "DC_Capacity_DC2",
                "Flow_Balance_DC1",
                "Flow_Balance_DC2",
            ]
        );
    }

    #[test]
    fn test_constraint_rows() {
        let model = default_model();
        let lp = &model.lp_problem;

        let plant = lp.constraint("Plant_Capacity_Plant2").unwrap();
        assert_eq!(plant.op, ConstraintOp::Le);
        assert_eq!(plant.rhs, 800.0);
        assert_eq!(plant.coefficients, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);

        let demand = lp.constraint("Customer_Demand_Customer1").unwrap();
        assert_eq!(demand.op, ConstraintOp::Ge);
        assert_eq!(demand.rhs, 600.0);
        assert_eq!(demand.coefficients, vec![0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0]);

        let dc = lp.constraint("DC_Capacity_DC1").unwrap();
        assert_eq!(dc.rhs, 1200.0);
        assert_eq!(dc.coefficients, vec![1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

        let balance = lp.constraint("Flow_Balance_DC2").unwrap();
        assert_eq!(balance.op, ConstraintOp::Eq);
        assert_eq!(balance.rhs, 0.0);
        assert_eq!(balance.coefficients, vec![0.0, 1.0, 0.0, 1.0, 0.0, 0.0, -1.0, -1.0]);
    }

    #[test]
    fn test_missing_entry_fails_before_solving() {
        let mut config = NetworkConfig::default();
        config.dc_capacity.remove("DC1");

        let err = FlowModel::from_config(&config).unwrap_err();

        assert_eq!(err.to_string(), "Missing dcCapacity entry for DC1");
    }
}
