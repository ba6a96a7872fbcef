use std::fmt;

/// The result of solving an LP problem
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Optimal values for each variable (empty unless optimal)
    pub values: Vec<f64>,
    /// Optimal objective value
    pub objective_value: f64,
    /// Detailed analysis
    pub analysis: Analysis,
    /// Constraint violations (populated when infeasible)
    pub violations: Vec<ConstraintViolation>,
    /// Why the solver stopped without a verdict
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// The problem is unbounded
    Unbounded,
    /// The solver stopped before reaching a verdict
    NotSolved,
    /// Solver encountered an error
    Error,
}

impl SolutionStatus {
    pub fn is_optimal(self) -> bool {
        self == SolutionStatus::Optimal
    }

    /// Integer status code in the convention used by common LP front-ends
    pub fn code(self) -> i32 {
        match self {
            SolutionStatus::Optimal => 1,
            SolutionStatus::NotSolved => 0,
            SolutionStatus::Infeasible => -1,
            SolutionStatus::Unbounded => -2,
            SolutionStatus::Error => -3,
        }
    }
}

impl fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SolutionStatus::Optimal => "Optimal",
            SolutionStatus::Infeasible => "Infeasible",
            SolutionStatus::Unbounded => "Unbounded",
            SolutionStatus::NotSolved => "Not Solved",
            SolutionStatus::Error => "Error",
        };
        f.write_str(label)
    }
}

/// Detailed analysis of the optimal solution
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Analysis {
    /// Shadow prices (dual values) for each constraint
    /// Indicates how much the objective would change per unit relaxation
    pub shadow_prices: Vec<ShadowPrice>,

    /// Reduced costs for each variable
    /// For non-basic variables, indicates how much cost must change to enter solution
    pub reduced_costs: Vec<ReducedCost>,

    /// Which constraints are binding (tight) at optimum
    pub binding_constraints: Vec<String>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ShadowPrice {
    /// Constraint name
    pub constraint: String,
    /// Shadow price value
    pub value: f64,
    /// Interpretation
    pub interpretation: String,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReducedCost {
    /// Variable name
    pub variable: String,
    /// Current value in solution
    pub value: f64,
    /// Reduced cost
    pub reduced_cost: f64,
    /// Is this variable in the basis?
    pub is_basic: bool,
}

/// Information about a violated constraint
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ConstraintViolation {
    /// Constraint name
    pub constraint: String,
    /// Required value (from constraint RHS)
    pub required: f64,
    /// Actual value achieved
    pub actual: f64,
    /// How much the constraint is violated by
    pub violation_amount: f64,
    /// Human-readable description of what's wrong
    pub description: String,
}

impl Solution {
    pub fn optimal(values: Vec<f64>, objective_value: f64, analysis: Analysis) -> Self {
        Self {
            status: SolutionStatus::Optimal,
            values,
            objective_value,
            analysis,
            violations: Vec::new(),
            message: None,
        }
    }

    pub fn infeasible_with_violations(violations: Vec<ConstraintViolation>) -> Self {
        Self {
            status: SolutionStatus::Infeasible,
            values: Vec::new(),
            objective_value: f64::INFINITY,
            analysis: Analysis::default(),
            violations,
            message: None,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            status: SolutionStatus::Unbounded,
            values: Vec::new(),
            objective_value: f64::NEG_INFINITY,
            analysis: Analysis::default(),
            violations: Vec::new(),
            message: None,
        }
    }

    pub fn not_solved(message: impl Into<String>) -> Self {
        Self::stopped(SolutionStatus::NotSolved, message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::stopped(SolutionStatus::Error, message.into())
    }

    fn stopped(status: SolutionStatus, message: String) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective_value: f64::NAN,
            analysis: Analysis::default(),
            violations: Vec::new(),
            message: Some(message),
        }
    }
}
