use std::collections::HashMap;

use tracing::{debug, warn};

use crate::problem::{Constraint, ConstraintOp, LpProblem};
use crate::solution::{Analysis, ConstraintViolation, ReducedCost, ShadowPrice, Solution};

/// Simplex solver for linear programming problems
pub struct Solver {
    /// Maximum pivots per phase before giving up
    max_iterations: usize,
    /// Tolerance for floating point comparisons
    tolerance: f64,
    /// Consecutive degenerate pivots before switching to Bland's rule
    degenerate_limit: usize,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            tolerance: 1e-9,
            degenerate_limit: 50,
        }
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Solve the LP problem using the two-phase simplex method
    pub fn solve(&self, problem: &LpProblem) -> Solution {
        if let Err(e) = problem.validate() {
            warn!(error = %e, "rejecting malformed LP problem");
            return Solution::error(e.to_string());
        }

        debug!(
            variables = problem.num_variables(),
            constraints = problem.num_constraints(),
            "solving LP problem"
        );

        match self.run(problem) {
            SimplexResult::Optimal(tableau) => self.extract_solution(&tableau, problem),
            SimplexResult::Unbounded => Solution::unbounded(),
            SimplexResult::Infeasible => self.diagnose_infeasibility(problem),
            SimplexResult::IterationLimit(phase) => Solution::not_solved(format!(
                "iteration limit of {} reached in phase {}",
                self.max_iterations, phase
            )),
        }
    }

    fn run(&self, problem: &LpProblem) -> SimplexResult {
        let mut tableau = self.build_tableau(problem);

        // Phase 1: Find initial basic feasible solution
        if tableau.n_artificial > 0 {
            match self.phase1(&mut tableau) {
                PhaseResult::Optimal => {}
                PhaseResult::Unbounded | PhaseResult::Infeasible => return SimplexResult::Infeasible,
                PhaseResult::IterationLimit => return SimplexResult::IterationLimit(1),
            }
        }

        // Phase 2: Optimize
        match self.phase2(&mut tableau) {
            PhaseResult::Optimal => SimplexResult::Optimal(tableau),
            PhaseResult::Unbounded => SimplexResult::Unbounded,
            PhaseResult::Infeasible => SimplexResult::Infeasible,
            PhaseResult::IterationLimit => SimplexResult::IterationLimit(2),
        }
    }

    /// When the original problem is infeasible, explain why by relaxing
    /// constraints and reporting which ones are violated
    fn diagnose_infeasibility(&self, problem: &LpProblem) -> Solution {
        // Strategy: solve with only <= and = constraints to get a baseline,
        // then check which >= constraints (lower bounds) are violated
        let mut relaxed = LpProblem::new(problem.variables.clone());
        relaxed.set_objective(
            problem.objective.coefficients.clone(),
            problem.objective.minimize,
        );
        for c in problem.constraints.iter().filter(|c| c.op != ConstraintOp::Ge) {
            relaxed.add_constraint(c.name.clone(), c.coefficients.clone(), c.op, c.rhs);
        }

        let relaxed_solution = match self.run(&relaxed) {
            SimplexResult::Optimal(tableau) => self.extract_solution(&tableau, &relaxed),
            _ => {
                // Even relaxed problem fails - analyze direct conflicts
                return self.analyze_conflicts(problem);
            }
        };

        let violations = self.find_violations(problem, &relaxed_solution.values);

        if violations.is_empty() {
            // The relaxed optimum satisfies every row, so it is optimal for the original too
            debug!("phase 1 reported infeasibility but relaxed optimum is feasible");
            return self.extract_relaxed_as_optimal(problem, relaxed_solution);
        }

        debug!(violations = violations.len(), "problem is infeasible");
        Solution::infeasible_with_violations(violations)
    }

    fn extract_relaxed_as_optimal(&self, problem: &LpProblem, relaxed: Solution) -> Solution {
        let objective_value = problem.objective.evaluate(&relaxed.values);
        Solution::optimal(relaxed.values, objective_value, relaxed.analysis)
    }

    /// Find which constraints are violated by a given solution
    fn find_violations(&self, problem: &LpProblem, values: &[f64]) -> Vec<ConstraintViolation> {
        let mut violations = Vec::new();

        for c in &problem.constraints {
            let lhs = c.lhs(values);
            let tol = self.row_tolerance(c);

            let violation = match c.op {
                ConstraintOp::Le if lhs > c.rhs + tol => {
                    let amt = lhs - c.rhs;
                    Some((amt, format!("{} exceeds maximum of {:.2} by {:.2}", c.name, c.rhs, amt)))
                }
                ConstraintOp::Ge if lhs < c.rhs - tol => {
                    let amt = c.rhs - lhs;
                    Some((amt, format!("{} is below minimum of {:.2} by {:.2}", c.name, c.rhs, amt)))
                }
                ConstraintOp::Eq if (lhs - c.rhs).abs() > tol => {
                    let amt = (lhs - c.rhs).abs();
                    Some((amt, format!("{} requires exactly {:.2} but got {:.2}", c.name, c.rhs, lhs)))
                }
                _ => None,
            };

            if let Some((violation_amount, description)) = violation {
                violations.push(ConstraintViolation {
                    constraint: c.name.clone(),
                    required: c.rhs,
                    actual: lhs,
                    violation_amount,
                    description,
                });
            }
        }

        // Sort by violation amount (worst first)
        violations.sort_by(|a, b| b.violation_amount.total_cmp(&a.violation_amount));

        violations
    }

    /// Analyze direct constraint conflicts when even relaxed solve fails
    fn analyze_conflicts(&self, problem: &LpProblem) -> Solution {
        let mut violations = Vec::new();

        // Look for obvious conflicts: min > max on the same expression
        // Group constraints by their coefficient sign pattern
        let mut constraint_groups: HashMap<Vec<i8>, Vec<&Constraint>> = HashMap::new();

        for c in &problem.constraints {
            let key: Vec<i8> = c
                .coefficients
                .iter()
                .map(|&x| {
                    if x.abs() < self.tolerance {
                        0
                    } else if x > 0.0 {
                        1
                    } else {
                        -1
                    }
                })
                .collect();
            constraint_groups.entry(key).or_default().push(c);
        }

        for constraints in constraint_groups.values() {
            let mut min_bound: Option<(f64, &str)> = None;
            let mut max_bound: Option<(f64, &str)> = None;

            for c in constraints {
                match c.op {
                    ConstraintOp::Ge => {
                        if min_bound.is_none_or(|(v, _)| c.rhs > v) {
                            min_bound = Some((c.rhs, &c.name));
                        }
                    }
                    ConstraintOp::Le => {
                        if max_bound.is_none_or(|(v, _)| c.rhs < v) {
                            max_bound = Some((c.rhs, &c.name));
                        }
                    }
                    ConstraintOp::Eq => {
                        min_bound = Some((c.rhs, &c.name));
                        max_bound = Some((c.rhs, &c.name));
                    }
                }
            }

            if let (Some((min_val, min_name)), Some((max_val, max_name))) = (min_bound, max_bound) {
                if min_val > max_val + self.tolerance {
                    violations.push(ConstraintViolation {
                        constraint: format!("{} vs {}", min_name, max_name),
                        required: min_val,
                        actual: max_val,
                        violation_amount: min_val - max_val,
                        description: format!(
                            "Conflict: {} requires >= {:.2} but {} requires <= {:.2}",
                            min_name, min_val, max_name, max_val
                        ),
                    });
                }
            }
        }

        violations.sort_by(|a, b| b.violation_amount.total_cmp(&a.violation_amount));
        Solution::infeasible_with_violations(violations)
    }

    fn build_tableau(&self, problem: &LpProblem) -> Tableau {
        let n_vars = problem.num_variables();
        let n_constraints = problem.num_constraints();

        // Count slack and artificial variables needed
        let mut n_slack = 0;
        let mut n_artificial = 0;

        for c in &problem.constraints {
            if c.op != ConstraintOp::Eq {
                n_slack += 1; // slack or surplus
            }
            if needs_artificial(c) {
                n_artificial += 1;
            }
        }

        let total_cols = n_vars + n_slack + n_artificial + 1; // +1 for RHS
        let total_rows = n_constraints + 1; // +1 for objective
        let max_rhs = problem.constraints.iter().map(|c| c.rhs.abs()).fold(0.0, f64::max);

        let mut tableau = Tableau {
            data: vec![vec![0.0; total_cols]; total_rows],
            basic_vars: vec![0; n_constraints],
            dual_columns: Vec::with_capacity(n_constraints),
            flipped: vec![false; n_constraints],
            n_vars,
            n_slack,
            n_artificial,
            feasibility_tolerance: self.tolerance * (1.0 + max_rhs),
        };

        let mut slack_idx = n_vars;
        let mut artificial_idx = n_vars + n_slack;

        for (i, c) in problem.constraints.iter().enumerate() {
            for (j, &coef) in c.coefficients.iter().enumerate() {
                tableau.data[i][j] = coef;
            }

            // RHS (ensure non-negative)
            let mut rhs = c.rhs;
            let flip = rhs < 0.0;
            if flip {
                rhs = -rhs;
                for j in 0..n_vars {
                    tableau.data[i][j] = -tableau.data[i][j];
                }
            }
            tableau.flipped[i] = flip;
            tableau.data[i][total_cols - 1] = rhs;

            // Add slack/surplus/artificial
            match c.op {
                ConstraintOp::Le => {
                    let sign = if flip { -1.0 } else { 1.0 };
                    tableau.data[i][slack_idx] = sign;
                    if flip {
                        // a negated <= row needs an artificial start
                        tableau.data[i][artificial_idx] = 1.0;
                        tableau.basic_vars[i] = artificial_idx;
                    } else {
                        tableau.basic_vars[i] = slack_idx;
                    }
                    tableau.dual_columns.push((slack_idx, sign));
                    slack_idx += 1;
                }
                ConstraintOp::Ge => {
                    let sign = if flip { 1.0 } else { -1.0 };
                    tableau.data[i][slack_idx] = sign; // surplus
                    if flip {
                        tableau.basic_vars[i] = slack_idx;
                    } else {
                        tableau.data[i][artificial_idx] = 1.0;
                        tableau.basic_vars[i] = artificial_idx;
                    }
                    tableau.dual_columns.push((slack_idx, sign));
                    slack_idx += 1;
                }
                ConstraintOp::Eq => {
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    tableau.dual_columns.push((artificial_idx, 1.0));
                }
            }

            if needs_artificial(c) {
                artificial_idx += 1;
            }
        }

        // Objective row (last row)
        // Simplex maximizes, so for minimization we negate the coefficients
        let obj_row = n_constraints;
        for (j, &coef) in problem.objective.coefficients.iter().enumerate() {
            tableau.data[obj_row][j] = if problem.objective.minimize { -coef } else { coef };
        }

        tableau
    }

    fn phase1(&self, tableau: &mut Tableau) -> PhaseResult {
        // Auxiliary objective: maximize -sum(artificials)
        let n_constraints = tableau.data.len() - 1;
        let n_cols = tableau.data[0].len();
        let art_start = tableau.artificial_start();

        let orig_obj = tableau.data[n_constraints].clone();

        for j in 0..n_cols {
            tableau.data[n_constraints][j] = 0.0;
        }
        for j in art_start..(art_start + tableau.n_artificial) {
            tableau.data[n_constraints][j] = -1.0;
        }

        // Price out the basic artificials
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start {
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] += tableau.data[i][j];
                }
            }
        }

        match self.iterate(tableau, n_cols - 1, 1) {
            PhaseResult::Optimal => {}
            other => return other,
        }

        // Check if all artificials are zero
        let rhs_col = n_cols - 1;
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start
                && tableau.data[i][rhs_col].abs() > tableau.feasibility_tolerance
            {
                return PhaseResult::Infeasible;
            }
        }

        self.drive_out_artificials(tableau);

        // Restore original objective and price out the basic variables
        tableau.data[n_constraints] = orig_obj;
        for i in 0..n_constraints {
            let basic = tableau.basic_vars[i];
            let ratio = tableau.data[n_constraints][basic];
            if ratio.abs() > self.tolerance {
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] -= ratio * tableau.data[i][j];
                }
            }
        }

        PhaseResult::Optimal
    }

    /// Pivot zero-level artificials out of the basis so phase 2 cannot
    /// raise them again. Rows with no usable column are redundant.
    fn drive_out_artificials(&self, tableau: &mut Tableau) {
        let n_constraints = tableau.data.len() - 1;
        let art_start = tableau.artificial_start();

        for i in 0..n_constraints {
            if tableau.basic_vars[i] < art_start {
                continue;
            }
            let entering = (0..art_start)
                .filter(|&j| tableau.data[i][j].abs() > self.tolerance)
                .max_by(|&a, &b| tableau.data[i][a].abs().total_cmp(&tableau.data[i][b].abs()));
            match entering {
                Some(col) => self.pivot(tableau, i, col),
                None => debug!(row = i, "redundant constraint row left with artificial basis"),
            }
        }
    }

    fn phase2(&self, tableau: &mut Tableau) -> PhaseResult {
        // Exclude artificial variable columns from pivoting
        let exclude_from = tableau.artificial_start();
        self.iterate(tableau, exclude_from, 2)
    }

    /// Pivot until no column below `column_limit` can improve the objective
    fn iterate(&self, tableau: &mut Tableau, column_limit: usize, phase: u8) -> PhaseResult {
        let mut iterations = 0;
        let mut degenerate_run = 0;

        loop {
            let bland = degenerate_run >= self.degenerate_limit;
            let Some(pivot_col) = self.find_pivot_column(tableau, column_limit, bland) else {
                debug!(phase, iterations, "simplex phase converged");
                return PhaseResult::Optimal;
            };
            if iterations >= self.max_iterations {
                warn!(phase, iterations, "simplex iteration limit reached");
                return PhaseResult::IterationLimit;
            }
            let Some((pivot_row, ratio)) = self.find_pivot_row(tableau, pivot_col, bland) else {
                debug!(phase, column = pivot_col, "no leaving row, objective is unbounded");
                return PhaseResult::Unbounded;
            };

            if ratio <= self.tolerance {
                degenerate_run += 1;
                if degenerate_run == self.degenerate_limit {
                    debug!(phase, iterations, "switching to Bland's rule after degenerate pivots");
                }
            } else {
                degenerate_run = 0;
            }

            self.pivot(tableau, pivot_row, pivot_col);
            iterations += 1;
        }
    }

    fn find_pivot_column(&self, tableau: &Tableau, column_limit: usize, bland: bool) -> Option<usize> {
        let obj_row = &tableau.data[tableau.data.len() - 1];

        if bland {
            // Lowest index with a positive reduced cost
            return (0..column_limit).find(|&j| obj_row[j] > self.tolerance);
        }

        // Look for the most positive reduced cost (can improve objective)
        let mut max_val = self.tolerance;
        let mut max_col = None;

        for (j, &val) in obj_row.iter().enumerate().take(column_limit) {
            if val > max_val {
                max_val = val;
                max_col = Some(j);
            }
        }

        max_col
    }

    fn find_pivot_row(&self, tableau: &Tableau, col: usize, bland: bool) -> Option<(usize, f64)> {
        let n_constraints = tableau.data.len() - 1;
        let rhs_col = tableau.data[0].len() - 1;

        let mut best: Option<(usize, f64)> = None;

        for i in 0..n_constraints {
            let val = tableau.data[i][col];
            if val <= self.tolerance {
                continue;
            }
            let ratio = tableau.data[i][rhs_col].max(0.0) / val;
            best = match best {
                None => Some((i, ratio)),
                Some((row, min_ratio)) => {
                    let tie = (ratio - min_ratio).abs() <= self.tolerance;
                    if bland && tie {
                        // Ties go to the lowest basic variable index
                        if tableau.basic_vars[i] < tableau.basic_vars[row] {
                            Some((i, ratio))
                        } else {
                            Some((row, min_ratio))
                        }
                    } else if ratio < min_ratio && !tie {
                        Some((i, ratio))
                    } else {
                        Some((row, min_ratio))
                    }
                }
            };
        }

        best
    }

    fn pivot(&self, tableau: &mut Tableau, row: usize, col: usize) {
        let n_cols = tableau.data[0].len();

        tableau.basic_vars[row] = col;

        // Scale pivot row
        let pivot_val = tableau.data[row][col];
        for j in 0..n_cols {
            tableau.data[row][j] /= pivot_val;
        }

        // Eliminate column in other rows
        let pivot_row = tableau.data[row].clone();
        for (i, data_row) in tableau.data.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = data_row[col];
            if factor == 0.0 {
                continue;
            }
            for (cell, &p) in data_row.iter_mut().zip(&pivot_row) {
                *cell -= factor * p;
            }
        }
    }

    fn extract_solution(&self, tableau: &Tableau, problem: &LpProblem) -> Solution {
        let n_vars = problem.num_variables();
        let rhs_col = tableau.data[0].len() - 1;

        let mut values = vec![0.0; n_vars];
        for (i, &basic) in tableau.basic_vars.iter().enumerate() {
            if basic < n_vars {
                let value = tableau.data[i][rhs_col];
                // Snap round-off residue so bounds hold exactly
                values[basic] = if value.abs() <= tableau.feasibility_tolerance { 0.0 } else { value };
            }
        }

        let objective_value = problem.objective.evaluate(&values);
        let analysis = self.analyze(tableau, problem, &values);

        Solution::optimal(values, objective_value, analysis)
    }

    fn analyze(&self, tableau: &Tableau, problem: &LpProblem, values: &[f64]) -> Analysis {
        let obj_row = &tableau.data[tableau.data.len() - 1];
        // Duals come out of the tableau in maximization sense
        let sense = if problem.objective.minimize { -1.0 } else { 1.0 };

        // Shadow price: change in objective per unit increase of the RHS
        let mut shadow_prices = Vec::with_capacity(problem.num_constraints());
        for (i, constraint) in problem.constraints.iter().enumerate() {
            let (col, coef) = tableau.dual_columns[i];
            let mut dual = -obj_row[col] / coef;
            if tableau.flipped[i] {
                dual = -dual;
            }
            let value = clean(sense * dual, self.tolerance);
            let interpretation = if value == 0.0 {
                "Non-binding constraint".to_string()
            } else if value < 0.0 {
                format!("Increasing RHS by 1 unit would decrease the objective by {:.4}", -value)
            } else {
                format!("Increasing RHS by 1 unit would increase the objective by {:.4}", value)
            };
            shadow_prices.push(ShadowPrice {
                constraint: constraint.name.clone(),
                value,
                interpretation,
            });
        }

        // Reduced cost: how far a coefficient must improve before the variable enters
        let reduced_costs = problem
            .variables
            .iter()
            .enumerate()
            .map(|(j, var_name)| {
                let is_basic = tableau.basic_vars.contains(&j);
                let reduced_cost = if is_basic { 0.0 } else { clean(-obj_row[j], self.tolerance) };
                ReducedCost {
                    variable: var_name.clone(),
                    value: values[j],
                    reduced_cost,
                    is_basic,
                }
            })
            .collect();

        let binding_constraints = problem
            .constraints
            .iter()
            .filter(|c| c.op == ConstraintOp::Eq || (c.lhs(values) - c.rhs).abs() <= self.row_tolerance(c))
            .map(|c| c.name.clone())
            .collect();

        Analysis {
            shadow_prices,
            reduced_costs,
            binding_constraints,
        }
    }

    fn row_tolerance(&self, c: &Constraint) -> f64 {
        self.tolerance * 1e3 * (1.0 + c.rhs.abs())
    }
}

/// Rows whose slack cannot start in the basis at a non-negative value
fn needs_artificial(c: &Constraint) -> bool {
    let flip = c.rhs < 0.0;
    match c.op {
        ConstraintOp::Le => flip,
        ConstraintOp::Ge => !flip,
        ConstraintOp::Eq => true,
    }
}

fn clean(value: f64, tolerance: f64) -> f64 {
    if value.abs() <= tolerance { 0.0 } else { value }
}

struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    /// Column and its coefficient that carries each row's dual value
    dual_columns: Vec<(usize, f64)>,
    flipped: Vec<bool>,
    n_vars: usize,
    n_slack: usize,
    n_artificial: usize,
    feasibility_tolerance: f64,
}

impl Tableau {
    fn artificial_start(&self) -> usize {
        self.n_vars + self.n_slack
    }
}

enum SimplexResult {
    Optimal(Tableau),
    Unbounded,
    Infeasible,
    IterationLimit(u8),
}

enum PhaseResult {
    Optimal,
    Unbounded,
    Infeasible,
    IterationLimit,
}
