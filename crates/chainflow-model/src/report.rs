use chainflow_solver::{Analysis, SolutionStatus};

use crate::solution::FlowSolution;

/// Plain-text console report for a solved network
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    show_analysis: bool,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_analysis(mut self, show: bool) -> Self {
        self.show_analysis = show;
        self
    }

    pub fn render(&self, solution: &FlowSolution) -> String {
        self.lines(solution).join("\n")
    }

    /// Status, cost, then one line per plant to DC arc and per DC to
    /// customer arc in solution order
    pub fn lines(&self, solution: &FlowSolution) -> Vec<String> {
        let mut lines = vec![format!("Optimization Status: {}", solution.status)];

        match solution.status {
            SolutionStatus::Optimal => {
                if let Some(cost) = solution.objective_value {
                    lines.push(format!("Optimal Total Cost: {}", cost));
                }
                for f in solution.flows() {
                    lines.push(format!("Flow from {} to {}: {} units", f.origin, f.destination, f.quantity));
                }
                if self.show_analysis {
                    if let Some(ref analysis) = solution.analysis {
                        lines.extend(analysis_lines(analysis));
                    }
                }
            }
            SolutionStatus::Infeasible => {
                lines.push("No flow assignment satisfies all constraints.".to_string());
                if !solution.violations.is_empty() {
                    lines.push("Violated constraints:".to_string());
                    for v in &solution.violations {
                        lines.push(format!("  - {}", v.description));
                    }
                }
            }
            SolutionStatus::Unbounded => {
                lines.push("The problem has no finite optimal cost.".to_string());
            }
            SolutionStatus::NotSolved | SolutionStatus::Error => {
                lines.push("Solver did not produce a solution.".to_string());
            }
        }

        lines
    }
}

fn analysis_lines(analysis: &Analysis) -> Vec<String> {
    let mut lines = vec![String::new(), "Analysis:".to_string()];

    if !analysis.binding_constraints.is_empty() {
        lines.push(String::new());
        lines.push("Binding constraints (pinch points):".to_string());
        for name in &analysis.binding_constraints {
            lines.push(format!("  - {}", name));
        }
    }

    let priced: Vec<_> = analysis.shadow_prices.iter().filter(|sp| sp.value.abs() > 0.001).collect();
    if !priced.is_empty() {
        lines.push(String::new());
        lines.push("Shadow prices:".to_string());
        for sp in priced {
            lines.push(format!("  {:30} {:10.4}", sp.constraint, sp.value));
            lines.push(format!("    {}", sp.interpretation));
        }
    }

    let unused: Vec<_> = analysis
        .reduced_costs
        .iter()
        .filter(|rc| !rc.is_basic && rc.reduced_cost.abs() > 0.001)
        .collect();
    if !unused.is_empty() {
        lines.push(String::new());
        lines.push("Reduced costs (arcs not in solution):".to_string());
        for rc in unused {
            lines.push(format!(
                "  {:36} cost must decrease by {:.2} to enter solution",
                rc.variable, rc.reduced_cost
            ));
        }
    }

    lines
}
