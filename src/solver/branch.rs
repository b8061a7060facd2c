//! Depth-first branch-and-bound over LP relaxations.
//!
//! Branching rules:
//! - the ceiling child (`x = 1`) is explored before the floor child, which
//!   tends to reach a feasible cover quickly;
//! - the branching variable maximizes the product of its estimated down and
//!   up bound gains (pseudo-costs learned from earlier branchings);
//! - ties are broken at random with a seedable `ChaCha8Rng`.

use std::ops::ControlFlow;
use std::time::Instant;

use rand::seq::IndexedRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::error::SolverError;
use crate::model::Model;

use super::{
    lp, CoverageSolver, Progress, Relaxation, Solution, SolveStatus, SolverSettings,
    INTEGRALITY_TOLERANCE,
};

/// Floor applied to gain estimates so a zero gain on one side still ranks.
const SCORE_FLOOR: f64 = 1e-6;

/// Relative slack within which two branching scores count as tied.
const TIE_TOLERANCE: f64 = 1e-9;

/// Feasibility slack when checking a rounded LP point.
const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Branch-and-bound engine backed by `microlp` relaxations.
#[derive(Debug, Clone, Default)]
pub struct BranchAndBound {
    settings: SolverSettings,
}

#[derive(Debug, Clone, Copy)]
struct Branch {
    var: usize,
    up: bool,
    /// Distance the variable was moved by this branching.
    distance: f64,
    parent_objective: f64,
}

#[derive(Debug, Clone)]
struct Node {
    lower: Vec<f64>,
    upper: Vec<f64>,
    /// Relaxation objective of the parent; a lower bound for this subtree.
    bound: f64,
    depth: u32,
    branch: Option<Branch>,
}

impl Node {
    fn root(num_vars: usize) -> Self {
        Self {
            lower: vec![0.0; num_vars],
            upper: vec![1.0; num_vars],
            bound: f64::NEG_INFINITY,
            depth: 0,
            branch: None,
        }
    }

    /// Splits on `var`, returning (floor child, ceiling child).
    fn split(&self, var: usize, value: f64, objective: f64) -> (Node, Node) {
        let mut down = self.clone();
        down.upper[var] = 0.0;
        down.bound = objective;
        down.depth = self.depth + 1;
        down.branch = Some(Branch {
            var,
            up: false,
            distance: value,
            parent_objective: objective,
        });

        let mut up = self.clone();
        up.lower[var] = 1.0;
        up.bound = objective;
        up.depth = self.depth + 1;
        up.branch = Some(Branch {
            var,
            up: true,
            distance: 1.0 - value,
            parent_objective: objective,
        });

        (down, up)
    }
}

/// Per-variable average bound gain per unit of change, by direction.
#[derive(Debug, Clone)]
struct PseudoCosts {
    down_sum: Vec<f64>,
    down_count: Vec<u32>,
    up_sum: Vec<f64>,
    up_count: Vec<u32>,
}

impl PseudoCosts {
    fn new(num_vars: usize) -> Self {
        Self {
            down_sum: vec![0.0; num_vars],
            down_count: vec![0; num_vars],
            up_sum: vec![0.0; num_vars],
            up_count: vec![0; num_vars],
        }
    }

    fn record(&mut self, branch: &Branch, objective: f64) {
        let gain =
            (objective - branch.parent_objective).max(0.0) / branch.distance.max(SCORE_FLOOR);
        if branch.up {
            self.up_sum[branch.var] += gain;
            self.up_count[branch.var] += 1;
        } else {
            self.down_sum[branch.var] += gain;
            self.down_count[branch.var] += 1;
        }
    }

    /// Mean over initialized variables; 1.0 before any branching.
    fn fallback(sum: &[f64], count: &[u32]) -> f64 {
        let (total, n) = sum
            .iter()
            .zip(count)
            .filter(|(_, &c)| c > 0)
            .fold((0.0, 0u32), |(total, n), (&s, &c)| (total + s / f64::from(c), n + 1));
        if n == 0 {
            1.0
        } else {
            total / f64::from(n)
        }
    }

    fn estimate(sum: &[f64], count: &[u32], var: usize, fallback: f64) -> f64 {
        if count[var] > 0 {
            sum[var] / f64::from(count[var])
        } else {
            fallback
        }
    }
}

struct Incumbent {
    objective: f64,
    values: Vec<f64>,
}

fn is_integral(value: f64) -> bool {
    (value - value.round()).abs() <= INTEGRALITY_TOLERANCE
}

/// Picks the fractional variable with the best pseudo-cost product score.
fn select_branch(values: &[f64], costs: &PseudoCosts, rng: &mut ChaCha8Rng) -> Option<usize> {
    let down_fallback = PseudoCosts::fallback(&costs.down_sum, &costs.down_count);
    let up_fallback = PseudoCosts::fallback(&costs.up_sum, &costs.up_count);

    let mut best_score = 0.0;
    let mut ties: Vec<usize> = Vec::new();
    for (var, &value) in values.iter().enumerate() {
        if is_integral(value) {
            continue;
        }
        let fraction = value - value.floor();
        let down = PseudoCosts::estimate(&costs.down_sum, &costs.down_count, var, down_fallback)
            * fraction;
        let up = PseudoCosts::estimate(&costs.up_sum, &costs.up_count, var, up_fallback)
            * (1.0 - fraction);
        let score = down.max(SCORE_FLOOR) * up.max(SCORE_FLOOR);

        if ties.is_empty() || score > best_score * (1.0 + TIE_TOLERANCE) {
            best_score = score;
            ties.clear();
            ties.push(var);
        } else if score >= best_score * (1.0 - TIE_TOLERANCE) {
            ties.push(var);
        }
    }

    ties.choose(rng).copied()
}

fn lowest_bound(stack: &[Node]) -> f64 {
    stack.iter().map(|n| n.bound).fold(f64::INFINITY, f64::min)
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

impl BranchAndBound {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    fn create_rng(&self) -> ChaCha8Rng {
        match self.settings.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        }
    }

    fn limit_reached(&self, nodes: u64, start: Instant) -> Option<&'static str> {
        if self.settings.node_limit.is_some_and(|limit| nodes >= limit) {
            return Some("node limit");
        }
        if self
            .settings
            .time_limit
            .is_some_and(|limit| start.elapsed() >= limit)
        {
            return Some("time limit");
        }
        None
    }
}

impl CoverageSolver for BranchAndBound {
    fn relax(&self, model: &Model) -> Result<Option<Relaxation>, SolverError> {
        lp::solve_relaxation(model)
    }

    fn solve(
        &self,
        model: &Model,
        on_progress: &mut dyn FnMut(&Progress) -> ControlFlow<()>,
    ) -> Result<Solution, SolverError> {
        let start = Instant::now();
        let gap = self.settings.mip_gap;
        let mut rng = self.create_rng();
        let mut costs = PseudoCosts::new(model.num_vars());

        let mut stack = vec![Node::root(model.num_vars())];
        let mut incumbent: Option<Incumbent> = None;
        // lowest bound among subtrees closed by the gap rule
        let mut pruned_bound = f64::INFINITY;
        let mut nodes = 0u64;
        let mut iterations = 0u64;
        let mut last_poll = start;
        let mut stop_reason: Option<&'static str> = None;

        while let Some(node) = stack.pop() {
            if let Some(best) = &incumbent {
                if best.objective - node.bound <= gap {
                    pruned_bound = pruned_bound.min(node.bound);
                    continue;
                }
            }

            if let Some(reason) = self.limit_reached(nodes, start) {
                stop_reason = Some(reason);
                stack.push(node);
                break;
            }

            if last_poll.elapsed() >= self.settings.progress_interval {
                last_poll = Instant::now();
                let progress = Progress {
                    iterations,
                    nodes,
                    open_nodes: stack.len() + 1,
                    elapsed: start.elapsed(),
                    best_bound: finite(lowest_bound(&stack).min(node.bound).min(pruned_bound)),
                    incumbent: incumbent.as_ref().map(|best| best.objective),
                };
                if on_progress(&progress).is_break() {
                    stop_reason = Some("interrupted");
                    stack.push(node);
                    break;
                }
            }

            nodes += 1;
            iterations += 1;
            let Some(relaxation) = lp::solve_bounded(model, &node.lower, &node.upper)? else {
                continue;
            };

            if let Some(branch) = &node.branch {
                costs.record(branch, relaxation.objective);
            }

            if let Some(best) = &incumbent {
                if best.objective - relaxation.objective <= gap {
                    pruned_bound = pruned_bound.min(relaxation.objective);
                    continue;
                }
            }

            match select_branch(&relaxation.values, &costs, &mut rng) {
                Some(var) => {
                    let (down, up) = node.split(var, relaxation.values[var], relaxation.objective);
                    // ceiling child on top of the stack
                    stack.push(down);
                    stack.push(up);
                }
                None => {
                    let values: Vec<f64> = relaxation
                        .values
                        .iter()
                        .map(|v| v.round().clamp(0.0, 1.0))
                        .collect();
                    if !model.is_feasible(&values, FEASIBILITY_TOLERANCE) {
                        warn!(depth = node.depth, "Rounded integral relaxation violates a row");
                        continue;
                    }
                    let objective = model.objective(&values);
                    if incumbent
                        .as_ref()
                        .is_none_or(|best| objective < best.objective)
                    {
                        debug!(objective, nodes, depth = node.depth, "New incumbent");
                        incumbent = Some(Incumbent { objective, values });
                    }
                }
            }
        }

        let elapsed = start.elapsed();
        let proven = lowest_bound(&stack).min(pruned_bound);

        let solution = match (stop_reason, incumbent) {
            (Some(reason), incumbent) => {
                warn!(reason, nodes, "Branch and bound stopped early");
                let (objective, values) = match incumbent {
                    Some(best) => (Some(best.objective), best.values),
                    None => (None, Vec::new()),
                };
                let bound = objective.map_or(proven, |o| proven.min(o));
                Solution {
                    status: SolveStatus::Aborted,
                    objective,
                    best_bound: finite(bound),
                    values,
                    nodes,
                    iterations,
                    elapsed,
                }
            }
            (None, None) => Solution::infeasible(nodes, iterations, elapsed),
            (None, Some(best)) => {
                let bound = proven.min(best.objective);
                // an integer objective less than one unit above the bound is optimal
                let status = if best.objective - bound < 1.0 - INTEGRALITY_TOLERANCE {
                    SolveStatus::Optimal
                } else {
                    SolveStatus::FeasibleWithinGap
                };
                Solution {
                    status,
                    objective: Some(best.objective),
                    best_bound: Some(bound),
                    values: best.values,
                    nodes,
                    iterations,
                    elapsed,
                }
            }
        };

        debug!(
            status = %solution.status,
            nodes = solution.nodes,
            iterations = solution.iterations,
            "Branch and bound finished"
        );
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CoverageConstraint;
    use std::time::Duration;

    fn row(name: &str, indices: &[usize], rhs: u32) -> CoverageConstraint {
        CoverageConstraint::new(name, indices.to_vec(), rhs)
    }

    fn engine() -> BranchAndBound {
        BranchAndBound::new(SolverSettings::default().with_seed(42))
    }

    fn no_progress(_: &Progress) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn selected(solution: &Solution) -> Vec<usize> {
        solution
            .values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > 0.5)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_cat_dog_needs_all_three() {
        let model = Model::new(3, vec![row("cat", &[0, 1], 2), row("dog", &[0, 2], 2)]);
        let solution = engine().solve(&model, &mut no_progress).unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert_eq!(solution.objective, Some(3.0));
        assert_eq!(selected(&solution), vec![0, 1, 2]);
    }

    #[test]
    fn test_triangle_branches_to_integer_optimum() {
        let model = Model::new(
            3,
            vec![
                row("ab", &[0, 1], 1),
                row("bc", &[1, 2], 1),
                row("ac", &[0, 2], 1),
            ],
        );
        let solution = engine().solve(&model, &mut no_progress).unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert_eq!(solution.objective, Some(2.0));
        assert!(model.is_feasible(&solution.values, 1e-9));
        assert!(solution.nodes > 1);
    }

    #[test]
    fn test_infeasible_model() {
        let model = Model::new(2, vec![row("x", &[0, 1], 3)]);
        let solution = engine().solve(&model, &mut no_progress).unwrap();
        assert_eq!(solution.status, SolveStatus::Infeasible);
        assert!(!solution.has_assignment());
    }

    #[test]
    fn test_unconstrained_item_not_selected() {
        let model = Model::new(3, vec![row("a", &[0, 2], 1)]);
        let solution = engine().solve(&model, &mut no_progress).unwrap();
        assert_eq!(solution.objective, Some(1.0));
        assert_eq!(solution.values[1], 0.0);
    }

    #[test]
    fn test_exact_mode_matches_default_objective() {
        // 5-cycle: LP optimum 2.5, integer optimum 3
        let model = Model::new(
            5,
            vec![
                row("e01", &[0, 1], 1),
                row("e12", &[1, 2], 1),
                row("e23", &[2, 3], 1),
                row("e34", &[3, 4], 1),
                row("e04", &[0, 4], 1),
            ],
        );
        let fast = engine().solve(&model, &mut no_progress).unwrap();
        let exact = BranchAndBound::new(SolverSettings::exact().with_seed(42))
            .solve(&model, &mut no_progress)
            .unwrap();
        assert_eq!(fast.objective, Some(3.0));
        assert_eq!(exact.objective, Some(3.0));
        assert_eq!(exact.status, SolveStatus::Optimal);
        assert!(exact.gap().unwrap() < 1e-6);
    }

    #[test]
    fn test_wide_gap_reports_feasible_within_gap() {
        let model = Model::new(
            5,
            vec![
                row("e01", &[0, 1], 1),
                row("e12", &[1, 2], 1),
                row("e23", &[2, 3], 1),
                row("e34", &[3, 4], 1),
                row("e04", &[0, 4], 1),
            ],
        );
        let solver =
            BranchAndBound::new(SolverSettings::default().with_mip_gap(10.0).with_seed(1));
        let solution = solver.solve(&model, &mut no_progress).unwrap();
        assert!(model.is_feasible(&solution.values, 1e-9));
        assert!(matches!(
            solution.status,
            SolveStatus::Optimal | SolveStatus::FeasibleWithinGap
        ));
        if solution.status == SolveStatus::FeasibleWithinGap {
            assert!(solution.gap().unwrap() >= 1.0 - INTEGRALITY_TOLERANCE);
        }
    }

    #[test]
    fn test_node_limit_aborts() {
        let model = Model::new(
            3,
            vec![
                row("ab", &[0, 1], 1),
                row("bc", &[1, 2], 1),
                row("ac", &[0, 2], 1),
            ],
        );
        let solver =
            BranchAndBound::new(SolverSettings::default().with_node_limit(1).with_seed(3));
        let solution = solver.solve(&model, &mut no_progress).unwrap();
        assert_eq!(solution.status, SolveStatus::Aborted);
        assert_eq!(solution.nodes, 1);
        // root relaxation is fractional, so no incumbent yet
        assert!(!solution.has_assignment());
        assert!((solution.best_bound.unwrap() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_node_limit_keeps_incumbent() {
        let cycle: [[usize; 2]; 7] = [[0, 1], [1, 2], [2, 3], [3, 4], [4, 5], [5, 6], [0, 6]];
        let rows = cycle
            .iter()
            .enumerate()
            .map(|(n, pair)| row(&format!("e{}", n), pair, 1))
            .collect();
        let model = Model::new(7, rows);

        // the root is all halves; the first ceiling child is integral
        let solver =
            BranchAndBound::new(SolverSettings::exact().with_node_limit(2).with_seed(42));
        let solution = solver.solve(&model, &mut no_progress).unwrap();

        assert_eq!(solution.status, SolveStatus::Aborted);
        assert_eq!(solution.nodes, 2);
        assert_eq!(solution.objective.map(f64::round), Some(4.0));
        assert!(model.is_feasible(&solution.values, 1e-9));
        let bound = solution.best_bound.unwrap();
        assert!(bound <= 4.0 + 1e-9);
        assert!((bound - 3.5).abs() < 1e-6);
    }

    #[test]
    fn test_callback_abort() {
        let model = Model::new(3, vec![row("a", &[0, 1, 2], 2)]);
        let solver = BranchAndBound::new(
            SolverSettings::default()
                .with_progress_interval(Duration::ZERO)
                .with_seed(5),
        );
        let mut calls = 0;
        let mut stop_now = |progress: &Progress| {
            calls += 1;
            assert_eq!(progress.nodes, 0);
            ControlFlow::Break(())
        };
        let solution = solver.solve(&model, &mut stop_now).unwrap();
        assert_eq!(calls, 1);
        assert_eq!(solution.status, SolveStatus::Aborted);
        assert_eq!(solution.nodes, 0);
        assert!(solution.objective.is_none());
    }

    #[test]
    fn test_progress_reports_counts() {
        let model = Model::new(
            5,
            vec![
                row("e01", &[0, 1], 1),
                row("e12", &[1, 2], 1),
                row("e23", &[2, 3], 1),
                row("e34", &[3, 4], 1),
                row("e04", &[0, 4], 1),
            ],
        );
        let solver = BranchAndBound::new(
            SolverSettings::default()
                .with_progress_interval(Duration::ZERO)
                .with_seed(9),
        );
        let mut snapshots = Vec::new();
        let mut record = |progress: &Progress| {
            snapshots.push(progress.clone());
            ControlFlow::Continue(())
        };
        let solution = solver.solve(&model, &mut record).unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert!(!snapshots.is_empty());
        assert!(snapshots.windows(2).all(|w| w[0].nodes <= w[1].nodes));
        assert!(snapshots.iter().all(|s| s.nodes <= solution.nodes));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let model = Model::new(
            6,
            vec![
                row("a", &[0, 1, 2], 2),
                row("b", &[2, 3, 4], 2),
                row("c", &[4, 5, 0], 2),
            ],
        );
        let first = engine().solve(&model, &mut no_progress).unwrap();
        let second = engine().solve(&model, &mut no_progress).unwrap();
        assert_eq!(first.values, second.values);
        assert_eq!(first.nodes, second.nodes);
    }

    #[test]
    fn test_select_branch_prefers_most_fractional_without_history() {
        let costs = PseudoCosts::new(3);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let var = select_branch(&[0.9, 0.5, 1.0], &costs, &mut rng);
        assert_eq!(var, Some(1));
        assert_eq!(select_branch(&[0.0, 1.0], &costs, &mut rng), None);
    }

    #[test]
    fn test_pseudo_costs_learn_gain() {
        let mut costs = PseudoCosts::new(2);
        costs.record(
            &Branch {
                var: 0,
                up: true,
                distance: 0.5,
                parent_objective: 1.0,
            },
            2.0,
        );
        assert_eq!(costs.up_count[0], 1);
        assert!((costs.up_sum[0] - 2.0).abs() < 1e-12);
        assert!((PseudoCosts::fallback(&costs.up_sum, &costs.up_count) - 2.0).abs() < 1e-12);
        assert_eq!(PseudoCosts::fallback(&costs.down_sum, &costs.down_count), 1.0);
    }
}
