use std::{
    error,
    fmt::Display,
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread,
    time::Duration,
};

use microlp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem};

use crate::constraint::ConstraintSystem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    Infeasible,
    Timeout(Duration),
    Backend(String),
}

impl Display for SolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveError::Infeasible => write!(
                f,
                "No count of button presses within bounds hits every joltage target exactly."
            ),
            SolveError::Timeout(limit) => {
                write!(f, "Solver gave no answer within {:?}.", limit)
            }
            SolveError::Backend(s) => write!(f, "Solver failed: {}", s),
        }
    }
}

impl error::Error for SolveError {}

impl From<microlp::Error> for SolveError {
    fn from(e: microlp::Error) -> Self {
        match e {
            microlp::Error::Infeasible => SolveError::Infeasible,
            microlp::Error::Unbounded => {
                SolveError::Backend("problem reported unbounded despite bounded presses".to_string())
            }
            microlp::Error::InternalError(s) => SolveError::Backend(s),
        }
    }
}

/// Optimal presses for one machine, one count per button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PressPlan {
    presses: Vec<usize>,
    total: usize,
}

impl PressPlan {
    pub fn new(presses: Vec<usize>, total: usize) -> Self {
        Self { presses, total }
    }

    pub fn presses(&self) -> &[usize] {
        &self.presses
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

impl Display for PressPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "presses per button {:?}, {} in total", self.presses, self.total)
    }
}

/// Anything that can find the cheapest integer solution of a [`ConstraintSystem`].
pub trait IntegerProgramSolver: Send + Sync {
    fn solve(&self, system: &ConstraintSystem) -> Result<PressPlan, SolveError>;

    fn name(&self) -> &'static str;
}

impl<S: IntegerProgramSolver + ?Sized> IntegerProgramSolver for Box<S> {
    fn solve(&self, system: &ConstraintSystem) -> Result<PressPlan, SolveError> {
        (**self).solve(system)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Branch and bound through [microlp](https://docs.rs/microlp).
#[derive(Debug, Default, Clone, Copy)]
pub struct MilpSolver;

impl IntegerProgramSolver for MilpSolver {
    fn solve(&self, system: &ConstraintSystem) -> Result<PressPlan, SolveError> {
        // A row without coefficients holds only when its target is zero.
        let mut live_rows = Vec::new();
        for (row, target) in system.coefficients().iter().zip(system.targets()) {
            if row.iter().all(|coeff| *coeff == 0) {
                if *target != 0 {
                    return Err(SolveError::Infeasible);
                }
            } else {
                live_rows.push((row, *target));
            }
        }
        if system.cols() == 0 {
            return Ok(PressPlan::new(Vec::new(), 0));
        }

        let mut problem = Problem::new(OptimizationDirection::Minimize);
        let mut variables = Vec::with_capacity(system.cols());
        for (cost, (min, max)) in system.objective().iter().zip(system.bounds()) {
            variables.push(
                problem.add_integer_var(*cost as f64, (to_bound(*min)?, to_bound(*max)?)),
            );
        }
        for (row, target) in live_rows {
            let mut expr = LinearExpr::empty();
            for (var, coeff) in variables.iter().zip(row).filter(|(_, coeff)| **coeff != 0) {
                expr.add(*var, *coeff as f64);
            }
            problem.add_constraint(expr, ComparisonOp::Eq, target as f64);
        }

        let solution = problem.solve()?;
        let presses = variables
            .iter()
            .map(|var| {
                let value = solution[*var].round();
                if value < 0.0 {
                    Err(SolveError::Backend(format!(
                        "negative press count {}",
                        value
                    )))
                } else {
                    Ok(value as usize)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        if !system.is_satisfied_by(&presses) {
            return Err(SolveError::Backend(format!(
                "presses {:?} do not satisfy the constraints",
                presses
            )));
        }

        let total = system.objective_value(&presses);
        Ok(PressPlan::new(presses, total))
    }

    fn name(&self) -> &'static str {
        "milp"
    }
}

fn to_bound(value: usize) -> Result<i32, SolveError> {
    i32::try_from(value)
        .map_err(|_| SolveError::Backend(format!("press bound {} is too large", value)))
}

/// Depth first enumeration of every press count, pruned by the best total
/// found so far. Exact, but only practical for small machines.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExhaustiveSolver;

impl IntegerProgramSolver for ExhaustiveSolver {
    fn solve(&self, system: &ConstraintSystem) -> Result<PressPlan, SolveError> {
        let mut search = Search::new(system);
        if search.has_uncovered_target() {
            return Err(SolveError::Infeasible);
        }

        search.visit(0, 0);
        search.best.ok_or(SolveError::Infeasible)
    }

    fn name(&self) -> &'static str {
        "exhaustive"
    }
}

struct Search<'a> {
    system: &'a ConstraintSystem,
    // Rows each button affects.
    affected: Vec<Vec<usize>>,
    // Rows whose last affecting button is the key.
    closed_rows: Vec<Vec<usize>>,
    caps: Vec<usize>,
    presses: Vec<usize>,
    remaining: Vec<usize>,
    best: Option<PressPlan>,
}

impl<'a> Search<'a> {
    fn new(system: &'a ConstraintSystem) -> Self {
        let affected = (0..system.cols())
            .map(|col| {
                (0..system.rows())
                    .filter(|row| system.coefficients()[*row][col] != 0)
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let mut closed_rows = vec![Vec::new(); system.cols()];
        for row in 0..system.rows() {
            if let Some(last_col) = (0..system.cols())
                .rev()
                .find(|col| system.coefficients()[row][*col] != 0)
            {
                closed_rows[last_col].push(row);
            }
        }
        let caps = affected
            .iter()
            .zip(system.bounds())
            .map(|(rows, (_, max))| {
                rows.iter()
                    .map(|row| system.targets()[*row])
                    .min()
                    .unwrap_or(0)
                    .min(*max)
            })
            .collect();

        Self {
            system,
            affected,
            closed_rows,
            caps,
            presses: vec![0; system.cols()],
            remaining: system.targets().to_vec(),
            best: None,
        }
    }

    fn has_uncovered_target(&self) -> bool {
        (0..self.system.rows()).any(|row| {
            self.remaining[row] != 0 && self.affected.iter().all(|rows| !rows.contains(&row))
        })
    }

    fn visit(&mut self, col: usize, cost: usize) {
        if self.best.as_ref().is_some_and(|best| cost >= best.total()) {
            return;
        }
        if col == self.system.cols() {
            if self.remaining.iter().all(|r| *r == 0) {
                self.best = Some(PressPlan::new(self.presses.clone(), cost));
            }
            return;
        }

        let (min, _) = self.system.bounds()[col];
        let unit_cost = self.system.objective()[col];
        for count in min..=self.caps[col] {
            if self.affected[col].iter().any(|row| self.remaining[*row] < count) {
                break;
            }

            for row in &self.affected[col] {
                self.remaining[*row] -= count;
            }
            // No later button can fix a row this one closes.
            if self.closed_rows[col].iter().all(|row| self.remaining[*row] == 0) {
                self.presses[col] = count;
                self.visit(col + 1, cost + unit_cost * count);
            }
            for row in &self.affected[col] {
                self.remaining[*row] += count;
            }
        }
        self.presses[col] = 0;
    }
}

/// Runs the inner solver on a worker thread and gives up after `limit`.
/// A worker that outlives its limit is left to finish on its own.
pub struct TimeLimitedSolver<S> {
    inner: Arc<S>,
    limit: Duration,
}

impl<S> TimeLimitedSolver<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            limit,
        }
    }
}

impl<S: IntegerProgramSolver + 'static> IntegerProgramSolver for TimeLimitedSolver<S> {
    fn solve(&self, system: &ConstraintSystem) -> Result<PressPlan, SolveError> {
        let (sender, receiver) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let system = system.clone();
        thread::spawn(move || {
            // The receiver is gone once the limit has passed.
            let _ = sender.send(inner.solve(&system));
        });

        match receiver.recv_timeout(self.limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(SolveError::Timeout(self.limit)),
            Err(RecvTimeoutError::Disconnected) => Err(SolveError::Backend(format!(
                "{} solver stopped without an answer",
                self.inner.name()
            ))),
        }
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
fn system_of(text: &str, max_positions: usize) -> ConstraintSystem {
    let limits = crate::Limits {
        max_positions,
        max_presses: crate::MAX_PRESSES,
    };
    ConstraintSystem::build(&text.parse::<crate::Device>().unwrap(), &limits).unwrap()
}

// Tries every press vector with counts up to the largest target.
#[cfg(test)]
fn brute_force_min(system: &ConstraintSystem) -> Option<usize> {
    let top = system.targets().iter().copied().max().unwrap_or(0);
    let mut presses = vec![0; system.cols()];
    let mut best = None;
    loop {
        if system.is_satisfied_by(&presses) {
            let total = system.objective_value(&presses);
            best = Some(best.map_or(total, |b: usize| b.min(total)));
        }

        let mut col = 0;
        while col < presses.len() && presses[col] == top {
            presses[col] = 0;
            col += 1;
        }
        if col == presses.len() {
            return best;
        }
        presses[col] += 1;
    }
}

#[test]
fn test_solvers_on_two_buttons() {
    let system = system_of("(0) (0,1) {3,1}", crate::MAX_POSITIONS);
    for solver in [&MilpSolver as &dyn IntegerProgramSolver, &ExhaustiveSolver] {
        let plan = solver.solve(&system).unwrap();
        assert_eq!(plan.presses(), &[2, 1], "{}", solver.name());
        assert_eq!(plan.total(), 3, "{}", solver.name());
    }
}

#[test]
fn test_solvers_on_empty_button() {
    let system = system_of("() {0}", crate::MAX_POSITIONS);
    for solver in [&MilpSolver as &dyn IntegerProgramSolver, &ExhaustiveSolver] {
        let plan = solver.solve(&system).unwrap();
        assert_eq!(plan.presses(), &[0], "{}", solver.name());
        assert_eq!(plan.total(), 0, "{}", solver.name());
    }
}

#[test]
fn test_solvers_report_infeasible() {
    for text in ["(0) {3,1}", "{2}", "(0,1) {1,2}"] {
        let system = system_of(text, crate::MAX_POSITIONS);
        assert_eq!(MilpSolver.solve(&system), Err(SolveError::Infeasible), "{}", text);
        assert_eq!(ExhaustiveSolver.solve(&system), Err(SolveError::Infeasible), "{}", text);
    }
}

#[test]
fn test_solvers_match_brute_force() {
    let masks = 0..8usize;
    let button_text = |mask: usize| {
        let positions = (0..3)
            .filter(|pos| (mask >> pos) & 1 == 1)
            .map(|pos| pos.to_string())
            .collect::<Vec<_>>();
        format!("({})", positions.join(","))
    };
    for targets in ["{3,1,2}", "{2,2,0}", "{1,0,4}", "{0,0,0}"] {
        for a in masks.clone() {
            for b in a..8 {
                for c in b..8 {
                    let text = format!(
                        "{} {} {} {}",
                        button_text(a),
                        button_text(b),
                        button_text(c),
                        targets
                    );
                    let system = system_of(&text, 3);
                    let expected = brute_force_min(&system);
                    for solver in [&MilpSolver as &dyn IntegerProgramSolver, &ExhaustiveSolver] {
                        match solver.solve(&system) {
                            Ok(plan) => {
                                assert!(system.is_satisfied_by(plan.presses()), "{}", text);
                                assert_eq!(Some(plan.total()), expected, "{} by {}", text, solver.name());
                            }
                            Err(e) => {
                                assert_eq!(e, SolveError::Infeasible, "{}", text);
                                assert_eq!(expected, None, "{} by {}", text, solver.name());
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
struct SlowSolver(Duration);

#[cfg(test)]
impl IntegerProgramSolver for SlowSolver {
    fn solve(&self, system: &ConstraintSystem) -> Result<PressPlan, SolveError> {
        thread::sleep(self.0);
        ExhaustiveSolver.solve(system)
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

#[test]
fn test_time_limited_solver() {
    let system = system_of("(0) (0,1) {3,1}", crate::MAX_POSITIONS);

    let patient = TimeLimitedSolver::new(MilpSolver, Duration::from_secs(30));
    assert_eq!(patient.solve(&system).unwrap().total(), 3);
    assert_eq!(patient.name(), "milp");

    let limit = Duration::from_millis(10);
    let hasty = TimeLimitedSolver::new(SlowSolver(Duration::from_millis(500)), limit);
    assert_eq!(hasty.solve(&system), Err(SolveError::Timeout(limit)));
}
