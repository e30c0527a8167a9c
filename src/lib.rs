use std::{
    error,
    fmt::Display,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};

pub mod constraint;
pub mod device;
pub mod solver;

pub use constraint::{ConstraintSystem, Limits, MAX_POSITIONS, MAX_PRESSES, POSITIONS_LIMIT};
pub use device::{Button, Device, IndicatorLights};
pub use solver::{
    ExhaustiveSolver, IntegerProgramSolver, MilpSolver, PressPlan, SolveError, TimeLimitedSolver,
};

#[derive(Debug)]
pub enum Error {
    InvalidToken(String),
    InvalidNumber(String),
    InvalidLightChar(char),
    TooManyLights(usize, usize), // (given lights, max lights).
    DuplicateLights,
    NoJoltageTargets,
    DuplicateJoltageTargets,
    PositionOutOfRange(usize, usize), // (position, max positions).
    TooManyTargets(usize, usize),     // (given targets, max positions).
    TooManyPositions(usize, usize),   // (given positions, positions limit).
    Unsolved(SolveError),
    DeviceFailed(usize, Box<Error>),
    NoIndicatorLights,
    LightsUnreachable,
    NoSuchDevice(usize, usize), // (index, device count).
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidToken(s) => write!(
                f,
                "Invalid token({}) in machine description, expect [...], (...) or {{...}}.",
                s
            ),
            Error::InvalidNumber(s) => write!(f, "Invalid number({}) in machine description.", s),
            Error::InvalidLightChar(c) => {
                write!(f, "Invalid character({}) for indicator light, expect . or #.", c)
            }
            Error::TooManyLights(n, max_n) => write!(
                f,
                "Given {} indicator lights, expect at most {}.",
                n, max_n
            ),
            Error::DuplicateLights => write!(f, "Found more than one indicator light diagram."),
            Error::NoJoltageTargets => write!(f, "Expect joltage targets({{...}}), but can't find one."),
            Error::DuplicateJoltageTargets => write!(f, "Found more than one list of joltage targets."),
            Error::PositionOutOfRange(pos, max_n) => write!(
                f,
                "Button affects counter {}, expect counters in [0, {}).",
                pos, max_n
            ),
            Error::TooManyTargets(n, max_n) => write!(
                f,
                "Given {} joltage targets, expect at most {}.",
                n, max_n
            ),
            Error::TooManyPositions(n, max_n) => write!(
                f,
                "Given {} joltage counters per machine, expect at most {}.",
                n, max_n
            ),
            Error::Unsolved(e) => write!(f, "Can't configure joltage counters: {}", e),
            Error::DeviceFailed(ind, e) => write!(f, "Machine {} failed: {}", ind, e),
            Error::NoIndicatorLights => write!(f, "No indicator light diagram given."),
            Error::LightsUnreachable => {
                write!(f, "No button presses turn the indicator lights into the diagram.")
            }
            Error::NoSuchDevice(ind, n) => write!(
                f,
                "No machine {} to inspect, given {} machine(s).",
                ind, n
            ),
        }
    }
}

impl error::Error for Error {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SolverKind {
    Milp,
    Exhaustive,
}

#[derive(Debug, Parser)]
pub struct CLIArgs {
    pub input_path: PathBuf,
    /// Joltage counters every machine is modeled with, at most 64.
    #[arg(long, default_value_t = MAX_POSITIONS)]
    pub max_positions: usize,
    /// Upper bound of presses on any single button.
    #[arg(long, default_value_t = MAX_PRESSES)]
    pub max_presses: usize,
    /// Give up on a machine after this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    #[arg(long, value_enum, default_value_t = SolverKind::Milp)]
    pub solver: SolverKind,
    /// Print the full press plan of the machine at this index.
    #[arg(long)]
    pub inspect: Option<usize>,
}

impl CLIArgs {
    pub fn limits(&self) -> Result<Limits, Error> {
        Limits::new(self.max_positions, self.max_presses)
    }

    pub fn make_solver(&self) -> Box<dyn IntegerProgramSolver> {
        match (self.solver, self.timeout_secs.map(Duration::from_secs)) {
            (SolverKind::Milp, None) => Box::new(MilpSolver),
            (SolverKind::Milp, Some(limit)) => Box::new(TimeLimitedSolver::new(MilpSolver, limit)),
            (SolverKind::Exhaustive, None) => Box::new(ExhaustiveSolver),
            (SolverKind::Exhaustive, Some(limit)) => {
                Box::new(TimeLimitedSolver::new(ExhaustiveSolver, limit))
            }
        }
    }
}

/// Solves machines one by one and adds up their fewest presses.
pub struct PressPlanner<S> {
    solver: S,
    limits: Limits,
}

impl<S: IntegerProgramSolver> PressPlanner<S> {
    pub fn new(solver: S, limits: Limits) -> Self {
        Self { solver, limits }
    }

    pub fn plan(&self, device: &Device) -> Result<PressPlan, Error> {
        let system = ConstraintSystem::build(device, &self.limits)?;
        self.solver.solve(&system).map_err(Error::Unsolved)
    }

    /// Plans of all machines in input order. Stops at the first machine
    /// that can't be planned.
    pub fn plan_all(&self, devices: &[Device]) -> Result<Vec<PressPlan>, Error> {
        let mut plans = Vec::with_capacity(devices.len());
        for (ind, device) in devices.iter().enumerate() {
            match self.plan(device) {
                Ok(plan) => {
                    debug!(
                        "Machine {} needs {} presses on {} buttons ({} solver).",
                        ind,
                        plan.total(),
                        device.buttons().len(),
                        self.solver.name()
                    );
                    plans.push(plan);
                }
                Err(e) => {
                    warn!("Machine {} failed: {}", ind, e);
                    return Err(Error::DeviceFailed(ind, Box::new(e)));
                }
            }
        }

        Ok(plans)
    }

    pub fn min_presses_sum(&self, devices: &[Device]) -> Result<usize, Error> {
        Ok(presses_sum(&self.plan_all(devices)?))
    }
}

pub fn presses_sum(plans: &[PressPlan]) -> usize {
    let presses_sum = plans.iter().map(|plan| plan.total()).sum::<usize>();
    info!(
        "{} machine(s) need {} presses in total.",
        plans.len(),
        presses_sum
    );

    presses_sum
}

pub fn lights_presses_sum(devices: &[Device]) -> Result<usize, Error> {
    let mut presses_sum = 0;
    for (ind, device) in devices.iter().enumerate() {
        let lights = device
            .lights()
            .ok_or(Error::DeviceFailed(ind, Box::new(Error::NoIndicatorLights)))?;
        let presses = lights
            .min_presses(device.buttons())
            .ok_or(Error::DeviceFailed(ind, Box::new(Error::LightsUnreachable)))?;
        debug!("Machine {} needs {} presses for its indicator lights.", ind, presses);
        presses_sum += presses;
    }

    Ok(presses_sum)
}

pub fn read_devices<P: AsRef<Path>>(path: P) -> Result<Vec<Device>> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open given file({}).", path.as_ref().display()))?;
    let reader = BufReader::new(file);
    let mut devices = Vec::new();
    for (ind, line) in reader.lines().enumerate() {
        let line = line.with_context(|| {
            format!(
                "Failed to read line {} of given file({}).",
                ind + 1,
                path.as_ref().display()
            )
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let device = line.parse::<Device>().with_context(|| {
            format!(
                "Failed to parse machine at line {} of given file({}).",
                ind + 1,
                path.as_ref().display()
            )
        })?;
        devices.push(device);
    }

    Ok(devices)
}

#[cfg(test)]
fn devices(lines: &[&str]) -> Vec<Device> {
    lines
        .iter()
        .map(|line| line.parse::<Device>().unwrap())
        .collect()
}

#[cfg(test)]
const SAMPLE: [&str; 3] = [
    "[.##.] (3) (1,3) (2) (2,3) (0,2) (0,1) {3,5,4,7}",
    "[...#.] (0,2,3,4) (2,3) (0,4) (0,1,2) (1,2,3,4) {7,5,12,7,2}",
    "[.###.#] (0,1,2,3,4) (0,3,4) (0,1,2,4,5) (1,2) {10,11,11,5,10,5}",
];

#[test]
fn test_min_presses_sum() {
    let planner = PressPlanner::new(MilpSolver, Limits::default());
    // 3 presses, then 2 + 3 = 5 presses.
    let machines = devices(&["(0) (0,1) {3,1}", "(0) (1) {2,3}"]);
    assert_eq!(planner.min_presses_sum(&machines).unwrap(), 8);
    assert_eq!(planner.min_presses_sum(&[]).unwrap(), 0);
}

#[test]
fn test_sum_matches_each_plan() {
    let machines = devices(&SAMPLE);
    let planner = PressPlanner::new(MilpSolver, Limits::default());
    let each = machines
        .iter()
        .map(|m| planner.plan(m).unwrap().total())
        .collect::<Vec<_>>();
    assert_eq!(each, vec![10, 12, 11]);
    assert_eq!(planner.min_presses_sum(&machines).unwrap(), 33);

    let checker = PressPlanner::new(ExhaustiveSolver, Limits::default());
    assert_eq!(checker.min_presses_sum(&machines).unwrap(), 33);
}

#[test]
fn test_infeasible_machine_aborts() {
    let planner = PressPlanner::new(MilpSolver, Limits::default());
    let machines = devices(&["(0) (0,1) {3,1}", "(0) {3,1}", "() {0}"]);
    match planner.plan_all(&machines) {
        Err(Error::DeviceFailed(1, e)) => {
            assert!(matches!(*e, Error::Unsolved(SolveError::Infeasible)))
        }
        other => panic!("expect machine 1 to be infeasible, get {:?}", other),
    }
}

#[test]
fn test_shape_mismatch_aborts() {
    let planner = PressPlanner::new(MilpSolver, Limits::default());
    let machines = devices(&["() {0}", "(10) {1}"]);
    match planner.plan_all(&machines) {
        Err(Error::DeviceFailed(1, e)) => {
            assert!(matches!(*e, Error::PositionOutOfRange(10, MAX_POSITIONS)))
        }
        other => panic!("expect machine 1 to be rejected, get {:?}", other),
    }
}

#[test]
fn test_lights_presses_sum() {
    assert_eq!(lights_presses_sum(&devices(&SAMPLE)).unwrap(), 7);
    assert!(matches!(
        lights_presses_sum(&devices(&["[#] (0) {1}", "(0) {1}"])),
        Err(Error::DeviceFailed(1, e)) if matches!(*e, Error::NoIndicatorLights)
    ));
}

#[test]
fn test_make_solver() {
    let args = CLIArgs::parse_from(["part2", "sample.txt", "--solver", "exhaustive", "--timeout-secs", "5"]);
    assert_eq!(args.limits().unwrap(), Limits::default());
    assert_eq!(args.make_solver().name(), "exhaustive");
    assert!(args.inspect.is_none());
}

#[test]
fn test_read_devices_skips_blank_lines() {
    let machines = read_devices("sample.txt").unwrap();
    assert_eq!(machines, devices(&SAMPLE));

    let e = read_devices("sample_malformed.txt").unwrap_err();
    let chain = format!("{:#}", e);
    assert!(chain.contains("line 3"), "{}", chain);
    assert!(chain.contains("Invalid token(<x>)"), "{}", chain);
    assert!(matches!(
        e.downcast_ref::<Error>(),
        Some(Error::InvalidToken(t)) if t == "<x>"
    ));
}

#[test]
fn test_presses_sum_of_plans() {
    let plans = [PressPlan::new(vec![2, 1], 3), PressPlan::new(vec![2, 3], 5)];
    assert_eq!(presses_sum(&plans), 8);
    assert_eq!(presses_sum(&[]), 0);
}

#[test]
fn test_limits_from_args() {
    let args = CLIArgs::parse_from(["part2", "sample.txt", "--max-positions", "100000000"]);
    assert!(matches!(
        args.limits(),
        Err(Error::TooManyPositions(100_000_000, POSITIONS_LIMIT))
    ));
}
