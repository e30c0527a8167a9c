use crate::{device::Device, Error};

/// Counter slots every machine is modeled with, used or not.
pub const MAX_POSITIONS: usize = 10;
pub const MAX_PRESSES: usize = 512;
/// Most counter slots a machine may be modeled with.
pub const POSITIONS_LIMIT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_positions: usize,
    pub max_presses: usize,
}

impl Limits {
    pub fn new(max_positions: usize, max_presses: usize) -> Result<Self, Error> {
        if max_positions > POSITIONS_LIMIT {
            return Err(Error::TooManyPositions(max_positions, POSITIONS_LIMIT));
        }

        Ok(Self {
            max_positions,
            max_presses,
        })
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_positions: MAX_POSITIONS,
            max_presses: MAX_PRESSES,
        }
    }
}

/// Integer program for one machine: minimize `objective · x` subject to
/// `coefficients · x == targets`, each `x[j]` an integer within `bounds[j]`.
///
/// Rows are counter positions (always `max_positions` of them), columns are
/// buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSystem {
    objective: Vec<usize>,
    coefficients: Vec<Vec<usize>>,
    targets: Vec<usize>,
    bounds: Vec<(usize, usize)>,
    integrality: Vec<bool>,
}

impl ConstraintSystem {
    pub fn build(device: &Device, limits: &Limits) -> Result<Self, Error> {
        let max_positions = limits.max_positions;
        if let Some(position) = device
            .buttons()
            .iter()
            .flat_map(|button| button.positions())
            .find(|pos| *pos >= max_positions)
        {
            return Err(Error::PositionOutOfRange(position, max_positions));
        }
        let targets_n = device.joltage_targets().len();
        if targets_n > max_positions {
            return Err(Error::TooManyTargets(targets_n, max_positions));
        }

        let buttons = device.buttons();
        let coefficients = (0..max_positions)
            .map(|pos| {
                buttons
                    .iter()
                    .map(|button| usize::from(button.affects(pos)))
                    .collect()
            })
            .collect();
        let targets = (0..max_positions)
            .map(|pos| device.joltage_targets().get(pos).copied().unwrap_or(0))
            .collect();

        Ok(Self {
            objective: vec![1; buttons.len()],
            coefficients,
            targets,
            bounds: vec![(0, limits.max_presses); buttons.len()],
            integrality: vec![true; buttons.len()],
        })
    }

    pub fn rows(&self) -> usize {
        self.coefficients.len()
    }

    pub fn cols(&self) -> usize {
        self.objective.len()
    }

    pub fn objective(&self) -> &[usize] {
        &self.objective
    }

    pub fn coefficients(&self) -> &[Vec<usize>] {
        &self.coefficients
    }

    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    pub fn bounds(&self) -> &[(usize, usize)] {
        &self.bounds
    }

    pub fn integrality(&self) -> &[bool] {
        &self.integrality
    }

    pub fn objective_value(&self, presses: &[usize]) -> usize {
        self.objective
            .iter()
            .zip(presses)
            .map(|(cost, count)| cost * count)
            .sum()
    }

    /// Whether `presses` is within bounds and hits every counter exactly.
    pub fn is_satisfied_by(&self, presses: &[usize]) -> bool {
        presses.len() == self.cols()
            && presses
                .iter()
                .zip(&self.bounds)
                .all(|(count, (min, max))| min <= count && count <= max)
            && self
                .coefficients
                .iter()
                .zip(&self.targets)
                .all(|(row, target)| {
                    row.iter()
                        .zip(presses)
                        .map(|(coeff, count)| coeff * count)
                        .sum::<usize>()
                        == *target
                })
    }
}

#[cfg(test)]
fn device(text: &str) -> Device {
    text.parse::<Device>().unwrap()
}

#[test]
fn test_build_shape_and_padding() {
    let system = ConstraintSystem::build(&device("(0) (0,1) {3,1}"), &Limits::default()).unwrap();
    assert_eq!(system.rows(), MAX_POSITIONS);
    assert_eq!(system.cols(), 2);
    assert_eq!(system.objective(), &[1, 1]);
    assert_eq!(system.coefficients()[0], vec![1, 1]);
    assert_eq!(system.coefficients()[1], vec![0, 1]);
    assert!(system.coefficients()[2..].iter().all(|row| row == &vec![0, 0]));
    assert_eq!(system.targets(), &[3, 1, 0, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(system.bounds(), &[(0, MAX_PRESSES), (0, MAX_PRESSES)]);
    assert_eq!(system.integrality(), &[true, true]);
}

#[test]
fn test_build_is_idempotent() {
    let machine = device("[.##.] (3) (1,3) (2) (2,3) (0,2) (0,1) {3,5,4,7}");
    let limits = Limits::default();
    assert_eq!(
        ConstraintSystem::build(&machine, &limits).unwrap(),
        ConstraintSystem::build(&machine, &limits).unwrap()
    );
}

#[test]
fn test_build_empty_button_column() {
    let system = ConstraintSystem::build(&device("() (1) {0,2}"), &Limits::default()).unwrap();
    assert!(system.coefficients().iter().all(|row| row[0] == 0));
    assert_eq!(system.bounds()[0], (0, MAX_PRESSES));
    assert!(system.is_satisfied_by(&[0, 2]));
    assert!(system.is_satisfied_by(&[4, 2]));
    assert_eq!(system.objective_value(&[4, 2]), 6);
}

#[test]
fn test_build_rejects_shape_mismatch() {
    let limits = Limits {
        max_positions: 3,
        max_presses: MAX_PRESSES,
    };
    assert!(matches!(
        ConstraintSystem::build(&device("(0,3) {1}"), &limits),
        Err(Error::PositionOutOfRange(3, 3))
    ));
    assert!(matches!(
        ConstraintSystem::build(&device("(0) {1,0,0,0}"), &limits),
        Err(Error::TooManyTargets(4, 3))
    ));
}

#[test]
fn test_is_satisfied_by() {
    let limits = Limits {
        max_positions: 2,
        max_presses: 2,
    };
    let system = ConstraintSystem::build(&device("(0) (0,1) {3,1}"), &limits).unwrap();
    assert!(system.is_satisfied_by(&[2, 1]));
    assert!(!system.is_satisfied_by(&[1, 1]));
    assert!(!system.is_satisfied_by(&[2]));
    assert!(!system.is_satisfied_by(&[3, 0]));
}

#[test]
fn test_limits_reject_too_many_positions() {
    assert_eq!(Limits::new(MAX_POSITIONS, MAX_PRESSES).unwrap(), Limits::default());
    assert!(Limits::new(POSITIONS_LIMIT, MAX_PRESSES).is_ok());
    assert!(matches!(
        Limits::new(100_000_000, MAX_PRESSES),
        Err(Error::TooManyPositions(100_000_000, POSITIONS_LIMIT))
    ));
}
