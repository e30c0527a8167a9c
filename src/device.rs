use std::{
    collections::{BTreeSet, HashSet, VecDeque},
    str::FromStr,
};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::Error;

// Light states are kept in a u32 bit mask.
const MAX_LIGHTS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    positions: BTreeSet<usize>,
}

impl Button {
    pub fn new<I: IntoIterator<Item = usize>>(positions: I) -> Self {
        Self {
            positions: positions.into_iter().collect(),
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.positions.iter().copied()
    }

    pub fn affects(&self, position: usize) -> bool {
        self.positions.contains(&position)
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    // Positions beyond the last light have nothing to toggle.
    fn toggle_mask(&self, light_n: usize) -> u32 {
        self.positions()
            .filter(|pos| *pos < light_n)
            .fold(0, |mask, pos| mask | (1 << pos))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorLights {
    mask: u32,
    n: usize,
}

impl IndicatorLights {
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn is_on(&self, ind: usize) -> bool {
        ind < self.n && (self.mask >> ind) & 1 == 1
    }

    /// Fewest presses turning all-off lights into this diagram, found by
    /// breadth first search over light states. `None` if no sequence of
    /// presses reaches it.
    pub fn min_presses(&self, buttons: &[Button]) -> Option<usize> {
        let masks = buttons
            .iter()
            .map(|b| b.toggle_mask(self.n))
            .collect::<HashSet<_>>();
        let mut visited = HashSet::from([0u32]);
        let mut search_states = VecDeque::from([(0u32, 0usize)]);
        while let Some((state, presses)) = search_states.pop_front() {
            if state == self.mask {
                return Some(presses);
            }

            for mask in &masks {
                let next = state ^ mask;
                if visited.insert(next) {
                    search_states.push_back((next, presses + 1));
                }
            }
        }

        None
    }
}

impl FromStr for IndicatorLights {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n = s.chars().count();
        if n > MAX_LIGHTS {
            return Err(Error::TooManyLights(n, MAX_LIGHTS));
        }

        let mut mask = 0;
        for (ind, c) in s.chars().enumerate() {
            match c {
                '.' => (),
                '#' => mask |= 1 << ind,
                other => return Err(Error::InvalidLightChar(other)),
            }
        }

        Ok(Self { mask, n })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    lights: Option<IndicatorLights>,
    buttons: Vec<Button>,
    joltage_targets: Vec<usize>,
}

impl Device {
    pub fn new(
        lights: Option<IndicatorLights>,
        buttons: Vec<Button>,
        joltage_targets: Vec<usize>,
    ) -> Self {
        Self {
            lights,
            buttons,
            joltage_targets,
        }
    }

    pub fn lights(&self) -> Option<&IndicatorLights> {
        self.lights.as_ref()
    }

    pub fn buttons(&self) -> &[Button] {
        &self.buttons
    }

    pub fn joltage_targets(&self) -> &[usize] {
        &self.joltage_targets
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static LIGHTS_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[(.*)\]$").unwrap());
        static BUTTON_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\((.*)\)$").unwrap());
        static TARGETS_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\{(.*)\}$").unwrap());

        let mut lights = None;
        let mut buttons = Vec::new();
        let mut joltage_targets = None;
        for token in s.split_whitespace() {
            if let Some(caps) = LIGHTS_PATTERN.captures(token) {
                if lights.replace(caps[1].parse::<IndicatorLights>()?).is_some() {
                    return Err(Error::DuplicateLights);
                }
            } else if let Some(caps) = BUTTON_PATTERN.captures(token) {
                buttons.push(Button::new(parse_num_list(&caps[1])?));
            } else if let Some(caps) = TARGETS_PATTERN.captures(token) {
                if joltage_targets
                    .replace(parse_num_list(&caps[1])?)
                    .is_some()
                {
                    return Err(Error::DuplicateJoltageTargets);
                }
            } else {
                return Err(Error::InvalidToken(token.to_string()));
            }
        }

        Ok(Device::new(
            lights,
            buttons,
            joltage_targets.ok_or(Error::NoJoltageTargets)?,
        ))
    }
}

fn parse_num_list(text: &str) -> Result<Vec<usize>, Error> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    text.split(',')
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| Error::InvalidNumber(part.to_string()))
        })
        .collect()
}

#[test]
fn test_parse_device() {
    let device = "[.##.] (3) (1,3) (2) (2,3) (0,2) (0,1) {3,5,4,7}"
        .parse::<Device>()
        .unwrap();
    let lights = device.lights().unwrap();
    assert_eq!(lights.len(), 4);
    assert!(!lights.is_on(0) && lights.is_on(1) && lights.is_on(2) && !lights.is_on(3));
    assert_eq!(device.buttons().len(), 6);
    assert_eq!(device.buttons()[1], Button::new([1, 3]));
    assert_eq!(device.joltage_targets(), &[3, 5, 4, 7]);
}

#[test]
fn test_parse_button_edge_cases() {
    let device = "() (2,2,0) {0}".parse::<Device>().unwrap();
    assert!(device.lights().is_none());
    assert!(device.buttons()[0].is_empty());
    assert_eq!(device.buttons()[1].positions().collect::<Vec<_>>(), vec![0, 2]);
}

#[test]
fn test_parse_device_errors() {
    assert!(matches!(
        "(0) <1> {1}".parse::<Device>(),
        Err(Error::InvalidToken(t)) if t == "<1>"
    ));
    assert!(matches!(
        "(0,x) {1}".parse::<Device>(),
        Err(Error::InvalidNumber(n)) if n == "x"
    ));
    assert!(matches!(
        "(0,,1) {1}".parse::<Device>(),
        Err(Error::InvalidNumber(_))
    ));
    assert!(matches!(
        "[.o] (0) {1}".parse::<Device>(),
        Err(Error::InvalidLightChar('o'))
    ));
    assert!(matches!(
        "[.#] (0)".parse::<Device>(),
        Err(Error::NoJoltageTargets)
    ));
    assert!(matches!(
        "(0) {1} {2}".parse::<Device>(),
        Err(Error::DuplicateJoltageTargets)
    ));
    assert!(matches!(
        "[.] [#] (0) {1}".parse::<Device>(),
        Err(Error::DuplicateLights)
    ));
    let long_diagram = format!("[{}] (0) {{1}}", ".".repeat(33));
    assert!(matches!(
        long_diagram.parse::<Device>(),
        Err(Error::TooManyLights(33, MAX_LIGHTS))
    ));
    let widest_diagram = format!("[{}#] (31) {{1}}", ".".repeat(31));
    assert_eq!(widest_diagram.parse::<Device>().unwrap().lights().unwrap().len(), 32);
}

#[test]
fn test_lights_min_presses() {
    let parse = |s: &str| s.parse::<Device>().unwrap();
    let min_presses = |d: &Device| d.lights().unwrap().min_presses(d.buttons());

    assert_eq!(
        min_presses(&parse("[.##.] (3) (1,3) (2) (2,3) (0,2) (0,1) {3,5,4,7}")),
        Some(2)
    );
    assert_eq!(
        min_presses(&parse("[...#.] (0,2,3,4) (2,3) (0,4) (0,1,2) (1,2,3,4) {7,5,12,7,2}")),
        Some(3)
    );
    assert_eq!(min_presses(&parse("[....] (0) {0}")), Some(0));
    assert_eq!(min_presses(&parse("[.#] (0) {1}")), None);
}
