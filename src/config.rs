use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_ARRAY_SIZE: (usize, usize) = (190, 80);
pub const DEFAULT_CELL_SIDE: usize = 10;
pub const DEFAULT_CYCLE_DELAY: Duration = Duration::from_millis(100);
/// floor for the cycle delay, keeps the driver from spinning.
pub const MIN_CYCLE_DELAY: Duration = Duration::from_millis(50);
/// upper bound on the padded cell array, border included.
pub const MAX_CELLS: usize = 1 << 24;
pub const MAX_CELL_SIDE: usize = 256;

/// Clamps a delay in seconds to [`MIN_CYCLE_DELAY`] when it is not a
/// positive finite value.
pub fn clamp_cycle_delay(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).unwrap_or(MIN_CYCLE_DELAY)
    } else {
        MIN_CYCLE_DELAY
    }
}

/// Validated engine parameters, as entered on the configuration surface.
///
/// Only built through [`SimConfig::new`], [`SimConfig::from_fields`] or
/// `Default`, so every instance describes a grid the engine can allocate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimConfig {
    array_size: (usize, usize),
    cell_side: usize,
    cycle_delay: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            array_size: DEFAULT_ARRAY_SIZE,
            cell_side: DEFAULT_CELL_SIDE,
            cycle_delay: DEFAULT_CYCLE_DELAY,
        }
    }
}

impl SimConfig {
    pub fn new(array_size: (usize, usize), cell_side: usize, cycle_delay: f64) -> Result<Self> {
        let (width, height) = array_size;
        if width == 0 || height == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "array size must be positive, got {width}x{height}"
            )));
        }
        // coordinates are `i32`, and the padded array must stay allocatable.
        let padded = width
            .checked_add(2)
            .zip(height.checked_add(2))
            .and_then(|(w, h)| w.checked_mul(h));
        let fits_coords = i32::try_from(width).is_ok() && i32::try_from(height).is_ok();
        if !fits_coords || !padded.is_some_and(|cells| cells <= MAX_CELLS) {
            return Err(Error::InvalidConfiguration(format!(
                "array size {width}x{height} exceeds {MAX_CELLS} cells"
            )));
        }
        if cell_side == 0 || cell_side > MAX_CELL_SIDE {
            return Err(Error::InvalidConfiguration(format!(
                "cell side must be between 1 and {MAX_CELL_SIDE}, got {cell_side}"
            )));
        }
        Ok(Self {
            array_size,
            cell_side,
            cycle_delay: clamp_cycle_delay(cycle_delay),
        })
    }

    /// (width, height) of the active area.
    pub fn array_size(&self) -> (usize, usize) {
        self.array_size
    }

    pub fn cell_side(&self) -> usize {
        self.cell_side
    }

    pub fn cycle_delay(&self) -> Duration {
        self.cycle_delay
    }

    /// Parses raw text fields (rows, columns, cell side, delay in seconds).
    pub fn from_fields(rows: &str, columns: &str, cell_side: &str, delay: &str) -> Result<Self> {
        let rows = parse_positive("rows", rows)?;
        let columns = parse_positive("columns", columns)?;
        let cell_side = parse_positive("cell side", cell_side)?;
        let delay = delay.trim();
        let delay = delay
            .parse::<f64>()
            .ok()
            .filter(|d| !d.is_nan())
            .ok_or_else(|| Error::InvalidConfiguration(format!("delay is not a number: {delay:?}")))?;
        Self::new((columns, rows), cell_side, delay)
    }
}

fn parse_positive(name: &str, field: &str) -> Result<usize> {
    let field = field.trim();
    match field.parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(Error::InvalidConfiguration(format!(
            "{name} must be a positive integer, got {field:?}"
        ))),
    }
}

#[test]
fn test_clamp_cycle_delay() {
    assert_eq!(clamp_cycle_delay(0.25), Duration::from_millis(250));
    assert_eq!(clamp_cycle_delay(0.0), MIN_CYCLE_DELAY);
    assert_eq!(clamp_cycle_delay(-3.0), MIN_CYCLE_DELAY);
    assert_eq!(clamp_cycle_delay(f64::NAN), MIN_CYCLE_DELAY);
    assert_eq!(clamp_cycle_delay(f64::INFINITY), MIN_CYCLE_DELAY);
}

#[test]
fn test_from_fields() {
    let config = SimConfig::from_fields(" 80", "190 ", "10", "0.25").unwrap();
    assert_eq!(config.array_size, DEFAULT_ARRAY_SIZE);
    assert_eq!(config.cell_side, DEFAULT_CELL_SIDE);
    assert_eq!(config.cycle_delay, Duration::from_millis(250));

    let config = SimConfig::from_fields("3", "4", "1", "-1").unwrap();
    assert_eq!(config.array_size, (4, 3));
    assert_eq!(config.cycle_delay, MIN_CYCLE_DELAY);
}

#[test]
fn test_invalid_fields() {
    for (rows, columns, side, delay) in [
        ("0", "4", "1", "0.1"),
        ("3", "-4", "1", "0.1"),
        ("3", "4", "0", "0.1"),
        ("3.5", "4", "1", "0.1"),
        ("3", "4", "1", "fast"),
        ("", "4", "1", "0.1"),
        ("1", "18446744073709551615", "1", "0.1"),
        ("1", "4294967297", "1", "0.1"),
        ("2147483648", "1", "1", "0.1"),
        ("5000", "5000", "1", "0.1"),
        ("3", "4", "257", "0.1"),
    ] {
        assert!(matches!(
            SimConfig::from_fields(rows, columns, side, delay),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}

#[test]
fn test_size_limits() {
    assert!(SimConfig::new((4094, 4094), 1, 0.1).is_ok());
    assert!(SimConfig::new((4095, 4095), 1, 0.1).is_err());
    assert!(SimConfig::new((usize::MAX, 1), 1, 0.1).is_err());
    assert!(SimConfig::new((1, usize::MAX - 1), 1, 0.1).is_err());
    assert!(SimConfig::new((3, 3), MAX_CELL_SIDE, 0.1).is_ok());
}
