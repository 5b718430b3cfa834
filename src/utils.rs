use std::{
    collections::HashSet,
    fmt,
    ops::{Add, Sub},
};

use metrohash::MetroBuildHasher;

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

#[macro_export]
macro_rules! pos {
    ($x:expr, $y:expr) => {
        $crate::Pos { x: $x, y: $y }
    };
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl Add for Pos {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        pos!(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Pos {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        pos!(self.x - rhs.x, self.y - rhs.y)
    }
}

/// set of cells whose state flipped during one grid operation.
pub type Changes = HashSet<Pos, MetroBuildHasher>;

#[test]
fn test_pos_arithmetic() {
    assert_eq!(pos!(1, 2) + pos!(-1, 3), pos!(0, 5));
    assert_eq!(pos!(4, 4) - pos!(1, 6), pos!(3, -2));
    assert_eq!(pos!(-1, 7).to_string(), "(-1, 7)");
}
