#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    active: bool,
}

impl Cell {
    pub fn active() -> Self {
        Self { active: true }
    }

    pub fn inactive() -> Self {
        Self { active: false }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// applies the life rule to a cell given its live neighbor count.
    pub fn next(self, neighbor_count: usize) -> Self {
        match (self.is_active(), neighbor_count) {
            (true, 2) | (_, 3) => Cell::active(), // stays or becomes alive
            _ => Cell::inactive(),                // dies or stays dead
        }
    }
}

impl From<bool> for Cell {
    fn from(active: bool) -> Self {
        Self { active }
    }
}

pub use grid::Grid;
mod grid;

#[test]
fn test_rule_table() {
    for count in 0..=8 {
        let from_dead = Cell::inactive().next(count);
        let from_alive = Cell::active().next(count);
        match count {
            2 => {
                assert_eq!(from_dead, Cell::inactive());
                assert_eq!(from_alive, Cell::active());
            }
            3 => {
                assert_eq!(from_dead, Cell::active());
                assert_eq!(from_alive, Cell::active());
            }
            _ => {
                assert_eq!(from_dead, Cell::inactive());
                assert_eq!(from_alive, Cell::inactive());
            }
        }
    }
}
