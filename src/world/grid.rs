use crate::{
    error::{Error, Result},
    pos, Cell, Changes, Pos,
};

const NEIGHBORS: [Pos; 8] = [
    pos!(-1, -1),
    pos!(0, -1),
    pos!(1, -1),
    pos!(-1, 0),
    pos!(1, 0),
    pos!(-1, 1),
    pos!(0, 1),
    pos!(1, 1),
];

/// Bounded cell array surrounded by a one cell wide dead border.
///
/// Only the engine builds and mutates grids; callers get read-only copies
/// through `SimHandle::snapshot` and `SimHandle::watch`.
///
/// Active coordinates span `[0, width) x [0, height)`. The border is never
/// written, so neighbor counts can read one cell past every edge without
/// bounds checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    pub(crate) fn new(width: usize, height: usize) -> Self {
        let cells = vec![Cell::inactive(); (width + 2) * (height + 2)];
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn stride(&self) -> usize {
        self.width + 2
    }

    fn contains(&self, Pos { x, y }: Pos) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// index of an active cell in the padded array.
    fn index(&self, pos: Pos) -> Result<usize> {
        if !self.contains(pos) {
            return Err(Error::OutOfRange {
                pos,
                width: self.width,
                height: self.height,
            });
        }
        Ok(self.padded_index(pos))
    }

    /// also valid for positions on the border ring.
    fn padded_index(&self, Pos { x, y }: Pos) -> usize {
        (y + 1) as usize * self.stride() + (x + 1) as usize
    }

    pub fn get(&self, pos: Pos) -> Result<Cell> {
        let index = self.index(pos)?;
        Ok(self.cells[index])
    }

    pub fn is_alive(&self, x: i32, y: i32) -> bool {
        self.get(pos!(x, y)).map(|cell| cell.is_active()).unwrap_or(false)
    }

    /// returns whether the cell changed.
    pub(crate) fn set(&mut self, pos: Pos, cell: Cell) -> Result<bool> {
        let index = self.index(pos)?;
        let changed = self.cells[index] != cell;
        self.cells[index] = cell;
        Ok(changed)
    }

    pub(crate) fn activate(&mut self, x: i32, y: i32) -> Result<bool> {
        self.set(pos!(x, y), Cell::active())
    }

    pub(crate) fn deactivate(&mut self, x: i32, y: i32) -> Result<bool> {
        self.set(pos!(x, y), Cell::inactive())
    }

    fn active_positions(&self) -> impl Iterator<Item = Pos> {
        let (width, height) = (self.width as i32, self.height as i32);
        (0..height).flat_map(move |y| (0..width).map(move |x| pos!(x, y)))
    }

    /// live cells in row-major order.
    pub fn actives(&self) -> Vec<Pos> {
        self.active_positions()
            .filter(|&pos| self.cells[self.padded_index(pos)].is_active())
            .collect()
    }

    pub fn population(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_active()).count()
    }

    fn neighbor_count(cells: &[Cell], stride: usize, index: usize) -> usize {
        NEIGHBORS
            .iter()
            .filter(|offset| {
                let neighbor = index as isize + offset.y as isize * stride as isize + offset.x as isize;
                cells[neighbor as usize].is_active()
            })
            .count()
    }

    /// Advances one generation and returns the cells that flipped.
    ///
    /// Every neighbor count reads the pre-step snapshot, so the new
    /// generation is applied to all cells at once.
    pub(crate) fn step(&mut self) -> Changes {
        let snapshot = self.cells.clone();
        let stride = self.stride();
        let mut changes = Changes::default();
        for pos in self.active_positions() {
            let index = self.padded_index(pos);
            let count = Self::neighbor_count(&snapshot, stride, index);
            let next = snapshot[index].next(count);
            if next != snapshot[index] {
                self.cells[index] = next;
                changes.insert(pos);
            }
        }
        changes
    }

    pub(crate) fn clear(&mut self) -> Changes {
        let changes: Changes = self.actives().into_iter().collect();
        self.cells.fill(Cell::inactive());
        changes
    }

    /// reallocates the array, every cell dead.
    pub(crate) fn resize(&mut self, width: usize, height: usize) {
        *self = Self::new(width, height);
    }

    #[cfg(test)]
    fn border_is_dead(&self) -> bool {
        let stride = self.stride() as i32;
        let rows = self.height as i32 + 2;
        (0..rows)
            .flat_map(|y| (0..stride).map(move |x| pos!(x - 1, y - 1)))
            .filter(|&pos| !self.contains(pos))
            .all(|pos| !self.cells[self.padded_index(pos)].is_active())
    }
}

#[cfg(test)]
fn grid_with(width: usize, height: usize, actives: &[(i32, i32)]) -> Grid {
    let mut grid = Grid::new(width, height);
    for &(x, y) in actives {
        grid.activate(x, y).unwrap();
    }
    grid
}

#[cfg(test)]
fn sorted(changes: Changes) -> Vec<Pos> {
    let mut result: Vec<_> = changes.into_iter().collect();
    result.sort_by_key(|p| (p.y, p.x));
    result
}

#[test]
fn test_activate_deactivate() {
    let mut grid = Grid::new(4, 3);
    assert_eq!(grid.activate(3, 2), Ok(true));
    assert_eq!(grid.activate(3, 2), Ok(false));
    assert!(grid.is_alive(3, 2));
    assert_eq!(grid.deactivate(3, 2), Ok(true));
    assert_eq!(grid.deactivate(3, 2), Ok(false));
    assert!(!grid.is_alive(3, 2));
}

#[test]
fn test_out_of_range() {
    let mut grid = Grid::new(4, 3);
    for (x, y) in [(-1, 0), (0, -1), (4, 0), (0, 3), (4, 3)] {
        assert_eq!(
            grid.activate(x, y),
            Err(Error::OutOfRange {
                pos: pos!(x, y),
                width: 4,
                height: 3
            })
        );
        assert!(grid.deactivate(x, y).is_err());
        assert!(!grid.is_alive(x, y));
    }
    assert!(grid.border_is_dead());
}

#[test]
fn test_isolated_cell_dies() {
    let mut grid = grid_with(3, 3, &[(1, 1)]);
    let changes = grid.step();
    assert_eq!(sorted(changes), vec![pos!(1, 1)]);
    assert!(grid.actives().is_empty());
}

#[test]
fn test_blinker() {
    let mut grid = grid_with(5, 5, &[(1, 0), (1, 1), (1, 2)]);
    let first = grid.step();
    assert_eq!(grid.actives(), vec![pos!(0, 1), pos!(1, 1), pos!(2, 1)]);
    assert_eq!(sorted(first), vec![pos!(1, 0), pos!(0, 1), pos!(2, 1), pos!(1, 2)]);
    grid.step();
    assert_eq!(grid.actives(), vec![pos!(1, 0), pos!(1, 1), pos!(1, 2)]);
}

#[test]
fn test_block_is_still() {
    let mut grid = grid_with(4, 4, &[(1, 1), (2, 1), (1, 2), (2, 2)]);
    assert!(grid.step().is_empty());
    assert_eq!(grid.population(), 4);
}

#[test]
fn test_step_reads_snapshot() {
    // (0, 0) dies during the step; (1, 1) must still count it as a neighbor.
    let mut grid = grid_with(3, 3, &[(0, 0), (2, 0), (0, 2)]);
    grid.step();
    assert!(grid.is_alive(1, 1));
    assert!(!grid.is_alive(0, 0));
}

#[test]
fn test_neighbor_counts() {
    // center of a 3x3 area with `n` live neighbors around it.
    let ring = [(0, 0), (1, 0), (2, 0), (0, 1), (2, 1), (0, 2), (1, 2), (2, 2)];
    for n in 0..=8 {
        for center_alive in [false, true] {
            let mut grid = grid_with(3, 3, &ring[..n]);
            if center_alive {
                grid.activate(1, 1).unwrap();
            }
            grid.step();
            let expected = match n {
                2 => center_alive,
                3 => true,
                _ => false,
            };
            assert_eq!(grid.is_alive(1, 1), expected, "{n} neighbors, alive: {center_alive}");
        }
    }
}

#[test]
fn test_edges_stay_bounded() {
    let mut grid = grid_with(3, 3, &[(0, 0), (1, 0), (2, 0)]);
    for _ in 0..4 {
        grid.step();
        assert!(grid.border_is_dead());
    }
    assert_eq!(grid.dimensions(), (3, 3));
}

#[test]
fn test_clear_is_idempotent() {
    let mut grid = grid_with(5, 5, &[(1, 0), (4, 4)]);
    assert_eq!(sorted(grid.clear()), vec![pos!(1, 0), pos!(4, 4)]);
    let once = grid.clone();
    assert!(grid.clear().is_empty());
    assert_eq!(grid, once);
    assert_eq!(grid, Grid::new(5, 5));
}

#[test]
fn test_resize() {
    let mut grid = grid_with(5, 5, &[(4, 4)]);
    grid.resize(8, 2);
    assert_eq!(grid.dimensions(), (8, 2));
    assert_eq!(grid.population(), 0);
    assert!(grid.activate(7, 1).unwrap());
    assert!(grid.activate(4, 4).is_err());
}
