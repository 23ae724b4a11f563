//! Toroidal Game of Life grid

use anyhow::{Result, bail};
use rand::Rng;

use crate::constants::validation::{MAX_GRID_DIMENSION, MIN_GRID_DIMENSION};

/// Offsets of the eight Moore neighbors as (row, col) deltas
const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1),           (0, 1),
    (1, -1),  (1, 0),  (1, 1),
];

/// Fixed-size boolean cell matrix whose edges wrap around
/// Cells are stored row-major; `(row, col)` addressing is 0-indexed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cols: usize,
    rows: usize,
    cells: Vec<bool>,
}

impl Grid {
    /// All-dead grid of `cols × rows`
    pub fn new(cols: usize, rows: usize) -> Result<Self> {
        validate_dimensions(cols, rows)?;
        Ok(Self {
            cols,
            rows,
            cells: vec![false; cols * rows],
        })
    }

    /// Grid where every cell is independently alive with probability 1/2
    pub fn random<R: Rng>(cols: usize, rows: usize, rng: &mut R) -> Result<Self> {
        let mut grid = Self::new(cols, rows)?;
        for cell in grid.cells.iter_mut() {
            *cell = rng.random_bool(0.5);
        }
        Ok(grid)
    }

    /// All-dead grid with the listed `(row, col)` cells alive
    #[cfg(test)]
    pub fn with_live_cells(cols: usize, rows: usize, live: &[(usize, usize)]) -> Result<Self> {
        let mut grid = Self::new(cols, rows)?;
        for &(row, col) in live {
            if row >= rows || col >= cols {
                bail!("Cell ({row}, {col}) lies outside a {cols}x{rows} grid");
            }
            grid.set(row, col, true);
        }
        Ok(grid)
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_alive(&self, row: usize, col: usize) -> bool {
        self.cells[self.index(row, col)]
    }

    #[cfg(test)]
    pub fn set(&mut self, row: usize, col: usize, alive: bool) {
        let idx = self.index(row, col);
        self.cells[idx] = alive;
    }

    /// Number of live cells in the whole grid
    pub fn population(&self) -> usize {
        self.cells.iter().filter(|&&alive| alive).count()
    }

    /// Iterate `(row, col)` of every live cell in row-major order
    pub fn live_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(idx, _)| (idx / self.cols, idx % self.cols))
    }

    /// Live cells among the eight neighbors, indices taken modulo the grid size.
    /// On a single-width axis the wrapped offsets land on the cell itself and are counted.
    pub fn live_neighbors(&self, row: usize, col: usize) -> u8 {
        NEIGHBOR_OFFSETS
            .iter()
            .filter(|&&(dr, dc)| {
                let r = wrap(row, dr, self.rows);
                let c = wrap(col, dc, self.cols);
                self.is_alive(r, c)
            })
            .count() as u8
    }

    /// Next generation. Leaves `self` untouched.
    pub fn step(&self) -> Grid {
        let mut cells = Vec::with_capacity(self.cells.len());
        for row in 0..self.rows {
            for col in 0..self.cols {
                let next = match (self.is_alive(row, col), self.live_neighbors(row, col)) {
                    (true, 2) | (true, 3) => true, // Survival
                    (false, 3) => true,            // Birth
                    _ => false,
                };
                cells.push(next);
            }
        }
        Grid {
            cols: self.cols,
            rows: self.rows,
            cells,
        }
    }

    fn index(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.rows && col < self.cols);
        row * self.cols + col
    }
}

fn wrap(pos: usize, delta: isize, len: usize) -> usize {
    (pos as isize + delta).rem_euclid(len as isize) as usize
}

fn validate_dimensions(cols: usize, rows: usize) -> Result<()> {
    for (name, value) in [("cols", cols), ("rows", rows)] {
        if !(MIN_GRID_DIMENSION..=MAX_GRID_DIMENSION).contains(&value) {
            bail!(
                "Grid {name} must be between {MIN_GRID_DIMENSION} and {MAX_GRID_DIMENSION}, got {value}"
            );
        }
    }
    Ok(())
}
