use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::Cell;

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Cell {cell} is out of bounds for grid size ({width}, {height})")]
    OutOfBounds {
        cell: Cell,
        width: usize,
        height: usize,
    },
}

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order and
/// is addressed by [`Cell`]. Cells with negative or too-large coordinates
/// are simply outside the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with the specified dimensions, filled with default values.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn new(width: usize, height: usize) -> Self
    where
        T: Default + Clone,
    {
        Self::filled(width, height, T::default())
    }

    /// Creates a new grid with every cell set to `value`.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn filled(width: usize, height: usize, value: T) -> Self
    where
        T: Clone,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        Grid {
            width,
            height,
            cells: vec![value; size],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Converts a cell to a flat vector index.
    ///
    /// Returns `None` if the cell lies outside the grid.
    #[inline]
    pub fn index_of(&self, cell: Cell) -> Option<usize> {
        let x = usize::try_from(cell.x).ok()?;
        let y = usize::try_from(cell.y).ok()?;
        if x < self.width && y < self.height {
            Some(y * self.width + x)
        } else {
            None
        }
    }

    #[inline]
    fn cell_at(&self, index: usize) -> Cell {
        // Grid dimensions come from parsed boards, far below i32::MAX.
        Cell::new((index % self.width) as i32, (index / self.width) as i32)
    }

    #[inline]
    pub fn contains(&self, cell: Cell) -> bool {
        self.index_of(cell).is_some()
    }

    pub fn get(&self, cell: Cell) -> Option<&T> {
        self.index_of(cell).map(|index| &self.cells[index])
    }

    pub fn get_mut(&mut self, cell: Cell) -> Option<&mut T> {
        self.index_of(cell).map(|index| &mut self.cells[index])
    }

    /// Sets the value of a cell.
    ///
    /// Returns `Err(GridError::OutOfBounds)` if the cell lies outside the grid.
    pub fn set(&mut self, cell: Cell, value: T) -> Result<(), GridError> {
        let index = self.index_of(cell).ok_or(GridError::OutOfBounds {
            cell,
            width: self.width,
            height: self.height,
        })?;
        self.cells[index] = value;
        Ok(())
    }

    /// Returns an iterator that yields `(cell, &T)` in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (Cell, &T)> {
        self.cells
            .iter()
            .enumerate()
            .map(move |(index, value)| (self.cell_at(index), value))
    }
}

impl<T> Index<Cell> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, cell: Cell) -> &Self::Output {
        match self.index_of(cell) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for grid size ({}, {})",
                cell, self.width, self.height
            ),
        }
    }
}

impl<T> IndexMut<Cell> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, cell: Cell) -> &mut Self::Output {
        let width = self.width;
        let height = self.height;
        match self.index_of(cell) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for grid size ({}, {})",
                cell, width, height
            ),
        }
    }
}
