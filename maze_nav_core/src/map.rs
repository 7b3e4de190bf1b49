use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::{Bounds, Coordinate};

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Coordinate {coordinate} is out of bounds for grid {bounds:?}")]
    OutOfBounds {
        coordinate: Coordinate,
        bounds: Bounds,
    },
}

/// A generic 2D grid covering a signed bounding box.
///
/// Stores elements of type `T` in a flat vector using row-major order, with
/// row 0 at `min_y`. Cells are addressed by world [`Coordinate`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    bounds: Bounds,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid covering `bounds`, filled with default values.
    pub fn new(bounds: Bounds) -> Self
    where
        T: Default + Clone,
    {
        Grid {
            bounds,
            cells: vec![T::default(); bounds.width() * bounds.height()],
        }
    }

    /// Creates a new grid covering `bounds`, filled by a generator function.
    ///
    /// The generator is called once per cell in row-major order.
    pub fn from_generator<F>(bounds: Bounds, mut f: F) -> Self
    where
        F: FnMut(Coordinate) -> T,
    {
        let mut cells = Vec::with_capacity(bounds.width() * bounds.height());
        for y in bounds.min_y..=bounds.max_y {
            for x in bounds.min_x..=bounds.max_x {
                cells.push(f(Coordinate::new(x, y)));
            }
        }
        Grid { bounds, cells }
    }

    #[inline]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.bounds.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.bounds.height()
    }

    /// Converts a coordinate to a flat vector index, or `None` outside the grid.
    #[inline]
    pub fn coords_to_index(&self, coordinate: Coordinate) -> Option<usize> {
        if !self.bounds.contains(coordinate) {
            return None;
        }
        let column = (coordinate.x - self.bounds.min_x) as usize;
        let row = (coordinate.y - self.bounds.min_y) as usize;
        Some(row * self.width() + column)
    }

    /// Converts a flat vector index back to a coordinate.
    #[inline]
    pub fn index_to_coords(&self, index: usize) -> Option<Coordinate> {
        if index < self.cells.len() {
            let row = (index / self.width()) as i32;
            let column = (index % self.width()) as i32;
            Some(Coordinate::new(
                self.bounds.min_x + column,
                self.bounds.min_y + row,
            ))
        } else {
            None
        }
    }

    pub fn get(&self, coordinate: Coordinate) -> Option<&T> {
        self.cells.get(self.coords_to_index(coordinate)?)
    }

    pub fn get_mut(&mut self, coordinate: Coordinate) -> Option<&mut T> {
        let index = self.coords_to_index(coordinate)?;
        self.cells.get_mut(index)
    }

    /// Sets the value of the cell at `coordinate`.
    pub fn set(&mut self, coordinate: Coordinate, value: T) -> Result<(), GridError> {
        let index = self
            .coords_to_index(coordinate)
            .ok_or(GridError::OutOfBounds {
                coordinate,
                bounds: self.bounds,
            })?;
        self.cells[index] = value;
        Ok(())
    }

    /// Returns an iterator that yields `(coordinate, &T)` for each cell.
    pub fn enumerate(&self) -> impl Iterator<Item = (Coordinate, &T)> {
        let bounds = self.bounds;
        let width = self.width();
        self.cells.iter().enumerate().map(move |(index, cell)| {
            let column = (index % width) as i32;
            let row = (index / width) as i32;
            (
                Coordinate::new(bounds.min_x + column, bounds.min_y + row),
                cell,
            )
        })
    }

    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }
}

impl<T> Index<Coordinate> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, coordinate: Coordinate) -> &Self::Output {
        match self.coords_to_index(coordinate) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for grid {:?}",
                coordinate, self.bounds
            ),
        }
    }
}

impl<T> IndexMut<Coordinate> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, coordinate: Coordinate) -> &mut Self::Output {
        let bounds = self.bounds;
        match self.coords_to_index(coordinate) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for grid {:?}",
                coordinate, bounds
            ),
        }
    }
}
