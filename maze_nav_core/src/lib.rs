use std::ops::Add;

use serde::{Deserialize, Serialize};

pub mod commands;
pub mod map;
pub mod obstacles;
pub mod pathfinder;
pub mod world;

/// Represents a 2D coordinate on the signed world grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    pub const ORIGIN: Coordinate = Coordinate { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Coordinate { x, y }
    }

    /// Manhattan (L1) distance between two coordinates.
    #[inline]
    pub fn manhattan(self, other: Coordinate) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl Add for Coordinate {
    type Output = Coordinate;

    fn add(self, rhs: Coordinate) -> Self::Output {
        Coordinate::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl From<(i32, i32)> for Coordinate {
    fn from((x, y): (i32, i32)) -> Self {
        Coordinate::new(x, y)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Inclusive bounding box `[min_x, max_x] x [min_y, max_y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Default for Bounds {
    /// The robot's safe zone.
    fn default() -> Self {
        Bounds::new(-100, 100, -200, 200)
    }
}

impl Bounds {
    pub const fn new(min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> Self {
        Bounds {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    #[inline]
    pub fn contains(&self, coordinate: Coordinate) -> bool {
        (self.min_x..=self.max_x).contains(&coordinate.x)
            && (self.min_y..=self.max_y).contains(&coordinate.y)
    }

    /// Number of columns covered, zero for an inverted box.
    pub fn width(&self) -> usize {
        (self.max_x - self.min_x + 1).max(0) as usize
    }

    /// Number of rows covered, zero for an inverted box.
    pub fn height(&self) -> usize {
        (self.max_y - self.min_y + 1).max(0) as usize
    }
}

pub use commands::{Command, CommandList, Heading, compile};
pub use obstacles::{FieldConfig, Obstacle, ObstacleField};
pub use pathfinder::{Edge, GridSpace, find_path, solve};
pub use world::{Robot, World, parse_maze};

/// Ordered sequence of coordinates from start to goal, inclusive.
pub type Path = Vec<Coordinate>;
