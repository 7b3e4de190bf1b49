use std::collections::HashSet;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Bounds, Coordinate};

/// Represents errors raised by geometry queries on an [`ObstacleField`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("Segment {from} -> {to} is not axis-aligned")]
    NotAxisAligned { from: Coordinate, to: Coordinate },
}

/// How an obstacle blocks the cells it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObstacleShape {
    /// Blocks its whole bounding box, interior included.
    Rectangle,
    /// Blocks exactly the listed cells. Used for maze walls.
    Cells,
}

/// An immutable blocked region described by its outline cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obstacle {
    shape: ObstacleShape,
    perimeter: Vec<Coordinate>,
    min: Coordinate,
    max: Coordinate,
}

impl Obstacle {
    /// Builds the square outline of side `size` anchored at its lower-left corner.
    ///
    /// The perimeter is listed as: the anchor, the left side going up, the
    /// bottom side going right, the top side between the corners, then the
    /// right side going up. The last cell is always the upper-right corner.
    /// Returns `None` when the far corner does not fit in `i32`.
    pub fn square(anchor: Coordinate, size: u32) -> Option<Self> {
        let size = i32::try_from(size).ok()?;
        let Coordinate { x, y } = anchor;
        let max = Coordinate::new(x.checked_add(size)?, y.checked_add(size)?);

        let mut perimeter = Vec::with_capacity(4 * size.max(1) as usize);
        perimeter.push(anchor);
        perimeter.extend((1..=size).map(|i| Coordinate::new(x, y + i)));
        perimeter.extend((1..=size).map(|i| Coordinate::new(x + i, y)));
        perimeter.extend((1..size).map(|i| Coordinate::new(x + i, max.y)));
        perimeter.extend((1..=size).map(|i| Coordinate::new(max.x, y + i)));

        Some(Obstacle {
            shape: ObstacleShape::Rectangle,
            perimeter,
            min: anchor,
            max,
        })
    }

    /// Builds a rectangle from an explicit outline. Returns `None` for an empty outline.
    pub fn rectangle(perimeter: Vec<Coordinate>) -> Option<Self> {
        Self::with_shape(ObstacleShape::Rectangle, perimeter)
    }

    /// Builds a free-form obstacle blocking exactly `cells`. Returns `None` when empty.
    pub fn from_cells(cells: Vec<Coordinate>) -> Option<Self> {
        Self::with_shape(ObstacleShape::Cells, cells)
    }

    fn with_shape(shape: ObstacleShape, perimeter: Vec<Coordinate>) -> Option<Self> {
        let first = *perimeter.first()?;
        let (min, max) = perimeter.iter().fold((first, first), |(lo, hi), c| {
            (
                Coordinate::new(lo.x.min(c.x), lo.y.min(c.y)),
                Coordinate::new(hi.x.max(c.x), hi.y.max(c.y)),
            )
        });
        Some(Obstacle {
            shape,
            perimeter,
            min,
            max,
        })
    }

    #[inline]
    pub fn shape(&self) -> ObstacleShape {
        self.shape
    }

    /// Lower-left corner of the cached bounding box.
    #[inline]
    pub fn min(&self) -> Coordinate {
        self.min
    }

    /// Upper-right corner of the cached bounding box.
    #[inline]
    pub fn max(&self) -> Coordinate {
        self.max
    }

    pub fn perimeter(&self) -> &[Coordinate] {
        &self.perimeter
    }

    /// Checks whether the bounding box covers `coordinate`, both corners inclusive.
    #[inline]
    pub fn box_contains(&self, coordinate: Coordinate) -> bool {
        (self.min.x..=self.max.x).contains(&coordinate.x)
            && (self.min.y..=self.max.y).contains(&coordinate.y)
    }
}

impl std::fmt::Display for Obstacle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.shape {
            ObstacleShape::Rectangle => write!(
                f,
                "At position {},{} (to {},{})",
                self.min.x, self.min.y, self.max.x, self.max.y
            ),
            ObstacleShape::Cells => write!(
                f,
                "Maze of {} cells spanning {},{} (to {},{})",
                self.perimeter.len(),
                self.min.x,
                self.min.y,
                self.max.x,
                self.max.y
            ),
        }
    }
}

/// Parameters for random obstacle placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Side length of each square obstacle.
    pub size: u32,
    /// Upper bound on the number of obstacles; the actual count is drawn in `0..=max_count`.
    pub max_count: u32,
    /// Candidate anchors tried per obstacle before it is skipped.
    pub max_attempts: u32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        FieldConfig {
            size: 4,
            max_count: 10,
            max_attempts: 100,
        }
    }
}

/// The set of obstacles for one episode. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct ObstacleField {
    obstacles: Vec<Obstacle>,
    /// Every perimeter cell of every obstacle, for segment queries.
    perimeter: HashSet<Coordinate>,
    /// Cells of `ObstacleShape::Cells` obstacles, for point queries.
    cells: HashSet<Coordinate>,
}

impl ObstacleField {
    /// A field with no obstacles.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wraps a fixed list of obstacles, e.g. a loaded maze.
    pub fn from_obstacles(obstacles: Vec<Obstacle>) -> Self {
        let mut perimeter = HashSet::new();
        let mut cells = HashSet::new();
        for obstacle in &obstacles {
            perimeter.extend(obstacle.perimeter.iter().copied());
            if obstacle.shape == ObstacleShape::Cells {
                cells.extend(obstacle.perimeter.iter().copied());
            }
        }
        ObstacleField {
            obstacles,
            perimeter,
            cells,
        }
    }

    /// Places up to `config.max_count` square obstacles at random inside `bounds`.
    ///
    /// Guarantees that no obstacle covers the origin (or the row and column
    /// strips next to it), that no two anchors fall within `size` of each
    /// other on both axes, and that every obstacle lies fully inside `bounds`.
    /// An obstacle that cannot be placed within `config.max_attempts` draws is
    /// skipped, so the final count may be lower than the drawn one.
    pub fn generate<R: Rng>(bounds: Bounds, config: &FieldConfig, rng: &mut R) -> Self {
        let count = rng.random_range(0..=config.max_count);
        let mut placed: Vec<Obstacle> = Vec::with_capacity(count as usize);

        for index in 0..count {
            match place_square(bounds, config, &placed, rng) {
                Some(obstacle) => placed.push(obstacle),
                None => debug!(
                    "Skipped obstacle {} of {}: no valid anchor after {} attempts",
                    index + 1,
                    count,
                    config.max_attempts
                ),
            }
        }

        debug!("Generated {} of {} requested obstacles", placed.len(), count);
        Self::from_obstacles(placed)
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    /// Iterates every perimeter cell of every obstacle, in obstacle order.
    pub fn perimeter_cells(&self) -> impl Iterator<Item = Coordinate> + '_ {
        self.obstacles
            .iter()
            .flat_map(|obstacle| obstacle.perimeter.iter().copied())
    }

    /// Returns `true` if `(x, y)` falls inside an obstacle.
    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        let coordinate = Coordinate::new(x, y);
        self.cells.contains(&coordinate)
            || self.obstacles.iter().any(|obstacle| {
                obstacle.shape == ObstacleShape::Rectangle && obstacle.box_contains(coordinate)
            })
    }

    /// Returns `true` if an obstacle outline cell lies on the segment from
    /// `(x1, y1)` to `(x2, y2)`, both endpoints included.
    ///
    /// Only horizontal and vertical segments are meaningful; anything else is
    /// rejected with [`GeometryError::NotAxisAligned`].
    pub fn is_segment_blocked(
        &self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
    ) -> Result<bool, GeometryError> {
        let from = Coordinate::new(x1, y1);
        let to = Coordinate::new(x2, y2);
        if x1 != x2 && y1 != y2 {
            return Err(GeometryError::NotAxisAligned { from, to });
        }

        let step = Coordinate::new((x2 - x1).signum(), (y2 - y1).signum());
        let mut cursor = from;
        loop {
            if self.perimeter.contains(&cursor) {
                return Ok(true);
            }
            if cursor == to {
                return Ok(false);
            }
            cursor = cursor + step;
        }
    }
}

/// Draws anchors until one satisfies every placement rule, or gives up.
fn place_square<R: Rng>(
    bounds: Bounds,
    config: &FieldConfig,
    placed: &[Obstacle],
    rng: &mut R,
) -> Option<Obstacle> {
    let fitted = i32::try_from(config.size).ok().and_then(|size| {
        let max_x = bounds.max_x.checked_sub(size)?;
        let max_y = bounds.max_y.checked_sub(size)?;
        (max_x >= bounds.min_x && max_y >= bounds.min_y).then_some((size, max_x, max_y))
    });
    let Some((size, max_x, max_y)) = fitted else {
        debug!("Bounds {:?} too small for obstacles of size {}", bounds, config.size);
        return None;
    };

    // Anchors in this band would put the obstacle on top of, or right next to, the origin.
    let origin_band = (-1 - size)..=0;

    for _ in 0..config.max_attempts {
        let x = rng.random_range(bounds.min_x..=max_x);
        let y = rng.random_range(bounds.min_y..=max_y);
        if origin_band.contains(&x) || origin_band.contains(&y) {
            continue;
        }
        let overlaps = placed.iter().any(|other| {
            let anchor = other.min();
            anchor.x.abs_diff(x) <= config.size && anchor.y.abs_diff(y) <= config.size
        });
        if overlaps {
            continue;
        }
        return Obstacle::square(Coordinate::new(x, y), config.size);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn c(x: i32, y: i32) -> Coordinate {
        Coordinate::new(x, y)
    }

    fn single_square() -> ObstacleField {
        ObstacleField::from_obstacles(vec![Obstacle::square(c(1, 1), 4).unwrap()])
    }

    #[test]
    fn square_outline_order() {
        let square = Obstacle::square(c(1, 1), 4).unwrap();
        let expected = vec![
            c(1, 1),
            c(1, 2),
            c(1, 3),
            c(1, 4),
            c(1, 5),
            c(2, 1),
            c(3, 1),
            c(4, 1),
            c(5, 1),
            c(2, 5),
            c(3, 5),
            c(4, 5),
            c(5, 2),
            c(5, 3),
            c(5, 4),
            c(5, 5),
        ];
        assert_eq!(square.perimeter(), expected.as_slice());
        assert_eq!(square.min(), c(1, 1));
        assert_eq!(square.max(), c(5, 5));
        assert_eq!(square.to_string(), "At position 1,1 (to 5,5)");
    }

    #[test]
    fn point_queries_cover_the_whole_box() {
        let field = single_square();
        assert!(field.is_blocked(5, 1));
        assert!(field.is_blocked(1, 5));
        assert!(field.is_blocked(3, 3));
        assert!(!field.is_blocked(10, 20));
        assert!(!field.is_blocked(0, 0));
        assert!(!field.is_blocked(6, 3));
    }

    #[test]
    fn segment_queries() {
        let field = single_square();
        assert_eq!(field.is_segment_blocked(4, -100, 4, 100), Ok(true));
        assert_eq!(field.is_segment_blocked(185, 3, -14, 3), Ok(true));
        assert_eq!(field.is_segment_blocked(5, -100, 5, 100), Ok(true));
        assert_eq!(field.is_segment_blocked(185, 1, -14, 1), Ok(true));
        assert_eq!(field.is_segment_blocked(99, 1, 5, 1), Ok(true));
        assert_eq!(field.is_segment_blocked(0, -100, 0, 100), Ok(false));
        assert_eq!(field.is_segment_blocked(185, 7, -14, 7), Ok(false));
    }

    #[test]
    fn segment_endpoints_are_inclusive() {
        let field = single_square();
        assert_eq!(field.is_segment_blocked(0, 1, 1, 1), Ok(true));
        assert_eq!(field.is_segment_blocked(0, 1, -5, 1), Ok(false));
        assert_eq!(field.is_segment_blocked(1, 1, 1, 1), Ok(true));
    }

    #[test]
    fn interior_is_point_blocked_but_not_segment_blocked() {
        let field = single_square();
        assert!(field.is_blocked(3, 3));
        assert_eq!(field.is_segment_blocked(3, 3, 3, 3), Ok(false));
        assert_eq!(field.is_segment_blocked(2, 2, 4, 2), Ok(false));
    }

    #[test]
    fn diagonal_segment_is_rejected() {
        let field = single_square();
        assert_eq!(
            field.is_segment_blocked(0, 0, 3, 3),
            Err(GeometryError::NotAxisAligned {
                from: c(0, 0),
                to: c(3, 3)
            })
        );
    }

    #[test]
    fn cell_obstacles_block_only_their_cells() {
        let wall = Obstacle::from_cells(vec![c(-10, 10), c(10, 10), c(10, -10)]).unwrap();
        assert_eq!(wall.min(), c(-10, -10));
        assert_eq!(wall.max(), c(10, 10));

        let field = ObstacleField::from_obstacles(vec![wall]);
        assert!(field.is_blocked(10, 10));
        assert!(!field.is_blocked(0, 0));
        assert_eq!(field.is_segment_blocked(10, 0, 10, 20), Ok(true));
    }

    #[test]
    fn empty_outlines_are_rejected() {
        assert!(Obstacle::rectangle(vec![]).is_none());
        assert!(Obstacle::from_cells(vec![]).is_none());
    }

    #[test]
    fn bounds_too_small_skips_every_obstacle() {
        let config = FieldConfig {
            size: 4,
            max_count: 10,
            max_attempts: 50,
        };
        let mut rng = StdRng::seed_from_u64(7);
        let field = ObstacleField::generate(Bounds::new(0, 3, 0, 3), &config, &mut rng);
        assert!(field.is_empty());
    }

    #[test]
    fn sizes_beyond_the_coordinate_range_skip_every_obstacle() {
        let mut rng = StdRng::seed_from_u64(1);
        for size in [3_000_000_000, u32::MAX, i32::MAX as u32] {
            let config = FieldConfig {
                size,
                max_count: 10,
                max_attempts: 100,
            };
            let field = ObstacleField::generate(Bounds::default(), &config, &mut rng);
            assert!(field.is_empty(), "size {} placed an obstacle", size);
        }
    }

    #[test]
    fn square_corner_overflow_is_rejected() {
        assert!(Obstacle::square(c(0, 0), 3_000_000_000).is_none());
        assert!(Obstacle::square(c(i32::MAX - 2, 0), 4).is_none());
        let edge = Obstacle::square(c(i32::MAX - 4, 0), 4).unwrap();
        assert_eq!(edge.max(), c(i32::MAX, 4));
    }

    #[test]
    fn zero_max_count_places_nothing() {
        let config = FieldConfig {
            max_count: 0,
            ..FieldConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let field = ObstacleField::generate(Bounds::default(), &config, &mut rng);
        assert!(field.is_empty());
    }

    proptest! {
        #[test]
        fn generated_fields_respect_placement_rules(seed in any::<u64>(), size in 1u32..8, max_count in 0u32..20) {
            let bounds = Bounds::default();
            let config = FieldConfig { size, max_count, max_attempts: 100 };
            let mut rng = StdRng::seed_from_u64(seed);
            let field = ObstacleField::generate(bounds, &config, &mut rng);

            prop_assert!(field.len() <= max_count as usize);
            prop_assert!(!field.is_blocked(0, 0));
            for obstacle in field.obstacles() {
                prop_assert!(bounds.contains(obstacle.min()));
                prop_assert!(bounds.contains(obstacle.max()));
                prop_assert_eq!(obstacle.perimeter().len(), 4 * size as usize);
            }
            for (i, a) in field.obstacles().iter().enumerate() {
                for b in &field.obstacles()[i + 1..] {
                    let close = a.min().x.abs_diff(b.min().x) <= size
                        && a.min().y.abs_diff(b.min().y) <= size;
                    prop_assert!(!close);
                }
            }
        }

        #[test]
        fn perimeter_hits_agree_between_point_and_segment(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let field = ObstacleField::generate(Bounds::default(), &FieldConfig::default(), &mut rng);
            for cell in field.perimeter_cells() {
                prop_assert!(field.is_blocked(cell.x, cell.y));
                prop_assert_eq!(field.is_segment_blocked(cell.x, cell.y, cell.x, cell.y), Ok(true));
            }
        }
    }
}
