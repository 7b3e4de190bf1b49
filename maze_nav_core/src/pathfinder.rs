use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
    fmt,
    str::FromStr,
};

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::{Bounds, Coordinate, Path, obstacles::ObstacleField};

/// One discovered position. Parents are indices into the search arena.
#[derive(Debug, Clone, Copy)]
struct SearchNode {
    position: Coordinate,
    parent: Option<usize>,
    g: u32,
}

/// Frontier entry for the priority queue.
///
/// Ordered by lowest `f`, then lowest `h` (prefer nodes closer to the goal),
/// then earliest insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrontierEntry {
    f: u32,
    h: u32,
    seq: u64,
    node: usize,
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* search with unit step cost.
///
/// Returns the path from `start` to the first popped coordinate satisfying
/// `is_goal`, both inclusive, or `None` once the frontier is exhausted.
/// `neighbors_of` must only yield passable cells; `heuristic` must not
/// overestimate the remaining cost by more than a constant for the result to
/// be optimal.
///
/// Entries superseded by a cheaper route to the same position are discarded
/// when popped instead of being expanded or accepted as the goal.
pub fn find_path<G, N, I, H>(
    start: Coordinate,
    mut is_goal: G,
    mut neighbors_of: N,
    mut heuristic: H,
) -> Option<Path>
where
    G: FnMut(Coordinate) -> bool,
    N: FnMut(Coordinate) -> I,
    I: IntoIterator<Item = Coordinate>,
    H: FnMut(Coordinate) -> u32,
{
    let start_h = heuristic(start);
    let mut arena = vec![SearchNode {
        position: start,
        parent: None,
        g: 0,
    }];
    let mut best_cost: HashMap<Coordinate, u32> = HashMap::new();
    best_cost.insert(start, 0);

    let mut frontier = BinaryHeap::new();
    frontier.push(FrontierEntry {
        f: start_h,
        h: start_h,
        seq: 0,
        node: 0,
    });
    let mut next_seq = 1;
    let mut expanded = 0usize;

    while let Some(FrontierEntry { node: index, .. }) = frontier.pop() {
        let current = arena[index];

        if best_cost
            .get(&current.position)
            .is_some_and(|&best| current.g > best)
        {
            continue;
        }

        if is_goal(current.position) {
            trace!(
                "Goal {} reached after expanding {} nodes",
                current.position, expanded
            );
            return Some(reconstruct(&arena, index));
        }
        expanded += 1;

        for neighbor in neighbors_of(current.position) {
            let cost = current.g + 1;
            if best_cost.get(&neighbor).is_some_and(|&best| cost >= best) {
                continue;
            }
            best_cost.insert(neighbor, cost);

            let h = heuristic(neighbor);
            arena.push(SearchNode {
                position: neighbor,
                parent: Some(index),
                g: cost,
            });
            frontier.push(FrontierEntry {
                f: cost + h,
                h,
                seq: next_seq,
                node: arena.len() - 1,
            });
            next_seq += 1;
        }
    }

    trace!("Frontier exhausted after expanding {} nodes", expanded);
    None
}

/// Walks parent links back to the start and reverses them.
fn reconstruct(arena: &[SearchNode], goal: usize) -> Path {
    let mut path = Vec::new();
    let mut cursor = Some(goal);
    while let Some(index) = cursor {
        let node = &arena[index];
        path.push(node.position);
        cursor = node.parent;
    }
    path.reverse();
    path
}

/// Neighbour generator over a bounded grid with obstacles.
#[derive(Debug, Clone, Copy)]
pub struct GridSpace<'a> {
    pub bounds: Bounds,
    pub field: &'a ObstacleField,
}

impl<'a> GridSpace<'a> {
    pub fn new(bounds: Bounds, field: &'a ObstacleField) -> Self {
        GridSpace { bounds, field }
    }

    /// Returns the in-bounds, unblocked cells one step away from `coordinate`.
    pub fn neighbors(&self, coordinate: Coordinate) -> Vec<Coordinate> {
        const DIRECTIONS: [Coordinate; 4] = [
            Coordinate::new(1, 0),
            Coordinate::new(-1, 0),
            Coordinate::new(0, 1),
            Coordinate::new(0, -1),
        ];

        DIRECTIONS
            .iter()
            .map(|&delta| coordinate + delta)
            .filter(|&next| self.bounds.contains(next) && !self.field.is_blocked(next.x, next.y))
            .collect()
    }
}

/// The boundary of the bounding box the robot is trying to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Top, Edge::Bottom, Edge::Left, Edge::Right];

    /// Checks if `coordinate` is at, or one cell short of, this edge.
    pub fn is_reached(self, bounds: &Bounds, coordinate: Coordinate) -> bool {
        match self {
            Edge::Top => coordinate.y >= bounds.max_y - 1,
            Edge::Bottom => coordinate.y <= bounds.min_y + 1,
            Edge::Right => coordinate.x >= bounds.max_x - 1,
            Edge::Left => coordinate.x <= bounds.min_x + 1,
        }
    }

    /// Distance from `coordinate` to the edge line along the perpendicular axis.
    pub fn distance(self, bounds: &Bounds, coordinate: Coordinate) -> u32 {
        match self {
            Edge::Top => bounds.max_y.abs_diff(coordinate.y),
            Edge::Bottom => bounds.min_y.abs_diff(coordinate.y),
            Edge::Right => bounds.max_x.abs_diff(coordinate.x),
            Edge::Left => bounds.min_x.abs_diff(coordinate.x),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Edge::Top => "top",
            Edge::Bottom => "bottom",
            Edge::Left => "left",
            Edge::Right => "right",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown edge '{0}', expected one of top, bottom, left, right")]
pub struct ParseEdgeError(pub String);

impl FromStr for Edge {
    type Err = ParseEdgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Edge::ALL
            .into_iter()
            .find(|edge| edge.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseEdgeError(trimmed.to_string()))
    }
}

/// Finds a shortest path from `start` to `edge` of `bounds`, avoiding `field`.
pub fn solve(start: Coordinate, edge: Edge, bounds: Bounds, field: &ObstacleField) -> Option<Path> {
    let space = GridSpace::new(bounds, field);
    let path = find_path(
        start,
        |c| edge.is_reached(&bounds, c),
        |c| space.neighbors(c),
        |c| edge.distance(&bounds, c),
    );

    match &path {
        Some(path) => debug!(
            "Found path from {} to the {} edge in {} steps",
            start,
            edge,
            path.len().saturating_sub(1)
        ),
        None => info!("No path from {} to the {} edge", start, edge),
    }
    path
}
