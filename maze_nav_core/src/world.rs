use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    Bounds, Coordinate,
    commands::{Command, CommandList, CompileError, Heading, Motion, Turn, compile},
    map::Grid,
    obstacles::{GeometryError, Obstacle, ObstacleField},
    pathfinder::{Edge, solve},
};

/// The static part of an episode: the safe zone and what is in it.
#[derive(Debug, Clone, Default)]
pub struct World {
    pub bounds: Bounds,
    pub field: ObstacleField,
}

/// Represents why the robot refused a move.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("Sorry, I cannot go outside my safe zone.")]
    OutsideSafeZone,
    #[error("Sorry, there is an obstacle in the way.")]
    Obstructed,
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// What the robot did after accepting a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Moved(Motion, u32),
    Turned(Turn),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Moved(Motion::Forward, steps) => write!(f, "moved forward by {} steps.", steps),
            Outcome::Moved(Motion::Back, steps) => write!(f, "moved back by {} steps.", steps),
            Outcome::Turned(Turn::Left) => f.write_str("turned left."),
            Outcome::Turned(Turn::Right) => f.write_str("turned right."),
        }
    }
}

/// Position and heading of the robot. Owned by the caller, never by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Robot {
    pub position: Coordinate,
    pub heading: Heading,
}

impl Robot {
    /// A robot at the origin facing forward.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(position: Coordinate, heading: Heading) -> Self {
        Robot { position, heading }
    }

    /// Applies one command. A refused move leaves the robot where it was.
    pub fn execute(&mut self, command: &Command, world: &World) -> Result<Outcome, MoveError> {
        match *command {
            Command::Turn(turn) => {
                self.heading = self.heading.turned(turn);
                Ok(Outcome::Turned(turn))
            }
            Command::Move(motion, steps) => {
                let direction = match motion {
                    Motion::Forward => self.heading,
                    Motion::Back => self.heading.reversed(),
                };
                let destination =
                    offset(self.position, direction, steps).ok_or(MoveError::OutsideSafeZone)?;

                if !world.bounds.contains(destination) {
                    return Err(MoveError::OutsideSafeZone);
                }
                let crosses_obstacle = world.field.is_segment_blocked(
                    self.position.x,
                    self.position.y,
                    destination.x,
                    destination.y,
                )?;
                if crosses_obstacle || world.field.is_blocked(destination.x, destination.y) {
                    return Err(MoveError::Obstructed);
                }

                self.position = destination;
                Ok(Outcome::Moved(motion, steps))
            }
        }
    }
}

/// `steps` cells from `from` along `heading`, or `None` on overflow.
fn offset(from: Coordinate, heading: Heading, steps: u32) -> Option<Coordinate> {
    let steps = i32::try_from(steps).ok()?;
    let delta = heading.delta();
    Some(Coordinate::new(
        from.x.checked_add(delta.x.checked_mul(steps)?)?,
        from.y.checked_add(delta.y.checked_mul(steps)?)?,
    ))
}

/// What a single cell looks like when the world is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tile {
    #[default]
    Open,
    Obstacle,
    Path,
    Robot(Heading),
}

impl World {
    pub fn new(bounds: Bounds, field: ObstacleField) -> Self {
        World { bounds, field }
    }

    /// Plans a route from the robot's current state to `edge`.
    ///
    /// Returns `Ok(None)` when the edge cannot be reached.
    pub fn navigate(&self, robot: &Robot, edge: Edge) -> Result<Option<CommandList>, CompileError> {
        solve(robot.position, edge, self.bounds, &self.field)
            .map(|path| compile(&path, robot.heading))
            .transpose()
    }

    /// Rasterises the world with an optional planned path and the robot on top.
    pub fn raster(&self, path: &[Coordinate], robot: &Robot) -> Grid<Tile> {
        let mut grid = Grid::from_generator(self.bounds, |c| {
            if self.field.is_blocked(c.x, c.y) {
                Tile::Obstacle
            } else {
                Tile::Open
            }
        });
        for step in path {
            if let Some(tile) = grid.get_mut(*step) {
                *tile = Tile::Path;
            }
        }
        if let Some(tile) = grid.get_mut(robot.position) {
            *tile = Tile::Robot(robot.heading);
        }
        grid
    }
}

/// Represents errors when reading maze text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MazeError {
    #[error("Line {line}: expected 'x,y', found '{content}'")]
    Malformed { line: usize, content: String },
    #[error("Maze contains no coordinates")]
    Empty,
}

/// Reads maze text with one `x,y` wall coordinate per line into a single obstacle.
pub fn parse_maze(text: &str) -> Result<Obstacle, MazeError> {
    let mut cells = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let malformed = || MazeError::Malformed {
            line: index + 1,
            content: trimmed.to_string(),
        };
        let (x, y) = trimmed.split_once(',').ok_or_else(malformed)?;
        let x = x.trim().parse::<i32>().map_err(|_| malformed())?;
        let y = y.trim().parse::<i32>().map_err(|_| malformed())?;
        cells.push(Coordinate::new(x, y));
    }
    Obstacle::from_cells(cells).ok_or(MazeError::Empty)
}
