use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Coordinate;

/// The robot's facing direction, in clockwise rotation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Heading {
    /// Facing "forward", towards +y.
    #[default]
    North,
    /// Facing "right", towards +x.
    East,
    /// Facing "back", towards -y.
    South,
    /// Facing "left", towards -x.
    West,
}

impl Heading {
    const ROTATION: [Heading; 4] = [Heading::North, Heading::East, Heading::South, Heading::West];

    /// Position in the rotation order, 0 to 3.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Self {
        Self::ROTATION[index % 4]
    }

    pub fn turned_right(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn turned_left(self) -> Self {
        Self::from_index(self.index() + 3)
    }

    pub fn reversed(self) -> Self {
        Self::from_index(self.index() + 2)
    }

    pub fn turned(self, turn: Turn) -> Self {
        match turn {
            Turn::Left => self.turned_left(),
            Turn::Right => self.turned_right(),
        }
    }

    /// Unit step taken when moving forward with this heading.
    pub fn delta(self) -> Coordinate {
        match self {
            Heading::North => Coordinate::new(0, 1),
            Heading::East => Coordinate::new(1, 0),
            Heading::South => Coordinate::new(0, -1),
            Heading::West => Coordinate::new(-1, 0),
        }
    }

    /// The heading whose unit step is `(dx, dy)`, if it is one.
    pub fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        Self::ROTATION
            .into_iter()
            .find(|heading| heading.delta() == Coordinate::new(dx, dy))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Turn {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Motion {
    Forward,
    Back,
}

/// A single instruction for the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Turn(Turn),
    /// Move along (or against) the current heading without turning. Steps are at least 1.
    Move(Motion, u32),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Turn(Turn::Left) => f.write_str("left"),
            Command::Turn(Turn::Right) => f.write_str("right"),
            Command::Move(Motion::Forward, steps) => write!(f, "forward {}", steps),
            Command::Move(Motion::Back, steps) => write!(f, "back {}", steps),
        }
    }
}

/// Represents errors when reading a command token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCommandError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown command '{0}'")]
    UnknownVerb(String),
    #[error("'{0}' needs a number of steps")]
    MissingSteps(String),
    #[error("Invalid number of steps '{0}'")]
    InvalidSteps(String),
    #[error("Unexpected argument '{0}'")]
    UnexpectedArgument(String),
}

impl FromStr for Command {
    type Err = ParseCommandError;

    /// Reads the token shapes produced by `Display`: `forward N`, `back N`, `left`, `right`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let verb = words.next().ok_or(ParseCommandError::Empty)?.to_ascii_lowercase();
        let argument = words.next();
        if let Some(extra) = words.next() {
            return Err(ParseCommandError::UnexpectedArgument(extra.to_string()));
        }

        let motion = match verb.as_str() {
            "left" | "right" => {
                if let Some(extra) = argument {
                    return Err(ParseCommandError::UnexpectedArgument(extra.to_string()));
                }
                let turn = if verb == "left" { Turn::Left } else { Turn::Right };
                return Ok(Command::Turn(turn));
            }
            "forward" => Motion::Forward,
            "back" => Motion::Back,
            _ => return Err(ParseCommandError::UnknownVerb(verb)),
        };

        let raw = argument.ok_or_else(|| ParseCommandError::MissingSteps(verb.clone()))?;
        match raw.parse::<u32>() {
            Ok(steps) if steps >= 1 => Ok(Command::Move(motion, steps)),
            _ => Err(ParseCommandError::InvalidSteps(raw.to_string())),
        }
    }
}

/// Represents errors when a path cannot be turned into commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("Path step {from} -> {to} is not a single axis-aligned move")]
    NotAdjacent { from: Coordinate, to: Coordinate },
}

/// Compiled commands together with the heading the robot ends up with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandList {
    commands: Vec<Command>,
    final_heading: Heading,
}

impl CommandList {
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn final_heading(&self) -> Heading {
        self.final_heading
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    /// The textual tokens understood by the robot, e.g. `["right", "forward 99"]`.
    pub fn tokens(&self) -> Vec<String> {
        self.commands.iter().map(Command::to_string).collect()
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

/// Translates a 4-connected path into turn/move commands for a robot that
/// starts out facing `initial`.
///
/// A step along the heading moves forward, a step against it moves back
/// without turning, and a sideways step turns first. Runs of equal moves are
/// merged afterwards.
pub fn compile(path: &[Coordinate], initial: Heading) -> Result<CommandList, CompileError> {
    let mut heading = initial;
    let mut raw = Vec::with_capacity(path.len());

    for pair in path.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let required = Heading::from_delta(to.x - from.x, to.y - from.y)
            .ok_or(CompileError::NotAdjacent { from, to })?;

        if required == heading {
            raw.push(Command::Move(Motion::Forward, 1));
        } else if required == heading.reversed() {
            raw.push(Command::Move(Motion::Back, 1));
        } else {
            let turn = if required == heading.turned_right() {
                Turn::Right
            } else {
                Turn::Left
            };
            raw.push(Command::Turn(turn));
            raw.push(Command::Move(Motion::Forward, 1));
            heading = required;
        }
    }

    Ok(CommandList {
        commands: compress(raw),
        final_heading: heading,
    })
}

/// Merges consecutive moves in the same direction. Turns always break a run.
fn compress(raw: Vec<Command>) -> Vec<Command> {
    let mut merged: Vec<Command> = Vec::with_capacity(raw.len());
    for command in raw {
        match (merged.last_mut(), command) {
            (Some(Command::Move(motion, total)), Command::Move(next, steps)) if *motion == next => {
                *total += steps;
            }
            _ => merged.push(command),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn c(x: i32, y: i32) -> Coordinate {
        Coordinate::new(x, y)
    }

    fn line(from: Coordinate, step: Coordinate, steps: i32) -> Vec<Coordinate> {
        (0..=steps)
            .map(|i| c(from.x + step.x * i, from.y + step.y * i))
            .collect()
    }

    /// Replays commands on a bare position/heading pair.
    fn simulate(start: Coordinate, heading: Heading, commands: &CommandList) -> (Coordinate, Heading) {
        commands
            .iter()
            .fold((start, heading), |(position, heading), command| match *command {
                Command::Turn(turn) => (position, heading.turned(turn)),
                Command::Move(motion, steps) => {
                    let delta = match motion {
                        Motion::Forward => heading.delta(),
                        Motion::Back => heading.reversed().delta(),
                    };
                    let steps = steps as i32;
                    (c(position.x + delta.x * steps, position.y + delta.y * steps), heading)
                }
            })
    }

    #[test]
    fn straight_up_is_one_forward() {
        let path = line(Coordinate::ORIGIN, c(0, 1), 199);
        let commands = compile(&path, Heading::North).unwrap();
        assert_eq!(commands.tokens(), vec!["forward 199"]);
        assert_eq!(commands.final_heading(), Heading::North);
    }

    #[test]
    fn right_edge_turns_then_moves() {
        let path = line(Coordinate::ORIGIN, c(1, 0), 99);
        let commands = compile(&path, Heading::North).unwrap();
        assert_eq!(commands.tokens(), vec!["right", "forward 99"]);
        assert_eq!(commands.final_heading(), Heading::East);
    }

    #[test]
    fn opposite_direction_backs_up_without_turning() {
        let path = line(Coordinate::ORIGIN, c(0, -1), 5);
        let commands = compile(&path, Heading::North).unwrap();
        assert_eq!(commands.tokens(), vec!["back 5"]);
        assert_eq!(commands.final_heading(), Heading::North);
    }

    #[test]
    fn left_turns_and_runs_are_split_by_turns() {
        let path = vec![c(0, 0), c(0, 1), c(0, 2), c(-1, 2), c(-2, 2), c(-2, 3), c(-2, 4)];
        let commands = compile(&path, Heading::North).unwrap();
        assert_eq!(
            commands.tokens(),
            vec!["forward 2", "left", "forward 2", "right", "forward 2"]
        );
        assert_eq!(commands.final_heading(), Heading::North);
    }

    #[test]
    fn forward_and_back_runs_never_merge() {
        let path = vec![c(0, 0), c(0, 1), c(0, 0), c(0, -1)];
        let commands = compile(&path, Heading::North).unwrap();
        assert_eq!(commands.tokens(), vec!["forward 1", "back 2"]);
    }

    #[test]
    fn consecutive_turns_are_kept() {
        // East, two steps West, then North.
        let path = vec![c(0, 0), c(1, 0), c(0, 0), c(-1, 0), c(-1, 1)];
        let commands = compile(&path, Heading::North).unwrap();
        assert_eq!(commands.tokens(), vec!["right", "forward 1", "back 2", "left", "forward 1"]);
    }

    #[test]
    fn short_paths_compile_to_nothing() {
        assert!(compile(&[], Heading::East).unwrap().is_empty());
        let single = compile(&[c(3, 4)], Heading::East).unwrap();
        assert!(single.is_empty());
        assert_eq!(single.final_heading(), Heading::East);
    }

    #[test]
    fn gaps_in_the_path_are_rejected() {
        assert_eq!(
            compile(&[c(0, 0), c(1, 1)], Heading::North),
            Err(CompileError::NotAdjacent {
                from: c(0, 0),
                to: c(1, 1)
            })
        );
        assert!(compile(&[c(0, 0), c(0, 0)], Heading::North).is_err());
        assert!(compile(&[c(0, 0), c(0, 2)], Heading::North).is_err());
    }

    #[test]
    fn heading_rotation() {
        assert_eq!(Heading::North.turned_right(), Heading::East);
        assert_eq!(Heading::North.turned_left(), Heading::West);
        assert_eq!(Heading::West.turned_right(), Heading::North);
        assert_eq!(Heading::South.reversed(), Heading::North);
        assert_eq!(Heading::from_index(6), Heading::South);
        assert_eq!(Heading::from_delta(-1, 0), Some(Heading::West));
        assert_eq!(Heading::from_delta(1, 1), None);
    }

    #[test]
    fn tokens_parse_back() {
        assert_eq!("forward 10".parse::<Command>(), Ok(Command::Move(Motion::Forward, 10)));
        assert_eq!("  BACK 3 ".parse::<Command>(), Ok(Command::Move(Motion::Back, 3)));
        assert_eq!("Left".parse::<Command>(), Ok(Command::Turn(Turn::Left)));
        assert_eq!("right".parse::<Command>(), Ok(Command::Turn(Turn::Right)));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert_eq!("".parse::<Command>(), Err(ParseCommandError::Empty));
        assert_eq!(
            "forward a".parse::<Command>(),
            Err(ParseCommandError::InvalidSteps("a".to_string()))
        );
        assert_eq!(
            "forward 0".parse::<Command>(),
            Err(ParseCommandError::InvalidSteps("0".to_string()))
        );
        assert_eq!(
            "back".parse::<Command>(),
            Err(ParseCommandError::MissingSteps("back".to_string()))
        );
        assert_eq!(
            "jump up".parse::<Command>(),
            Err(ParseCommandError::UnknownVerb("jump".to_string()))
        );
        assert_eq!(
            "left 2".parse::<Command>(),
            Err(ParseCommandError::UnexpectedArgument("2".to_string()))
        );
    }

    fn random_walk() -> impl Strategy<Value = (Vec<Coordinate>, Heading)> {
        (prop::collection::vec(0usize..4, 0..60), 0usize..4).prop_map(|(steps, heading)| {
            let mut path = vec![Coordinate::ORIGIN];
            for index in steps {
                let last = *path.last().unwrap();
                path.push(last + Heading::from_index(index).delta());
            }
            (path, Heading::from_index(heading))
        })
    }

    /// Heading after the last step that left the current axis, or `initial`.
    fn heading_implied_by(path: &[Coordinate], initial: Heading) -> Heading {
        let vertical = |heading: Heading| heading.delta().x == 0;
        path.windows(2)
            .map(|pair| Heading::from_delta(pair[1].x - pair[0].x, pair[1].y - pair[0].y).unwrap())
            .fold(initial, |current, step| {
                if vertical(step) == vertical(current) { current } else { step }
            })
    }

    #[test]
    fn final_heading_follows_the_last_sideways_step() {
        // From South: the East step turns, the West steps back up, the North step turns.
        let path = vec![c(0, 0), c(1, 0), c(0, 0), c(-1, 0), c(-1, 1)];
        assert_eq!(heading_implied_by(&path, Heading::South), Heading::North);
        let commands = compile(&path, Heading::South).unwrap();
        assert_eq!(commands.final_heading(), Heading::North);

        // Only steps along the initial axis: no turn at all.
        let path = vec![c(0, 0), c(0, -1), c(0, 0)];
        assert_eq!(compile(&path, Heading::North).unwrap().final_heading(), Heading::North);
    }

    proptest! {
        #[test]
        fn replaying_commands_reaches_the_path_end((path, heading) in random_walk()) {
            let commands = compile(&path, heading).unwrap();
            let (end, final_heading) = simulate(path[0], heading, &commands);
            let expected = heading_implied_by(&path, heading);
            prop_assert_eq!(end, *path.last().unwrap());
            prop_assert_eq!(final_heading, expected);
            prop_assert_eq!(commands.final_heading(), expected);
        }

        #[test]
        fn compiling_is_deterministic((path, heading) in random_walk()) {
            prop_assert_eq!(compile(&path, heading), compile(&path, heading));
        }

        #[test]
        fn compressed_lists_have_no_mergeable_neighbours((path, heading) in random_walk()) {
            let commands = compile(&path, heading).unwrap();
            for pair in commands.commands().windows(2) {
                if let (Command::Move(a, _), Command::Move(b, _)) = (pair[0], pair[1]) {
                    prop_assert_ne!(a, b);
                }
            }
            for command in &commands {
                prop_assert_eq!(command.to_string().parse::<Command>(), Ok(*command));
            }
        }
    }
}
