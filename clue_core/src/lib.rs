use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub mod agent;
pub mod board;
pub mod map;
pub mod navigation;
pub mod notepad;
pub mod occupancy;
pub mod routing;

/// Identifies a player's token on the board.
pub type PlayerId = usize;

/// Name of a room. Rooms double as cards in the deck.
pub type RoomName = String;

/// An integer coordinate on the board grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Cell { x, y }
    }

    /// The four orthogonal neighbours, in up, down, left, right order.
    ///
    /// The cells are not checked against any board.
    pub fn neighbours(self) -> [Cell; 4] {
        [
            Cell::new(self.x, self.y - 1),
            Cell::new(self.x, self.y + 1),
            Cell::new(self.x - 1, self.y),
            Cell::new(self.x + 1, self.y),
        ]
    }

    /// Returns manhattan distance between two cells, ignoring obstacles.
    pub fn manhattan(self, other: Cell) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn is_adjacent(self, other: Cell) -> bool {
        self.manhattan(other) == 1
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Where a token can be: on an open cell, or inside a room.
///
/// Rooms have no internal coordinates. Cells order before rooms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    Cell(Cell),
    Room(RoomName),
}

impl Position {
    pub fn room(name: impl Into<RoomName>) -> Self {
        Position::Room(name.into())
    }

    pub fn as_cell(&self) -> Option<Cell> {
        match self {
            Position::Cell(cell) => Some(*cell),
            Position::Room(_) => None,
        }
    }

    pub fn as_room(&self) -> Option<&str> {
        match self {
            Position::Cell(_) => None,
            Position::Room(name) => Some(name),
        }
    }

    pub fn is_room(&self) -> bool {
        matches!(self, Position::Room(_))
    }
}

impl From<Cell> for Position {
    fn from(cell: Cell) -> Self {
        Position::Cell(cell)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Cell(cell) => cell.fmt(f),
            Position::Room(name) => f.write_str(name),
        }
    }
}

/// Errors from parsing a [`Position`] out of text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParsePositionError {
    #[error("Position is empty")]
    Empty,
    #[error("Malformed coordinate '{0}', expected 'x,y'")]
    BadCoordinate(String),
}

/// Parses `"x,y"` as a cell and anything else as a room name.
impl FromStr for Position {
    type Err = ParsePositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParsePositionError::Empty);
        }
        match s.split_once(',') {
            Some((x, y)) => {
                let bad = || ParsePositionError::BadCoordinate(s.to_string());
                let x = x.trim().parse().map_err(|_| bad())?;
                let y = y.trim().parse().map_err(|_| bad())?;
                Ok(Position::Cell(Cell::new(x, y)))
            }
            None => Ok(Position::Room(s.to_string())),
        }
    }
}
