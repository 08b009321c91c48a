use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    Cell, PlayerId, RoomName,
    map::{Grid, GridError},
};

/// The static type of a board square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tile {
    Open,
    /// Off the board, or inside a room. Never a cell a token can stand on.
    #[default]
    Blocked,
}

/// A named region of the board. Rooms have no internal coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub name: RoomName,
    /// Open cells from which a token enters or leaves the room, in map order.
    pub doors: Vec<Cell>,
    /// Target of the secret passage leaving this room, if any.
    pub passage: Option<RoomName>,
}

impl Room {
    pub fn has_door(&self, cell: Cell) -> bool {
        self.doors.contains(&cell)
    }
}

/// Errors raised while building or loading a board.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("Board map is empty")]
    Empty,
    #[error("Inconsistent width at row {row}: expected {expected}, found {found}")]
    InconsistentWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Unknown map code '{code}' at position ({x}, {y})")]
    UnknownCode { code: String, x: usize, y: usize },
    #[error("Player {0} has more than one starting cell")]
    DuplicateStart(PlayerId),
    #[error("Malformed legend line '{0}'")]
    MalformedLegend(String),
    #[error("Legend letter '{0}' is used but never named")]
    UnnamedLegend(char),
    #[error("Legend letter '{0}' is named twice")]
    DuplicateLegend(char),
    #[error("Room '{0}' is declared twice")]
    DuplicateRoom(RoomName),
    #[error("Unknown room '{0}'")]
    UnknownRoom(String),
    #[error("Door {cell} of room '{room}' is not an open cell")]
    DoorOffBoard { room: RoomName, cell: Cell },
    #[error("Room '{0}' cannot have a secret passage to itself")]
    PassageToSelf(RoomName),
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Board topology: which cells exist, and how rooms connect to them.
///
/// Loaded once and read-only for the rest of the game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    tiles: Grid<Tile>,
    rooms: BTreeMap<RoomName, Room>,
}

impl Board {
    /// Creates a board where every square is an open cell and there are no rooms.
    pub fn open(width: usize, height: usize) -> Self {
        Board {
            tiles: Grid::filled(width, height, Tile::Open),
            rooms: BTreeMap::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.tiles.width()
    }

    pub fn height(&self) -> usize {
        self.tiles.height()
    }

    /// Returns the tile at `cell`; anything outside the grid is `Blocked`.
    pub fn tile(&self, cell: Cell) -> Tile {
        self.tiles.get(cell).copied().unwrap_or_default()
    }

    pub fn is_on_board(&self, cell: Cell) -> bool {
        self.tile(cell) == Tile::Open
    }

    /// Takes a square off the board.
    pub fn block(&mut self, cell: Cell) -> Result<(), BoardError> {
        self.tiles.set(cell, Tile::Blocked)?;
        Ok(())
    }

    /// Adds a room reached through `doors`. Duplicate doors are collapsed.
    pub fn add_room(
        &mut self,
        name: impl Into<RoomName>,
        doors: impl IntoIterator<Item = Cell>,
    ) -> Result<&Room, BoardError> {
        let name = name.into();
        if self.rooms.contains_key(&name) {
            return Err(BoardError::DuplicateRoom(name));
        }
        let mut door_cells = Vec::new();
        for cell in doors {
            if !self.is_on_board(cell) {
                return Err(BoardError::DoorOffBoard { room: name, cell });
            }
            if !door_cells.contains(&cell) {
                door_cells.push(cell);
            }
        }
        let room = Room {
            name: name.clone(),
            doors: door_cells,
            passage: None,
        };
        Ok(self.rooms.entry(name).or_insert(room))
    }

    /// Links two rooms by a secret passage usable in both directions.
    pub fn link_passage(&mut self, a: &str, b: &str) -> Result<(), BoardError> {
        if a == b {
            return Err(BoardError::PassageToSelf(a.to_string()));
        }
        for name in [a, b] {
            if !self.rooms.contains_key(name) {
                return Err(BoardError::UnknownRoom(name.to_string()));
            }
        }
        for (from, to) in [(a, b), (b, a)] {
            if let Some(room) = self.rooms.get_mut(from) {
                room.passage = Some(to.to_string());
            }
        }
        Ok(())
    }

    pub fn room(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    /// Rooms in name order.
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn room_names(&self) -> Vec<RoomName> {
        self.rooms.keys().cloned().collect()
    }

    /// Rooms that can be entered from `cell`, i.e. rooms having `cell` as a door.
    pub fn adjacent_rooms(&self, cell: Cell) -> impl Iterator<Item = &str> + '_ {
        self.rooms
            .values()
            .filter(move |room| room.has_door(cell))
            .map(|room| room.name.as_str())
    }

    pub fn secret_passage(&self, room: &str) -> Option<&str> {
        self.rooms.get(room)?.passage.as_deref()
    }

    /// Orthogonal neighbours of `cell` that are on the board.
    pub fn neighbours(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        cell.neighbours()
            .into_iter()
            .filter(move |n| self.is_on_board(*n))
    }
}

/// Loads a board and the players' starting cells from a text map.
///
/// The grid is written as whitespace-separated two-character codes:
///
/// * `..` open cell, `##` off the board
/// * `X#` inside the room with legend letter `X`
/// * `X+` open cell that is a door of room `X`
/// * `@n` open cell holding player `n`'s token
///
/// A `---` line ends the grid. Legend lines follow, either `X Room Name`
/// or `passage X Y`.
pub fn load_board_from_string(
    map_string: &str,
) -> Result<(Board, BTreeMap<PlayerId, Cell>), BoardError> {
    let mut lines = map_string.trim().lines();
    let rows: Vec<&str> = lines
        .by_ref()
        .take_while(|line| line.trim() != "---")
        .filter(|line| !line.trim().is_empty())
        .collect();
    let legend: Vec<&str> = lines.collect();

    if rows.is_empty() {
        return Err(BoardError::Empty);
    }

    let mut width = 0;
    let mut parsed_rows: Vec<Vec<&str>> = Vec::with_capacity(rows.len());
    for (y, line) in rows.iter().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if y == 0 {
            width = tokens.len();
        } else if tokens.len() != width {
            return Err(BoardError::InconsistentWidth {
                row: y,
                expected: width,
                found: tokens.len(),
            });
        }
        parsed_rows.push(tokens);
    }

    let mut tiles: Grid<Tile> = Grid::new(width, parsed_rows.len());
    let mut doors: BTreeMap<char, Vec<Cell>> = BTreeMap::new();
    let mut used_letters = BTreeSet::new();
    let mut starts = BTreeMap::new();

    for (y, row_tokens) in parsed_rows.iter().enumerate() {
        for (x, token) in row_tokens.iter().enumerate() {
            let cell = Cell::new(x as i32, y as i32);
            let tile = match token.as_bytes() {
                b".." => Tile::Open,
                b"##" => Tile::Blocked,
                [b'@', digit] if digit.is_ascii_digit() => {
                    let player = PlayerId::from(digit - b'0');
                    if starts.insert(player, cell).is_some() {
                        return Err(BoardError::DuplicateStart(player));
                    }
                    Tile::Open
                }
                [letter, b'#'] if letter.is_ascii_uppercase() => {
                    used_letters.insert(char::from(*letter));
                    Tile::Blocked
                }
                [letter, b'+'] if letter.is_ascii_uppercase() => {
                    let letter = char::from(*letter);
                    used_letters.insert(letter);
                    doors.entry(letter).or_default().push(cell);
                    Tile::Open
                }
                _ => {
                    return Err(BoardError::UnknownCode {
                        code: token.to_string(),
                        x,
                        y,
                    });
                }
            };
            tiles.set(cell, tile)?;
        }
    }

    let mut names: BTreeMap<char, RoomName> = BTreeMap::new();
    let mut passages = Vec::new();
    for line in legend.iter().map(|line| line.trim()) {
        if line.is_empty() {
            continue;
        }
        let malformed = || BoardError::MalformedLegend(line.to_string());
        let (head, rest) = line.split_once(char::is_whitespace).ok_or_else(malformed)?;
        if head == "passage" {
            let letters: Vec<Option<char>> = rest.split_whitespace().map(legend_letter).collect();
            match letters[..] {
                [Some(a), Some(b)] => passages.push((a, b)),
                _ => return Err(malformed()),
            }
        } else {
            let letter = legend_letter(head).ok_or_else(malformed)?;
            let name = rest.trim();
            if name.is_empty() {
                return Err(malformed());
            }
            if names.insert(letter, name.to_string()).is_some() {
                return Err(BoardError::DuplicateLegend(letter));
            }
        }
    }

    if let Some(letter) = used_letters.iter().find(|l| !names.contains_key(l)) {
        return Err(BoardError::UnnamedLegend(*letter));
    }

    let mut board = Board {
        tiles,
        rooms: BTreeMap::new(),
    };
    for (letter, name) in &names {
        board.add_room(name.clone(), doors.remove(letter).unwrap_or_default())?;
    }
    for (a, b) in passages {
        let room_a = names.get(&a).ok_or(BoardError::UnnamedLegend(a))?;
        let room_b = names.get(&b).ok_or(BoardError::UnnamedLegend(b))?;
        board.link_passage(room_a, room_b)?;
    }

    Ok((board, starts))
}

fn legend_letter(token: &str) -> Option<char> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_uppercase() => Some(c),
        _ => None,
    }
}
