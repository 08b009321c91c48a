use std::collections::BTreeMap;

use crate::{Cell, PlayerId, Position, board::Board, map::Grid};

/// Errors raised when placing tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OccupancyError {
    #[error("Cell {cell} is already occupied by player {occupant}")]
    CellTaken { cell: Cell, occupant: PlayerId },
    #[error("Cell {0} is not on the board")]
    OffBoard(Cell),
    #[error("Unknown room '{0}'")]
    UnknownRoom(String),
}

/// Current position of every token.
///
/// At most one token stands on an open cell; rooms hold any number of
/// tokens. Written only by the turn engine, read by every navigator query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupancy {
    positions: BTreeMap<PlayerId, Option<Position>>,
    cells: Grid<Option<PlayerId>>,
}

impl Occupancy {
    /// Creates an empty tracker sized for `board`.
    pub fn new(board: &Board) -> Self {
        Occupancy {
            positions: BTreeMap::new(),
            cells: Grid::new(board.width(), board.height()),
        }
    }

    /// Creates a tracker with the starting cells read from a board map.
    pub fn with_starts(
        board: &Board,
        starts: &BTreeMap<PlayerId, Cell>,
    ) -> Result<Self, OccupancyError> {
        let mut occupancy = Occupancy::new(board);
        for (&player, &cell) in starts {
            occupancy.place(board, player, Position::Cell(cell))?;
        }
        Ok(occupancy)
    }

    /// Puts `player`'s token at `position`, vacating wherever it was before.
    pub fn place(
        &mut self,
        board: &Board,
        player: PlayerId,
        position: Position,
    ) -> Result<(), OccupancyError> {
        match &position {
            Position::Cell(cell) => {
                if !board.is_on_board(*cell) {
                    return Err(OccupancyError::OffBoard(*cell));
                }
                match self.occupant(*cell) {
                    Some(occupant) if occupant != player => {
                        return Err(OccupancyError::CellTaken {
                            cell: *cell,
                            occupant,
                        });
                    }
                    _ => {}
                }
            }
            Position::Room(name) => {
                if board.room(name).is_none() {
                    return Err(OccupancyError::UnknownRoom(name.clone()));
                }
            }
        }

        self.vacate(player);
        if let Position::Cell(cell) = position {
            self.cells[cell] = Some(player);
        }
        log::trace!("player {player} placed at {position}");
        self.positions.insert(player, Some(position));
        Ok(())
    }

    /// Takes `player`'s token off the board, e.g. after a wrong accusation.
    pub fn remove(&mut self, player: PlayerId) {
        self.vacate(player);
        self.positions.insert(player, None);
    }

    fn vacate(&mut self, player: PlayerId) {
        if let Some(Some(Position::Cell(cell))) = self.positions.get(&player) {
            self.cells[*cell] = None;
        }
    }

    pub fn position(&self, player: PlayerId) -> Option<&Position> {
        self.positions.get(&player)?.as_ref()
    }

    /// The player standing on `cell`, if any.
    pub fn occupant(&self, cell: Cell) -> Option<PlayerId> {
        self.cells.get(cell).copied().flatten()
    }

    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.occupant(cell).is_some()
    }

    /// Players currently inside `room`.
    pub fn in_room<'a>(&'a self, room: &'a str) -> impl Iterator<Item = PlayerId> + 'a {
        self.positions
            .iter()
            .filter(move |(_, position)| {
                position.as_ref().and_then(Position::as_room) == Some(room)
            })
            .map(|(player, _)| *player)
    }

    /// Every known player with its position, `None` when off the board.
    pub fn players(&self) -> impl Iterator<Item = (PlayerId, Option<&Position>)> {
        self.positions
            .iter()
            .map(|(player, position)| (*player, position.as_ref()))
    }

    /// An owned copy for computations that must not observe later moves.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }
}
