//! Reachability over the board grid.
//!
//! Movement rules:
//! 1. A token moves orthogonally, one cell per step, never onto a cell
//!    holding another token and never twice onto the same cell.
//! 2. A roll of N lands on open cells whose board-distance is exactly N.
//! 3. Entering a room takes a step and ends movement, so a room is
//!    enterable from any of its doors reached with steps still in hand.
//! 4. A token leaving a room spends one step to stand on any free door.
//! 5. A secret passage is a separate, dice-free option from its room.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::{Cell, Position, RoomName, board::Board, board::Room, occupancy::Occupancy};

/// Highest roll accepted by default: two six-sided dice.
pub const DEFAULT_MAX_STEPS: u32 = 12;

/// Default amount of work the greedy router may spend on one query.
pub const DEFAULT_ROUTE_BUDGET: usize = 20_000;

/// Limits applied to navigator queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Largest dice roll `available_moves` accepts.
    pub max_steps: u32,
    /// Node expansions the greedy router may spend before giving up.
    pub route_budget: usize,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        NavigatorConfig {
            max_steps: DEFAULT_MAX_STEPS,
            route_budget: DEFAULT_ROUTE_BUDGET,
        }
    }
}

/// A position the board cannot resolve. Signals a bug upstream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPosition {
    #[error("cell {0} is not on the board")]
    OffBoard(Cell),
    #[error("unknown room '{0}'")]
    UnknownRoom(String),
    #[error("room '{0}' has no way out")]
    NoDoors(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavError {
    #[error("invalid position: {0}")]
    InvalidPosition(#[from] InvalidPosition),
    #[error("roll of {steps} exceeds the limit of {limit} steps")]
    TooManySteps { steps: u32, limit: u32 },
}

/// Destinations reachable with one roll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableMoves {
    cells: BTreeSet<Cell>,
    rooms: BTreeSet<RoomName>,
    passages: BTreeSet<RoomName>,
}

impl AvailableMoves {
    /// Open cells at exactly the rolled distance.
    pub fn cells(&self) -> &BTreeSet<Cell> {
        &self.cells
    }

    /// Rooms that can be entered with this roll.
    pub fn rooms(&self) -> &BTreeSet<RoomName> {
        &self.rooms
    }

    /// Rooms reachable through a secret passage instead of rolling.
    pub fn passages(&self) -> &BTreeSet<RoomName> {
        &self.passages
    }

    /// Whether `position` is a legal dice move.
    pub fn contains(&self, position: &Position) -> bool {
        match position {
            Position::Cell(cell) => self.cells.contains(cell),
            Position::Room(room) => self.rooms.contains(room),
        }
    }

    pub fn is_passage(&self, room: &str) -> bool {
        self.passages.contains(room)
    }

    /// Dice destinations, cells first. Passages are not included.
    pub fn destinations(&self) -> impl Iterator<Item = Position> + '_ {
        self.cells
            .iter()
            .map(|cell| Position::Cell(*cell))
            .chain(self.rooms.iter().map(|room| Position::Room(room.clone())))
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.rooms.is_empty() && self.passages.is_empty()
    }
}

/// An ordered walk from a start position to a room.
///
/// Room-to-room routes start with the room being left; a route through a
/// secret passage is just the two rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route(Vec<Position>);

impl Route {
    pub fn new(positions: Vec<Position>) -> Self {
        Route(positions)
    }

    pub fn positions(&self) -> &[Position] {
        &self.0
    }

    pub fn start(&self) -> Option<&Position> {
        self.0.first()
    }

    pub fn destination(&self) -> Option<&Position> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of moves along the route.
    pub fn steps(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn is_passage(&self) -> bool {
        self.0.len() == 2 && self.0.iter().all(Position::is_room)
    }
}

/// Route to every room other than the one being left; `None` where sealed off.
pub type RoomPaths = BTreeMap<RoomName, Option<Route>>;

/// Read-only view over the topology and one occupancy snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Navigator<'a> {
    board: &'a Board,
    occupancy: &'a Occupancy,
    config: NavigatorConfig,
}

impl<'a> Navigator<'a> {
    pub fn new(board: &'a Board, occupancy: &'a Occupancy) -> Self {
        Navigator {
            board,
            occupancy,
            config: NavigatorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: NavigatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn board(&self) -> &'a Board {
        self.board
    }

    pub fn occupancy(&self) -> &'a Occupancy {
        self.occupancy
    }

    pub fn config(&self) -> NavigatorConfig {
        self.config
    }

    /// A cell a moving token may step onto: on the board and free.
    pub fn is_available(&self, cell: Cell) -> bool {
        self.board.is_on_board(cell) && !self.occupancy.is_occupied(cell)
    }

    pub(crate) fn room_checked(&self, name: &str) -> Result<&'a Room, NavError> {
        self.board
            .room(name)
            .ok_or_else(|| InvalidPosition::UnknownRoom(name.to_string()).into())
    }

    pub(crate) fn cell_checked(&self, cell: Cell) -> Result<Cell, NavError> {
        if self.board.is_on_board(cell) {
            Ok(cell)
        } else {
            Err(InvalidPosition::OffBoard(cell).into())
        }
    }

    /// Computes every destination a roll of `steps` allows from `start`.
    pub fn available_moves(&self, start: &Position, steps: u32) -> Result<AvailableMoves, NavError> {
        if steps > self.config.max_steps {
            return Err(NavError::TooManySteps {
                steps,
                limit: self.config.max_steps,
            });
        }

        let mut moves = AvailableMoves::default();
        let mut visited: HashSet<Cell> = HashSet::new();
        let mut frontier: Vec<Cell> = Vec::new();
        let mut remaining = steps;
        let mut left_room = None;

        match start {
            Position::Cell(cell) => {
                let cell = self.cell_checked(*cell)?;
                visited.insert(cell);
                frontier.push(cell);
            }
            Position::Room(name) => {
                let room = self.room_checked(name)?;
                if room.doors.is_empty() && room.passage.is_none() {
                    return Err(InvalidPosition::NoDoors(name.clone()).into());
                }
                if let Some(passage) = &room.passage {
                    moves.passages.insert(passage.clone());
                }
                if steps == 0 {
                    return Ok(moves);
                }
                left_room = Some(room.name.as_str());
                remaining -= 1;
                for door in room.doors.iter().copied() {
                    if self.is_available(door) && visited.insert(door) {
                        frontier.push(door);
                    }
                }
            }
        }

        // Expand one ring of cells per step; `visited` keeps every ring
        // at its exact board-distance.
        loop {
            if remaining == 0 {
                moves.cells.extend(frontier);
                break;
            }
            for cell in &frontier {
                for room in self.board.adjacent_rooms(*cell) {
                    if left_room != Some(room) {
                        moves.rooms.insert(room.to_string());
                    }
                }
            }
            let mut next = Vec::new();
            for cell in &frontier {
                for neighbour in self.board.neighbours(*cell) {
                    if !self.occupancy.is_occupied(neighbour) && visited.insert(neighbour) {
                        next.push(neighbour);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
            remaining -= 1;
        }

        log::debug!(
            "moves from {start} with {steps}: {} cells, {} rooms, {} passages",
            moves.cells.len(),
            moves.rooms.len(),
            moves.passages.len()
        );
        Ok(moves)
    }

    /// Routes from `start` to every other room, for choosing a target.
    pub fn room_paths(&self, start: &Position) -> Result<RoomPaths, NavError> {
        let mut paths = RoomPaths::new();
        for room in self.board.rooms() {
            if start.as_room() == Some(room.name.as_str()) {
                continue;
            }
            let route = self.find_path_to_room(start, &room.name)?;
            paths.insert(room.name.clone(), route);
        }
        Ok(paths)
    }

    /// Board-distance between two cells, or `None` if `to` cannot be reached.
    ///
    /// The token at `from` is assumed to be the mover and does not block.
    pub fn board_distance(&self, from: Cell, to: Cell) -> Option<u32> {
        if from == to {
            return Some(0);
        }
        self.distance_field([from]).get(&to).copied()
    }

    /// Breadth-first distances from the nearest of `sources` over free cells.
    ///
    /// Sources count as free even when a token stands on them.
    pub(crate) fn distance_field(&self, sources: impl IntoIterator<Item = Cell>) -> HashMap<Cell, u32> {
        let mut distances = HashMap::new();
        let mut queue = VecDeque::new();
        for source in sources {
            if self.board.is_on_board(source) && !distances.contains_key(&source) {
                distances.insert(source, 0);
                queue.push_back(source);
            }
        }
        while let Some(cell) = queue.pop_front() {
            let next = distances[&cell] + 1;
            for neighbour in self.board.neighbours(cell) {
                if !self.occupancy.is_occupied(neighbour) && !distances.contains_key(&neighbour) {
                    distances.insert(neighbour, next);
                    queue.push_back(neighbour);
                }
            }
        }
        distances
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::load_board_from_string;

    fn cells(list: &[(i32, i32)]) -> BTreeSet<Cell> {
        list.iter().map(|&(x, y)| Cell::new(x, y)).collect()
    }

    #[test]
    fn open_grid_roll_of_two() {
        let board = Board::open(4, 4);
        let occupancy = Occupancy::new(&board);
        let nav = Navigator::new(&board, &occupancy);
        let moves = nav.available_moves(&Cell::new(0, 0).into(), 2).unwrap();
        assert_eq!(moves.cells(), &cells(&[(0, 2), (2, 0), (1, 1)]));
        assert!(moves.rooms().is_empty());
        assert!(moves.passages().is_empty());
    }

    #[test]
    fn exact_distance_excludes_nearer_cells() {
        let board = Board::open(4, 4);
        let occupancy = Occupancy::new(&board);
        let nav = Navigator::new(&board, &occupancy);
        let moves = nav.available_moves(&Cell::new(0, 0).into(), 3).unwrap();
        assert_eq!(moves.cells(), &cells(&[(0, 3), (1, 2), (2, 1), (3, 0)]));
        assert!(!moves.contains(&Cell::new(1, 0).into()));
    }

    #[test]
    fn room_entry_ends_movement_early() {
        let mut board = Board::open(3, 1);
        board.add_room("Kitchen", [Cell::new(0, 0)]).unwrap();
        let occupancy = Occupancy::new(&board);
        let nav = Navigator::new(&board, &occupancy);
        let moves = nav.available_moves(&Cell::new(0, 0).into(), 1).unwrap();
        assert_eq!(moves.cells(), &cells(&[(1, 0)]));
        assert!(moves.contains(&Position::room("Kitchen")));
    }

    #[test]
    fn rooms_are_found_mid_walk() {
        let mut board = Board::open(6, 1);
        board.add_room("Kitchen", [Cell::new(2, 0)]).unwrap();
        let occupancy = Occupancy::new(&board);
        let nav = Navigator::new(&board, &occupancy);
        let moves = nav.available_moves(&Cell::new(0, 0).into(), 5).unwrap();
        assert_eq!(moves.cells(), &cells(&[(5, 0)]));
        assert!(moves.contains(&Position::room("Kitchen")));
        // The door is two steps away: a roll of two lands on it but cannot enter.
        let moves = nav.available_moves(&Cell::new(0, 0).into(), 2).unwrap();
        assert!(moves.rooms().is_empty());
    }

    #[test]
    fn other_tokens_block_movement() {
        let board = Board::open(3, 1);
        let mut occupancy = Occupancy::new(&board);
        occupancy.place(&board, 2, Cell::new(1, 0).into()).unwrap();
        let nav = Navigator::new(&board, &occupancy);
        let moves = nav.available_moves(&Cell::new(0, 0).into(), 2).unwrap();
        assert!(moves.is_empty());
    }

    #[test]
    fn leaving_a_room_uses_every_free_door() {
        let (board, _) = load_board_from_string(
            "
            .. .. .. ..
            A+ A# A# A+
            .. .. .. ..
            ---
            A Attic
            ",
        )
        .unwrap();
        let mut occupancy = Occupancy::new(&board);
        occupancy.place(&board, 1, Position::room("Attic")).unwrap();
        let nav = Navigator::new(&board, &occupancy);
        let moves = nav.available_moves(&Position::room("Attic"), 1).unwrap();
        assert_eq!(moves.cells(), &cells(&[(0, 1), (3, 1)]));
        // A token re-entering the room it just left is not a move.
        assert!(moves.rooms().is_empty());

        occupancy.place(&board, 2, Cell::new(3, 1).into()).unwrap();
        let nav = Navigator::new(&board, &occupancy);
        let moves = nav.available_moves(&Position::room("Attic"), 2).unwrap();
        assert_eq!(moves.cells(), &cells(&[(0, 0), (0, 2)]));
    }

    #[test]
    fn passages_are_tagged_apart_from_dice_moves() {
        let (board, _) = load_board_from_string(
            "
            K# K+ .. S+ S#
            ---
            K Kitchen
            S Study
            passage K S
            ",
        )
        .unwrap();
        let occupancy = Occupancy::new(&board);
        let nav = Navigator::new(&board, &occupancy);
        let moves = nav.available_moves(&Position::room("Kitchen"), 0).unwrap();
        assert!(moves.is_passage("Study"));
        assert!(moves.cells().is_empty());
        assert!(!moves.contains(&Position::room("Study")));

        // Out of the Kitchen, two steps along, one step into the Study.
        let moves = nav.available_moves(&Position::room("Kitchen"), 4).unwrap();
        assert!(moves.is_passage("Study"));
        assert!(moves.rooms().contains("Study"));
        assert_eq!(moves.destinations().count(), moves.cells().len() + 1);
    }

    #[test]
    fn rejects_bad_queries() {
        let mut board = Board::open(2, 2);
        board.block(Cell::new(1, 1)).unwrap();
        board.add_room("Vault", Vec::new()).unwrap();
        let occupancy = Occupancy::new(&board);
        let nav = Navigator::new(&board, &occupancy);
        assert_eq!(
            nav.available_moves(&Cell::new(1, 1).into(), 1),
            Err(InvalidPosition::OffBoard(Cell::new(1, 1)).into())
        );
        assert_eq!(
            nav.available_moves(&Position::room("Pantry"), 1),
            Err(InvalidPosition::UnknownRoom("Pantry".to_string()).into())
        );
        assert_eq!(
            nav.available_moves(&Position::room("Vault"), 1),
            Err(InvalidPosition::NoDoors("Vault".to_string()).into())
        );
        assert_eq!(
            nav.available_moves(&Cell::new(0, 0).into(), 13),
            Err(NavError::TooManySteps { steps: 13, limit: 12 })
        );
    }

    #[test]
    fn zero_roll_stays_put() {
        let board = Board::open(2, 2);
        let occupancy = Occupancy::new(&board);
        let nav = Navigator::new(&board, &occupancy);
        let moves = nav.available_moves(&Cell::new(1, 0).into(), 0).unwrap();
        assert_eq!(moves.cells(), &cells(&[(1, 0)]));
    }

    #[test]
    fn repeated_queries_agree() {
        let (board, starts) = load_board_from_string(
            "
            .. .. @1 .. ..
            .. ## .. ## B+
            .. .. .. .. B#
            ---
            B Billiard Room
            ",
        )
        .unwrap();
        let occupancy = Occupancy::with_starts(&board, &starts).unwrap();
        let nav = Navigator::new(&board, &occupancy);
        let start = Cell::new(2, 0).into();
        let first = nav.available_moves(&start, 4).unwrap();
        assert_eq!(first, nav.available_moves(&start, 4).unwrap());
        assert!(first.contains(&Position::room("Billiard Room")));
    }

    #[test]
    fn board_distance_walks_around_obstacles() {
        let mut board = Board::open(3, 3);
        board.block(Cell::new(1, 0)).unwrap();
        board.block(Cell::new(1, 1)).unwrap();
        let occupancy = Occupancy::new(&board);
        let nav = Navigator::new(&board, &occupancy);
        assert_eq!(nav.board_distance(Cell::new(0, 0), Cell::new(2, 0)), Some(6));
        assert_eq!(nav.board_distance(Cell::new(0, 0), Cell::new(0, 0)), Some(0));
        assert_eq!(nav.board_distance(Cell::new(0, 0), Cell::new(1, 1)), None);
    }
}
