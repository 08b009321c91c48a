//! Door-seeking router.
//!
//! Algorithm: "straight runs, then detours"
//! 1. Rank the target room's free doors by board-distance from the current cell
//! 2. Step along an unbroken horizontal-then-vertical (or vertical-then-horizontal)
//!    run toward the nearest door when one exists
//! 3. Otherwise aim for the nearest free cell on the perpendicular bisector of
//!    the line to the door, and step toward that instead
//! 4. Doors and cells that dead-end are remembered for the rest of the query,
//!    and the next door is tried
//! 5. If the greedy walk gives up while a door is still reachable, the
//!    breadth-first shortest route is returned
//!
//! Every choice is ordered: no randomness, so equal boards give equal routes.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    rc::Rc,
};

use crate::{
    Cell, Position,
    board::Room,
    navigation::{NavError, Navigator, Route},
};

impl Navigator<'_> {
    /// Finds a route from `start` into `room`.
    ///
    /// Returns `Ok(None)` when every door of `room` is unreachable.
    pub fn find_path_to_room(&self, start: &Position, room: &str) -> Result<Option<Route>, NavError> {
        let target = self.room_checked(room)?;
        match start {
            Position::Room(from) => self.find_path_between_rooms(from, room),
            Position::Cell(cell) => {
                let cell = self.cell_checked(*cell)?;
                Ok(self.route_from(None, &[cell], target))
            }
        }
    }

    /// Finds a route from inside `start_room` into `room`.
    ///
    /// Uses the secret passage when it leads straight there, otherwise leaves
    /// by the free door nearest the target room.
    pub fn find_path_between_rooms(
        &self,
        start_room: &str,
        room: &str,
    ) -> Result<Option<Route>, NavError> {
        let from = self.room_checked(start_room)?;
        let target = self.room_checked(room)?;
        if from.name == target.name {
            return Ok(None);
        }
        if from.passage.as_deref() == Some(target.name.as_str()) {
            return Ok(Some(Route::new(vec![
                Position::Room(from.name.clone()),
                Position::Room(target.name.clone()),
            ])));
        }

        let to_target = self.distance_field(self.free_doors(target));
        let mut doors = self.free_doors(from);
        doors.sort_by_key(|door| estimate(&to_target, *door));
        Ok(self.route_from(Some(from), &doors, target))
    }

    fn free_doors(&self, room: &Room) -> Vec<Cell> {
        room.doors
            .iter()
            .copied()
            .filter(|door| self.is_available(*door))
            .collect()
    }

    /// Tries the greedy router from each start in turn, then the exact search.
    fn route_from(&self, start_room: Option<&Room>, starts: &[Cell], target: &Room) -> Option<Route> {
        for &start in starts {
            let mut router = Router::new(*self, target);
            if let Some(cells) = router.run(start) {
                return Some(assemble(start_room, cells, target));
            }
            log::debug!("no greedy route from {start} to '{}'", target.name);
        }
        let cells = self.shortest_route(starts, target)?;
        log::debug!("using breadth-first route to '{}'", target.name);
        Some(assemble(start_room, cells, target))
    }

    /// Breadth-first shortest walk from any of `sources` to a door of `target`.
    fn shortest_route(&self, sources: &[Cell], target: &Room) -> Option<Vec<Cell>> {
        let mut parents: HashMap<Cell, Option<Cell>> = HashMap::new();
        let mut queue = VecDeque::new();
        for &source in sources {
            if self.board().is_on_board(source) && !parents.contains_key(&source) {
                parents.insert(source, None);
                queue.push_back(source);
            }
        }
        while let Some(cell) = queue.pop_front() {
            if target.has_door(cell) {
                let mut cells = vec![cell];
                let mut current = cell;
                while let Some(Some(previous)) = parents.get(&current) {
                    cells.push(*previous);
                    current = *previous;
                }
                cells.reverse();
                return Some(cells);
            }
            for neighbour in self.board().neighbours(cell) {
                if !self.occupancy().is_occupied(neighbour) && !parents.contains_key(&neighbour) {
                    parents.insert(neighbour, Some(cell));
                    queue.push_back(neighbour);
                }
            }
        }
        None
    }
}

fn assemble(start_room: Option<&Room>, cells: Vec<Cell>, target: &Room) -> Route {
    let mut positions = Vec::with_capacity(cells.len() + 2);
    if let Some(room) = start_room {
        positions.push(Position::Room(room.name.clone()));
    }
    positions.extend(cells.into_iter().map(Position::Cell));
    positions.push(Position::Room(target.name.clone()));
    Route::new(positions)
}

fn estimate(distances: &HashMap<Cell, u32>, cell: Cell) -> u32 {
    distances.get(&cell).copied().unwrap_or(u32::MAX)
}

/// Line through the midpoint of start and target, perpendicular to it.
#[derive(Debug, Clone, Copy)]
enum Bisector {
    /// Start and target share a row, so the bisector is the column `x = mid.x`.
    Vertical,
    Sloped { slope: f64, intercept: f64 },
}

/// A cell on the walk and the doors still to try from it.
struct Frame {
    cell: Cell,
    doors: std::vec::IntoIter<Cell>,
    /// Door the step after `cell` was aimed at.
    trying: Option<Cell>,
}

/// State of one greedy routing attempt.
struct Router<'n> {
    nav: Navigator<'n>,
    target: &'n Room,
    /// Cells and doors proven to dead-end during this attempt.
    failed: HashSet<Cell>,
    budget: usize,
    /// How far along a bisector to look for a detour cell.
    reach: i32,
    /// Distance fields, keyed by the door they were grown from.
    fields: HashMap<Cell, Rc<HashMap<Cell, u32>>>,
    path: Vec<Cell>,
    on_path: HashSet<Cell>,
}

impl<'n> Router<'n> {
    fn new(nav: Navigator<'n>, target: &'n Room) -> Self {
        let board = nav.board();
        let reach = i32::try_from(board.width().max(board.height())).unwrap_or(i32::MAX / 10);
        Router {
            nav,
            target,
            failed: HashSet::new(),
            budget: nav.config().route_budget,
            reach,
            fields: HashMap::new(),
            path: Vec::new(),
            on_path: HashSet::new(),
        }
    }

    fn spend(&mut self) -> bool {
        if self.budget == 0 {
            return false;
        }
        self.budget -= 1;
        true
    }

    /// Walks from `start` toward the room, backing up a cell whenever every
    /// door tried from it dead-ends.
    fn run(&mut self, start: Cell) -> Option<Vec<Cell>> {
        let mut frames: Vec<Frame> = Vec::new();
        let mut pending = Some(start);
        loop {
            if let Some(cell) = pending.take() {
                if !self.failed.contains(&cell) && self.spend() {
                    self.path.push(cell);
                    self.on_path.insert(cell);
                    if self.target.has_door(cell) {
                        return Some(std::mem::take(&mut self.path));
                    }
                    let doors = self.ranked_doors(cell);
                    frames.push(Frame {
                        cell,
                        doors: doors.into_iter(),
                        trying: None,
                    });
                }
            }

            let frame = frames.last_mut()?;
            if let Some(door) = frame.trying.take() {
                self.failed.insert(door);
            }
            for door in frame.doors.by_ref() {
                if self.failed.contains(&door) {
                    continue;
                }
                if let Some(next) = self.next_space(frame.cell, door) {
                    frame.trying = Some(door);
                    pending = Some(next);
                    break;
                }
                self.failed.insert(door);
            }

            if pending.is_none() {
                let cell = frame.cell;
                self.failed.insert(cell);
                self.on_path.remove(&cell);
                self.path.pop();
                frames.pop();
            }
        }
    }

    fn field(&mut self, door: Cell) -> Rc<HashMap<Cell, u32>> {
        let nav = self.nav;
        Rc::clone(
            self.fields
                .entry(door)
                .or_insert_with(|| Rc::new(nav.distance_field([door]))),
        )
    }

    /// Board-distance from `cell` to `door`.
    fn door_distance(&mut self, door: Cell, cell: Cell) -> Option<u32> {
        let field = self.field(door);
        if self.nav.is_available(cell) {
            return field.get(&cell).copied();
        }
        // The mover's own cell is occupied, so it is only ever left.
        self.nav
            .board()
            .neighbours(cell)
            .filter_map(|n| field.get(&n))
            .min()
            .map(|d| d + 1)
    }

    /// Free doors of the target reachable from `position`, nearest first.
    fn ranked_doors(&mut self, position: Cell) -> Vec<Cell> {
        let target = self.target;
        let mut doors: Vec<(u32, Cell)> = Vec::new();
        for &door in &target.doors {
            if !self.nav.is_available(door) {
                continue;
            }
            if let Some(distance) = self.door_distance(door, position) {
                doors.push((distance, door));
            }
        }
        // Stable: equal distances keep the board's door order.
        doors.sort_by_key(|(distance, _)| *distance);
        doors.into_iter().map(|(_, door)| door).collect()
    }

    /// Picks the neighbour of `position` to step onto, aiming at `door` when
    /// a straight run reaches it, or else at detours around it.
    fn next_space(&mut self, position: Cell, door: Cell) -> Option<Cell> {
        let to_door = self.field(door);
        let mut seen = HashSet::new();
        let mut targets = vec![door];
        loop {
            if !self.spend() {
                return None;
            }
            for &target in &targets {
                seen.insert(target);
                let steps = self.straight_steps(position, target, &to_door);
                if let Some(step) = steps.into_iter().find(|step| !self.failed.contains(step)) {
                    return Some(step);
                }
            }

            let mut detours: Vec<Cell> = Vec::new();
            for &target in &targets {
                for detour in self.detour_spaces(position, target, &seen) {
                    if !detours.contains(&detour) {
                        detours.push(detour);
                    }
                }
            }
            if detours.is_empty() {
                return None;
            }
            detours.sort_by_key(|detour| estimate(&to_door, *detour));
            targets = detours;
        }
    }

    /// First steps of the unbroken L-shaped runs from `start` to `target`,
    /// best first. Horizontal wins ties.
    fn straight_steps(&self, start: Cell, target: Cell, to_door: &HashMap<Cell, u32>) -> Vec<Cell> {
        if start == target {
            return Vec::new();
        }
        let step_x = Cell::new(start.x + (target.x - start.x).signum(), start.y);
        let step_y = Cell::new(start.x, start.y + (target.y - start.y).signum());
        let corner_x = Cell::new(target.x, start.y);
        let corner_y = Cell::new(start.x, target.y);

        let horizontal = start.x != target.x
            && self.run_clear(start, corner_x)
            && (corner_x == target || self.run_clear(corner_x, target));
        let vertical = start.y != target.y
            && self.run_clear(start, corner_y)
            && (corner_y == target || self.run_clear(corner_y, target));

        match (horizontal, vertical) {
            (true, true) => {
                match estimate(to_door, step_x).cmp(&estimate(to_door, step_y)) {
                    std::cmp::Ordering::Less => vec![step_x],
                    std::cmp::Ordering::Greater => vec![step_y],
                    // Either may dead-end later, so offer both.
                    std::cmp::Ordering::Equal => vec![step_x, step_y],
                }
            }
            (true, false) => vec![step_x],
            (false, true) => vec![step_y],
            (false, false) => Vec::new(),
        }
    }

    /// Whether every cell after `from` up to and including `to` is open.
    /// The two cells must share a row or a column.
    fn run_clear(&self, from: Cell, to: Cell) -> bool {
        let dx = (to.x - from.x).signum();
        let dy = (to.y - from.y).signum();
        let mut cell = from;
        while cell != to {
            cell = Cell::new(cell.x + dx, cell.y + dy);
            if !self.is_open(cell) {
                return false;
            }
        }
        true
    }

    fn is_open(&self, cell: Cell) -> bool {
        self.nav.is_available(cell) && !self.on_path.contains(&cell)
    }

    /// Open cells nearest the midpoint on either side of the bisector of
    /// `start` and `target`, closest to the midpoint first.
    fn detour_spaces(&self, start: Cell, target: Cell, seen: &HashSet<Cell>) -> Vec<Cell> {
        let mid = (
            f64::from(start.x + target.x) / 2.0,
            f64::from(start.y + target.y) / 2.0,
        );
        let bisector = if start.y == target.y {
            Bisector::Vertical
        } else {
            let slope = -f64::from(start.x - target.x) / f64::from(start.y - target.y);
            Bisector::Sloped {
                slope,
                intercept: mid.1 - slope * mid.0,
            }
        };

        let positive = self.bisector_space(mid, bisector, true);
        let negative = self
            .bisector_space(mid, bisector, false)
            .filter(|cell| Some(*cell) != positive);
        let mut detours: Vec<Cell> = positive
            .into_iter()
            .chain(negative)
            .filter(|cell| !seen.contains(cell))
            .collect();
        // Stable: the positive side wins ties.
        detours.sort_by(|a, b| off_mid(*a, mid).total_cmp(&off_mid(*b, mid)));
        detours
    }

    /// Walks along the bisector from the midpoint in tenths of a cell.
    fn bisector_space(&self, mid: (f64, f64), bisector: Bisector, positive: bool) -> Option<Cell> {
        let sign = if positive { 1.0 } else { -1.0 };
        let x = mid.0.floor();
        let mut last = None;
        for tenth in 0..=self.reach.saturating_mul(10) {
            let delta = f64::from(tenth) / 10.0 * sign;
            let (cx, cy) = match bisector {
                Bisector::Vertical => (x, (mid.1.floor() + delta).floor()),
                Bisector::Sloped { slope, intercept } => {
                    let dx = x + delta;
                    (dx.floor(), (slope * dx + intercept).floor())
                }
            };
            let cell = Cell::new(cx as i32, cy as i32);
            if last == Some(cell) {
                continue;
            }
            last = Some(cell);
            if self.is_open(cell) {
                return Some(cell);
            }
        }
        None
    }
}

fn off_mid(cell: Cell, mid: (f64, f64)) -> f64 {
    (f64::from(cell.x) - mid.0).abs() + (f64::from(cell.y) - mid.1).abs()
}
