use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    PlayerId, Position, RoomName,
    navigation::{AvailableMoves, Navigator, RoomPaths, Route},
    notepad::{AccusationDraft, Card, Category, Deck, Mark, Notepad, NotepadError, Triple},
};

/// The part of a turn a player is asked to act in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Roll,
    /// Roll phase of a turn that began inside a room the player was
    /// summoned to; a suggestion may be made without moving.
    RollOrSuggest,
    Move,
    Suggest,
    End,
}

/// What a player wants to do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Roll,
    /// Take the secret passage to the named room instead of rolling.
    Passage(RoomName),
    Move(Position),
    Suggest(Triple),
    Accuse(Triple),
    End,
}

/// Everything a player may look at when deciding.
#[derive(Debug, Clone, Copy)]
pub struct TurnView<'a> {
    pub phase: Phase,
    pub navigator: Navigator<'a>,
    /// Destinations for this turn's roll; only present in the move phase.
    pub available_moves: Option<&'a AvailableMoves>,
}

impl<'a> TurnView<'a> {
    pub fn new(phase: Phase, navigator: Navigator<'a>) -> Self {
        TurnView {
            phase,
            navigator,
            available_moves: None,
        }
    }

    pub fn with_moves(mut self, moves: &'a AvailableMoves) -> Self {
        self.available_moves = Some(moves);
        self
    }

    /// Where `player`'s token currently is.
    pub fn location(&self, player: PlayerId) -> Option<&'a Position> {
        self.navigator.occupancy().position(player)
    }
}

/// Trait defining the behaviour of a player the turn engine drives.
///
/// Alternate policies, such as scripted ones in tests, implement this
/// trait rather than branching inside [`CpuPlayer`].
pub trait Agent {
    fn id(&self) -> PlayerId;

    /// Called once as the player's turn begins, with routes to every room.
    fn start_turn(&mut self, _room_paths: &RoomPaths, view: &TurnView) -> Action {
        self.decide(view)
    }

    /// Picks the action for `view.phase`.
    fn decide(&mut self, view: &TurnView) -> Action;
}

/// How a CPU player chooses between equally good options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TieBreak {
    /// Always take the first option in name or board order.
    #[default]
    Ordered,
    /// Choose uniformly with a generator seeded from the value.
    Seeded(u64),
}

/// The computer opponent.
///
/// Heads for the nearest room it has not ruled out, suggests there with its
/// best guesses, and accuses once its notepad names the whole solution.
#[derive(Debug)]
pub struct CpuPlayer {
    id: PlayerId,
    notepad: Notepad,
    accusation: AccusationDraft,
    suggestion: Option<Triple>,
    hand: Vec<Card>,
    target: Option<Route>,
    rng: Option<StdRng>,
}

impl CpuPlayer {
    /// Creates a player holding `hand`. Cards in hand are ruled out at once.
    pub fn new(
        id: PlayerId,
        deck: &Deck,
        hand: Vec<Card>,
        tie_break: TieBreak,
    ) -> Result<Self, NotepadError> {
        let mut notepad = Notepad::new(deck);
        for card in &hand {
            notepad.mark(card, Mark::Disproved)?;
        }
        let mut accusation = AccusationDraft::default();
        notepad.evaluate(&mut accusation);
        let rng = match tie_break {
            TieBreak::Ordered => None,
            TieBreak::Seeded(seed) => Some(StdRng::seed_from_u64(seed)),
        };
        Ok(CpuPlayer {
            id,
            notepad,
            accusation,
            suggestion: None,
            hand,
            target: None,
            rng,
        })
    }

    pub fn notepad(&self) -> &Notepad {
        &self.notepad
    }

    pub fn accusation(&self) -> &AccusationDraft {
        &self.accusation
    }

    /// The suggestion made this turn, until its result is recorded.
    pub fn suggestion(&self) -> Option<&Triple> {
        self.suggestion.as_ref()
    }

    pub fn hand(&self) -> &[Card] {
        &self.hand
    }

    /// Route to the room this player is heading for.
    pub fn target(&self) -> Option<&Route> {
        self.target.as_ref()
    }

    fn target_room(&self) -> Option<&str> {
        self.target.as_ref()?.destination()?.as_room()
    }

    fn pick<'c, T>(&mut self, choices: &'c [T]) -> Option<&'c T> {
        match &mut self.rng {
            _ if choices.is_empty() => None,
            Some(rng) => choices.get(rng.random_range(0..choices.len())),
            None => choices.first(),
        }
    }

    fn is_ruled_out(&self, room: &str) -> bool {
        self.notepad.get(&Card::room(room)) == Some(Mark::Disproved)
    }

    /// Picks the room to head for this turn from routes to every room.
    ///
    /// A lone reachable room is taken even when ruled out; otherwise the
    /// closest room still in doubt wins.
    pub fn choose_target(&mut self, room_paths: &RoomPaths) -> Option<&Route> {
        let reachable: Vec<(&RoomName, &Route)> = room_paths
            .iter()
            .filter_map(|(room, route)| route.as_ref().map(|route| (room, route)))
            .collect();

        self.target = if let [(_, route)] = reachable.as_slice() {
            Some((*route).clone())
        } else {
            let open: Vec<(&RoomName, &Route)> = reachable
                .iter()
                .filter(|(room, _)| !self.is_ruled_out(room))
                .copied()
                .collect();
            let pool = if open.is_empty() { reachable } else { open };
            let fewest = pool.iter().map(|(_, route)| route.steps()).min();
            let closest: Vec<&Route> = pool
                .into_iter()
                .filter(|(_, route)| Some(route.steps()) == fewest)
                .map(|(_, route)| route)
                .collect();
            self.pick(&closest).map(|route| (*route).clone())
        };

        match self.target_room() {
            Some(room) => log::info!("player {} heads for the {room}", self.id),
            None => log::info!("player {} has no room in reach", self.id),
        }
        self.target.as_ref()
    }

    /// Takes note of a card another player showed.
    pub fn observe_card(&mut self, card: &Card) -> Result<(), NotepadError> {
        self.notepad.mark(card, Mark::Disproved)?;
        self.notepad.evaluate(&mut self.accusation);
        Ok(())
    }

    /// Records how this turn's suggestion went: the card shown, or `None`
    /// when nobody could disprove it. Does nothing without a suggestion.
    pub fn record_suggestion_result(&mut self, shown: Option<&Card>) -> Result<(), NotepadError> {
        let suggestion = self.suggestion.take();
        if let Some(card) = shown {
            return self.observe_card(card);
        }
        let Some(suggestion) = suggestion else {
            return Ok(());
        };
        log::info!("player {}: nobody disproved {suggestion}", self.id);
        for card in suggestion.cards() {
            self.notepad.mark(&card, Mark::Proved)?;
        }
        self.notepad.evaluate(&mut self.accusation);
        Ok(())
    }

    /// Chooses a card from hand to disprove another player's suggestion.
    pub fn reveal_card(&mut self, suggestion: &Triple) -> Option<Card> {
        let matching: Vec<Card> = self
            .hand
            .iter()
            .filter(|card| suggestion.contains(card))
            .cloned()
            .collect();
        self.pick(&matching).cloned()
    }

    fn roll(&mut self, phase: Phase, location: Option<&Position>) -> Action {
        let open_room = location
            .and_then(Position::as_room)
            .filter(|room| !self.is_ruled_out(room));

        if let Some(route) = &self.target {
            if route.is_passage() {
                if let Some(room) = route.destination().and_then(Position::as_room) {
                    return Action::Passage(room.to_string());
                }
            }
        }
        match (phase, open_room) {
            (Phase::RollOrSuggest, Some(room)) => self.suggest(room),
            _ if self.target.is_none() => Action::End,
            _ => Action::Roll,
        }
    }

    fn step(&mut self, view: &TurnView, location: Option<&Position>) -> Action {
        let Some(moves) = view.available_moves else {
            return Action::End;
        };
        if let Some(next) = self.furthest_on_target(moves) {
            return Action::Move(next);
        }

        // Another token has moved onto the route since it was planned.
        if let (Some(location), Some(room)) = (location, self.target_room().map(str::to_string)) {
            self.target = match view.navigator.find_path_to_room(location, &room) {
                Ok(route) => route,
                Err(err) => {
                    log::warn!("player {} cannot re-plan to the {room}: {err}", self.id);
                    None
                }
            };
            if let Some(next) = self.furthest_on_target(moves) {
                return Action::Move(next);
            }
        }
        self.closest_move(view, moves)
    }

    /// The position furthest along the target route that this roll reaches.
    fn furthest_on_target(&self, moves: &AvailableMoves) -> Option<Position> {
        self.target
            .as_ref()?
            .positions()
            .iter()
            .skip(1)
            .filter(|position| moves.contains(position))
            .last()
            .cloned()
    }

    /// The legal destination nearest the target room's doors.
    fn closest_move(&self, view: &TurnView, moves: &AvailableMoves) -> Action {
        let target = self.target_room();
        let doors = target
            .and_then(|room| view.navigator.board().room(room))
            .map(|room| room.doors.clone())
            .unwrap_or_default();
        let to_doors = view.navigator.distance_field(doors);
        moves
            .destinations()
            .min_by_key(|position| match position {
                Position::Room(room) if Some(room.as_str()) == target => 0,
                Position::Room(_) => u32::MAX,
                Position::Cell(cell) => to_doors.get(cell).map_or(u32::MAX, |d| d + 1),
            })
            .map_or(Action::End, Action::Move)
    }

    /// The best guess for `category`: the proved value, else any candidate.
    fn guess(&mut self, category: Category) -> Option<String> {
        if let Some(value) = self.notepad.proved(category) {
            return Some(value.to_string());
        }
        let candidates: Vec<String> = self
            .notepad
            .candidates(category)
            .into_iter()
            .map(str::to_string)
            .collect();
        self.pick(&candidates).cloned()
    }

    fn suggest(&mut self, room: &str) -> Action {
        let (Some(suspect), Some(weapon)) = (self.guess(Category::Suspect), self.guess(Category::Weapon))
        else {
            return Action::End;
        };
        let suggestion = Triple::new(suspect, weapon, room);
        log::info!("player {} suggests {suggestion}", self.id);
        self.suggestion = Some(suggestion.clone());
        Action::Suggest(suggestion)
    }

    fn accusation_ready(&self) -> Option<Triple> {
        if self.notepad.is_solved() {
            self.accusation.complete()
        } else {
            None
        }
    }
}

impl Agent for CpuPlayer {
    fn id(&self) -> PlayerId {
        self.id
    }

    fn start_turn(&mut self, room_paths: &RoomPaths, view: &TurnView) -> Action {
        self.suggestion = None;
        self.choose_target(room_paths);
        self.decide(view)
    }

    fn decide(&mut self, view: &TurnView) -> Action {
        let location = view.location(self.id);
        match view.phase {
            Phase::Roll | Phase::RollOrSuggest => self.roll(view.phase, location),
            Phase::Move => self.step(view, location),
            Phase::Suggest => match location.and_then(Position::as_room) {
                Some(room) if !self.is_ruled_out(room) => self.suggest(room),
                _ => Action::End,
            },
            Phase::End => self.accusation_ready().map_or(Action::End, Action::Accuse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Cell,
        board::{Board, load_board_from_string},
        occupancy::Occupancy,
    };

    const HOUSE: &str = "
        K# K+ .. .. .. S+ S#
        .. .. .. @1 .. .. ..
        L# L+ .. .. .. .. ..
        ---
        K Kitchen
        S Study
        L Library
        passage K S
    ";

    fn house() -> (Board, Occupancy) {
        let (board, starts) = load_board_from_string(HOUSE).unwrap();
        let occupancy = Occupancy::with_starts(&board, &starts).unwrap();
        (board, occupancy)
    }

    fn cpu(board: &Board, hand: Vec<Card>) -> CpuPlayer {
        CpuPlayer::new(1, &Deck::classic(board.room_names()), hand, TieBreak::Ordered).unwrap()
    }

    fn begin(cpu: &mut CpuPlayer, nav: Navigator, phase: Phase) -> Action {
        let location = nav.occupancy().position(cpu.id()).unwrap().clone();
        let paths = nav.room_paths(&location).unwrap();
        cpu.start_turn(&paths, &TurnView::new(phase, nav))
    }

    #[test]
    fn equal_rooms_are_broken_by_name() {
        let (board, occupancy) = house();
        let nav = Navigator::new(&board, &occupancy);
        let mut cpu = cpu(&board, Vec::new());
        assert_eq!(begin(&mut cpu, nav, Phase::Roll), Action::Roll);
        assert_eq!(cpu.target().unwrap().destination(), Some(&Position::room("Kitchen")));

        cpu.observe_card(&Card::room("Kitchen")).unwrap();
        begin(&mut cpu, nav, Phase::Roll);
        assert_eq!(cpu.target().unwrap().destination(), Some(&Position::room("Library")));
    }

    #[test]
    fn heads_for_the_closest_room() {
        let (board, mut occupancy) = house();
        occupancy.place(&board, 1, Cell::new(4, 1).into()).unwrap();
        let nav = Navigator::new(&board, &occupancy);
        let mut cpu = cpu(&board, Vec::new());
        begin(&mut cpu, nav, Phase::Roll);
        let target = cpu.target().unwrap();
        assert_eq!(target.destination(), Some(&Position::room("Study")));
        assert_eq!(target.steps(), 3);
    }

    #[test]
    fn a_lone_reachable_room_is_taken_even_if_ruled_out() {
        let (board, mut occupancy) = house();
        occupancy.place(&board, 2, Cell::new(1, 0).into()).unwrap();
        occupancy.place(&board, 3, Cell::new(1, 2).into()).unwrap();
        let nav = Navigator::new(&board, &occupancy);
        let mut cpu = cpu(&board, vec![Card::room("Study")]);
        assert_eq!(begin(&mut cpu, nav, Phase::Roll), Action::Roll);
        assert_eq!(cpu.target().unwrap().destination(), Some(&Position::room("Study")));
    }

    #[test]
    fn sealed_in_means_ending_the_turn() {
        let (board, mut occupancy) = house();
        for (player, x) in [(2, 1), (3, 5)] {
            occupancy.place(&board, player, Cell::new(x, 0).into()).unwrap();
        }
        occupancy.place(&board, 4, Cell::new(1, 2).into()).unwrap();
        let nav = Navigator::new(&board, &occupancy);
        let mut cpu = cpu(&board, Vec::new());
        assert_eq!(begin(&mut cpu, nav, Phase::Roll), Action::End);
        assert!(cpu.target().is_none());
    }

    #[test]
    fn takes_the_secret_passage() {
        let (board, mut occupancy) = house();
        occupancy.place(&board, 1, Position::room("Kitchen")).unwrap();
        let nav = Navigator::new(&board, &occupancy);
        let mut cpu = cpu(&board, vec![Card::room("Kitchen")]);
        assert_eq!(
            begin(&mut cpu, nav, Phase::Roll),
            Action::Passage("Study".to_string())
        );
    }

    #[test]
    fn summoned_into_an_open_room_suggests_at_once() {
        let (board, mut occupancy) = house();
        occupancy.place(&board, 1, Position::room("Library")).unwrap();
        let nav = Navigator::new(&board, &occupancy);
        let mut cpu = cpu(&board, vec![Card::suspect("Colonel Mustard")]);
        let action = begin(&mut cpu, nav, Phase::RollOrSuggest);
        assert_eq!(
            action,
            Action::Suggest(Triple::new("Miss Scarlet", "Candlestick", "Library"))
        );
        assert_eq!(cpu.suggestion(), Some(&Triple::new("Miss Scarlet", "Candlestick", "Library")));

        // A ruled-out room is left instead.
        cpu.observe_card(&Card::room("Library")).unwrap();
        assert_eq!(begin(&mut cpu, nav, Phase::RollOrSuggest), Action::Roll);
    }

    #[test]
    fn moves_as_far_along_the_route_as_the_roll_allows() {
        let (board, occupancy) = house();
        let nav = Navigator::new(&board, &occupancy);
        let mut cpu = cpu(&board, Vec::new());
        begin(&mut cpu, nav, Phase::Roll);
        let route = cpu.target().unwrap().clone();

        let moves = nav.available_moves(&Cell::new(3, 1).into(), 2).unwrap();
        let action = cpu.decide(&TurnView::new(Phase::Move, nav).with_moves(&moves));
        let Action::Move(next) = action else {
            panic!("expected a move, got {action:?}");
        };
        assert!(route.positions().contains(&next));
        assert!(moves.contains(&next));

        let moves = nav.available_moves(&Cell::new(3, 1).into(), 4).unwrap();
        let action = cpu.decide(&TurnView::new(Phase::Move, nav).with_moves(&moves));
        assert_eq!(action, Action::Move(Position::room("Kitchen")));
    }

    #[test]
    fn re_plans_when_the_route_is_blocked() {
        let (board, mut occupancy) = house();
        let mut cpu = cpu(&board, Vec::new());
        begin(&mut cpu, Navigator::new(&board, &occupancy), Phase::Roll);
        assert!(cpu.target().unwrap().positions().contains(&Cell::new(2, 1).into()));

        occupancy.place(&board, 2, Cell::new(2, 1).into()).unwrap();
        let nav = Navigator::new(&board, &occupancy);
        let moves = nav.available_moves(&Cell::new(3, 1).into(), 2).unwrap();
        let action = cpu.decide(&TurnView::new(Phase::Move, nav).with_moves(&moves));
        assert_eq!(action, Action::Move(Cell::new(2, 0).into()));
        assert!(!cpu.target().unwrap().positions().contains(&Cell::new(2, 1).into()));
    }

    #[test]
    fn suggests_proved_values_and_accuses_when_solved() {
        let (board, mut occupancy) = house();
        occupancy.place(&board, 1, Position::room("Study")).unwrap();
        let nav = Navigator::new(&board, &occupancy);
        let deck = Deck::classic(board.room_names());
        let mut cpu = CpuPlayer::new(1, &deck, Vec::new(), TieBreak::Ordered).unwrap();
        for weapon in ["Candlestick", "Dagger", "Lead Pipe", "Revolver", "Wrench"] {
            cpu.observe_card(&Card::weapon(weapon)).unwrap();
        }
        assert_eq!(cpu.notepad().proved(Category::Weapon), Some("Rope"));

        let view = TurnView::new(Phase::Suggest, nav);
        let guess = Triple::new("Colonel Mustard", "Rope", "Study");
        assert_eq!(cpu.decide(&view), Action::Suggest(guess.clone()));
        assert_eq!(cpu.decide(&TurnView::new(Phase::End, nav)), Action::End);

        cpu.record_suggestion_result(None).unwrap();
        assert!(cpu.notepad().is_solved());
        assert_eq!(cpu.decide(&TurnView::new(Phase::End, nav)), Action::Accuse(guess));
    }

    #[test]
    fn results_only_count_for_the_current_suggestion() {
        let (board, mut occupancy) = house();
        occupancy.place(&board, 1, Position::room("Study")).unwrap();
        let nav = Navigator::new(&board, &occupancy);
        let mut cpu = cpu(&board, Vec::new());

        assert!(matches!(cpu.decide(&TurnView::new(Phase::Suggest, nav)), Action::Suggest(_)));
        let made = cpu.suggestion().cloned().unwrap();
        cpu.record_suggestion_result(Some(&Card::suspect(made.suspect.as_str()))).unwrap();
        assert_eq!(cpu.suggestion(), None);
        cpu.record_suggestion_result(None).unwrap();
        assert_eq!(cpu.notepad().get(&Card::weapon(made.weapon.as_str())), Some(Mark::Unknown));

        assert!(matches!(cpu.decide(&TurnView::new(Phase::Suggest, nav)), Action::Suggest(_)));
        let paths = nav.room_paths(&Position::room("Study")).unwrap();
        cpu.start_turn(&paths, &TurnView::new(Phase::Roll, nav));
        assert_eq!(cpu.suggestion(), None);
        cpu.record_suggestion_result(None).unwrap();
        assert_eq!(cpu.notepad().proved(Category::Weapon), None);
    }

    #[test]
    fn suggest_phase_outside_a_room_ends() {
        let (board, occupancy) = house();
        let nav = Navigator::new(&board, &occupancy);
        let mut cpu = cpu(&board, Vec::new());
        assert_eq!(cpu.decide(&TurnView::new(Phase::Suggest, nav)), Action::End);
        assert_eq!(cpu.decide(&TurnView::new(Phase::Move, nav)), Action::End);
    }

    #[test]
    fn shown_cards_rule_values_out() {
        let (board, _) = house();
        let mut cpu = cpu(&board, Vec::new());
        cpu.record_suggestion_result(Some(&Card::suspect("Mrs. White"))).unwrap();
        assert_eq!(
            cpu.notepad().get(&Card::suspect("Mrs. White")),
            Some(Mark::Disproved)
        );
        assert!(cpu.observe_card(&Card::weapon("Banana")).is_err());
    }

    #[test]
    fn reveals_only_matching_cards() {
        let (board, _) = house();
        let hand = vec![Card::weapon("Rope"), Card::room("Study"), Card::suspect("Mrs. White")];
        let mut cpu = cpu(&board, hand);
        let suggestion = Triple::new("Mrs. White", "Rope", "Kitchen");
        assert_eq!(cpu.reveal_card(&suggestion), Some(Card::weapon("Rope")));
        assert_eq!(
            cpu.reveal_card(&Triple::new("Miss Scarlet", "Dagger", "Library")),
            None
        );
    }

    #[test]
    fn seeded_players_repeat_their_choices() {
        let (board, _) = house();
        let deck = Deck::classic(board.room_names());
        let hand = vec![Card::weapon("Rope"), Card::room("Study"), Card::suspect("Mrs. White")];
        let suggestion = Triple::new("Mrs. White", "Rope", "Study");
        let picks = |seed| {
            let mut cpu = CpuPlayer::new(1, &deck, hand.clone(), TieBreak::Seeded(seed)).unwrap();
            (0..8).map(|_| cpu.reveal_card(&suggestion)).collect::<Vec<_>>()
        };
        let first = picks(7);
        assert_eq!(first, picks(7));
        assert!(first.iter().all(|card| card.as_ref().is_some_and(|c| hand.contains(c))));
    }
}
