use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::RoomName;

/// The six suspects of the classic game.
pub const CLASSIC_SUSPECTS: [&str; 6] = [
    "Colonel Mustard",
    "Miss Scarlet",
    "Mrs. Peacock",
    "Mrs. White",
    "Professor Plum",
    "Reverend Green",
];

/// The six weapons of the classic game.
pub const CLASSIC_WEAPONS: [&str; 6] = [
    "Candlestick",
    "Dagger",
    "Lead Pipe",
    "Revolver",
    "Rope",
    "Wrench",
];

/// One of the three parts of the hidden solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Suspect,
    Weapon,
    Room,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Suspect, Category::Weapon, Category::Room];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Suspect => "suspect",
            Category::Weapon => "weapon",
            Category::Room => "room",
        };
        f.write_str(name)
    }
}

/// Belief about one card being part of the solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mark {
    #[default]
    Unknown,
    /// Known to be in the solution.
    Proved,
    /// Known to be held by some player, so not in the solution.
    Disproved,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Card {
    pub category: Category,
    pub name: String,
}

impl Card {
    pub fn new(category: Category, name: impl Into<String>) -> Self {
        Card {
            category,
            name: name.into(),
        }
    }

    pub fn suspect(name: impl Into<String>) -> Self {
        Card::new(Category::Suspect, name)
    }

    pub fn weapon(name: impl Into<String>) -> Self {
        Card::new(Category::Weapon, name)
    }

    pub fn room(name: impl Into<String>) -> Self {
        Card::new(Category::Room, name)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} card '{}'", self.category, self.name)
    }
}

/// A suspect, weapon and room: the shape of suggestions and accusations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub suspect: String,
    pub weapon: String,
    pub room: RoomName,
}

impl Triple {
    pub fn new(
        suspect: impl Into<String>,
        weapon: impl Into<String>,
        room: impl Into<RoomName>,
    ) -> Self {
        Triple {
            suspect: suspect.into(),
            weapon: weapon.into(),
            room: room.into(),
        }
    }

    pub fn cards(&self) -> [Card; 3] {
        [
            Card::suspect(self.suspect.as_str()),
            Card::weapon(self.weapon.as_str()),
            Card::room(self.room.as_str()),
        ]
    }

    pub fn contains(&self, card: &Card) -> bool {
        let value = match card.category {
            Category::Suspect => &self.suspect,
            Category::Weapon => &self.weapon,
            Category::Room => &self.room,
        };
        *value == card.name
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} with the {} in the {}", self.suspect, self.weapon, self.room)
    }
}

/// Every card in play, by category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    values: BTreeMap<Category, Vec<String>>,
}

impl Deck {
    /// Builds a deck from the values of each category. Repeated values are dropped.
    pub fn new(suspects: Vec<String>, weapons: Vec<String>, rooms: Vec<RoomName>) -> Self {
        let mut values = BTreeMap::new();
        for (category, mut names) in Category::ALL.into_iter().zip([suspects, weapons, rooms]) {
            names.sort();
            names.dedup();
            values.insert(category, names);
        }
        Deck { values }
    }

    /// The classic suspects and weapons with the rooms of a board.
    pub fn classic(rooms: impl IntoIterator<Item = RoomName>) -> Self {
        Deck::new(
            CLASSIC_SUSPECTS.iter().map(|s| s.to_string()).collect(),
            CLASSIC_WEAPONS.iter().map(|s| s.to_string()).collect(),
            rooms.into_iter().collect(),
        )
    }

    /// Values of `category` in name order.
    pub fn values(&self, category: Category) -> &[String] {
        self.values
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn cards(&self) -> impl Iterator<Item = Card> + '_ {
        self.values
            .iter()
            .flat_map(|(category, names)| {
                names
                    .iter()
                    .map(move |name| Card::new(*category, name.as_str()))
            })
    }

    pub fn contains(&self, card: &Card) -> bool {
        self.values(card.category).contains(&card.name)
    }
}

/// An accusation being assembled one category at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccusationDraft {
    pub suspect: Option<String>,
    pub weapon: Option<String>,
    pub room: Option<RoomName>,
}

impl AccusationDraft {
    pub fn slot(&self, category: Category) -> Option<&str> {
        match category {
            Category::Suspect => self.suspect.as_deref(),
            Category::Weapon => self.weapon.as_deref(),
            Category::Room => self.room.as_deref(),
        }
    }

    pub fn slot_mut(&mut self, category: Category) -> &mut Option<String> {
        match category {
            Category::Suspect => &mut self.suspect,
            Category::Weapon => &mut self.weapon,
            Category::Room => &mut self.room,
        }
    }

    /// The accusation, once every category is filled.
    pub fn complete(&self) -> Option<Triple> {
        Some(Triple::new(
            self.suspect.as_deref()?,
            self.weapon.as_deref()?,
            self.room.as_deref()?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotepadError {
    #[error("{0} is not in the deck")]
    UnknownCard(Card),
}

/// A player's private belief about the hidden solution.
///
/// At most one value per category is `Proved` once [`Notepad::evaluate`]
/// has run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notepad {
    marks: BTreeMap<Category, BTreeMap<String, Mark>>,
}

impl Notepad {
    /// A notepad with every card of `deck` unknown.
    pub fn new(deck: &Deck) -> Self {
        let marks = Category::ALL
            .into_iter()
            .map(|category| {
                let values = deck
                    .values(category)
                    .iter()
                    .map(|name| (name.clone(), Mark::Unknown))
                    .collect();
                (category, values)
            })
            .collect();
        Notepad { marks }
    }

    pub fn mark(&mut self, card: &Card, mark: Mark) -> Result<(), NotepadError> {
        let slot = self
            .marks
            .get_mut(&card.category)
            .and_then(|values| values.get_mut(&card.name))
            .ok_or_else(|| NotepadError::UnknownCard(card.clone()))?;
        *slot = mark;
        Ok(())
    }

    pub fn get(&self, card: &Card) -> Option<Mark> {
        self.marks.get(&card.category)?.get(&card.name).copied()
    }

    /// Values of `category` carrying `mark`, in name order.
    pub fn values_with(&self, category: Category, mark: Mark) -> impl Iterator<Item = &str> {
        self.marks
            .get(&category)
            .into_iter()
            .flatten()
            .filter(move |(_, m)| **m == mark)
            .map(|(name, _)| name.as_str())
    }

    /// Values of `category` that could still be in the solution.
    pub fn candidates(&self, category: Category) -> Vec<&str> {
        self.marks
            .get(&category)
            .into_iter()
            .flatten()
            .filter(|(_, mark)| **mark != Mark::Disproved)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// The single proved value of `category`, if there is exactly one.
    pub fn proved(&self, category: Category) -> Option<&str> {
        let mut proved = self.values_with(category, Mark::Proved);
        match (proved.next(), proved.next()) {
            (Some(value), None) => Some(value),
            _ => None,
        }
    }

    pub fn is_solved(&self) -> bool {
        Category::ALL.into_iter().all(|category| self.proved(category).is_some())
    }

    /// Draws conclusions from the current marks and copies them into `draft`.
    ///
    /// Per category: several proved values contradict each other and are
    /// reset to unknown, and a lone remaining candidate is proved.
    pub fn evaluate(&mut self, draft: &mut AccusationDraft) {
        for category in Category::ALL {
            let Some(values) = self.marks.get_mut(&category) else {
                continue;
            };

            let proved: Vec<String> = values
                .iter()
                .filter(|(_, mark)| **mark == Mark::Proved)
                .map(|(name, _)| name.clone())
                .collect();
            match proved.as_slice() {
                [value] => {
                    *draft.slot_mut(category) = Some(value.clone());
                    continue;
                }
                [] => {}
                _ => {
                    log::debug!("conflicting proved {category} values {proved:?}, resetting");
                    for name in &proved {
                        values.insert(name.clone(), Mark::Unknown);
                    }
                    *draft.slot_mut(category) = None;
                }
            }

            let mut candidates = values.iter_mut().filter(|(_, mark)| **mark != Mark::Disproved);
            if let (Some((name, mark)), None) = (candidates.next(), candidates.next()) {
                log::debug!("{category} '{name}' proved by elimination");
                *mark = Mark::Proved;
                *draft.slot_mut(category) = Some(name.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deck() -> Deck {
        Deck::classic(["Hall", "Kitchen", "Study"].map(String::from))
    }

    #[test]
    fn classic_deck_lists_every_card() {
        let deck = deck();
        assert_eq!(deck.values(Category::Suspect).len(), 6);
        assert_eq!(deck.values(Category::Weapon).len(), 6);
        assert_eq!(deck.values(Category::Room), ["Hall", "Kitchen", "Study"]);
        assert_eq!(deck.cards().count(), 15);
        assert!(deck.contains(&Card::weapon("Rope")));
        assert!(!deck.contains(&Card::room("Rope")));
    }

    #[test]
    fn last_candidate_is_proved_by_elimination() {
        let deck = deck();
        let mut notepad = Notepad::new(&deck);
        let mut draft = AccusationDraft::default();
        notepad.mark(&Card::room("Hall"), Mark::Disproved).unwrap();
        notepad.evaluate(&mut draft);
        assert_eq!(notepad.proved(Category::Room), None);

        notepad.mark(&Card::room("Study"), Mark::Disproved).unwrap();
        notepad.evaluate(&mut draft);
        assert_eq!(notepad.get(&Card::room("Kitchen")), Some(Mark::Proved));
        assert_eq!(draft.slot(Category::Room), Some("Kitchen"));
        assert_eq!(notepad.candidates(Category::Room), vec!["Kitchen"]);
    }

    #[test]
    fn second_proved_value_resets_both() {
        let deck = deck();
        let mut notepad = Notepad::new(&deck);
        let mut draft = AccusationDraft::default();
        for room in ["Hall", "Study"] {
            notepad.mark(&Card::room(room), Mark::Disproved).unwrap();
        }
        notepad.evaluate(&mut draft);
        assert_eq!(notepad.proved(Category::Room), Some("Kitchen"));

        notepad.mark(&Card::room("Hall"), Mark::Proved).unwrap();
        notepad.evaluate(&mut draft);
        assert_eq!(notepad.get(&Card::room("Hall")), Some(Mark::Unknown));
        assert_eq!(notepad.get(&Card::room("Kitchen")), Some(Mark::Unknown));
        assert_eq!(notepad.values_with(Category::Room, Mark::Proved).count(), 0);
        assert_eq!(draft.room, None);
    }

    #[test]
    fn solved_once_every_category_is_proved() {
        let deck = deck();
        let mut notepad = Notepad::new(&deck);
        let mut draft = AccusationDraft::default();
        let answer = Triple::new("Mrs. White", "Rope", "Study");
        for card in answer.cards() {
            notepad.mark(&card, Mark::Proved).unwrap();
        }
        assert!(draft.complete().is_none());
        notepad.evaluate(&mut draft);
        assert!(notepad.is_solved());
        assert_eq!(draft.complete(), Some(answer));
    }

    #[test]
    fn rejects_cards_outside_the_deck() {
        let mut notepad = Notepad::new(&deck());
        let card = Card::weapon("Banana");
        assert_eq!(
            notepad.mark(&card, Mark::Disproved),
            Err(NotepadError::UnknownCard(card.clone()))
        );
        assert_eq!(notepad.get(&card), None);
    }

    #[test]
    fn triples_match_their_cards() {
        let triple = Triple::new("Miss Scarlet", "Dagger", "Hall");
        assert!(triple.contains(&Card::suspect("Miss Scarlet")));
        assert!(!triple.contains(&Card::room("Dagger")));
        assert_eq!(triple.to_string(), "Miss Scarlet with the Dagger in the Hall");
    }
}
