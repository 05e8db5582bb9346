use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AnswerId, CardId, DeckId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeckError {
    #[error("deck title cannot be empty")]
    EmptyTitle,

    #[error("deck must contain at least one card")]
    NoCards,

    #[error("card title cannot be empty")]
    EmptyCardTitle,

    #[error("card {0} has no possible answers")]
    NoAnswers(CardId),

    #[error("card {0} has no correct answer")]
    NoCorrectAnswer(CardId),

    #[error("duplicate card id {0}")]
    DuplicateCard(CardId),
}

//
// ─── CARD KIND ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    #[default]
    SingleChoice,
    FillInTheBlanks,
}

//
// ─── ANSWER / CARD ─────────────────────────────────────────────────────────────
//

/// One selectable answer of a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub text: String,
    pub is_correct: bool,
}

/// A question inside a deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub title: String,
    pub explanation: String,
    pub kind: CardKind,
    pub possible_answers: Vec<Answer>,
}

impl Card {
    /// True when `answer_id` names one of this card's correct answers.
    ///
    /// Unknown answer ids are simply incorrect.
    #[must_use]
    pub fn is_correct(&self, answer_id: AnswerId) -> bool {
        self.possible_answers
            .iter()
            .any(|a| a.id == answer_id && a.is_correct)
    }

    fn validate(&self) -> Result<(), DeckError> {
        if self.title.trim().is_empty() {
            return Err(DeckError::EmptyCardTitle);
        }
        if self.possible_answers.is_empty() {
            return Err(DeckError::NoAnswers(self.id));
        }
        if !self.possible_answers.iter().any(|a| a.is_correct) {
            return Err(DeckError::NoCorrectAnswer(self.id));
        }
        Ok(())
    }
}

//
// ─── DECK ──────────────────────────────────────────────────────────────────────
//

/// A deck of cards lessons can embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    id: DeckId,
    title: String,
    description: String,
    cards: Vec<Card>,
}

impl Deck {
    /// Creates a validated deck.
    ///
    /// # Errors
    ///
    /// Returns `DeckError` if the title is blank, the deck has no cards, card
    /// ids repeat, or any card lacks a correct answer.
    pub fn new(
        id: DeckId,
        title: impl Into<String>,
        description: impl Into<String>,
        cards: Vec<Card>,
    ) -> Result<Self, DeckError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(DeckError::EmptyTitle);
        }
        if cards.is_empty() {
            return Err(DeckError::NoCards);
        }
        for (i, card) in cards.iter().enumerate() {
            card.validate()?;
            if cards[..i].iter().any(|c| c.id == card.id) {
                return Err(DeckError::DuplicateCard(card.id));
            }
        }

        Ok(Self {
            id,
            title,
            description: description.into(),
            cards,
        })
    }

    #[must_use]
    pub fn id(&self) -> DeckId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    #[must_use]
    pub fn card(&self, card_id: CardId) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == card_id)
    }

    pub fn card_ids(&self) -> impl Iterator<Item = CardId> + '_ {
        self.cards.iter().map(|c| c.id)
    }
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// Answer as submitted by an author, before ids are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDraft {
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDraft {
    pub title: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub kind: CardKind,
    pub possible_answers: Vec<AnswerDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub cards: Vec<CardDraft>,
}

impl DeckDraft {
    /// Assigns fresh ids to the deck, its cards and answers, then validates.
    ///
    /// # Errors
    ///
    /// Returns `DeckError` under the same rules as [`Deck::new`].
    pub fn into_deck(self) -> Result<Deck, DeckError> {
        let cards = self
            .cards
            .into_iter()
            .map(|card| Card {
                id: CardId::generate(),
                title: card.title.trim().to_owned(),
                explanation: card.explanation,
                kind: card.kind,
                possible_answers: card
                    .possible_answers
                    .into_iter()
                    .map(|a| Answer {
                        id: AnswerId::generate(),
                        text: a.text,
                        is_correct: a.is_correct,
                    })
                    .collect(),
            })
            .collect();
        Deck::new(DeckId::generate(), self.title, self.description, cards)
    }
}
