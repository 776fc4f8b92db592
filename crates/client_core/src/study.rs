//! Study session over an in-memory snapshot of a deck's cards.
//!
//! The session never talks to the store. It walks the cards one at a time,
//! tracks whether the current card shows its back, and in graded mode keeps
//! one verdict per card. Advancing past the last card completes the session
//! and freezes its statistics until it is restarted or shuffled.

use std::{collections::HashMap, time::Duration};

use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::domain::{Card, CardId, Verdict};

/// How long a card takes to turn back over before the next one is shown.
pub const FLIP_TRANSITION: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyMode {
    /// Flip freely; "next" is always enabled.
    Ungraded,
    /// Flip, then record a verdict, then advance.
    Graded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
    pub incorrect: usize,
    /// Percentage of answered cards judged correct, rounded; 0 when nothing
    /// was answered.
    pub accuracy: u32,
}

impl SessionStats {
    fn from_results(total: usize, results: &HashMap<CardId, Verdict>) -> Self {
        let correct = results
            .values()
            .filter(|verdict| **verdict == Verdict::Correct)
            .count();
        let answered = results.len();
        let accuracy = if answered > 0 {
            (correct as f64 / answered as f64 * 100.0).round() as u32
        } else {
            0
        };
        Self {
            total,
            answered,
            correct,
            incorrect: answered - correct,
            accuracy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved { index: usize },
    Completed(SessionStats),
    /// Graded mode only: the current card has no verdict yet.
    Blocked,
}

/// Input events the study view forwards, named after what they do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyCommand {
    Flip,
    Previous,
    Next,
}

impl StudyCommand {
    /// Keyboard bindings of the study view.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            " " | "Enter" => Some(Self::Flip),
            "ArrowLeft" => Some(Self::Previous),
            "ArrowRight" => Some(Self::Next),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StudySession {
    mode: StudyMode,
    cards: Vec<Card>,
    index: usize,
    flipped: bool,
    answered: bool,
    results: HashMap<CardId, Verdict>,
    completed: Option<SessionStats>,
}

impl StudySession {
    /// Starts at the first card. A deck without cards cannot be studied.
    pub fn new(cards: Vec<Card>, mode: StudyMode) -> Option<Self> {
        if cards.is_empty() {
            return None;
        }
        Some(Self {
            mode,
            cards,
            index: 0,
            flipped: false,
            answered: false,
            results: HashMap::new(),
            completed: None,
        })
    }

    pub fn mode(&self) -> StudyMode {
        self.mode
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_card(&self) -> &Card {
        &self.cards[self.index]
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn is_answered(&self) -> bool {
        self.answered
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.cards.len()
    }

    pub fn is_completed(&self) -> bool {
        self.completed.is_some()
    }

    pub fn completion(&self) -> Option<SessionStats> {
        self.completed
    }

    pub fn verdict(&self, card_id: CardId) -> Option<Verdict> {
        self.results.get(&card_id).copied()
    }

    /// 1-based position of the current card.
    pub fn position(&self) -> usize {
        self.index + 1
    }

    pub fn total(&self) -> usize {
        self.cards.len()
    }

    pub fn progress_percent(&self) -> u32 {
        (self.position() as f64 / self.total() as f64 * 100.0).round() as u32
    }

    /// Statistics over the verdicts recorded so far.
    pub fn stats(&self) -> SessionStats {
        SessionStats::from_results(self.cards.len(), &self.results)
    }

    /// In graded mode a flipped card stays flipped until it has a verdict.
    pub fn can_flip(&self) -> bool {
        if self.is_completed() {
            return false;
        }
        match self.mode {
            StudyMode::Ungraded => true,
            StudyMode::Graded => !(self.flipped && !self.answered),
        }
    }

    pub fn can_answer(&self) -> bool {
        self.mode == StudyMode::Graded && !self.is_completed() && self.flipped && !self.answered
    }

    pub fn can_advance(&self) -> bool {
        if self.is_completed() {
            return false;
        }
        match self.mode {
            StudyMode::Ungraded => true,
            StudyMode::Graded => self.answered,
        }
    }

    pub fn flip(&mut self) -> bool {
        if !self.can_flip() {
            return false;
        }
        self.flipped = !self.flipped;
        true
    }

    /// Records a verdict for the current card. Ignored unless the answer
    /// buttons are enabled and `card_id` is the card being shown; a card
    /// that already has a verdict comes back answered, so the first verdict
    /// stands until the session is restarted or shuffled.
    pub fn mark_answer(&mut self, card_id: CardId, verdict: Verdict) -> bool {
        if !self.can_answer() || self.current_card().id != card_id {
            return false;
        }
        self.results.insert(card_id, verdict);
        self.answered = true;
        true
    }

    /// Moves to the next card, or completes the session from the last one.
    pub fn advance(&mut self) -> Advance {
        if !self.can_advance() {
            return Advance::Blocked;
        }
        if self.is_last() {
            let stats = self.stats();
            self.flipped = false;
            self.completed = Some(stats);
            return Advance::Completed(stats);
        }
        self.show(self.index + 1);
        Advance::Moved { index: self.index }
    }

    /// Like [`advance`](Self::advance), but a flipped card is turned back
    /// over and given [`FLIP_TRANSITION`] before the next card appears.
    pub async fn advance_animated(&mut self) -> Advance {
        if !self.can_advance() {
            return Advance::Blocked;
        }
        if self.flipped && !self.is_last() {
            self.flipped = false;
            tokio::time::sleep(FLIP_TRANSITION).await;
        }
        self.advance()
    }

    /// Steps back one card. No-op on the first card or after completion.
    pub fn retreat(&mut self) -> bool {
        if self.is_completed() || self.is_first() {
            return false;
        }
        self.show(self.index - 1);
        true
    }

    /// Fisher-Yates over the whole deck, then back to the first card. In
    /// graded mode the score starts over.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for i in (1..self.cards.len()).rev() {
            let j = rng.gen_range(0..=i);
            self.cards.swap(i, j);
        }
        self.reset();
    }

    pub fn restart(&mut self) {
        self.reset();
    }

    pub fn apply(&mut self, command: StudyCommand) -> bool {
        match command {
            StudyCommand::Flip => self.flip(),
            StudyCommand::Previous => self.retreat(),
            StudyCommand::Next => !matches!(self.advance(), Advance::Blocked),
        }
    }

    fn show(&mut self, index: usize) {
        self.flipped = false;
        self.index = index;
        self.answered = match self.mode {
            StudyMode::Graded => self.results.contains_key(&self.cards[index].id),
            StudyMode::Ungraded => false,
        };
    }

    fn reset(&mut self) {
        if self.mode == StudyMode::Graded {
            self.results.clear();
        }
        self.completed = None;
        self.index = 0;
        self.flipped = false;
        self.answered = false;
    }
}

#[cfg(test)]
#[path = "tests/study_tests.rs"]
mod tests;
