//! Locally held card order for the deck editor.
//!
//! A drag ends with a `(source, target)` index pair. The board applies the
//! move to its visible sequence at once, hands back a [`ReorderTicket`]
//! carrying the batch to persist, and reconciles when the persistence
//! outcome arrives: success commits the sequence, any failure restores the
//! sequence that was visible before the move.

use shared::{
    domain::{Card, CardOrder, DeckId},
    error::ApiError,
    protocol::{ActionResult, ReorderCardsInput},
};
use tracing::{debug, warn};

use crate::actions::DeckActions;

/// Removes the element at `source` and reinserts it at `target`, shifting
/// the elements in between. Returns `false` without touching `items` when
/// the indices are equal or either one is out of bounds.
pub fn move_card<T>(items: &mut Vec<T>, source: usize, target: usize) -> bool {
    let len = items.len();
    if source == target || source >= len || target >= len {
        return false;
    }
    let moved = items.remove(source);
    items.insert(target, moved);
    true
}

/// Positions for a sequence: each card's order is its zero-based index.
pub fn derive_orders(cards: &[Card]) -> Vec<CardOrder> {
    cards
        .iter()
        .enumerate()
        .map(|(idx, card)| CardOrder {
            id: card.id,
            order: idx as i64,
        })
        .collect()
}

/// Submits `sequence` as one reorder batch for `deck_id`.
pub async fn persist_order<A>(actions: &A, deck_id: DeckId, sequence: &[Card]) -> ActionResult<()>
where
    A: DeckActions + ?Sized,
{
    let input = ReorderCardsInput {
        deck_id,
        card_orders: derive_orders(sequence),
    };
    actions.reorder_cards(&input).await
}

/// Lifecycle of one optimistic mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<T> {
    Pending { optimistic: T, previous: T },
    Committed,
    RolledBack,
}

/// An optimistic move waiting for its persistence outcome.
#[derive(Debug, Clone)]
pub struct ReorderTicket {
    request: ReorderCardsInput,
    state: Mutation<Vec<Card>>,
}

impl ReorderTicket {
    pub fn request(&self) -> &ReorderCardsInput {
        &self.request
    }

    pub fn state(&self) -> &Mutation<Vec<Card>> {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, Mutation::Pending { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ReorderBoard {
    deck_id: DeckId,
    visible: Vec<Card>,
    confirmed: Vec<Card>,
    in_flight: usize,
}

impl ReorderBoard {
    pub fn new(deck_id: DeckId, cards: Vec<Card>) -> Self {
        Self {
            deck_id,
            confirmed: cards.clone(),
            visible: cards,
            in_flight: 0,
        }
    }

    pub fn deck_id(&self) -> DeckId {
        self.deck_id
    }

    /// The sequence currently shown, optimistic moves included.
    pub fn cards(&self) -> &[Card] {
        &self.visible
    }

    /// The last sequence the store acknowledged.
    pub fn confirmed(&self) -> &[Card] {
        &self.confirmed
    }

    /// True while at least one persistence request is outstanding.
    pub fn is_reordering(&self) -> bool {
        self.in_flight > 0
    }

    /// Replaces both sequences with freshly loaded cards, e.g. after the
    /// deck view was invalidated and reloaded.
    pub fn sync_from_server(&mut self, cards: Vec<Card>) {
        self.confirmed = cards.clone();
        self.visible = cards;
    }

    /// Applies a drag result optimistically. Returns `None` for moves that
    /// change nothing.
    pub fn begin_move(&mut self, source: usize, target: usize) -> Option<ReorderTicket> {
        let previous = self.visible.clone();
        let mut next = previous.clone();
        if !move_card(&mut next, source, target) {
            return None;
        }

        debug!(deck_id = self.deck_id.0, source, target, "optimistic card move");
        self.visible = next.clone();
        self.in_flight += 1;
        Some(ReorderTicket {
            request: ReorderCardsInput {
                deck_id: self.deck_id,
                card_orders: derive_orders(&next),
            },
            state: Mutation::Pending {
                optimistic: next,
                previous,
            },
        })
    }

    /// Reconciles a ticket with the persistence outcome. On failure the
    /// visible sequence goes back to what it was before the move and the
    /// error is returned. Settling a ticket twice has no effect.
    pub fn settle(
        &mut self,
        ticket: &mut ReorderTicket,
        outcome: ActionResult<()>,
    ) -> Result<(), ApiError> {
        let state = std::mem::replace(&mut ticket.state, Mutation::Committed);
        let Mutation::Pending {
            optimistic,
            previous,
        } = state
        else {
            ticket.state = state;
            return Ok(());
        };
        self.in_flight = self.in_flight.saturating_sub(1);

        match outcome.into_result() {
            Ok(_) => {
                self.confirmed = optimistic;
                ticket.state = Mutation::Committed;
                Ok(())
            }
            Err(err) => {
                warn!(
                    deck_id = self.deck_id.0,
                    error = %err.message,
                    "reorder failed; restoring previous order"
                );
                self.visible = previous;
                ticket.state = Mutation::RolledBack;
                Err(err)
            }
        }
    }

    /// Moves, persists and reconciles in one call.
    pub async fn move_and_persist<A>(
        &mut self,
        actions: &A,
        source: usize,
        target: usize,
    ) -> Result<bool, ApiError>
    where
        A: DeckActions + ?Sized,
    {
        let Some(mut ticket) = self.begin_move(source, target) else {
            return Ok(false);
        };
        let outcome = actions.reorder_cards(ticket.request()).await;
        self.settle(&mut ticket, outcome)?;
        Ok(true)
    }
}

#[cfg(test)]
#[path = "tests/reorder_tests.rs"]
mod tests;
