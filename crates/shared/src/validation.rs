//! Input checks for every action. Each check either yields the constrained
//! value the store accepts or a [`FieldError`] naming the offending field.

use crate::{
    domain::{CardId, CardOrder, DeckId},
    error::FieldError,
    protocol::{
        CreateCardInput, CreateDeckInput, DeleteCardInput, DeleteDeckInput, ReorderCardsInput,
        UpdateCardInput, UpdateDeckInput,
    },
};

// Limits are in UTF-16 code units, the unit browser clients measure in.
pub const MAX_DECK_NAME_UNITS: usize = 255;
pub const MAX_DECK_DESCRIPTION_UNITS: usize = 1000;
pub const MAX_CARD_SIDE_UNITS: usize = 5000;

/// Deck text that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckText {
    pub name: String,
    pub description: Option<String>,
}

/// Card faces that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardText {
    pub front: String,
    pub back: String,
}

pub fn create_deck(input: &CreateDeckInput) -> Result<DeckText, FieldError> {
    deck_text(&input.name, input.description.as_deref())
}

pub fn update_deck(input: &UpdateDeckInput) -> Result<(DeckId, DeckText), FieldError> {
    let id = deck_id("id", input.id)?;
    Ok((id, deck_text(&input.name, input.description.as_deref())?))
}

pub fn delete_deck(input: &DeleteDeckInput) -> Result<DeckId, FieldError> {
    deck_id("id", input.id)
}

pub fn create_card(input: &CreateCardInput) -> Result<(DeckId, CardText), FieldError> {
    let deck = deck_id("deckId", input.deck_id)?;
    Ok((deck, card_text(&input.front, &input.back)?))
}

pub fn update_card(input: &UpdateCardInput) -> Result<(CardId, DeckId, CardText), FieldError> {
    let id = card_id("id", input.id)?;
    let deck = deck_id("deckId", input.deck_id)?;
    Ok((id, deck, card_text(&input.front, &input.back)?))
}

pub fn delete_card(input: &DeleteCardInput) -> Result<(CardId, DeckId), FieldError> {
    Ok((card_id("id", input.id)?, deck_id("deckId", input.deck_id)?))
}

pub fn reorder_cards(input: &ReorderCardsInput) -> Result<(DeckId, Vec<CardOrder>), FieldError> {
    let deck = deck_id("deckId", input.deck_id)?;
    if input.card_orders.is_empty() {
        return Err(FieldError::new(
            "cardOrders",
            "At least one card order is required",
        ));
    }
    for (idx, entry) in input.card_orders.iter().enumerate() {
        card_id(&format!("cardOrders.{idx}.id"), entry.id)?;
        if entry.order < 0 {
            return Err(FieldError::new(
                format!("cardOrders.{idx}.order"),
                "Order must be zero or greater",
            ));
        }
    }
    Ok((deck, input.card_orders.clone()))
}

fn deck_text(name: &str, description: Option<&str>) -> Result<DeckText, FieldError> {
    bounded("name", name, MAX_DECK_NAME_UNITS, "Name is required", "Name too long")?;
    if let Some(description) = description {
        if utf16_len(description) > MAX_DECK_DESCRIPTION_UNITS {
            return Err(FieldError::new("description", "Description too long"));
        }
    }
    Ok(DeckText {
        name: name.to_string(),
        description: description
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string),
    })
}

fn card_text(front: &str, back: &str) -> Result<CardText, FieldError> {
    bounded(
        "front",
        front,
        MAX_CARD_SIDE_UNITS,
        "Front text is required",
        "Front text too long",
    )?;
    bounded(
        "back",
        back,
        MAX_CARD_SIDE_UNITS,
        "Back text is required",
        "Back text too long",
    )?;
    if front.trim() == back.trim() {
        return Err(FieldError::new("back", "Front and back cannot be identical"));
    }
    Ok(CardText {
        front: front.to_string(),
        back: back.to_string(),
    })
}

fn bounded(
    field: &str,
    value: &str,
    max_units: usize,
    empty_message: &str,
    long_message: &str,
) -> Result<(), FieldError> {
    if value.is_empty() {
        return Err(FieldError::new(field, empty_message));
    }
    if utf16_len(value) > max_units {
        return Err(FieldError::new(field, long_message));
    }
    Ok(())
}

fn utf16_len(value: &str) -> usize {
    value.encode_utf16().count()
}

fn deck_id(field: &str, id: DeckId) -> Result<DeckId, FieldError> {
    if id.0 <= 0 {
        return Err(FieldError::new(field, "Id must be a positive integer"));
    }
    Ok(id)
}

fn card_id(field: &str, id: CardId) -> Result<CardId, FieldError> {
    if id.0 <= 0 {
        return Err(FieldError::new(field, "Id must be a positive integer"));
    }
    Ok(id)
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
