use shared::{
    domain::{Card, Deck, DeckId, DeckSummary, DeckWithCards, OwnerId},
    error::{ApiError, ErrorCode},
    protocol::{
        deck_path, ActionResult, CreateCardInput, CreateDeckInput, DeleteCardInput,
        DeleteDeckInput, ReorderCardsInput, ServerEvent, UpdateCardInput, UpdateDeckInput,
        DASHBOARD_PATH,
    },
    validation,
};
use storage::Storage;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub events: broadcast::Sender<ServerEvent>,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        let (events, _) = broadcast::channel(256);
        Self { storage, events }
    }

    /// Tells subscribed views which paths now show stale data. Having no
    /// subscribers is not an error.
    fn invalidate(&self, owner: &OwnerId, paths: Vec<String>) {
        let _ = self.events.send(ServerEvent::ViewsInvalidated {
            owner_id: owner.clone(),
            paths,
        });
    }
}

pub async fn list_decks(
    ctx: &ApiContext,
    caller: Option<&OwnerId>,
) -> Result<Vec<DeckSummary>, ApiError> {
    let owner = authenticated(caller)?;
    ctx.storage
        .list_decks_with_card_counts(owner)
        .await
        .map_err(internal)
}

pub async fn get_deck_with_cards(
    ctx: &ApiContext,
    caller: Option<&OwnerId>,
    deck_id: DeckId,
) -> Result<DeckWithCards, ApiError> {
    let owner = authenticated(caller)?;
    ctx.storage
        .deck_with_cards(deck_id, owner)
        .await
        .map_err(internal)?
        .ok_or_else(ApiError::deck_not_found)
}

pub async fn create_deck(
    ctx: &ApiContext,
    caller: Option<&OwnerId>,
    input: &CreateDeckInput,
) -> Result<Deck, ApiError> {
    let text = validation::create_deck(input)?;
    let owner = authenticated(caller)?;

    let deck = ctx
        .storage
        .insert_deck(owner, &text)
        .await
        .map_err(internal)?;
    info!(deck_id = deck.id.0, owner = %owner, "deck created");

    ctx.invalidate(owner, vec![DASHBOARD_PATH.to_string()]);
    Ok(deck)
}

pub async fn update_deck(
    ctx: &ApiContext,
    caller: Option<&OwnerId>,
    input: &UpdateDeckInput,
) -> Result<Deck, ApiError> {
    let (deck_id, text) = validation::update_deck(input)?;
    let owner = authenticated(caller)?;

    let deck = ctx
        .storage
        .update_deck(deck_id, owner, &text)
        .await
        .map_err(internal)?
        .ok_or_else(ApiError::deck_not_found)?;

    ctx.invalidate(owner, vec![DASHBOARD_PATH.to_string(), deck_path(deck_id)]);
    Ok(deck)
}

pub async fn delete_deck(
    ctx: &ApiContext,
    caller: Option<&OwnerId>,
    input: &DeleteDeckInput,
) -> Result<(), ApiError> {
    let deck_id = validation::delete_deck(input)?;
    let owner = authenticated(caller)?;

    let deleted = ctx
        .storage
        .delete_deck(deck_id, owner)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(ApiError::deck_not_found());
    }
    info!(deck_id = deck_id.0, owner = %owner, "deck deleted");

    ctx.invalidate(owner, vec![DASHBOARD_PATH.to_string()]);
    Ok(())
}

pub async fn create_card(
    ctx: &ApiContext,
    caller: Option<&OwnerId>,
    input: &CreateCardInput,
) -> Result<Card, ApiError> {
    let (deck_id, text) = validation::create_card(input)?;
    let owner = authenticated(caller)?;
    ensure_deck_owned(ctx, deck_id, owner).await?;

    let card = ctx
        .storage
        .insert_card(deck_id, &text)
        .await
        .map_err(internal)?;

    ctx.invalidate(owner, vec![deck_path(deck_id), DASHBOARD_PATH.to_string()]);
    Ok(card)
}

pub async fn update_card(
    ctx: &ApiContext,
    caller: Option<&OwnerId>,
    input: &UpdateCardInput,
) -> Result<Card, ApiError> {
    let (card_id, deck_id, text) = validation::update_card(input)?;
    let owner = authenticated(caller)?;
    ctx.storage
        .card_owner_deck(card_id, owner)
        .await
        .map_err(internal)?
        .ok_or_else(ApiError::card_not_found)?;

    let card = ctx
        .storage
        .update_card(card_id, deck_id, &text)
        .await
        .map_err(internal)?
        .ok_or_else(ApiError::card_not_found)?;

    ctx.invalidate(owner, vec![deck_path(deck_id)]);
    Ok(card)
}

pub async fn delete_card(
    ctx: &ApiContext,
    caller: Option<&OwnerId>,
    input: &DeleteCardInput,
) -> Result<(), ApiError> {
    let (card_id, deck_id) = validation::delete_card(input)?;
    let owner = authenticated(caller)?;
    ctx.storage
        .card_owner_deck(card_id, owner)
        .await
        .map_err(internal)?
        .ok_or_else(ApiError::card_not_found)?;

    let deleted = ctx
        .storage
        .delete_card(card_id, deck_id)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(ApiError::card_not_found());
    }

    ctx.invalidate(owner, vec![deck_path(deck_id), DASHBOARD_PATH.to_string()]);
    Ok(())
}

/// Applies every pair of the batch independently. Pairs naming cards from
/// another deck are ignored and a failed write does not undo the others.
pub async fn reorder_cards(
    ctx: &ApiContext,
    caller: Option<&OwnerId>,
    input: &ReorderCardsInput,
) -> Result<(), ApiError> {
    let (deck_id, card_orders) = validation::reorder_cards(input)?;
    let owner = authenticated(caller)?;
    ensure_deck_owned(ctx, deck_id, owner).await?;

    let updated = ctx
        .storage
        .update_cards_order(deck_id, &card_orders)
        .await
        .map_err(internal)?;
    if updated.len() != card_orders.len() {
        warn!(
            deck_id = deck_id.0,
            requested = card_orders.len(),
            updated = updated.len(),
            "reorder batch named cards outside the deck"
        );
    }

    ctx.invalidate(owner, vec![deck_path(deck_id)]);
    Ok(())
}

/// Converts an action outcome into the envelope handed to the UI, logging
/// failures under the operation name.
pub fn into_action_result<T>(operation: &str, result: Result<T, ApiError>) -> ActionResult<T> {
    if let Err(err) = &result {
        match err.code {
            ErrorCode::Internal => error!(operation, error = %err.message, "action failed"),
            _ => warn!(
                operation,
                code = ?err.code,
                field = err.field.as_deref(),
                error = %err.message,
                "action rejected"
            ),
        }
    }
    result.into()
}

fn authenticated(caller: Option<&OwnerId>) -> Result<&OwnerId, ApiError> {
    caller.ok_or_else(ApiError::unauthorized)
}

async fn ensure_deck_owned(
    ctx: &ApiContext,
    deck_id: DeckId,
    owner: &OwnerId,
) -> Result<Deck, ApiError> {
    ctx.storage
        .deck_for_owner(deck_id, owner)
        .await
        .map_err(internal)?
        .ok_or_else(ApiError::deck_not_found)
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
