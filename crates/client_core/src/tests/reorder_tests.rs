use super::*;
use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{CardId, Deck, DeckSummary, DeckWithCards},
    error::ErrorCode,
    protocol::{
        CreateCardInput, CreateDeckInput, DeleteCardInput, DeleteDeckInput, UpdateCardInput,
        UpdateDeckInput,
    },
};
use std::sync::Mutex;

fn card(id: i64, front: &str) -> Card {
    let now = Utc::now();
    Card {
        id: CardId(id),
        deck_id: DeckId(1),
        front: front.to_string(),
        back: front.to_lowercase(),
        order: id - 1,
        created_at: now,
        updated_at: now,
    }
}

fn fronts(cards: &[Card]) -> Vec<&str> {
    cards.iter().map(|card| card.front.as_str()).collect()
}

fn abc() -> Vec<Card> {
    vec![card(1, "A"), card(2, "B"), card(3, "C")]
}

/// Records reorder batches and answers with a fixed outcome.
struct FakeActions {
    failure: Option<ApiError>,
    batches: Mutex<Vec<ReorderCardsInput>>,
}

impl FakeActions {
    fn ok() -> Self {
        Self {
            failure: None,
            batches: Mutex::new(Vec::new()),
        }
    }

    fn failing(error: ApiError) -> Self {
        Self {
            failure: Some(error),
            batches: Mutex::new(Vec::new()),
        }
    }

    fn unused<T>() -> ActionResult<T> {
        ActionResult::failed(ApiError::new(ErrorCode::Internal, "not used in this test"))
    }
}

#[async_trait]
impl DeckActions for FakeActions {
    async fn list_decks(&self) -> ActionResult<Vec<DeckSummary>> {
        Self::unused()
    }
    async fn get_deck(&self, _deck_id: DeckId) -> ActionResult<DeckWithCards> {
        Self::unused()
    }
    async fn create_deck(&self, _input: &CreateDeckInput) -> ActionResult<Deck> {
        Self::unused()
    }
    async fn update_deck(&self, _input: &UpdateDeckInput) -> ActionResult<Deck> {
        Self::unused()
    }
    async fn delete_deck(&self, _input: &DeleteDeckInput) -> ActionResult<()> {
        Self::unused()
    }
    async fn create_card(&self, _input: &CreateCardInput) -> ActionResult<Card> {
        Self::unused()
    }
    async fn update_card(&self, _input: &UpdateCardInput) -> ActionResult<Card> {
        Self::unused()
    }
    async fn delete_card(&self, _input: &DeleteCardInput) -> ActionResult<()> {
        Self::unused()
    }
    async fn reorder_cards(&self, input: &ReorderCardsInput) -> ActionResult<()> {
        self.batches.lock().expect("lock").push(input.clone());
        match &self.failure {
            Some(error) => ActionResult::failed(error.clone()),
            None => ActionResult::done(),
        }
    }
}

#[test]
fn move_to_end_shifts_intermediate_cards() {
    let mut cards = abc();
    assert!(move_card(&mut cards, 0, 2));
    assert_eq!(fronts(&cards), vec!["B", "C", "A"]);
}

#[test]
fn move_towards_front_shifts_the_other_way() {
    let mut cards = abc();
    assert!(move_card(&mut cards, 2, 0));
    assert_eq!(fronts(&cards), vec!["C", "A", "B"]);
}

#[test]
fn move_to_same_index_is_identity() {
    let mut cards = abc();
    assert!(!move_card(&mut cards, 1, 1));
    assert_eq!(fronts(&cards), vec!["A", "B", "C"]);
}

#[test]
fn out_of_bounds_move_is_ignored() {
    let mut cards = abc();
    assert!(!move_card(&mut cards, 3, 0));
    assert!(!move_card(&mut cards, 0, 3));
    assert_eq!(fronts(&cards), vec!["A", "B", "C"]);

    let mut empty: Vec<Card> = Vec::new();
    assert!(!move_card(&mut empty, 0, 0));
    let mut single = vec![card(1, "A")];
    assert!(!move_card(&mut single, 0, 1));
}

#[test]
fn every_move_is_a_permutation_with_the_card_at_target() {
    let len = 5;
    for source in 0..len {
        for target in 0..len {
            let mut ids: Vec<i64> = (0..len as i64).collect();
            let moved = ids[source];
            move_card(&mut ids, source, target);
            assert_eq!(ids[target], moved);
            let mut sorted = ids.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..len as i64).collect::<Vec<_>>());
        }
    }
}

#[test]
fn derived_orders_follow_positions() {
    let mut cards = abc();
    move_card(&mut cards, 0, 2);
    let orders = derive_orders(&cards);
    assert_eq!(
        orders,
        vec![
            CardOrder { id: CardId(2), order: 0 },
            CardOrder { id: CardId(3), order: 1 },
            CardOrder { id: CardId(1), order: 2 },
        ]
    );
}

#[tokio::test]
async fn persist_order_submits_one_batch() {
    let actions = FakeActions::ok();
    let cards = abc();
    let result = persist_order(&actions, DeckId(1), &cards).await;
    assert!(result.success);

    let batches = actions.batches.lock().expect("lock");
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].deck_id, DeckId(1));
    assert_eq!(batches[0].card_orders.len(), 3);
}

#[test]
fn begin_move_applies_optimistically() {
    let mut board = ReorderBoard::new(DeckId(1), abc());
    let ticket = board.begin_move(0, 2).expect("ticket");

    assert_eq!(fronts(board.cards()), vec!["B", "C", "A"]);
    assert_eq!(fronts(board.confirmed()), vec!["A", "B", "C"]);
    assert!(board.is_reordering());
    assert!(ticket.is_pending());
    assert_eq!(ticket.request().card_orders[0].id, CardId(2));
}

#[test]
fn noop_moves_produce_no_ticket() {
    let mut board = ReorderBoard::new(DeckId(1), abc());
    assert!(board.begin_move(1, 1).is_none());
    assert!(board.begin_move(0, 9).is_none());
    assert!(!board.is_reordering());

    let mut single = ReorderBoard::new(DeckId(1), vec![card(1, "A")]);
    assert!(single.begin_move(0, 0).is_none());
}

#[test]
fn successful_settle_commits() {
    let mut board = ReorderBoard::new(DeckId(1), abc());
    let mut ticket = board.begin_move(0, 2).expect("ticket");
    board
        .settle(&mut ticket, ActionResult::done())
        .expect("commit");

    assert_eq!(ticket.state(), &Mutation::Committed);
    assert_eq!(fronts(board.confirmed()), vec!["B", "C", "A"]);
    assert!(!board.is_reordering());
}

#[test]
fn failed_settle_restores_pre_move_sequence() {
    let mut board = ReorderBoard::new(DeckId(1), abc());
    let mut ticket = board.begin_move(0, 2).expect("ticket");
    let err = board
        .settle(
            &mut ticket,
            ActionResult::failed(ApiError::deck_not_found()),
        )
        .expect_err("should fail");

    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(ticket.state(), &Mutation::RolledBack);
    assert_eq!(fronts(board.cards()), vec!["A", "B", "C"]);
}

#[test]
fn settling_twice_is_ignored() {
    let mut board = ReorderBoard::new(DeckId(1), abc());
    let mut ticket = board.begin_move(0, 2).expect("ticket");
    board
        .settle(&mut ticket, ActionResult::done())
        .expect("commit");
    board
        .settle(
            &mut ticket,
            ActionResult::failed(ApiError::deck_not_found()),
        )
        .expect("ignored");
    assert_eq!(fronts(board.cards()), vec!["B", "C", "A"]);
    assert_eq!(ticket.state(), &Mutation::Committed);
}

#[test]
fn overlapping_moves_settle_independently() {
    let mut board = ReorderBoard::new(DeckId(1), abc());
    let mut first = board.begin_move(0, 2).expect("first");
    let mut second = board.begin_move(0, 1).expect("second");
    assert_eq!(fronts(board.cards()), vec!["C", "B", "A"]);

    board
        .settle(&mut second, ActionResult::done())
        .expect("second commits");
    board
        .settle(&mut first, ActionResult::failed(ApiError::deck_not_found()))
        .expect_err("first fails");

    // The failed move restores what was visible before it was made.
    assert_eq!(fronts(board.cards()), vec!["A", "B", "C"]);
    assert!(!board.is_reordering());
}

#[tokio::test]
async fn move_and_persist_reverts_on_failure() {
    let actions = FakeActions::failing(ApiError::deck_not_found());
    let mut board = ReorderBoard::new(DeckId(1), abc());

    let err = board
        .move_and_persist(&actions, 0, 2)
        .await
        .expect_err("should fail");
    assert_eq!(err.message, "Deck not found or access denied");
    assert_eq!(fronts(board.cards()), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn move_and_persist_commits_on_success() {
    let actions = FakeActions::ok();
    let mut board = ReorderBoard::new(DeckId(1), abc());

    assert!(board.move_and_persist(&actions, 0, 2).await.expect("moved"));
    assert_eq!(fronts(board.confirmed()), vec!["B", "C", "A"]);
    assert!(!board.move_and_persist(&actions, 1, 1).await.expect("noop"));
    assert_eq!(actions.batches.lock().expect("lock").len(), 1);
}

#[test]
fn sync_from_server_replaces_both_sequences() {
    let mut board = ReorderBoard::new(DeckId(1), abc());
    board.sync_from_server(vec![card(3, "C")]);
    assert_eq!(fronts(board.cards()), vec!["C"]);
    assert_eq!(fronts(board.confirmed()), vec!["C"]);
}
