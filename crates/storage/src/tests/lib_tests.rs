use super::*;

fn deck_text(name: &str) -> DeckText {
    DeckText {
        name: name.to_string(),
        description: None,
    }
}

fn card_text(front: &str, back: &str) -> CardText {
    CardText {
        front: front.to_string(),
        back: back.to_string(),
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn decks_are_scoped_to_their_owner() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let alice = OwnerId::new("user_alice");
    let bob = OwnerId::new("user_bob");
    let deck = storage
        .insert_deck(&alice, &deck_text("Spanish"))
        .await
        .expect("deck");

    assert!(storage
        .deck_for_owner(deck.id, &alice)
        .await
        .expect("lookup")
        .is_some());
    assert!(storage
        .deck_for_owner(deck.id, &bob)
        .await
        .expect("lookup")
        .is_none());
    assert!(storage
        .update_deck(deck.id, &bob, &deck_text("Stolen"))
        .await
        .expect("update")
        .is_none());
    assert!(!storage.delete_deck(deck.id, &bob).await.expect("delete"));
}

#[tokio::test]
async fn lists_decks_newest_first_with_card_counts() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = OwnerId::new("user_carol");
    let older = storage
        .insert_deck(&owner, &deck_text("Older"))
        .await
        .expect("deck");
    let newer = storage
        .insert_deck(&owner, &deck_text("Newer"))
        .await
        .expect("deck");
    storage
        .insert_card(older.id, &card_text("dog", "anjing"))
        .await
        .expect("card");
    storage
        .insert_card(older.id, &card_text("cat", "kucing"))
        .await
        .expect("card");

    let decks = storage
        .list_decks_with_card_counts(&owner)
        .await
        .expect("decks");
    assert_eq!(decks.len(), 2);
    assert_eq!(decks[0].id, newer.id);
    assert_eq!(decks[0].card_count, 0);
    assert_eq!(decks[1].card_count, 2);
}

#[tokio::test]
async fn new_cards_are_appended_after_the_highest_order() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = OwnerId::new("user_dan");
    let deck = storage
        .insert_deck(&owner, &deck_text("History"))
        .await
        .expect("deck");

    let first = storage
        .insert_card(deck.id, &card_text("Hastings?", "1066"))
        .await
        .expect("card");
    assert_eq!(first.order, 0);

    storage
        .update_cards_order(deck.id, &[CardOrder { id: first.id, order: 7 }])
        .await
        .expect("reorder");
    let second = storage
        .insert_card(deck.id, &card_text("Waterloo?", "1815"))
        .await
        .expect("card");
    assert_eq!(second.order, 8);
}

#[tokio::test]
async fn cards_are_listed_by_persisted_order() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = OwnerId::new("user_erin");
    let deck = storage
        .insert_deck(&owner, &deck_text("Letters"))
        .await
        .expect("deck");
    let a = storage.insert_card(deck.id, &card_text("A", "a")).await.expect("a");
    let b = storage.insert_card(deck.id, &card_text("B", "b")).await.expect("b");
    let c = storage.insert_card(deck.id, &card_text("C", "c")).await.expect("c");

    let updated = storage
        .update_cards_order(
            deck.id,
            &[
                CardOrder { id: b.id, order: 0 },
                CardOrder { id: c.id, order: 1 },
                CardOrder { id: a.id, order: 2 },
            ],
        )
        .await
        .expect("reorder");
    assert_eq!(updated.len(), 3);

    let ids: Vec<CardId> = storage
        .list_cards_for_deck(deck.id)
        .await
        .expect("cards")
        .into_iter()
        .map(|card| card.id)
        .collect();
    assert_eq!(ids, vec![b.id, c.id, a.id]);
}

#[tokio::test]
async fn reorder_skips_cards_from_other_decks() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = OwnerId::new("user_frank");
    let mine = storage.insert_deck(&owner, &deck_text("Mine")).await.expect("deck");
    let other = storage.insert_deck(&owner, &deck_text("Other")).await.expect("deck");
    let stray = storage
        .insert_card(other.id, &card_text("q", "a"))
        .await
        .expect("card");

    let updated = storage
        .update_cards_order(mine.id, &[CardOrder { id: stray.id, order: 5 }])
        .await
        .expect("reorder");
    assert!(updated.is_empty());
    let cards = storage.list_cards_for_deck(other.id).await.expect("cards");
    assert_eq!(cards[0].order, 0);
}

#[tokio::test]
async fn card_ownership_follows_the_parent_deck() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = OwnerId::new("user_gina");
    let deck = storage.insert_deck(&owner, &deck_text("Deck")).await.expect("deck");
    let card = storage
        .insert_card(deck.id, &card_text("q", "a"))
        .await
        .expect("card");

    assert_eq!(
        storage.card_owner_deck(card.id, &owner).await.expect("owner"),
        Some(deck.id)
    );
    assert_eq!(
        storage
            .card_owner_deck(card.id, &OwnerId::new("user_mallory"))
            .await
            .expect("owner"),
        None
    );
}

#[tokio::test]
async fn update_and_delete_card_are_scoped_to_deck() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = OwnerId::new("user_hank");
    let deck = storage.insert_deck(&owner, &deck_text("Deck")).await.expect("deck");
    let other = storage.insert_deck(&owner, &deck_text("Other")).await.expect("deck");
    let card = storage
        .insert_card(deck.id, &card_text("q", "a"))
        .await
        .expect("card");

    assert!(storage
        .update_card(card.id, other.id, &card_text("x", "y"))
        .await
        .expect("update")
        .is_none());
    let updated = storage
        .update_card(card.id, deck.id, &card_text("question", "answer"))
        .await
        .expect("update")
        .expect("row");
    assert_eq!(updated.front, "question");
    assert!(updated.updated_at >= card.updated_at);

    assert!(!storage.delete_card(card.id, other.id).await.expect("delete"));
    assert!(storage.delete_card(card.id, deck.id).await.expect("delete"));
}

#[tokio::test]
async fn deleting_a_deck_cascades_to_cards() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = OwnerId::new("user_ivy");
    let deck = storage.insert_deck(&owner, &deck_text("Deck")).await.expect("deck");
    storage
        .insert_card(deck.id, &card_text("q", "a"))
        .await
        .expect("card");

    assert!(storage.delete_deck(deck.id, &owner).await.expect("delete"));
    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards")
        .fetch_one(storage.pool())
        .await
        .expect("count");
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn deck_with_cards_requires_ownership() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = OwnerId::new("user_jo");
    let deck = storage.insert_deck(&owner, &deck_text("Deck")).await.expect("deck");
    storage
        .insert_card(deck.id, &card_text("q", "a"))
        .await
        .expect("card");

    let loaded = storage
        .deck_with_cards(deck.id, &owner)
        .await
        .expect("load")
        .expect("owned");
    assert_eq!(loaded.cards.len(), 1);
    assert!(storage
        .deck_with_cards(deck.id, &OwnerId::new("user_kim"))
        .await
        .expect("load")
        .is_none());
}
