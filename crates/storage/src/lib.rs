use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::{
    domain::{Card, CardId, CardOrder, Deck, DeckId, DeckSummary, DeckWithCards, OwnerId},
    validation::{CardText, DeckText},
};

const DECK_COLUMNS: &str = "id, user_id, name, description, created_at, updated_at";
const CARD_COLUMNS: &str = r#"id, deck_id, front, back, "order", created_at, updated_at"#;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // Every connection to `sqlite::memory:` opens its own empty database.
        let max_connections = if database_url.starts_with("sqlite::memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn insert_deck(&self, owner: &OwnerId, text: &DeckText) -> Result<Deck> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO decks (user_id, name, description, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {DECK_COLUMNS}"
        ))
        .bind(owner.as_str())
        .bind(&text.name)
        .bind(text.description.as_deref())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert deck")?;
        deck_from_row(&row)
    }

    /// Decks owned by `owner`, newest first, each with its card count.
    pub async fn list_decks_with_card_counts(&self, owner: &OwnerId) -> Result<Vec<DeckSummary>> {
        let rows = sqlx::query(
            "SELECT d.id, d.name, d.description, d.created_at, d.updated_at, COUNT(c.id)
             FROM decks d
             LEFT JOIN cards c ON c.deck_id = d.id
             WHERE d.user_id = ?
             GROUP BY d.id
             ORDER BY d.created_at DESC, d.id DESC",
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .context("failed to list decks")?;

        rows.into_iter()
            .map(|r| {
                Ok(DeckSummary {
                    id: DeckId(r.try_get::<i64, _>(0)?),
                    name: r.try_get::<String, _>(1)?,
                    description: r.try_get::<Option<String>, _>(2)?,
                    created_at: r.try_get::<DateTime<Utc>, _>(3)?,
                    updated_at: r.try_get::<DateTime<Utc>, _>(4)?,
                    card_count: r.try_get::<i64, _>(5)?,
                })
            })
            .collect()
    }

    pub async fn deck_for_owner(&self, deck_id: DeckId, owner: &OwnerId) -> Result<Option<Deck>> {
        let row = sqlx::query(&format!(
            "SELECT {DECK_COLUMNS} FROM decks WHERE id = ? AND user_id = ?"
        ))
        .bind(deck_id.0)
        .bind(owner.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("failed to load deck")?;
        row.as_ref().map(deck_from_row).transpose()
    }

    pub async fn deck_with_cards(
        &self,
        deck_id: DeckId,
        owner: &OwnerId,
    ) -> Result<Option<DeckWithCards>> {
        let Some(deck) = self.deck_for_owner(deck_id, owner).await? else {
            return Ok(None);
        };
        let cards = self.list_cards_for_deck(deck_id).await?;
        Ok(Some(DeckWithCards { deck, cards }))
    }

    pub async fn update_deck(
        &self,
        deck_id: DeckId,
        owner: &OwnerId,
        text: &DeckText,
    ) -> Result<Option<Deck>> {
        let row = sqlx::query(&format!(
            "UPDATE decks
             SET name = ?, description = ?, updated_at = ?
             WHERE id = ? AND user_id = ?
             RETURNING {DECK_COLUMNS}"
        ))
        .bind(&text.name)
        .bind(text.description.as_deref())
        .bind(Utc::now())
        .bind(deck_id.0)
        .bind(owner.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("failed to update deck")?;
        row.as_ref().map(deck_from_row).transpose()
    }

    /// Deletes the deck and, through the foreign key, all of its cards.
    pub async fn delete_deck(&self, deck_id: DeckId, owner: &OwnerId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM decks WHERE id = ? AND user_id = ?")
            .bind(deck_id.0)
            .bind(owner.as_str())
            .execute(&self.pool)
            .await
            .context("failed to delete deck")?
            .rows_affected();
        Ok(deleted > 0)
    }

    /// Cards of a deck in study order: `order` first, ties broken by creation time.
    pub async fn list_cards_for_deck(&self, deck_id: DeckId) -> Result<Vec<Card>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {CARD_COLUMNS} FROM cards
               WHERE deck_id = ?
               ORDER BY "order" ASC, created_at ASC, id ASC"#
        ))
        .bind(deck_id.0)
        .fetch_all(&self.pool)
        .await
        .context("failed to list cards")?;
        rows.iter().map(card_from_row).collect()
    }

    /// Returns the deck of `card_id` when that deck belongs to `owner`.
    pub async fn card_owner_deck(&self, card_id: CardId, owner: &OwnerId) -> Result<Option<DeckId>> {
        let row = sqlx::query(
            "SELECT d.id
             FROM cards c
             INNER JOIN decks d ON d.id = c.deck_id
             WHERE c.id = ? AND d.user_id = ?",
        )
        .bind(card_id.0)
        .bind(owner.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("failed to verify card ownership")?;
        Ok(row.map(|r| DeckId(r.get::<i64, _>(0))))
    }

    /// Appends a card after the current last position of the deck.
    pub async fn insert_card(&self, deck_id: DeckId, text: &CardText) -> Result<Card> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"INSERT INTO cards (deck_id, front, back, "order", created_at, updated_at)
               VALUES (?, ?, ?, (SELECT COALESCE(MAX("order"), -1) + 1 FROM cards WHERE deck_id = ?), ?, ?)
               RETURNING {CARD_COLUMNS}"#
        ))
        .bind(deck_id.0)
        .bind(&text.front)
        .bind(&text.back)
        .bind(deck_id.0)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert card")?;
        card_from_row(&row)
    }

    pub async fn update_card(
        &self,
        card_id: CardId,
        deck_id: DeckId,
        text: &CardText,
    ) -> Result<Option<Card>> {
        let row = sqlx::query(&format!(
            "UPDATE cards
             SET front = ?, back = ?, updated_at = ?
             WHERE id = ? AND deck_id = ?
             RETURNING {CARD_COLUMNS}"
        ))
        .bind(&text.front)
        .bind(&text.back)
        .bind(Utc::now())
        .bind(card_id.0)
        .bind(deck_id.0)
        .fetch_optional(&self.pool)
        .await
        .context("failed to update card")?;
        row.as_ref().map(card_from_row).transpose()
    }

    pub async fn delete_card(&self, card_id: CardId, deck_id: DeckId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM cards WHERE id = ? AND deck_id = ?")
            .bind(card_id.0)
            .bind(deck_id.0)
            .execute(&self.pool)
            .await
            .context("failed to delete card")?
            .rows_affected();
        Ok(deleted > 0)
    }

    /// Writes every `(id, order)` pair as its own statement, concurrently.
    /// Pairs naming a card outside `deck_id` match nothing and are skipped.
    /// There is no transaction around the batch: when one write fails the
    /// others may already be applied.
    pub async fn update_cards_order(
        &self,
        deck_id: DeckId,
        card_orders: &[CardOrder],
    ) -> Result<Vec<CardId>> {
        let now = Utc::now();
        let writes = card_orders.iter().map(|entry| async move {
            let updated = sqlx::query(
                r#"UPDATE cards SET "order" = ?, updated_at = ? WHERE id = ? AND deck_id = ?"#,
            )
            .bind(entry.order)
            .bind(now)
            .bind(entry.id.0)
            .bind(deck_id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to update order of card {}", entry.id))?
            .rows_affected();
            Ok::<_, anyhow::Error>((updated > 0).then_some(entry.id))
        });
        let updated: Vec<CardId> = try_join_all(writes).await?.into_iter().flatten().collect();
        debug!(
            deck_id = deck_id.0,
            requested = card_orders.len(),
            updated = updated.len(),
            "card orders written"
        );
        Ok(updated)
    }
}

fn deck_from_row(r: &SqliteRow) -> Result<Deck> {
    Ok(Deck {
        id: DeckId(r.try_get::<i64, _>(0)?),
        owner_id: OwnerId(r.try_get::<String, _>(1)?),
        name: r.try_get::<String, _>(2)?,
        description: r.try_get::<Option<String>, _>(3)?,
        created_at: r.try_get::<DateTime<Utc>, _>(4)?,
        updated_at: r.try_get::<DateTime<Utc>, _>(5)?,
    })
}

fn card_from_row(r: &SqliteRow) -> Result<Card> {
    Ok(Card {
        id: CardId(r.try_get::<i64, _>(0)?),
        deck_id: DeckId(r.try_get::<i64, _>(1)?),
        front: r.try_get::<String, _>(2)?,
        back: r.try_get::<String, _>(3)?,
        order: r.try_get::<i64, _>(4)?,
        created_at: r.try_get::<DateTime<Utc>, _>(5)?,
        updated_at: r.try_get::<DateTime<Utc>, _>(6)?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
