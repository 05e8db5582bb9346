use course_core::model::{Deck, DeckId};

use super::SqliteRepository;
use super::mapping::{conn, map_deck_row, ser};
use crate::repository::{DeckRepository, StorageError};

#[async_trait::async_trait]
impl DeckRepository for SqliteRepository {
    async fn insert_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        let cards = serde_json::to_string(deck.cards()).map_err(ser)?;

        sqlx::query(
            r"
            INSERT INTO decks (id, title, description, cards)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(deck.id().to_string())
        .bind(deck.title())
        .bind(deck.description())
        .bind(cards)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get_deck(&self, id: DeckId) -> Result<Deck, StorageError> {
        let row = sqlx::query("SELECT id, title, description, cards FROM decks WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        match row {
            Some(row) => map_deck_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn get_decks(&self, ids: &[DeckId]) -> Result<Vec<Deck>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from("SELECT id, title, description, cards FROM decks WHERE id IN (");
        for i in 0..ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push(')');

        let mut q = sqlx::query(&sql);
        for id in ids {
            q = q.bind(id.to_string());
        }

        let rows = q.fetch_all(&self.pool).await.map_err(conn)?;

        let mut decks = Vec::with_capacity(rows.len());
        for row in rows {
            decks.push(map_deck_row(&row)?);
        }
        Ok(decks)
    }
}
