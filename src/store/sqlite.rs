//! SQLite-backed review store
//!
//! Handles database initialization, the per-user card catalog (decks and
//! cards), SM-2 review state persistence, and the simulated current date
//! used by the command-line front end.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use super::ReviewStore;
use crate::error::PersistenceError;
use crate::models::{Card, CardId, Deck, DueCard, ReviewRecord, ReviewState, UserId};

type Result<T> = std::result::Result<T, PersistenceError>;

/// Key of the simulated date row in `app_state`.
const CURRENT_DATE_KEY: &str = "current_date";

const SELECT_DUE: &str = "
    SELECT c.id, c.front, c.back,
           r.interval_days, r.ease_factor, r.repetitions, r.due_day, r.last_reviewed_at
    FROM cards c
    JOIN decks d ON d.id = c.deck_id
    LEFT JOIN review_states r ON r.card_id = c.id AND r.user_id = d.user_id
    WHERE d.user_id = ?1 AND (r.card_id IS NULL OR r.due_day <= ?2)
    ORDER BY c.id ASC";

const COUNT_DUE: &str = "
    SELECT COUNT(*)
    FROM cards c
    JOIN decks d ON d.id = c.deck_id
    LEFT JOIN review_states r ON r.card_id = c.id AND r.user_id = d.user_id
    WHERE d.user_id = ?1 AND (r.card_id IS NULL OR r.due_day <= ?2)";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database file and makes sure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), "opened review database");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ==================== Catalog ====================

    /// Creates a deck for `user` if it does not exist yet and returns its id.
    pub fn new_deck(&self, user: UserId, name: &str) -> Result<i64> {
        let conn = self.conn.lock()?;
        ensure_deck(&conn, user, name)
    }

    /// Adds a card to a deck, creating the deck when needed.
    ///
    /// A card whose front already exists in the deck is left untouched and
    /// its existing id is returned.
    pub fn add_card(&self, user: UserId, deck_name: &str, front: &str, back: &str) -> Result<CardId> {
        let conn = self.conn.lock()?;
        let deck_id = ensure_deck(&conn, user, deck_name)?;
        insert_card(&conn, deck_id, front, back)
    }

    /// Imports every card of `deck` in one transaction.
    pub fn import_deck(&self, user: UserId, deck: &Deck) -> Result<Vec<CardId>> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;
        let deck_id = ensure_deck(&tx, user, &deck.name)?;
        let ids = deck
            .cards
            .iter()
            .map(|card| insert_card(&tx, deck_id, &card.front, &card.back))
            .collect::<Result<Vec<_>>>()?;
        tx.commit()?;

        tracing::info!(user = %user, deck = %deck.name, cards = ids.len(), "imported deck");
        Ok(ids)
    }

    pub fn deck_names(&self, user: UserId) -> Result<Vec<String>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare("SELECT name FROM decks WHERE user_id = ?1 ORDER BY id")?;
        let names = stmt
            .query_map(params![user.0], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// Loads a deck with its cards, or `None` when `user` has no such deck.
    pub fn deck(&self, user: UserId, name: &str) -> Result<Option<Deck>> {
        let conn = self.conn.lock()?;
        let deck_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM decks WHERE user_id = ?1 AND name = ?2",
                params![user.0, name],
                |row| row.get(0),
            )
            .optional()?;
        let Some(deck_id) = deck_id else {
            return Ok(None);
        };

        let mut stmt = conn.prepare("SELECT front, back FROM cards WHERE deck_id = ?1 ORDER BY id")?;
        let cards = stmt
            .query_map(params![deck_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(Deck::with_cards(name, cards)))
    }

    /// Every card in the deck set of `user`, in catalog order.
    pub fn cards(&self, user: UserId) -> Result<Vec<Card>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.front, c.back FROM cards c
             JOIN decks d ON d.id = c.deck_id
             WHERE d.user_id = ?1 ORDER BY c.id",
        )?;
        let cards = stmt
            .query_map(params![user.0], card_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    // ==================== Simulated clock ====================

    /// Current simulated date, if one has been set.
    pub fn current_date(&self) -> Result<Option<NaiveDate>> {
        let conn = self.conn.lock()?;
        read_current_date(&conn)
    }

    /// Stores `date` as the simulated date unless one is already set, and
    /// returns the date in effect.
    pub fn init_current_date(&self, date: NaiveDate) -> Result<NaiveDate> {
        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO app_state (key, value) VALUES (?1, ?2)",
            params![CURRENT_DATE_KEY, date],
        )?;
        read_current_date(&conn)?
            .ok_or_else(|| PersistenceError::Corrupt("current date missing after insert".to_string()))
    }

    /// Advances the simulated date by one day (for stepping through reviews).
    pub fn advance_day(&self) -> Result<NaiveDate> {
        let conn = self.conn.lock()?;
        let current = read_current_date(&conn)?
            .ok_or_else(|| PersistenceError::Corrupt("current date is not initialized".to_string()))?;
        let next_day = current
            .checked_add_days(Days::new(1))
            .ok_or_else(|| PersistenceError::Corrupt(format!("cannot advance past {current}")))?;

        conn.execute(
            "UPDATE app_state SET value = ?1 WHERE key = ?2",
            params![next_day, CURRENT_DATE_KEY],
        )?;
        Ok(next_day)
    }
}

impl ReviewStore for SqliteStore {
    fn get_due(&self, user: UserId, as_of: NaiveDate) -> Result<Vec<DueCard>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare_cached(SELECT_DUE)?;
        let due = stmt
            .query_map(params![user.0, day_number(as_of)], |row| {
                Ok(DueCard {
                    card: card_from_row(row)?,
                    state: state_from_row(row, 3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(due)
    }

    fn get(&self, user: UserId, card: CardId) -> Result<ReviewState> {
        let conn = self.conn.lock()?;
        load_state(&conn, user, card)
    }

    fn upsert(&self, user: UserId, card: CardId, record: &ReviewRecord) -> Result<()> {
        let conn = self.conn.lock()?;
        write_record(&conn, user, card, record)
    }

    fn upsert_all(&self, user: UserId, records: &[(CardId, ReviewRecord)]) -> Result<()> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for (card, record) in records {
            // an error here drops the transaction and rolls back the earlier writes
            write_record(&tx, user, *card, record)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn compare_and_swap(
        &self,
        user: UserId,
        card: CardId,
        expected: &ReviewState,
        new: &ReviewRecord,
    ) -> Result<bool> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if load_state(&tx, user, card)? != *expected {
            // dropping the transaction rolls it back
            return Ok(false);
        }
        write_record(&tx, user, card, new)?;
        tx.commit()?;
        Ok(true)
    }

    fn count_due(&self, user: UserId, as_of: NaiveDate) -> Result<usize> {
        let conn = self.conn.lock()?;
        let count: i64 = conn.query_row(COUNT_DUE, params![user.0, day_number(as_of)], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| PersistenceError::Corrupt(format!("negative count {count}")))
    }

    fn review_records(&self, user: UserId) -> Result<Vec<(CardId, ReviewRecord)>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(
            "SELECT card_id, interval_days, ease_factor, repetitions, due_day, last_reviewed_at
             FROM review_states WHERE user_id = ?1 ORDER BY card_id",
        )?;
        let records = stmt
            .query_map(params![user.0], |row| Ok((CardId(row.get(0)?), record_from_row(row, 1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

/// Creates the catalog, review state, and app state tables.
fn init_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS decks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            UNIQUE(user_id, name)
        )",
        (),
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS cards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            deck_id INTEGER NOT NULL,
            front TEXT NOT NULL,
            back TEXT NOT NULL,
            FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE,
            UNIQUE(deck_id, front)
        )",
        (),
    )?;

    // One row per (user, card); a missing row means the card was never rated
    conn.execute(
        "CREATE TABLE IF NOT EXISTS review_states (
            user_id INTEGER NOT NULL,
            card_id INTEGER NOT NULL,
            interval_days INTEGER NOT NULL CHECK (interval_days >= 1),
            ease_factor REAL NOT NULL CHECK (ease_factor >= 1.3),
            repetitions INTEGER NOT NULL CHECK (repetitions >= 0),
            -- days since 0001-01-01, so comparisons stay numeric for any year
            due_day INTEGER NOT NULL,
            last_reviewed_at TEXT NOT NULL,
            PRIMARY KEY (user_id, card_id),
            FOREIGN KEY (card_id) REFERENCES cards(id) ON DELETE CASCADE
        )",
        (),
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS review_states_due ON review_states (user_id, due_day)",
        (),
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS app_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        (),
    )?;

    tracing::debug!("review schema ready");
    Ok(())
}

fn ensure_deck(conn: &Connection, user: UserId, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO decks (user_id, name) VALUES (?1, ?2)",
        params![user.0, name],
    )?;
    let id = conn.query_row(
        "SELECT id FROM decks WHERE user_id = ?1 AND name = ?2",
        params![user.0, name],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn insert_card(conn: &Connection, deck_id: i64, front: &str, back: &str) -> Result<CardId> {
    conn.execute(
        "INSERT OR IGNORE INTO cards (deck_id, front, back) VALUES (?1, ?2, ?3)",
        params![deck_id, front, back],
    )?;
    let id = conn.query_row(
        "SELECT id FROM cards WHERE deck_id = ?1 AND front = ?2",
        params![deck_id, front],
        |row| row.get(0),
    )?;
    Ok(CardId(id))
}

fn load_state(conn: &Connection, user: UserId, card: CardId) -> Result<ReviewState> {
    let record = conn
        .query_row(
            "SELECT interval_days, ease_factor, repetitions, due_day, last_reviewed_at
             FROM review_states WHERE user_id = ?1 AND card_id = ?2",
            params![user.0, card.0],
            |row| record_from_row(row, 0),
        )
        .optional()?;
    Ok(record.into())
}

fn write_record(conn: &Connection, user: UserId, card: CardId, record: &ReviewRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO review_states
            (user_id, card_id, interval_days, ease_factor, repetitions, due_day, last_reviewed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (user_id, card_id) DO UPDATE SET
            interval_days = excluded.interval_days,
            ease_factor = excluded.ease_factor,
            repetitions = excluded.repetitions,
            due_day = excluded.due_day,
            last_reviewed_at = excluded.last_reviewed_at",
        params![
            user.0,
            card.0,
            record.interval_days,
            record.ease_factor,
            record.repetitions,
            day_number(record.due_date),
            record.last_reviewed_at
        ],
    )?;
    Ok(())
}

fn read_current_date(conn: &Connection) -> Result<Option<NaiveDate>> {
    let date = conn
        .query_row(
            "SELECT value FROM app_state WHERE key = ?1",
            params![CURRENT_DATE_KEY],
            |row| row.get(0),
        )
        .optional()?;
    Ok(date)
}

/// Days since 0001-01-01 (CE), the stored form of a due date.
fn day_number(date: NaiveDate) -> i32 {
    date.num_days_from_ce()
}

fn date_from_day(day: i32, column: usize) -> rusqlite::Result<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(day)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, i64::from(day)))
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: CardId(row.get(0)?),
        front: row.get(1)?,
        back: row.get(2)?,
    })
}

/// Reads five review columns starting at `offset`.
fn record_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<ReviewRecord> {
    Ok(ReviewRecord {
        interval_days: row.get(offset)?,
        ease_factor: row.get(offset + 1)?,
        repetitions: row.get(offset + 2)?,
        due_date: date_from_day(row.get(offset + 3)?, offset + 3)?,
        last_reviewed_at: row.get::<_, DateTime<Utc>>(offset + 4)?,
    })
}

/// Like [`record_from_row`] for a `LEFT JOIN`, where NULL columns mean unreviewed.
fn state_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<ReviewState> {
    let interval: Option<u32> = row.get(offset)?;
    match interval {
        None => Ok(ReviewState::Unreviewed),
        Some(_) => record_from_row(row, offset).map(ReviewState::Reviewed),
    }
}
