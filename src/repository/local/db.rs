//! Database Connection and Setup
//!
//! Opens the embedded SQLite store and runs migrations. The schema mirrors
//! the hosted one: one table per entity, two review-count views, and
//! review rows cascading with their parent.

use std::path::Path;

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

use crate::domain::{ReadSource, Table};
use crate::repository::error::BackendResult;

/// Open (or create) a database file and migrate it
pub fn open_db(path: &Path) -> BackendResult<Connection> {
    let conn = Connection::open(path)?;
    register_functions(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// In-memory database, used by tests and throwaway sessions
pub fn open_in_memory() -> BackendResult<Connection> {
    let conn = Connection::open_in_memory()?;
    register_functions(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// SQL helpers the queries rely on. `fold(x)` lowercases with full Unicode
/// case mapping, since the built-in LIKE only folds ASCII letters.
fn register_functions(conn: &Connection) -> BackendResult<()> {
    conn.create_scalar_function(
        "fold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|text| text.to_lowercase()))
        },
    )?;
    Ok(())
}

/// Writable columns per table
pub fn table_columns(table: Table) -> &'static [&'static str] {
    match table {
        Table::Todos => &["id", "title", "description", "priority_levels", "user_id", "created_at"],
        Table::Foods => &["id", "title", "description", "food_image_url", "user_id", "created_at"],
        Table::FoodReviews => &["id", "food_id", "user_id", "comment", "created_at"],
        Table::Pokemons => &["id", "title", "description", "pokemon_image_url", "user_id", "created_at"],
        Table::PokemonReviews => &["id", "pokemon_id", "user_id", "comment", "created_at"],
        Table::GoogleDrives => &["id", "title", "google_drive_photo_url", "user_id", "created_at"],
        Table::MarkdownNotes => &["id", "description", "user_id", "created_at"],
    }
}

/// Whether `column` may appear in a filter or ordering on `source`
pub fn is_readable_column(source: ReadSource, column: &str) -> bool {
    let extra = match source {
        ReadSource::Table(_) => false,
        ReadSource::FoodsWithReviewCount | ReadSource::PokemonsWithReviewCount => {
            column == "reviewcount"
        }
    };
    extra || table_columns(source.base_table()).contains(&column)
}

/// Child tables deleted together with a parent row: (table, foreign key)
pub fn cascading_children(table: Table) -> &'static [(Table, &'static str)] {
    match table {
        Table::Foods => &[(Table::FoodReviews, "food_id")],
        Table::Pokemons => &[(Table::PokemonReviews, "pokemon_id")],
        _ => &[],
    }
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> BackendResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Run database migrations
fn run_migrations(conn: &Connection) -> BackendResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS todos (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS foods (
            id TEXT PRIMARY KEY,
            title TEXT,
            description TEXT,
            food_image_url TEXT,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS food_reviews (
            id TEXT PRIMARY KEY,
            food_id TEXT NOT NULL REFERENCES foods(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            comment TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pokemons (
            id TEXT PRIMARY KEY,
            title TEXT,
            description TEXT NOT NULL,
            pokemon_image_url TEXT,
            user_id TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pokemon_reviews (
            id TEXT PRIMARY KEY,
            pokemon_id TEXT NOT NULL REFERENCES pokemons(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            comment TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS google_drives (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            google_drive_photo_url TEXT,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS markdown_notes (
            id TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );",
    )?;

    // Priority arrived after the first todo schema
    if !column_exists(conn, "todos", "priority_levels")? {
        conn.execute("ALTER TABLE todos ADD COLUMN priority_levels TEXT", [])?;
    }

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_food_reviews_food ON food_reviews(food_id);
        CREATE INDEX IF NOT EXISTS idx_pokemon_reviews_pokemon ON pokemon_reviews(pokemon_id);

        CREATE VIEW IF NOT EXISTS foods_with_review_count AS
            SELECT f.*, (SELECT COUNT(*) FROM food_reviews r WHERE r.food_id = f.id) AS reviewcount
            FROM foods f;

        CREATE VIEW IF NOT EXISTS pokemons_with_review_count AS
            SELECT p.*, (SELECT COUNT(*) FROM pokemon_reviews r WHERE r.pokemon_id = p.id) AS reviewcount
            FROM pokemons p;",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert!(column_exists(&conn, "todos", "priority_levels").unwrap());
        assert!(!column_exists(&conn, "todos", "completed").unwrap());
    }

    #[test]
    fn test_fold_lowercases_unicode() {
        let conn = open_in_memory().unwrap();
        let folded: String = conn
            .query_row("SELECT fold('CRÈME Brûlée')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(folded, "crème brûlée");
        let null: Option<String> = conn.query_row("SELECT fold(NULL)", [], |row| row.get(0)).unwrap();
        assert!(null.is_none());
    }

    #[test]
    fn test_readable_columns() {
        assert!(is_readable_column(ReadSource::FoodsWithReviewCount, "reviewcount"));
        assert!(is_readable_column(ReadSource::FoodsWithReviewCount, "description"));
        assert!(!is_readable_column(ReadSource::Table(Table::Foods), "reviewcount"));
        assert!(!is_readable_column(ReadSource::Table(Table::Todos), "title; DROP TABLE todos"));
    }
}
