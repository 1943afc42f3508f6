use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};
use serde::Serialize;

/// Compiled statements kept per connection. Covers every fixed statement of
/// every query module plus the dynamic shapes the search and ranking
/// builders can produce.
const STATEMENT_CACHE_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Data structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pokemon {
    pub id: i64,
    pub name: String,
    pub height: i64,
    pub weight: i64,
    pub base_experience: i64,
    pub generation: i64,
    pub sprite_url: String,
    pub species_url: String,
}

impl Pokemon {
    /// Column list matching [`Pokemon::from_row`] with offset 0.
    pub const COLUMNS: &'static str = "p.id, p.name, p.height, p.weight, p.base_experience, \
         p.generation, p.sprite_url, p.species_url";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            height: row.get(2)?,
            weight: row.get(3)?,
            base_experience: row.get(4)?,
            generation: row.get(5)?,
            sprite_url: row.get(6)?,
            species_url: row.get(7)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure the schema.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;
        let db = Self { conn };
        db.apply_pragmas()?;
        db.migrate()?;
        Ok(db)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .context("failed to open in-memory database")?;
        let db = Self { conn };
        db.apply_pragmas()?;
        db.migrate()?;
        Ok(db)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn apply_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        self.conn
            .set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
        Ok(())
    }

    /// Execute `f` inside an IMMEDIATE transaction. Commits on Ok, rolls back on Err.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f() {
            Ok(val) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// The schema is owned by the ingestion side; creating it here keeps a
    /// fresh database queryable (empty) instead of failing on missing tables.
    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS pokemon (
                id              INTEGER PRIMARY KEY,
                name            TEXT NOT NULL UNIQUE COLLATE NOCASE,
                height          INTEGER NOT NULL DEFAULT 0,
                weight          INTEGER NOT NULL DEFAULT 0,
                base_experience INTEGER NOT NULL DEFAULT 0,
                generation      INTEGER NOT NULL DEFAULT 1,
                sprite_url      TEXT NOT NULL DEFAULT '',
                species_url     TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS stats (
                pokemon_id INTEGER NOT NULL REFERENCES pokemon(id) ON DELETE CASCADE,
                stat_name  TEXT NOT NULL,
                base_stat  INTEGER NOT NULL,
                effort     INTEGER NOT NULL DEFAULT 0,
                UNIQUE(pokemon_id, stat_name)
            );

            CREATE TABLE IF NOT EXISTS types (
                id   INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS pokemon_types (
                pokemon_id INTEGER NOT NULL REFERENCES pokemon(id) ON DELETE CASCADE,
                type_id    INTEGER NOT NULL REFERENCES types(id) ON DELETE CASCADE,
                slot       INTEGER NOT NULL,
                PRIMARY KEY (pokemon_id, slot)
            );

            CREATE TABLE IF NOT EXISTS abilities (
                id   INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS pokemon_abilities (
                pokemon_id INTEGER NOT NULL REFERENCES pokemon(id) ON DELETE CASCADE,
                ability_id INTEGER NOT NULL REFERENCES abilities(id) ON DELETE CASCADE,
                slot       INTEGER NOT NULL,
                is_hidden  INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (pokemon_id, slot)
            );

            -- Reserved for move data; nothing reads these yet.
            CREATE TABLE IF NOT EXISTS moves (
                id   INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS pokemon_moves (
                pokemon_id INTEGER NOT NULL REFERENCES pokemon(id) ON DELETE CASCADE,
                move_id    INTEGER NOT NULL REFERENCES moves(id) ON DELETE CASCADE,
                PRIMARY KEY (pokemon_id, move_id)
            );

            CREATE INDEX IF NOT EXISTS idx_pokemon_generation    ON pokemon(generation);
            CREATE INDEX IF NOT EXISTS idx_stats_name            ON stats(stat_name);
            CREATE INDEX IF NOT EXISTS idx_pokemon_types_type    ON pokemon_types(type_id);
            CREATE INDEX IF NOT EXISTS idx_pokemon_abilities_ab  ON pokemon_abilities(ability_id);
            ",
        )?;
        Ok(())
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    pub fn pokemon_count(&self) -> Result<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM pokemon", [], |row| row.get(0))?;
        Ok(n)
    }

    // -----------------------------------------------------------------------
    // Upserts (write path used by ingestion and test fixtures)
    // -----------------------------------------------------------------------

    pub fn upsert_pokemon(&self, p: &Pokemon) -> Result<()> {
        self.conn.execute(
            "INSERT INTO pokemon (id, name, height, weight, base_experience, generation, sprite_url, species_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET name            = excluded.name,
                                           height          = excluded.height,
                                           weight          = excluded.weight,
                                           base_experience = excluded.base_experience,
                                           generation      = excluded.generation,
                                           sprite_url      = excluded.sprite_url,
                                           species_url     = excluded.species_url",
            params![
                p.id,
                p.name,
                p.height,
                p.weight,
                p.base_experience,
                p.generation,
                p.sprite_url,
                p.species_url
            ],
        )?;
        Ok(())
    }

    pub fn upsert_stat(
        &self,
        pokemon_id: i64,
        stat_name: &str,
        base_stat: i64,
        effort: i64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO stats (pokemon_id, stat_name, base_stat, effort)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(pokemon_id, stat_name) DO UPDATE SET base_stat = excluded.base_stat,
                                                             effort    = excluded.effort",
            params![pokemon_id, stat_name, base_stat, effort],
        )?;
        Ok(())
    }

    /// Insert a type by name if missing and return its id.
    pub fn upsert_type(&self, name: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO types (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;
        // last_insert_rowid is stale on the DO NOTHING path; always SELECT.
        let id = self.conn.query_row(
            "SELECT id FROM types WHERE name = ?1",
            params![name],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    /// Put `type_name` in `slot` for a pokemon, replacing whatever held that slot.
    pub fn link_type(&self, pokemon_id: i64, type_name: &str, slot: i64) -> Result<()> {
        let type_id = self.upsert_type(type_name)?;
        self.conn.execute(
            "INSERT INTO pokemon_types (pokemon_id, type_id, slot) VALUES (?1, ?2, ?3)
             ON CONFLICT(pokemon_id, slot) DO UPDATE SET type_id = excluded.type_id",
            params![pokemon_id, type_id, slot],
        )?;
        Ok(())
    }

    pub fn upsert_ability(&self, name: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO abilities (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM abilities WHERE name = ?1",
            params![name],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    pub fn link_ability(
        &self,
        pokemon_id: i64,
        ability_name: &str,
        slot: i64,
        is_hidden: bool,
    ) -> Result<()> {
        let ability_id = self.upsert_ability(ability_name)?;
        self.conn.execute(
            "INSERT INTO pokemon_abilities (pokemon_id, ability_id, slot, is_hidden)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(pokemon_id, slot) DO UPDATE SET ability_id = excluded.ability_id,
                                                         is_hidden  = excluded.is_hidden",
            params![pokemon_id, ability_id, slot, is_hidden],
        )?;
        Ok(())
    }
}
