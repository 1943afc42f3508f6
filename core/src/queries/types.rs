use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::Result;
use crate::sql::Fragment;
use crate::statements::{fold_case, name_matches, StatementCache, StatementKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeSlot {
    pub slot: i64,
    pub name: String,
}

/// A pokemon listed under a type or ability, with the slot it holds there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PokemonRef {
    pub id: i64,
    pub name: String,
    pub generation: i64,
    pub slot: i64,
}

// ---------------------------------------------------------------------------
// Shared SQL fragments
// ---------------------------------------------------------------------------

/// LEFT JOIN bringing in a pokemon's types as `pt` (join row, carries `slot`)
/// and `t` (type row). `owner` is the pokemon id column, e.g. `"p.id"`.
pub fn join_fragment(owner: &str) -> String {
    format!(
        "LEFT JOIN pokemon_types pt ON pt.pokemon_id = {owner} \
         LEFT JOIN types t ON t.id = pt.type_id"
    )
}

/// Predicate true when the pokemon in `owner` has a type named `name`
/// (case-insensitive). Uses its own aliases so it can sit next to
/// [`join_fragment`] without affecting the joined rows.
pub fn exists_fragment(owner: &str, name: &str) -> Fragment {
    Fragment::new(format!(
        "EXISTS (SELECT 1 FROM pokemon_types ept \
         JOIN types et ON et.id = ept.type_id \
         WHERE ept.pokemon_id = {owner} AND {})",
        name_matches("et.name")
    ))
    .bind(fold_case(name))
}

// ---------------------------------------------------------------------------
// TypeQueries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TypeStmt {
    Exists,
    ForPokemon,
    PokemonByType,
    All,
}

impl StatementKey for TypeStmt {
    fn name(self) -> &'static str {
        match self {
            Self::Exists => "types.exists",
            Self::ForPokemon => "types.for_pokemon",
            Self::PokemonByType => "types.pokemon_by_type",
            Self::All => "types.all",
        }
    }
}

pub struct TypeQueries<'a> {
    cache: StatementCache<'a, TypeStmt>,
}

impl<'a> TypeQueries<'a> {
    pub fn new(conn: &'a Connection) -> Result<Self> {
        let mut cache = StatementCache::new(conn, "types");
        cache.prepare(
            TypeStmt::Exists,
            "SELECT EXISTS(SELECT 1 FROM types WHERE LOWER(name) = ?1)",
        )?;
        cache.prepare(
            TypeStmt::ForPokemon,
            "SELECT pt.slot, t.name
             FROM pokemon_types pt
             JOIN types t ON t.id = pt.type_id
             WHERE pt.pokemon_id = ?1
             ORDER BY pt.slot",
        )?;
        cache.prepare(
            TypeStmt::PokemonByType,
            "SELECT p.id, p.name, p.generation, pt.slot
             FROM pokemon p
             JOIN pokemon_types pt ON pt.pokemon_id = p.id
             JOIN types t ON t.id = pt.type_id
             WHERE LOWER(t.name) = ?1
             ORDER BY p.id
             LIMIT ?2",
        )?;
        cache.prepare(TypeStmt::All, "SELECT name FROM types ORDER BY name")?;
        Ok(Self { cache })
    }

    pub fn type_exists(&self, name: &str) -> Result<bool> {
        let mut stmt = self.cache.get(TypeStmt::Exists)?;
        let exists = stmt.query_row(params![fold_case(name)], |row| row.get(0))?;
        Ok(exists)
    }

    /// Types of one pokemon, ascending by slot.
    pub fn types_for_pokemon(&self, pokemon_id: i64) -> Result<Vec<TypeSlot>> {
        let mut stmt = self.cache.get(TypeStmt::ForPokemon)?;
        let rows = stmt.query_map(params![pokemon_id], |row| {
            Ok(TypeSlot {
                slot: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    pub fn pokemon_by_type(&self, name: &str, limit: i64) -> Result<Vec<PokemonRef>> {
        let mut stmt = self.cache.get(TypeStmt::PokemonByType)?;
        let rows = stmt.query_map(params![fold_case(name), limit], |row| {
            Ok(PokemonRef {
                id: row.get(0)?,
                name: row.get(1)?,
                generation: row.get(2)?,
                slot: row.get(3)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    pub fn all_types(&self) -> Result<Vec<String>> {
        let mut stmt = self.cache.get(TypeStmt::All)?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Value;

    #[test]
    fn exists_fragment_binds_folded_name() {
        let f = exists_fragment("p.id", "Grass");
        assert!(f.sql.contains("ept.pokemon_id = p.id"));
        assert!(f.sql.contains("LOWER(et.name) = ?"));
        assert_eq!(f.params, vec![Value::Text("grass".into())]);
        assert_eq!(f.placeholder_count(), 1);
    }

    #[test]
    fn join_fragment_has_no_placeholders() {
        let sql = join_fragment("p.id");
        assert!(sql.starts_with("LEFT JOIN pokemon_types pt ON pt.pokemon_id = p.id"));
        assert!(!sql.contains('?'));
    }
}
