use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::Result;
use crate::queries::types::PokemonRef;
use crate::sql::Fragment;
use crate::statements::{fold_case, name_matches, StatementCache, StatementKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbilitySlot {
    pub slot: i64,
    pub name: String,
    pub is_hidden: bool,
}

/// LEFT JOIN bringing in a pokemon's abilities as `pa` (join row, carries
/// `slot` and `is_hidden`) and `a` (ability row).
pub fn join_fragment(owner: &str) -> String {
    format!(
        "LEFT JOIN pokemon_abilities pa ON pa.pokemon_id = {owner} \
         LEFT JOIN abilities a ON a.id = pa.ability_id"
    )
}

/// Predicate true when the pokemon in `owner` has an ability named `name`.
pub fn exists_fragment(owner: &str, name: &str) -> Fragment {
    Fragment::new(format!(
        "EXISTS (SELECT 1 FROM pokemon_abilities epa \
         JOIN abilities ea ON ea.id = epa.ability_id \
         WHERE epa.pokemon_id = {owner} AND {})",
        name_matches("ea.name")
    ))
    .bind(fold_case(name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AbilityStmt {
    Exists,
    ForPokemon,
    PokemonByAbility,
}

impl StatementKey for AbilityStmt {
    fn name(self) -> &'static str {
        match self {
            Self::Exists => "abilities.exists",
            Self::ForPokemon => "abilities.for_pokemon",
            Self::PokemonByAbility => "abilities.pokemon_by_ability",
        }
    }
}

pub struct AbilityQueries<'a> {
    cache: StatementCache<'a, AbilityStmt>,
}

impl<'a> AbilityQueries<'a> {
    pub fn new(conn: &'a Connection) -> Result<Self> {
        let mut cache = StatementCache::new(conn, "abilities");
        cache.prepare(
            AbilityStmt::Exists,
            "SELECT EXISTS(SELECT 1 FROM abilities WHERE LOWER(name) = ?1)",
        )?;
        cache.prepare(
            AbilityStmt::ForPokemon,
            "SELECT pa.slot, a.name, pa.is_hidden
             FROM pokemon_abilities pa
             JOIN abilities a ON a.id = pa.ability_id
             WHERE pa.pokemon_id = ?1
             ORDER BY pa.slot",
        )?;
        cache.prepare(
            AbilityStmt::PokemonByAbility,
            "SELECT p.id, p.name, p.generation, pa.slot
             FROM pokemon p
             JOIN pokemon_abilities pa ON pa.pokemon_id = p.id
             JOIN abilities a ON a.id = pa.ability_id
             WHERE LOWER(a.name) = ?1
             ORDER BY p.id
             LIMIT ?2",
        )?;
        Ok(Self { cache })
    }

    pub fn ability_exists(&self, name: &str) -> Result<bool> {
        let mut stmt = self.cache.get(AbilityStmt::Exists)?;
        let exists = stmt.query_row(params![fold_case(name)], |row| row.get(0))?;
        Ok(exists)
    }

    /// Abilities of one pokemon, ascending by slot.
    pub fn abilities_for_pokemon(&self, pokemon_id: i64) -> Result<Vec<AbilitySlot>> {
        let mut stmt = self.cache.get(AbilityStmt::ForPokemon)?;
        let rows = stmt.query_map(params![pokemon_id], |row| {
            Ok(AbilitySlot {
                slot: row.get(0)?,
                name: row.get(1)?,
                is_hidden: row.get(2)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    pub fn pokemon_by_ability(&self, name: &str, limit: i64) -> Result<Vec<PokemonRef>> {
        let mut stmt = self.cache.get(AbilityStmt::PokemonByAbility)?;
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
}
