use std::collections::{BTreeMap, HashMap};

use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::db::Pokemon;
use crate::error::Result;
use crate::queries::abilities::{self, AbilitySlot};
use crate::queries::types::{self, TypeSlot};
use crate::statements::{Identifier, StatementCache, StatementKey};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// The six canonical stat names. Declaration order is output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatName {
    Hp,
    Attack,
    Defense,
    SpecialAttack,
    SpecialDefense,
    Speed,
}

impl StatName {
    pub const CANONICAL: [Self; 6] = [
        Self::Hp,
        Self::Attack,
        Self::Defense,
        Self::SpecialAttack,
        Self::SpecialDefense,
        Self::Speed,
    ];

    /// The name as stored in `stats.stat_name`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hp => "hp",
            Self::Attack => "attack",
            Self::Defense => "defense",
            Self::SpecialAttack => "special-attack",
            Self::SpecialDefense => "special-defense",
            Self::Speed => "speed",
        }
    }

    pub fn from_stored(name: &str) -> Option<Self> {
        Self::CANONICAL.into_iter().find(|s| s.as_str() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stat {
    pub name: StatName,
    pub base_stat: i64,
    pub effort: i64,
}

/// A pokemon with its stats, types and abilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PokemonDetail {
    #[serde(flatten)]
    pub pokemon: Pokemon,
    pub stats: Vec<Stat>,
    pub types: Vec<TypeSlot>,
    pub abilities: Vec<AbilitySlot>,
}

impl PokemonDetail {
    pub fn total(&self) -> i64 {
        self.stats.iter().map(|s| s.base_stat).sum()
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Flat join rows and reconstruction
// ---------------------------------------------------------------------------

/// One row of the complete-pokemon join. Every row repeats the pokemon
/// columns; relation columns are NULL when the left join found nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteRow {
    pub pokemon: Pokemon,
    pub stat_name: Option<String>,
    pub base_stat: Option<i64>,
    pub effort: Option<i64>,
    pub type_slot: Option<i64>,
    pub type_name: Option<String>,
    pub ability_slot: Option<i64>,
    pub ability_name: Option<String>,
    pub ability_hidden: Option<bool>,
}

impl CompleteRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pokemon: Pokemon::from_row(row)?,
            stat_name: row.get(8)?,
            base_stat: row.get(9)?,
            effort: row.get(10)?,
            type_slot: row.get(11)?,
            type_name: row.get(12)?,
            ability_slot: row.get(13)?,
            ability_name: row.get(14)?,
            ability_hidden: row.get(15)?,
        })
    }
}

/// Fold the flat join output back into one [`PokemonDetail`].
///
/// The join yields stats x types x abilities rows, so each relation is
/// deduplicated by its natural key (stat name, slot) keeping the first
/// occurrence. Stats come out in canonical order, skipping names never seen
/// and names outside the canonical set; types and abilities come out by
/// ascending slot. No rows means no such pokemon.
pub fn reconstruct(rows: &[CompleteRow]) -> Option<PokemonDetail> {
    let first = rows.first()?;

    let mut stats: HashMap<StatName, Stat> = HashMap::new();
    let mut type_slots: BTreeMap<i64, TypeSlot> = BTreeMap::new();
    let mut ability_slots: BTreeMap<i64, AbilitySlot> = BTreeMap::new();

    for row in rows {
        if let (Some(name), Some(base_stat)) = (row.stat_name.as_deref(), row.base_stat) {
            if let Some(stat) = StatName::from_stored(name) {
                stats.entry(stat).or_insert(Stat {
                    name: stat,
                    base_stat,
                    effort: row.effort.unwrap_or(0),
                });
            }
        }

        if let (Some(slot), Some(name)) = (row.type_slot, row.type_name.as_ref()) {
            type_slots.entry(slot).or_insert_with(|| TypeSlot {
                slot,
                name: name.clone(),
            });
        }

        if let (Some(slot), Some(name)) = (row.ability_slot, row.ability_name.as_ref()) {
            ability_slots.entry(slot).or_insert_with(|| AbilitySlot {
                slot,
                name: name.clone(),
                is_hidden: row.ability_hidden.unwrap_or(false),
            });
        }
    }

    Some(PokemonDetail {
        pokemon: first.pokemon.clone(),
        stats: StatName::CANONICAL
            .into_iter()
            .filter_map(|name| stats.remove(&name))
            .collect(),
        types: type_slots.into_values().collect(),
        abilities: ability_slots.into_values().collect(),
    })
}

// ---------------------------------------------------------------------------
// PokemonQueries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PokemonStmt {
    ById,
    ByName,
    CompleteById,
    CompleteByName,
}

impl StatementKey for PokemonStmt {
    fn name(self) -> &'static str {
        match self {
            Self::ById => "pokemon.by_id",
            Self::ByName => "pokemon.by_name",
            Self::CompleteById => "pokemon.complete_by_id",
            Self::CompleteByName => "pokemon.complete_by_name",
        }
    }
}

pub struct PokemonQueries<'a> {
    cache: StatementCache<'a, PokemonStmt>,
}

impl<'a> PokemonQueries<'a> {
    pub fn new(conn: &'a Connection) -> Result<Self> {
        let mut cache = StatementCache::new(conn, "pokemon");
        let columns = Pokemon::COLUMNS;

        cache.prepare(
            PokemonStmt::ById,
            format!("SELECT {columns} FROM pokemon p WHERE p.id = ?1"),
        )?;
        cache.prepare(
            PokemonStmt::ByName,
            format!("SELECT {columns} FROM pokemon p WHERE LOWER(p.name) = ?1"),
        )?;
        cache.prepare(PokemonStmt::CompleteById, complete_sql("p.id = ?1"))?;
        cache.prepare(
            PokemonStmt::CompleteByName,
            complete_sql("LOWER(p.name) = ?1"),
        )?;
        Ok(Self { cache })
    }

    /// Look up by id when `identifier` is all digits, otherwise by name
    /// (case-insensitive). `Ok(None)` when nothing matches.
    pub fn get_pokemon(&self, identifier: &str) -> Result<Option<Pokemon>> {
        let (key, param) = resolve(identifier, PokemonStmt::ById, PokemonStmt::ByName);
        let mut stmt = self.cache.get(key)?;
        let found = stmt
            .query_row(params![param], Pokemon::from_row)
            .optional()?;
        Ok(found)
    }

    /// Raw rows of the single stats/types/abilities join, ordered by
    /// (stat name, type slot, ability slot). Empty when nothing matches.
    pub fn get_pokemon_complete_rows(&self, identifier: &str) -> Result<Vec<CompleteRow>> {
        let (key, param) = resolve(
            identifier,
            PokemonStmt::CompleteById,
            PokemonStmt::CompleteByName,
        );
        let mut stmt = self.cache.get(key)?;
        let rows = stmt.query_map(params![param], CompleteRow::from_row)?;
        let rows = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        tracing::debug!(identifier, rows = rows.len(), "complete pokemon join");
        Ok(rows)
    }

    pub fn get_pokemon_complete(&self, identifier: &str) -> Result<Option<PokemonDetail>> {
        let rows = self.get_pokemon_complete_rows(identifier)?;
        Ok(reconstruct(&rows))
    }
}

fn resolve(identifier: &str, by_id: PokemonStmt, by_name: PokemonStmt) -> (PokemonStmt, Value) {
    match Identifier::parse(identifier) {
        Identifier::Id(id) => (by_id, Value::Integer(id)),
        Identifier::Name(name) => (by_name, Value::Text(name)),
    }
}

fn complete_sql(predicate: &str) -> String {
    format!(
        "SELECT {columns},
                s.stat_name, s.base_stat, s.effort,
                pt.slot, t.name,
                pa.slot, a.name, pa.is_hidden
         FROM pokemon p
         LEFT JOIN stats s ON s.pokemon_id = p.id
         {type_join}
         {ability_join}
         WHERE {predicate}
         ORDER BY s.stat_name, pt.slot, pa.slot",
        columns = Pokemon::COLUMNS,
        type_join = types::join_fragment("p.id"),
        ability_join = abilities::join_fragment("p.id"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulbasaur() -> Pokemon {
        Pokemon {
            id: 1,
            name: "bulbasaur".into(),
            height: 7,
            weight: 69,
            base_experience: 64,
            generation: 1,
            sprite_url: String::new(),
            species_url: String::new(),
        }
    }

    fn row(
        stat: Option<(&str, i64)>,
        ty: Option<(i64, &str)>,
        ability: Option<(i64, &str, bool)>,
    ) -> CompleteRow {
        CompleteRow {
            pokemon: bulbasaur(),
            stat_name: stat.map(|(n, _)| n.to_string()),
            base_stat: stat.map(|(_, v)| v),
            effort: stat.map(|_| 0),
            type_slot: ty.map(|(s, _)| s),
            type_name: ty.map(|(_, n)| n.to_string()),
            ability_slot: ability.map(|(s, _, _)| s),
            ability_name: ability.map(|(_, n, _)| n.to_string()),
            ability_hidden: ability.map(|(_, _, h)| h),
        }
    }

    /// Full cartesian product, in the order the join query sorts it
    /// (alphabetical stat names, then slots).
    fn fan_out_rows() -> Vec<CompleteRow> {
        let stats = [
            ("attack", 49),
            ("defense", 49),
            ("hp", 45),
            ("special-attack", 65),
            ("special-defense", 65),
            ("speed", 45),
        ];
        let types = [(1, "grass"), (2, "poison")];
        let abilities = [(1, "overgrow", false), (3, "chlorophyll", true)];

        let mut rows = Vec::new();
        for s in stats {
            for t in types {
                for a in abilities {
                    rows.push(row(Some(s), Some(t), Some(a)));
                }
            }
        }
        rows
    }

    #[test]
    fn empty_rows_is_not_found() {
        assert!(reconstruct(&[]).is_none());
    }

    #[test]
    fn fan_out_collapses_to_each_relation_once() {
        let rows = fan_out_rows();
        assert_eq!(rows.len(), 24);

        let detail = reconstruct(&rows).unwrap();
        assert_eq!(detail.stats.len(), 6);
        assert_eq!(detail.types.len(), 2);
        assert_eq!(detail.abilities.len(), 2);
        assert_eq!(detail.total(), 318);
        assert_eq!(detail.type_names(), vec!["grass", "poison"]);
        assert_eq!(detail.abilities[0].name, "overgrow");
        assert!(!detail.abilities[0].is_hidden);
        assert_eq!(detail.abilities[1].name, "chlorophyll");
        assert!(detail.abilities[1].is_hidden);
    }

    #[test]
    fn stats_come_out_in_canonical_order_regardless_of_row_order() {
        let mut rows = fan_out_rows();
        rows.reverse();
        let detail = reconstruct(&rows).unwrap();
        let names: Vec<StatName> = detail.stats.iter().map(|s| s.name).collect();
        assert_eq!(names, StatName::CANONICAL.to_vec());
    }

    #[test]
    fn slots_sorted_ascending_regardless_of_row_order() {
        let rows = vec![
            row(None, Some((2, "poison")), Some((3, "chlorophyll", true))),
            row(None, Some((1, "grass")), Some((1, "overgrow", false))),
        ];
        let detail = reconstruct(&rows).unwrap();
        assert_eq!(detail.type_names(), vec!["grass", "poison"]);
        assert_eq!(detail.abilities[0].slot, 1);
        assert_eq!(detail.abilities[1].slot, 3);
    }

    #[test]
    fn first_occurrence_wins() {
        let rows = vec![
            row(Some(("hp", 45)), Some((1, "grass")), Some((1, "overgrow", false))),
            row(Some(("hp", 99)), Some((1, "fire")), Some((1, "blaze", true))),
        ];
        let detail = reconstruct(&rows).unwrap();
        assert_eq!(detail.stats[0].base_stat, 45);
        assert_eq!(detail.types[0].name, "grass");
        assert_eq!(detail.abilities[0].name, "overgrow");
        assert!(!detail.abilities[0].is_hidden);
    }

    #[test]
    fn missing_and_unknown_stats_are_not_fabricated() {
        let rows = vec![
            row(Some(("speed", 45)), None, None),
            row(Some(("accuracy", 100)), None, None),
            row(Some(("hp", 45)), None, None),
        ];
        let detail = reconstruct(&rows).unwrap();
        let names: Vec<StatName> = detail.stats.iter().map(|s| s.name).collect();
        assert_eq!(names, vec![StatName::Hp, StatName::Speed]);
    }

    #[test]
    fn all_null_relations_yield_bare_pokemon() {
        let detail = reconstruct(&[row(None, None, None)]).unwrap();
        assert_eq!(detail.pokemon.name, "bulbasaur");
        assert!(detail.stats.is_empty());
        assert!(detail.types.is_empty());
        assert!(detail.abilities.is_empty());
    }

    #[test]
    fn stat_names_round_trip() {
        for stat in StatName::CANONICAL {
            assert_eq!(StatName::from_stored(stat.as_str()), Some(stat));
        }
        assert_eq!(StatName::from_stored("sp-attack"), None);
    }
}
