//! Read-side query layer over the pokedex store.
//!
//! Each submodule prepares its fixed statements once in `new` and reuses
//! them for its lifetime. Search and ranking assemble SQL per call through
//! [`crate::sql::SelectBuilder`] and rely on the connection's statement
//! cache to compile each query shape once.
//!
//! Nothing here locks. Share a [`crate::db::Database`] across threads only
//! behind the caller's own synchronization.

pub mod abilities;
pub mod pokemon;
pub mod ranking;
pub mod search;
pub mod types;

use crate::db::{Database, Pokemon};
use crate::error::Result;

use self::abilities::AbilityQueries;
use self::pokemon::{PokemonDetail, PokemonQueries};
use self::ranking::{RankEntry, RankFilters, RankingQueries, DEFAULT_RANK_LIMIT};
use self::search::{SearchFilters, SearchHit, SearchQueries, DEFAULT_SEARCH_LIMIT};
use self::types::TypeQueries;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub search_default_limit: i64,
    pub rank_default_limit: i64,
    /// Map `sp_attack`/`sp_defense` ranking metrics to the stored
    /// `special-*` stat names instead of the naive `sp-*` derivation.
    pub canonical_special_stats: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            search_default_limit: DEFAULT_SEARCH_LIMIT,
            rank_default_limit: DEFAULT_RANK_LIMIT,
            canonical_special_stats: false,
        }
    }
}

/// All query modules bound to one database.
pub struct Dex<'a> {
    pub pokemon: PokemonQueries<'a>,
    pub types: TypeQueries<'a>,
    pub abilities: AbilityQueries<'a>,
    pub search: SearchQueries<'a>,
    pub ranking: RankingQueries<'a>,
}

impl<'a> Dex<'a> {
    pub fn new(db: &'a Database, options: QueryOptions) -> Result<Self> {
        let conn = db.conn();
        Ok(Self {
            pokemon: PokemonQueries::new(conn)?,
            types: TypeQueries::new(conn)?,
            abilities: AbilityQueries::new(conn)?,
            search: SearchQueries::new(conn, options.search_default_limit),
            ranking: RankingQueries::new(
                conn,
                options.rank_default_limit,
                options.canonical_special_stats,
            ),
        })
    }

    pub fn get_pokemon(&self, identifier: &str) -> Result<Option<Pokemon>> {
        self.pokemon.get_pokemon(identifier)
    }

    pub fn get_pokemon_complete(&self, identifier: &str) -> Result<Option<PokemonDetail>> {
        self.pokemon.get_pokemon_complete(identifier)
    }

    pub fn search(&self, filters: &SearchFilters) -> Result<Vec<SearchHit>> {
        self.search.search(filters)
    }

    pub fn count(&self, filters: &SearchFilters) -> Result<i64> {
        self.search.count(filters)
    }

    pub fn rank(&self, metric: &str, filters: &RankFilters) -> Result<Vec<RankEntry>> {
        self.ranking.rank(metric, filters)
    }
}
