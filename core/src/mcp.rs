use std::sync::{Arc, Mutex};

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::schemars::JsonSchema;
use rmcp::{ServerHandler, tool, tool_handler, tool_router};
use serde::Deserialize;

use crate::db::Database;
use crate::present::OutputFormat;
use crate::queries::abilities::AbilityQueries;
use crate::queries::pokemon::PokemonQueries;
use crate::queries::ranking::{RankFilters, RankingQueries};
use crate::queries::search::{SearchFilters, SearchQueries};
use crate::queries::types::TypeQueries;
use crate::queries::QueryOptions;
use crate::validate::{validate_rank, validate_search, Validation};

/// Limit for the by-type / by-ability listings when the caller gives none.
const DEFAULT_MEMBER_LIMIT: i64 = 50;

// ---------------------------------------------------------------------------
// Parameter structs: doc comments surface as descriptions in the MCP
// JSON Schema.
// ---------------------------------------------------------------------------

#[derive(Deserialize, JsonSchema)]
pub struct GetPokemonParams {
    /// Pokedex number (e.g. "25") or name, case-insensitive (e.g. "Pikachu")
    pub identifier: String,
    /// Output format: "text" (default) or "json"
    pub format: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct SearchPokemonParams {
    /// Only pokemon having this type (e.g. "grass")
    pub tag: Option<String>,
    /// Only pokemon having this ability (e.g. "overgrow")
    pub ability: Option<String>,
    /// Only pokemon from this generation (1-9)
    pub generation: Option<i64>,
    /// Minimum base stat total (0-1530)
    pub min_total: Option<i64>,
    /// Max results (1-100, default 20)
    pub limit: Option<i64>,
    /// Output format: "text" (default) or "json"
    pub format: Option<String>,
}

impl SearchPokemonParams {
    fn filters(&self) -> SearchFilters {
        SearchFilters {
            tag: self.tag.clone(),
            ability: self.ability.clone(),
            generation: self.generation,
            min_total: self.min_total,
            limit: self.limit,
        }
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct RankPokemonParams {
    /// One of: total, attack, defense, speed, sp_attack, sp_defense
    pub metric: String,
    /// Only pokemon having this type
    pub tag: Option<String>,
    /// Only pokemon from this generation (1-9)
    pub generation: Option<i64>,
    /// Max results (1-100, default 10)
    pub limit: Option<i64>,
    /// Output format: "text" (default) or "json"
    pub format: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct ListTypesParams {
    /// Output format: "text" (default) or "json"
    pub format: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct RelationMembersParams {
    /// Type or ability name, case-insensitive
    pub name: String,
    /// Max results (1-100, default 50)
    pub limit: Option<i64>,
    /// Output format: "text" (default) or "json"
    pub format: Option<String>,
}

fn reject_invalid(tool: &str, validation: Validation) -> Result<(), String> {
    if validation.valid {
        return Ok(());
    }
    tracing::warn!(tool, errors = ?validation.errors, "rejected invalid filters");
    Err(format!("invalid filters: {}", validation.errors.join("; ")))
}

// ---------------------------------------------------------------------------
// DexServer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct DexServer {
    db: Arc<Mutex<Database>>,
    options: QueryOptions,
    tool_router: ToolRouter<Self>,
}

impl DexServer {
    pub fn new(db: Arc<Mutex<Database>>, options: QueryOptions) -> Self {
        Self {
            db,
            options,
            tool_router: Self::tool_router(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tool definitions: #[tool_router] generates Self::tool_router()
// ---------------------------------------------------------------------------

#[tool_router]
impl DexServer {
    #[tool(description = "Look up a pokemon by pokedex number or name. Returns its basic attributes (height, weight, base experience, generation).")]
    fn get_pokemon(
        &self,
        Parameters(params): Parameters<GetPokemonParams>,
    ) -> Result<String, String> {
        let found = {
            let db = self.db.lock().map_err(|e| format!("lock error: {e}"))?;
            let queries =
                PokemonQueries::new(db.conn()).map_err(|e| format!("query error: {e}"))?;
            queries
                .get_pokemon(&params.identifier)
                .map_err(|e| format!("query error: {e}"))?
        };
        let pokemon = found.ok_or_else(|| format!("pokemon '{}' not found", params.identifier))?;
        Ok(OutputFormat::parse(params.format.as_deref())
            .presenter()
            .pokemon(&pokemon))
    }

    #[tool(description = "Full pokemon record in one lookup: attributes, the six base stats in canonical order with their total, types by slot, and abilities by slot with hidden flags.")]
    fn get_pokemon_details(
        &self,
        Parameters(params): Parameters<GetPokemonParams>,
    ) -> Result<String, String> {
        let found = {
            let db = self.db.lock().map_err(|e| format!("lock error: {e}"))?;
            let queries =
                PokemonQueries::new(db.conn()).map_err(|e| format!("query error: {e}"))?;
            queries
                .get_pokemon_complete(&params.identifier)
                .map_err(|e| format!("query error: {e}"))?
        };
        let detail = found.ok_or_else(|| format!("pokemon '{}' not found", params.identifier))?;
        Ok(OutputFormat::parse(params.format.as_deref())
            .presenter()
            .detail(&detail))
    }

    #[tool(description = "Search pokemon by type, ability, generation, and minimum base stat total. All filters optional; results are ordered by pokedex number. Includes the total match count.")]
    fn search_pokemon(
        &self,
        Parameters(params): Parameters<SearchPokemonParams>,
    ) -> Result<String, String> {
        let filters = params.filters();
        reject_invalid("search_pokemon", validate_search(&filters))?;

        let (hits, total) = {
            let db = self.db.lock().map_err(|e| format!("lock error: {e}"))?;
            let queries = SearchQueries::new(db.conn(), self.options.search_default_limit);
            let hits = queries
                .search(&filters)
                .map_err(|e| format!("search error: {e}"))?;
            let total = queries
                .count(&filters)
                .map_err(|e| format!("search error: {e}"))?;
            (hits, total)
        };
        Ok(OutputFormat::parse(params.format.as_deref())
            .presenter()
            .search(&hits, Some(total)))
    }

    #[tool(description = "Count pokemon matching the same filters as search_pokemon, without a limit.")]
    fn count_pokemon(
        &self,
        Parameters(params): Parameters<SearchPokemonParams>,
    ) -> Result<String, String> {
        let filters = params.filters();
        reject_invalid("count_pokemon", validate_search(&filters))?;

        let count = {
            let db = self.db.lock().map_err(|e| format!("lock error: {e}"))?;
            SearchQueries::new(db.conn(), self.options.search_default_limit)
                .count(&filters)
                .map_err(|e| format!("search error: {e}"))?
        };
        Ok(format!("{{\"count\": {count}}}"))
    }

    #[tool(description = "Top pokemon by a stat metric (total, attack, defense, speed, sp_attack, sp_defense), highest first, optionally within a type and/or generation. Ties have no defined order.")]
    fn rank_pokemon(
        &self,
        Parameters(params): Parameters<RankPokemonParams>,
    ) -> Result<String, String> {
        let filters = RankFilters {
            tag: params.tag.clone(),
            generation: params.generation,
            limit: params.limit,
        };
        reject_invalid("rank_pokemon", validate_rank(&filters))?;

        let entries = {
            let db = self.db.lock().map_err(|e| format!("lock error: {e}"))?;
            RankingQueries::new(
                db.conn(),
                self.options.rank_default_limit,
                self.options.canonical_special_stats,
            )
            .rank(&params.metric, &filters)
            .map_err(|e| format!("ranking error: {e}"))?
        };
        Ok(OutputFormat::parse(params.format.as_deref())
            .presenter()
            .ranking(&params.metric, &entries))
    }

    #[tool(description = "List every pokemon type name known to the store.")]
    fn list_types(
        &self,
        Parameters(params): Parameters<ListTypesParams>,
    ) -> Result<String, String> {
        let names = {
            let db = self.db.lock().map_err(|e| format!("lock error: {e}"))?;
            TypeQueries::new(db.conn())
                .and_then(|q| q.all_types())
                .map_err(|e| format!("query error: {e}"))?
        };
        Ok(OutputFormat::parse(params.format.as_deref())
            .presenter()
            .names("Types", &names))
    }

    #[tool(description = "List pokemon that have the given type, ordered by pokedex number, with the slot the type occupies.")]
    fn pokemon_by_type(
        &self,
        Parameters(params): Parameters<RelationMembersParams>,
    ) -> Result<String, String> {
        let members = {
            let db = self.db.lock().map_err(|e| format!("lock error: {e}"))?;
            let queries = TypeQueries::new(db.conn()).map_err(|e| format!("query error: {e}"))?;
            if !queries
                .type_exists(&params.name)
                .map_err(|e| format!("query error: {e}"))?
            {
                return Err(format!("type '{}' not found", params.name));
            }
            queries
                .pokemon_by_type(&params.name, params.limit.unwrap_or(DEFAULT_MEMBER_LIMIT))
                .map_err(|e| format!("query error: {e}"))?
        };
        Ok(OutputFormat::parse(params.format.as_deref())
            .presenter()
            .members("type", &params.name, &members))
    }

    #[tool(description = "List pokemon that have the given ability, ordered by pokedex number, with the slot the ability occupies.")]
    fn pokemon_by_ability(
        &self,
        Parameters(params): Parameters<RelationMembersParams>,
    ) -> Result<String, String> {
        let members = {
            let db = self.db.lock().map_err(|e| format!("lock error: {e}"))?;
            let queries =
                AbilityQueries::new(db.conn()).map_err(|e| format!("query error: {e}"))?;
            if !queries
                .ability_exists(&params.name)
                .map_err(|e| format!("query error: {e}"))?
            {
                return Err(format!("ability '{}' not found", params.name));
            }
            queries
                .pokemon_by_ability(&params.name, params.limit.unwrap_or(DEFAULT_MEMBER_LIMIT))
                .map_err(|e| format!("query error: {e}"))?
        };
        Ok(OutputFormat::parse(params.format.as_deref())
            .presenter()
            .members("ability", &params.name, &members))
    }
}

// ---------------------------------------------------------------------------
// ServerHandler: #[tool_handler] wires call_tool + list_tools to the router
// ---------------------------------------------------------------------------

#[tool_handler]
impl ServerHandler for DexServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "dex: pokedex lookups over a local SQLite store. \
                 Fetch a pokemon by number or name, search by type/ability/generation/stat total, \
                 and rank by base stats."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: rmcp::model::Implementation {
                name: "dex".to_string(),
                title: Some("Dex MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
