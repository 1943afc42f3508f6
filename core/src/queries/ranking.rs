use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};

use crate::error::{DexError, Result};
use crate::queries::pokemon::StatName;
use crate::queries::types;
use crate::sql::{BuiltQuery, Fragment, SelectBuilder};
use crate::statements::{fold_case, prepare_dynamic};

pub const DEFAULT_RANK_LIMIT: i64 = 10;

/// What to rank by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    Total,
    Attack,
    Defense,
    Speed,
    SpAttack,
    SpDefense,
}

impl RankMetric {
    pub const ALL: [Self; 6] = [
        Self::Total,
        Self::Attack,
        Self::Defense,
        Self::Speed,
        Self::SpAttack,
        Self::SpDefense,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::Attack => "attack",
            Self::Defense => "defense",
            Self::Speed => "speed",
            Self::SpAttack => "sp_attack",
            Self::SpDefense => "sp_defense",
        }
    }

    pub fn parse(token: &str) -> Result<Self> {
        let folded = fold_case(token);
        Self::ALL
            .into_iter()
            .find(|m| m.token() == folded)
            .ok_or_else(|| {
                let accepted: Vec<&str> = Self::ALL.iter().map(|m| m.token()).collect();
                DexError::InvalidCriteria(format!(
                    "unknown ranking metric '{token}' (expected one of: {})",
                    accepted.join(", ")
                ))
            })
    }

    /// Value matched against `stats.stat_name`; `None` for `Total`.
    ///
    /// By default the name is derived from the token by swapping `_` for
    /// `-`, which turns `sp_attack` into `sp-attack`. No stored stat has
    /// that name, so the two special metrics rank nothing. With
    /// `canonical_special_stats` they map to `special-attack` and
    /// `special-defense` instead.
    pub fn stat_name(self, canonical_special_stats: bool) -> Option<String> {
        match self {
            Self::Total => None,
            Self::SpAttack if canonical_special_stats => {
                Some(StatName::SpecialAttack.as_str().to_string())
            }
            Self::SpDefense if canonical_special_stats => {
                Some(StatName::SpecialDefense.as_str().to_string())
            }
            other => Some(other.token().replace('_', "-")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RankFilters {
    /// Type name, case-insensitive.
    pub tag: Option<String>,
    pub generation: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankEntry {
    pub id: i64,
    pub name: String,
    pub generation: i64,
    pub value: i64,
}

/// Build the ranking query. Sorted by the metric, descending, with no
/// tie-breaker: pokemon with equal values come back in whatever order the
/// engine produces.
pub fn build_rank_query(
    metric: RankMetric,
    filters: &RankFilters,
    default_limit: i64,
    canonical_special_stats: bool,
) -> BuiltQuery {
    let mut q = SelectBuilder::from("pokemon p")
        .column("p.id")
        .column("p.name")
        .column("p.generation")
        .join("JOIN stats s ON s.pokemon_id = p.id");

    q = match metric.stat_name(canonical_special_stats) {
        None => q.column("SUM(s.base_stat) AS value"),
        Some(stat) => q
            .column("s.base_stat AS value")
            .filter(Fragment::new("s.stat_name = ?").bind(stat)),
    };

    if let Some(tag) = &filters.tag {
        q = q.filter(types::exists_fragment("p.id", tag));
    }
    if let Some(generation) = filters.generation {
        q = q.filter(Fragment::new("p.generation = ?").bind(generation));
    }
    if metric == RankMetric::Total {
        q = q.group_by("p.id");
    }

    q.order_by("value DESC")
        .limit(filters.limit.unwrap_or(default_limit))
        .build()
}

pub struct RankingQueries<'a> {
    conn: &'a Connection,
    default_limit: i64,
    canonical_special_stats: bool,
}

impl<'a> RankingQueries<'a> {
    pub fn new(conn: &'a Connection, default_limit: i64, canonical_special_stats: bool) -> Self {
        Self {
            conn,
            default_limit,
            canonical_special_stats,
        }
    }

    /// Rank by a metric token (`total`, `attack`, ...). Fails with
    /// `InvalidCriteria` before touching the store if the token is unknown.
    pub fn rank(&self, metric: &str, filters: &RankFilters) -> Result<Vec<RankEntry>> {
        let metric = RankMetric::parse(metric)?;
        self.rank_by(metric, filters)
    }

    pub fn rank_by(&self, metric: RankMetric, filters: &RankFilters) -> Result<Vec<RankEntry>> {
        let query = build_rank_query(
            metric,
            filters,
            self.default_limit,
            self.canonical_special_stats,
        );
        let mut stmt = prepare_dynamic(self.conn, "ranking", &query)?;
        let rows = stmt.query_map(params_from_iter(query.params.iter()), |row| {
            Ok(RankEntry {
                id: row.get(0)?,
                name: row.get(1)?,
                generation: row.get(2)?,
                value: row.get(3)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Value;

    #[test]
    fn parse_accepts_known_tokens_case_insensitively() {
        assert_eq!(RankMetric::parse("total").unwrap(), RankMetric::Total);
        assert_eq!(RankMetric::parse("SP_ATTACK").unwrap(), RankMetric::SpAttack);
    }

    #[test]
    fn parse_rejects_unknown_tokens() {
        for bad in ["hp", "special-attack", "", "totals"] {
            match RankMetric::parse(bad) {
                Err(DexError::InvalidCriteria(msg)) => assert!(msg.contains("total")),
                other => panic!("expected InvalidCriteria for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn special_metrics_keep_naive_stat_names_by_default() {
        assert_eq!(RankMetric::SpAttack.stat_name(false).as_deref(), Some("sp-attack"));
        assert_eq!(RankMetric::SpDefense.stat_name(false).as_deref(), Some("sp-defense"));
        assert_eq!(RankMetric::Attack.stat_name(false).as_deref(), Some("attack"));
        assert_eq!(RankMetric::Total.stat_name(false), None);
    }

    #[test]
    fn canonical_mapping_is_opt_in() {
        assert_eq!(
            RankMetric::SpAttack.stat_name(true).as_deref(),
            Some("special-attack")
        );
        assert_eq!(
            RankMetric::SpDefense.stat_name(true).as_deref(),
            Some("special-defense")
        );
        assert_eq!(RankMetric::Speed.stat_name(true).as_deref(), Some("speed"));
    }

    #[test]
    fn total_query_groups_and_sums() {
        let q = build_rank_query(RankMetric::Total, &RankFilters::default(), 10, false);
        assert_eq!(
            q.sql,
            "SELECT p.id, p.name, p.generation, SUM(s.base_stat) AS value \
             FROM pokemon p JOIN stats s ON s.pokemon_id = p.id \
             GROUP BY p.id ORDER BY value DESC LIMIT ?"
        );
        assert_eq!(q.params, vec![Value::Integer(10)]);
    }

    #[test]
    fn stat_query_with_all_filters_keeps_param_order() {
        let filters = RankFilters {
            tag: Some("Fire".into()),
            generation: Some(1),
            limit: Some(3),
        };
        let q = build_rank_query(RankMetric::Speed, &filters, 10, false);
        assert!(q.sql.contains("WHERE s.stat_name = ? AND EXISTS ("));
        assert!(q.sql.ends_with("AND p.generation = ? ORDER BY value DESC LIMIT ?"));
        assert!(!q.sql.contains("GROUP BY"));
        assert_eq!(
            q.params,
            vec![
                Value::Text("speed".into()),
                Value::Text("fire".into()),
                Value::Integer(1),
                Value::Integer(3),
            ]
        );
    }
}
