use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::queries::{abilities, types};
use crate::sql::{BuiltQuery, Fragment, SelectBuilder};
use crate::statements::prepare_dynamic;

pub const DEFAULT_SEARCH_LIMIT: i64 = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchFilters {
    /// Type name, case-insensitive.
    pub tag: Option<String>,
    /// Ability name, case-insensitive.
    pub ability: Option<String>,
    pub generation: Option<i64>,
    /// Minimum sum of base stats.
    pub min_total: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub id: i64,
    pub name: String,
    pub generation: i64,
    pub types: Vec<String>,
}

/// Split the comma-joined type list produced by `GROUP_CONCAT`.
pub fn split_type_list(joined: Option<&str>) -> Vec<String> {
    joined
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Join onto per-pokemon stat totals, keeping only totals >= `min_total`.
fn min_total_join(min_total: i64) -> Fragment {
    Fragment::new(
        "JOIN (SELECT pokemon_id, SUM(base_stat) AS total FROM stats \
         GROUP BY pokemon_id HAVING SUM(base_stat) >= ?) totals \
         ON totals.pokemon_id = p.id",
    )
    .bind(min_total)
}

fn apply_filters(mut q: SelectBuilder, filters: &SearchFilters) -> SelectBuilder {
    if let Some(min_total) = filters.min_total {
        q = q.join(min_total_join(min_total));
    }
    if let Some(tag) = &filters.tag {
        q = q.filter(types::exists_fragment("p.id", tag));
    }
    if let Some(ability) = &filters.ability {
        q = q.filter(abilities::exists_fragment("p.id", ability));
    }
    if let Some(generation) = filters.generation {
        q = q.filter(Fragment::new("p.generation = ?").bind(generation));
    }
    q
}

/// Matching pokemon ordered by id. The type filter is an EXISTS predicate,
/// so the displayed type list still shows every type the pokemon has.
pub fn build_search_query(filters: &SearchFilters, default_limit: i64) -> BuiltQuery {
    let q = SelectBuilder::from("pokemon p")
        .column("p.id")
        .column("p.name")
        .column("p.generation")
        .column("GROUP_CONCAT(t.name, ',' ORDER BY pt.slot) AS types")
        .join(types::join_fragment("p.id"));

    apply_filters(q, filters)
        .group_by("p.id")
        .order_by("p.id")
        .limit(filters.limit.unwrap_or(default_limit))
        .build()
}

/// Same filters as [`build_search_query`], no limit, distinct pokemon ids.
pub fn build_count_query(filters: &SearchFilters) -> BuiltQuery {
    let q = SelectBuilder::from("pokemon p")
        .column("COUNT(DISTINCT p.id)")
        .join(types::join_fragment("p.id"));
    apply_filters(q, filters).build()
}

pub struct SearchQueries<'a> {
    conn: &'a Connection,
    default_limit: i64,
}

impl<'a> SearchQueries<'a> {
    pub fn new(conn: &'a Connection, default_limit: i64) -> Self {
        Self {
            conn,
            default_limit,
        }
    }

    pub fn search(&self, filters: &SearchFilters) -> Result<Vec<SearchHit>> {
        let query = build_search_query(filters, self.default_limit);
        let mut stmt = prepare_dynamic(self.conn, "search", &query)?;
        let rows = stmt.query_map(params_from_iter(query.params.iter()), |row| {
            let joined: Option<String> = row.get(3)?;
            Ok(SearchHit {
                id: row.get(0)?,
                name: row.get(1)?,
                generation: row.get(2)?,
                types: split_type_list(joined.as_deref()),
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    pub fn count(&self, filters: &SearchFilters) -> Result<i64> {
        let query = build_count_query(filters);
        let mut stmt = prepare_dynamic(self.conn, "search", &query)?;
        let n = stmt.query_row(params_from_iter(query.params.iter()), |row| row.get(0))?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Value;

    #[test]
    fn split_trims_and_drops_empties() {
        assert_eq!(split_type_list(Some("grass, poison")), vec!["grass", "poison"]);
        assert_eq!(split_type_list(Some("fire")), vec!["fire"]);
        assert!(split_type_list(None).is_empty());
        assert!(split_type_list(Some("")).is_empty());
    }

    #[test]
    fn unfiltered_search_is_ordered_by_id_with_default_limit() {
        let q = build_search_query(&SearchFilters::default(), 20);
        assert!(q.sql.ends_with("GROUP BY p.id ORDER BY p.id LIMIT ?"));
        assert!(!q.sql.contains(" WHERE "));
        assert_eq!(q.params, vec![Value::Integer(20)]);
    }

    #[test]
    fn min_total_join_binds_before_where_params() {
        let filters = SearchFilters {
            tag: Some("GRASS".into()),
            generation: Some(1),
            min_total: Some(318),
            limit: Some(5),
            ..Default::default()
        };
        let q = build_search_query(&filters, 20);
        assert!(q.sql.contains("HAVING SUM(base_stat) >= ?) totals"));
        assert_eq!(
            q.params,
            vec![
                Value::Integer(318),
                Value::Text("grass".into()),
                Value::Integer(1),
                Value::Integer(5),
            ]
        );
    }

    #[test]
    fn count_is_distinct_and_unlimited() {
        let filters = SearchFilters {
            tag: Some("grass".into()),
            limit: Some(5),
            ..Default::default()
        };
        let q = build_count_query(&filters);
        assert!(q.sql.starts_with("SELECT COUNT(DISTINCT p.id) FROM pokemon p"));
        assert!(!q.sql.contains("LIMIT"));
        assert_eq!(q.params, vec![Value::Text("grass".into())]);
    }
}
