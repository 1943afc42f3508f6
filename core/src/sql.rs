use rusqlite::types::Value;

// ---------------------------------------------------------------------------
// Fragment: a piece of SQL plus the values for its `?` placeholders
// ---------------------------------------------------------------------------

/// SQL text with its bound values, in placeholder order.
///
/// Fragments use anonymous `?` placeholders only. Because every fragment
/// carries its own values and the builder concatenates fragments and values
/// in the same order, placeholder N always lines up with value N.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Fragment {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

/// Final SQL text and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

// ---------------------------------------------------------------------------
// SelectBuilder
// ---------------------------------------------------------------------------

/// Accumulates the clauses of one SELECT. Optional filters are added by
/// pushing fragments; `build` renders clauses in SQL order and gathers the
/// parameters in that same order.
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    columns: Vec<String>,
    from: String,
    joins: Vec<Fragment>,
    conditions: Vec<Fragment>,
    group_by: Vec<String>,
    having: Vec<Fragment>,
    order_by: Vec<String>,
    limit: Option<i64>,
}

impl SelectBuilder {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            columns: Vec::new(),
            from: table.into(),
            joins: Vec::new(),
            conditions: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn column(mut self, expr: impl Into<String>) -> Self {
        self.columns.push(expr.into());
        self
    }

    /// Full join clause, e.g. `"LEFT JOIN types t ON t.id = pt.type_id"`.
    pub fn join(mut self, fragment: impl Into<Fragment>) -> Self {
        self.joins.push(fragment.into());
        self
    }

    /// One predicate; predicates are AND-ed together.
    pub fn filter(mut self, fragment: impl Into<Fragment>) -> Self {
        self.conditions.push(fragment.into());
        self
    }

    pub fn group_by(mut self, expr: impl Into<String>) -> Self {
        self.group_by.push(expr.into());
        self
    }

    pub fn having(mut self, fragment: impl Into<Fragment>) -> Self {
        self.having.push(fragment.into());
        self
    }

    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by.push(expr.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn build(self) -> BuiltQuery {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.columns.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(&self.from);

        for join in self.joins {
            sql.push(' ');
            sql.push_str(&join.sql);
            params.extend(join.params);
        }

        append_predicates(&mut sql, &mut params, " WHERE ", self.conditions);

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        append_predicates(&mut sql, &mut params, " HAVING ", self.having);

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            params.push(Value::Integer(limit));
        }

        debug_assert_eq!(
            sql.matches('?').count(),
            params.len(),
            "placeholder/parameter mismatch in: {sql}"
        );

        BuiltQuery { sql, params }
    }
}

fn append_predicates(
    sql: &mut String,
    params: &mut Vec<Value>,
    keyword: &str,
    predicates: Vec<Fragment>,
) {
    for (i, predicate) in predicates.into_iter().enumerate() {
        sql.push_str(if i == 0 { keyword } else { " AND " });
        sql.push_str(&predicate.sql);
        params.extend(predicate.params);
    }
}

impl From<&str> for Fragment {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for Fragment {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_select() {
        let q = SelectBuilder::from("pokemon p")
            .column("p.id")
            .column("p.name")
            .order_by("p.id")
            .build();
        assert_eq!(q.sql, "SELECT p.id, p.name FROM pokemon p ORDER BY p.id");
        assert!(q.params.is_empty());
    }

    #[test]
    fn params_follow_clause_order_not_call_order() {
        // Filters are pushed before the join, but the join renders first,
        // so its value must come first too.
        let q = SelectBuilder::from("pokemon p")
            .column("p.id")
            .filter(Fragment::new("p.generation = ?").bind(1_i64))
            .join(Fragment::new("JOIN (SELECT pokemon_id FROM stats WHERE base_stat >= ?) s ON s.pokemon_id = p.id").bind(100_i64))
            .having(Fragment::new("COUNT(*) > ?").bind(0_i64))
            .group_by("p.id")
            .limit(5)
            .build();

        assert_eq!(
            q.sql,
            "SELECT p.id FROM pokemon p \
             JOIN (SELECT pokemon_id FROM stats WHERE base_stat >= ?) s ON s.pokemon_id = p.id \
             WHERE p.generation = ? GROUP BY p.id HAVING COUNT(*) > ? LIMIT ?"
        );
        assert_eq!(
            q.params,
            vec![
                Value::Integer(100),
                Value::Integer(1),
                Value::Integer(0),
                Value::Integer(5)
            ]
        );
    }

    #[test]
    fn multiple_filters_are_anded() {
        let q = SelectBuilder::from("pokemon p")
            .column("p.id")
            .filter(Fragment::new("LOWER(p.name) = ?").bind("bulbasaur".to_string()))
            .filter("p.height > 0")
            .build();
        assert_eq!(
            q.sql,
            "SELECT p.id FROM pokemon p WHERE LOWER(p.name) = ? AND p.height > 0"
        );
        assert_eq!(q.params, vec![Value::Text("bulbasaur".into())]);
    }

    #[test]
    fn fragment_counts_placeholders() {
        let f = Fragment::new("a = ? AND b = ?").bind(1_i64).bind(2_i64);
        assert_eq!(f.placeholder_count(), f.params.len());
    }
}
