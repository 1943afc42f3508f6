use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use rusqlite::{CachedStatement, Connection};

use crate::error::{DexError, Result};
use crate::sql::BuiltQuery;

// ---------------------------------------------------------------------------
// Identifier disambiguation
// ---------------------------------------------------------------------------

/// True iff `s` is non-empty and made only of ASCII decimal digits.
///
/// Every lookup that accepts "id or name" goes through this one rule.
pub fn is_numeric_identifier(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Case folding applied to every name-based comparison. Matches SQLite's
/// `LOWER()`, which only folds ASCII, so both sides of `name_matches` agree.
pub fn fold_case(s: &str) -> String {
    s.to_ascii_lowercase()
}

/// SQL predicate comparing `column` case-insensitively against one bound
/// parameter. Bind the parameter through [`fold_case`].
pub fn name_matches(column: &str) -> String {
    format!("LOWER({column}) = ?")
}

/// A resolved "id or name" identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Id(i64),
    /// Already case-folded.
    Name(String),
}

impl Identifier {
    /// Digit strings too large for an `i64` cannot be a stored primary key;
    /// they fall through to a name lookup, which will simply find nothing.
    pub fn parse(s: &str) -> Self {
        if is_numeric_identifier(s) {
            if let Ok(id) = s.parse::<i64>() {
                return Self::Id(id);
            }
        }
        Self::Name(fold_case(s))
    }
}

// ---------------------------------------------------------------------------
// StatementCache
// ---------------------------------------------------------------------------

/// Key of a statement owned by one query module.
pub trait StatementKey: Copy + Eq + Hash + Debug {
    fn name(self) -> &'static str;
}

/// Named parameterized statements for one query module.
///
/// `prepare` compiles the SQL immediately and registers it under `key`;
/// the compiled plan lives in rusqlite's per-connection statement cache, so
/// `get` hands back the already-compiled statement without re-parsing.
/// Dynamic queries go through [`prepare_dynamic`] instead.
pub struct StatementCache<'conn, K> {
    conn: &'conn Connection,
    module: &'static str,
    sql: HashMap<K, String>,
}

impl<'conn, K: StatementKey> StatementCache<'conn, K> {
    pub fn new(conn: &'conn Connection, module: &'static str) -> Self {
        Self {
            conn,
            module,
            sql: HashMap::new(),
        }
    }

    pub fn prepare(&mut self, key: K, sql: impl Into<String>) -> Result<()> {
        let sql = sql.into();
        self.conn.prepare_cached(&sql)?;
        self.sql.insert(key, sql);
        tracing::trace!(module = self.module, key = key.name(), "prepared statement");
        Ok(())
    }

    /// Fails with `StatementNotFound` if `key` was never prepared.
    pub fn get(&self, key: K) -> Result<CachedStatement<'conn>> {
        let Some(sql) = self.sql.get(&key) else {
            tracing::error!(module = self.module, key = key.name(), "statement used before prepare");
            return Err(DexError::StatementNotFound(key.name()));
        };
        Ok(self.conn.prepare_cached(sql)?)
    }

    pub fn is_prepared(&self, key: K) -> bool {
        self.sql.contains_key(&key)
    }
}

/// Compile (or fetch the cached plan for) a builder-produced query. The
/// connection caches by SQL text, so each distinct filter shape is compiled
/// once no matter which values are bound.
pub fn prepare_dynamic<'conn>(
    conn: &'conn Connection,
    module: &'static str,
    query: &BuiltQuery,
) -> Result<CachedStatement<'conn>> {
    tracing::debug!(module, sql = %query.sql, params = query.params.len(), "dynamic query");
    Ok(conn.prepare_cached(&query.sql)?)
}
