//! Dynamic query construction with positional arguments.
//!
//! The builder is purely additive: the first condition is prefixed with
//! `WHERE`, every later one with `AND`, and `ORDER BY`/`LIMIT`/`OFFSET`
//! are appended only when supplied. Argument indices (`$1`, `$2`, ...)
//! stay in lock-step with insertion order; [`QueryBuilder::next_index`]
//! lets callers composing fragments outside the builder (hand-written SET
//! clauses) continue the same sequence without collision.

use sea_orm::{DbBackend, Statement, Value};

#[derive(Debug, Default)]
pub struct QueryBuilder {
    conditions: Vec<String>,
    values: Vec<Value>,
    order_by: Option<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `<expr> $n` as a condition and records its argument.
    /// `expr` is the column plus comparison operator, e.g. `"status ="`.
    pub fn add_condition<V: Into<Value>>(&mut self, expr: &str, value: V) -> &mut Self {
        self.values.push(value.into());
        self.conditions
            .push(format!("{expr} ${}", self.values.len()));
        self
    }

    /// Like [`add_condition`](Self::add_condition) but a no-op when the
    /// value is absent, so callers never branch on "is this filter set?".
    pub fn add_optional<V: Into<Value>>(&mut self, expr: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.add_condition(expr, value);
        }
        self
    }

    /// Text-filter variant: a no-op for the empty string as well.
    pub fn add_optional_text(&mut self, expr: &str, value: &str) -> &mut Self {
        if !value.is_empty() {
            self.add_condition(expr, value.to_owned());
        }
        self
    }

    /// `IN (...)` condition; a no-op when the slice is empty.
    pub fn add_in_condition<V: Into<Value> + Clone>(
        &mut self,
        column: &str,
        values: &[V],
    ) -> &mut Self {
        if values.is_empty() {
            return self;
        }

        let mut placeholders = Vec::with_capacity(values.len());
        for value in values {
            self.values.push(value.clone().into());
            placeholders.push(format!("${}", self.values.len()));
        }
        self.conditions
            .push(format!("{column} IN ({})", placeholders.join(", ")));
        self
    }

    /// Appends a condition fragment written by the caller. The fragment
    /// must already use indices obtained from [`next_index`](Self::next_index).
    pub fn add_raw_condition(&mut self, fragment: String) -> &mut Self {
        self.conditions.push(fragment);
        self
    }

    pub fn order_by(&mut self, expr: &str) -> &mut Self {
        if !expr.is_empty() {
            self.order_by = Some(expr.to_owned());
        }
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        if limit > 0 {
            self.values.push(Value::from(limit as i64));
            self.limit = Some(self.values.len() as u64);
        }
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        if offset > 0 {
            self.values.push(Value::from(offset as i64));
            self.offset = Some(self.values.len() as u64);
        }
        self
    }

    /// The positional index the next recorded argument will receive.
    pub fn next_index(&self) -> usize {
        self.values.len() + 1
    }

    /// Records an argument for a fragment composed outside the builder.
    pub fn push_value<V: Into<Value>>(&mut self, value: V) -> &mut Self {
        self.values.push(value.into());
        self
    }

    /// The accumulated `WHERE`/`AND` predicate, empty when no conditions
    /// were added.
    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    /// Predicate plus ordering and pagination, ready to append to a base
    /// query.
    pub fn suffix(&self) -> String {
        let mut sql = self.where_clause();
        if let Some(order) = &self.order_by {
            sql.push_str(&format!(" ORDER BY {order}"));
        }
        if let Some(idx) = self.limit {
            sql.push_str(&format!(" LIMIT ${idx}"));
        }
        if let Some(idx) = self.offset {
            sql.push_str(&format!(" OFFSET ${idx}"));
        }
        sql
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Builds a full statement from a base query (e.g. `SELECT * FROM
    /// tenants`) plus the accumulated suffix and arguments.
    pub fn build(self, base: &str, backend: DbBackend) -> Statement {
        let sql = format!("{base}{}", self.suffix());
        Statement::from_sql_and_values(backend, sql, self.values)
    }
}
