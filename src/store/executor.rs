//! Executor trait definition.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use super::{StoreError, StoreResult};
use crate::sql::{Dialect, Statement, Value};

/// One result row, in SELECT list order.
pub type Row = Vec<Value>;

/// Runs compiled statements against a store.
///
/// Implementations bind `statement.params` to the placeholders in
/// `statement.sql`; the SQL text never carries user values.
#[async_trait]
pub trait Executor: Send + Sync {
    /// The dialect statements for this store must be rendered in.
    fn dialect(&self) -> Dialect;

    /// Run a query and return every row.
    async fn fetch_rows(&self, statement: &Statement) -> StoreResult<Vec<Row>>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&self, statement: &Statement) -> StoreResult<u64>;

    /// Run a query whose first column is an artist id.
    async fn fetch_ids(&self, statement: &Statement) -> StoreResult<Vec<Uuid>> {
        self.fetch_rows(statement)
            .await?
            .iter()
            .map(|row| row.uuid_at(0))
            .collect()
    }

    /// Run a single-value count query.
    async fn fetch_count(&self, statement: &Statement) -> StoreResult<u64> {
        let rows = self.fetch_rows(statement).await?;
        match rows.first() {
            Some(row) => Ok(row.required_int_at(0)?.max(0) as u64),
            None => Ok(0),
        }
    }
}

static NULL_VALUE: Value = Value::Null;

/// Positional accessors over a fetched row. Missing columns read as NULL.
pub trait RowExt {
    fn value_at(&self, idx: usize) -> &Value;

    fn uuid_at(&self, idx: usize) -> StoreResult<Uuid> {
        let value = self.value_at(idx);
        value.as_uuid().ok_or_else(|| StoreError::Decode {
            column: idx,
            value: value.clone(),
        })
    }

    fn required_int_at(&self, idx: usize) -> StoreResult<i64> {
        let value = self.value_at(idx);
        value.as_i64().ok_or_else(|| StoreError::Decode {
            column: idx,
            value: value.clone(),
        })
    }

    fn text_at(&self, idx: usize) -> Option<String> {
        self.value_at(idx).clone().into_opt_string()
    }

    fn int_at(&self, idx: usize) -> Option<i64> {
        self.value_at(idx).as_i64()
    }

    fn float_at(&self, idx: usize) -> Option<f64> {
        self.value_at(idx).as_f64()
    }

    fn bool_at(&self, idx: usize) -> bool {
        self.value_at(idx).as_bool().unwrap_or(false)
    }

    fn timestamp_at(&self, idx: usize) -> Option<NaiveDateTime> {
        self.value_at(idx).as_timestamp()
    }
}

impl RowExt for [Value] {
    fn value_at(&self, idx: usize) -> &Value {
        self.get(idx).unwrap_or(&NULL_VALUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_accessors() {
        let id = Uuid::new_v4();
        let row: Row = vec![
            Value::Text(id.to_string()),
            Value::Int(3),
            Value::Null,
            Value::Text("2024-05-01 12:00:00".into()),
        ];
        assert_eq!(row.uuid_at(0).unwrap(), id);
        assert_eq!(row.int_at(1), Some(3));
        assert!(row.bool_at(1));
        assert_eq!(row.text_at(2), None);
        assert_eq!(
            row.timestamp_at(3).map(|t| t.to_string()),
            Some("2024-05-01 12:00:00".to_string())
        );
        assert_eq!(row.text_at(9), None);
        assert!(matches!(row.uuid_at(1), Err(StoreError::Decode { column: 1, .. })));
    }
}
