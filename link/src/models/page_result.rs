use crate::coerce::{Row, TypedValue};

use super::column::Column;

/// One page of a cursor (or a whole direct result), already coerced.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub rows: Vec<Row>,
    pub schema: Vec<Column>,
    pub page_num: u32,
    pub page_size: u32,
    pub total: u64,
}

impl PageResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get column names from schema
    pub fn column_names(&self) -> Vec<String> {
        self.schema.iter().map(|c| c.name.clone()).collect()
    }

    /// Value at `(row, column name)`, if both exist
    pub fn value(&self, row_idx: usize, column: &str) -> Option<&TypedValue> {
        let col_idx = self.schema.iter().position(|c| c.name == column)?;
        self.rows.get(row_idx)?.get(col_idx)
    }
}
