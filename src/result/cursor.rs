use std::collections::{HashMap, VecDeque};

use crate::core::Value;

/// One fetched row that can be read by position or by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorRow {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl CursorRow {
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Result of one executed statement.
///
/// Rows are handed out front to back; once they run out every fetch
/// returns `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultCursor {
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
    row_count: usize,
    last_insert_id: Option<i64>,
}

impl ResultCursor {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Cursor over the rows of a SELECT.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            row_count: rows.len(),
            columns,
            rows: rows.into(),
            last_insert_id: None,
        }
    }

    /// Cursor for a statement that returned no rows.
    pub fn affected(row_count: usize, last_insert_id: Option<i64>) -> Self {
        Self {
            row_count,
            last_insert_id,
            ..Self::default()
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows returned by a SELECT, or rows affected by any other statement.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Rows not yet fetched.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn last_inserted_identifier(&self) -> Option<i64> {
        self.last_insert_id
    }

    /// Next row keyed by column name.
    pub fn fetch_associative(&mut self) -> Option<HashMap<String, Value>> {
        let values = self.rows.pop_front()?;
        Some(self.columns.iter().cloned().zip(values).collect())
    }

    /// Next row as a plain list of values.
    pub fn fetch_indexed(&mut self) -> Option<Vec<Value>> {
        self.rows.pop_front()
    }

    /// Next row readable both ways.
    pub fn fetch_array(&mut self) -> Option<CursorRow> {
        let values = self.rows.pop_front()?;
        Some(CursorRow {
            columns: self.columns.clone(),
            values,
        })
    }

    /// First column of the next row.
    pub fn fetch_scalar(&mut self) -> Option<Value> {
        self.rows.pop_front().and_then(|row| row.into_iter().next())
    }

    /// Remaining rows as text, one line per row, columns aligned.
    pub fn to_table_string(&self) -> String {
        if self.columns.is_empty() {
            return "Empty result set\n".to_string();
        }

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.len()).collect();
        for row in &self.rows {
            for (i, value) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(value.to_string().len());
                }
            }
        }

        let line = |cells: Vec<String>| {
            cells
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{:width$}", cell, width = widths[i]))
                .collect::<Vec<_>>()
                .join(" | ")
        };

        let mut out = line(self.columns.clone());
        out.push('\n');
        out.push_str(
            &widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        out.push('\n');
        for row in &self.rows {
            out.push_str(&line(row.iter().map(|v| v.to_string()).collect()));
            out.push('\n');
        }
        out.push_str(&format!("\n{} row(s)\n", self.rows.len()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor() -> ResultCursor {
        ResultCursor::new(
            vec!["id".into(), "name".into()],
            vec![
                vec![Value::Integer(1), Value::from("ada")],
                vec![Value::Integer(2), Value::from("bob")],
            ],
        )
    }

    #[test]
    fn test_fetch_modes() {
        let mut cursor = cursor();
        assert_eq!(cursor.row_count(), 2);

        let first = cursor.fetch_associative().unwrap();
        assert_eq!(first["name"], Value::from("ada"));

        let second = cursor.fetch_array().unwrap();
        assert_eq!(second.get(0), Some(&Value::Integer(2)));
        assert_eq!(second.get_by_name("name"), Some(&Value::from("bob")));
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_exhausted_cursor_returns_none() {
        let mut cursor = cursor();
        while cursor.fetch_indexed().is_some() {}
        assert!(cursor.fetch_associative().is_none());
        assert!(cursor.fetch_indexed().is_none());
        assert!(cursor.fetch_array().is_none());
        assert!(cursor.fetch_scalar().is_none());
        assert_eq!(cursor.row_count(), 2);
    }

    #[test]
    fn test_affected_rows_cursor() {
        let cursor = ResultCursor::affected(1, Some(42));
        assert_eq!(cursor.row_count(), 1);
        assert_eq!(cursor.last_inserted_identifier(), Some(42));
        assert!(cursor.columns().is_empty());
    }

    #[test]
    fn test_table_rendering() {
        let rendered = cursor().to_table_string();
        assert!(rendered.starts_with("id | name"));
        assert!(rendered.contains("2  | bob"));
        assert!(rendered.ends_with("2 row(s)\n"));
    }
}
