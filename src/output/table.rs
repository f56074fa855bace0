//! Plain-text tables with aligned columns.

use serde_json::{Map, Value};
use std::fmt::Write;

use super::value_to_cell;

/// A titled table; columns map a field name to a header.
#[derive(Debug, Clone, Default)]
pub struct Table {
    title: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Builds a table from JSON objects. Missing fields render empty;
    /// `max_columns` keeps only the first columns.
    pub fn from_objects(
        title: impl Into<String>,
        rows: &[&Map<String, Value>],
        columns: &[(&str, &str)],
        max_columns: Option<usize>,
    ) -> Self {
        let columns = match max_columns {
            Some(max) => &columns[..max.min(columns.len())],
            None => columns,
        };

        let mut table = Table::new(title);
        table.headers = columns.iter().map(|(_, header)| header.to_string()).collect();
        for row in rows {
            table.rows.push(
                columns
                    .iter()
                    .map(|(field, _)| row.get(*field).map(value_to_cell).unwrap_or_default())
                    .collect(),
            );
        }
        table
    }

    pub fn set_headers<I, S>(&mut self, headers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
    }

    pub fn add_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let len = cell.chars().count();
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(len),
                    None => widths.push(len),
                }
            }
        }

        let mut out = String::new();
        if !self.title.is_empty() {
            let _ = writeln!(out, "{}", self.title);
        }

        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let _ = writeln!(out, "{}", line(&self.headers));
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        let _ = writeln!(out, "{}", rule.join("  "));
        for row in &self.rows {
            let _ = writeln!(out, "{}", line(row));
        }
        out
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}
