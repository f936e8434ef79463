use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRow {
    pub id: String,
    pub cells: Vec<String>,
}

/// The rows a screen currently shows, after its search filter.
#[derive(Debug, Clone, Default)]
pub struct ListView {
    filter: String,
    rows: Vec<ViewRow>,
}

impl ListView {
    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn set_filter(&mut self, text: &str) {
        self.filter = text.trim().to_string();
    }

    /// Replaces the visible rows with those of `rows` matching the filter.
    /// `search_columns` are cell indexes the filter is matched against.
    pub fn replace(&mut self, rows: Vec<ViewRow>, search_columns: &[usize]) {
        let needle = self.filter.to_lowercase();
        self.rows = rows
            .into_iter()
            .filter(|r| matches_filter(&r.cells, search_columns, &needle))
            .collect();
    }

    pub fn clear_rows(&mut self) {
        self.rows.clear();
    }

    pub fn rows(&self) -> &[ViewRow] {
        &self.rows
    }

    pub fn to_csv(&self, headers: &[&str]) -> String {
        let mut csv = headers
            .iter()
            .map(|h| csv_quote(h))
            .collect::<Vec<_>>()
            .join(",");
        csv.push('\n');
        for row in &self.rows {
            csv.push_str(
                &row.cells
                    .iter()
                    .map(|c| csv_quote(c))
                    .collect::<Vec<_>>()
                    .join(","),
            );
            csv.push('\n');
        }
        csv
    }

    pub fn rows_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.rows
                .iter()
                .map(|r| json!({ "id": r.id, "cells": r.cells }))
                .collect(),
        )
    }
}

fn matches_filter(cells: &[String], columns: &[usize], needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    columns
        .iter()
        .filter_map(|&i| cells.get(i))
        .any(|c| c.to_lowercase().contains(needle))
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
