//! Two-dimensional labelled table of rates.
//!
//! Used for both bad-rate inputs and loss-rate outputs. Rows are vintages,
//! columns are observation ages (or any other pair of categorical axes).
//! A missing or non-numeric input value is held as `None`.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LossRateError;
use crate::types::Fraction;
use crate::LossRateResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    /// Header of the label column (e.g. "vintage"). May be empty.
    #[serde(default)]
    pub index_name: String,
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    /// Row-major cells: `cells[row][column]`.
    pub cells: Vec<Vec<Option<Fraction>>>,
}

impl RateTable {
    /// Build a table and check that it is rectangular with unique labels.
    pub fn new(
        row_labels: Vec<String>,
        column_labels: Vec<String>,
        cells: Vec<Vec<Option<Fraction>>>,
    ) -> LossRateResult<Self> {
        let table = Self {
            index_name: String::new(),
            row_labels,
            column_labels,
            cells,
        };
        table.validate()?;
        Ok(table)
    }

    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = name.into();
        self
    }

    pub fn n_rows(&self) -> usize {
        self.row_labels.len()
    }

    pub fn n_columns(&self) -> usize {
        self.column_labels.len()
    }

    pub fn get(&self, row: usize, column: usize) -> Option<Fraction> {
        self.cells.get(row).and_then(|r| r.get(column)).copied().flatten()
    }

    /// Cell lookup by labels.
    pub fn value(&self, row_label: &str, column_label: &str) -> Option<Fraction> {
        let row = self.row_labels.iter().position(|l| l == row_label)?;
        let column = self.column_labels.iter().position(|l| l == column_label)?;
        self.get(row, column)
    }

    /// Column `column` top to bottom.
    pub fn column(&self, column: usize) -> impl Iterator<Item = Option<Fraction>> + '_ {
        self.cells.iter().map(move |r| r.get(column).copied().flatten())
    }

    pub fn iter_cells(&self) -> impl Iterator<Item = Option<Fraction>> + '_ {
        self.cells.iter().flat_map(|r| r.iter().copied())
    }

    pub fn missing_cells(&self) -> usize {
        self.iter_cells().filter(Option::is_none).count()
    }

    /// Number of present cells outside [0, 1].
    pub fn out_of_unit_range(&self) -> usize {
        self.iter_cells()
            .flatten()
            .filter(|v| *v < Decimal::ZERO || *v > Decimal::ONE)
            .count()
    }

    /// Copy column-keyed values into a fresh table ordered like `self`.
    ///
    /// `columns` maps column label to a map of row label to value. Labels
    /// absent from `columns` come back as missing cells.
    pub fn reindex_like(
        &self,
        columns: &HashMap<String, HashMap<String, Option<Fraction>>>,
    ) -> RateTable {
        let cells = self
            .row_labels
            .iter()
            .map(|row| {
                self.column_labels
                    .iter()
                    .map(|col| columns.get(col).and_then(|c| c.get(row)).copied().flatten())
                    .collect()
            })
            .collect();

        RateTable {
            index_name: self.index_name.clone(),
            row_labels: self.row_labels.clone(),
            column_labels: self.column_labels.clone(),
            cells,
        }
    }

    /// Check shape and label uniqueness.
    pub fn validate(&self) -> LossRateResult<()> {
        if self.cells.len() != self.row_labels.len() {
            return Err(LossRateError::InvalidInput {
                field: "cells".into(),
                reason: format!(
                    "{} rows of cells for {} row labels",
                    self.cells.len(),
                    self.row_labels.len()
                ),
            });
        }
        for (label, row) in self.row_labels.iter().zip(&self.cells) {
            if row.len() != self.column_labels.len() {
                return Err(LossRateError::InvalidInput {
                    field: "cells".into(),
                    reason: format!(
                        "row '{label}' has {} cells, expected {}",
                        row.len(),
                        self.column_labels.len()
                    ),
                });
            }
        }
        if let Some(dup) = first_duplicate(&self.row_labels) {
            return Err(LossRateError::InvalidInput {
                field: "row_labels".into(),
                reason: format!("duplicate row label '{dup}'"),
            });
        }
        if let Some(dup) = first_duplicate(&self.column_labels) {
            return Err(LossRateError::InvalidInput {
                field: "column_labels".into(),
                reason: format!("duplicate column label '{dup}'"),
            });
        }
        Ok(())
    }
}

fn first_duplicate(labels: &[String]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(labels.len());
    labels
        .iter()
        .find(|l| !seen.insert(l.as_str()))
        .map(String::as_str)
}
