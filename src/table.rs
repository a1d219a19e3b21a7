//! In-memory tables read from CSV sheets.
//!
//! Cells are kept as text and parsed on access. Empty cells and the usual spreadsheet spellings
//! of a missing value read as `NaN` when a number is requested.
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use itertools::Itertools;

use crate::error::Error;
use crate::Result;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// A borrowed view of a single row
#[derive(Clone, Copy)]
pub struct Row<'a> {
    cells: &'a [String],
}

impl<'a> Row<'a> {
    pub fn text(&self, column: usize) -> &'a str {
        self.cells.get(column).map_or("", String::as_str)
    }

    /// Numeric value of a cell, `NaN` when the cell is blank or not a number
    pub fn number(&self, column: usize) -> f64 {
        parse_number(self.text(column))
    }
}

/// Parse a spreadsheet cell into a number
pub fn parse_number(cell: &str) -> f64 {
    match cell.trim() {
        "" | "NaN" | "nan" | "NA" | "N/A" => f64::NAN,
        value => value.parse().unwrap_or(f64::NAN),
    }
}

/// Render a number for CSV output, writing missing values as empty cells
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

impl Table {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: vec![],
        }
    }

    /// Read a table from CSV with a header row
    ///
    /// Short rows are padded with empty cells so every row spans the full header.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr
            .headers()?
            .iter()
            .map(|header| header.trim().to_owned())
            .collect::<Vec<_>>();

        let mut rows = vec![];
        for record in rdr.records() {
            let record = record?;
            let mut row = record.iter().map(str::to_owned).collect::<Vec<_>>();
            row.resize(headers.len().max(row.len()), String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        Self::from_reader(file)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|header| header == name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| Error::MissingColumn {
                name: name.to_owned(),
                candidates: vec![name.to_owned()],
            })
    }

    /// Index of the first of `candidates` present in the table
    ///
    /// Sheets from different cruises name the same key differently (`Station` or `Treatment`),
    /// so lookups fall back through the candidates in order.
    pub fn resolve(&self, candidates: &[&str]) -> Result<(usize, String)> {
        candidates
            .iter()
            .find_map(|name| {
                self.headers
                    .iter()
                    .position(|header| header == name)
                    .map(|index| (index, (*name).to_owned()))
            })
            .ok_or_else(|| Error::MissingColumn {
                name: candidates.first().copied().unwrap_or_default().to_owned(),
                candidates: candidates.iter().map(|c| (*c).to_owned()).collect(),
            })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|cells| Row { cells })
    }

    pub fn texts(&self, name: &str) -> Result<Vec<&str>> {
        let column = self.column_index(name)?;
        Ok(self.rows().map(|row| row.text(column)).collect())
    }

    pub fn numbers(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.column_index(name)?;
        Ok(self.rows().map(|row| row.number(column)).collect())
    }

    /// Sorted distinct values of a column, blank cells excluded
    pub fn unique(&self, name: &str) -> Result<Vec<String>> {
        let column = self.column_index(name)?;
        Ok(self
            .rows()
            .map(|row| row.text(column))
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
            .sorted()
            .dedup()
            .collect())
    }

    /// Rows for which `predicate` holds, in their original order
    pub fn filter(&self, predicate: impl Fn(Row<'_>) -> bool) -> Self {
        Self {
            headers: self.headers.clone(),
            rows: self
                .rows
                .iter()
                .filter(|cells| predicate(Row { cells }))
                .cloned()
                .collect(),
        }
    }

    /// Rows whose `name` column equals `value`
    pub fn select(&self, name: &str, value: &str) -> Result<Self> {
        let column = self.column_index(name)?;
        Ok(self.filter(|row| row.text(column) == value))
    }

    /// Stable sort on the text of a column
    pub fn sort_by_column(&mut self, name: &str) -> Result<()> {
        let column = self.column_index(name)?;
        self.rows.sort_by(|a, b| a[column].cmp(&b[column]));
        Ok(())
    }

    pub fn push_row<S: Into<String>>(&mut self, row: impl IntoIterator<Item = S>) {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    /// Append a column, replacing any existing column with the same name
    pub fn set_column(&mut self, name: &str, values: Vec<String>) {
        assert_eq!(values.len(), self.rows.len(), "column length must match table");
        let column = match self.headers.iter().position(|header| header == name) {
            Some(index) => index,
            None => {
                self.headers.push(name.to_owned());
                for row in &mut self.rows {
                    row.resize(self.headers.len() - 1, String::new());
                    row.push(String::new());
                }
                self.headers.len() - 1
            }
        };
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[column] = value;
        }
    }

    /// Unpivot every column except `id` into (`id`, `var_name`, `value_name`) rows
    ///
    /// Rows are emitted column by column, so all rows of the first value column come first.
    pub fn melt(&self, id: &str, var_name: &str, value_name: &str) -> Result<Self> {
        let id_column = self.column_index(id)?;
        let mut melted = Self::new([id, var_name, value_name]);
        for (column, header) in self.headers.iter().enumerate() {
            if column == id_column {
                continue;
            }
            for row in self.rows() {
                melted.push_row([row.text(id_column), header.as_str(), row.text(column)]);
            }
        }
        Ok(melted)
    }

    /// Outer join on a shared key column
    ///
    /// Left rows keep their order, each followed by its matches from `other`; rows of `other`
    /// without a partner are appended at the end with blank left-hand cells.
    pub fn merge_outer(&self, other: &Self, on: &str) -> Result<Self> {
        let left_key = self.column_index(on)?;
        let right_key = other.column_index(on)?;

        let right_columns = (0..other.headers.len())
            .filter(|&column| column != right_key)
            .collect::<Vec<_>>();

        let mut merged = Self::new(
            self.headers
                .iter()
                .cloned()
                .chain(right_columns.iter().map(|&c| other.headers[c].clone())),
        );

        let mut matched = vec![false; other.rows.len()];
        for left in &self.rows {
            let mut found = false;
            for (index, right) in other.rows.iter().enumerate() {
                if right[right_key] == left[left_key] {
                    found = true;
                    matched[index] = true;
                    merged.rows.push(
                        left.iter()
                            .cloned()
                            .chain(right_columns.iter().map(|&c| right[c].clone()))
                            .collect(),
                    );
                }
            }
            if !found {
                let mut row = left.clone();
                row.resize(merged.headers.len(), String::new());
                merged.rows.push(row);
            }
        }

        for (right, _) in other.rows.iter().zip(matched).filter(|(_, m)| !m) {
            let mut row = vec![String::new(); self.headers.len()];
            row[left_key] = right[right_key].clone();
            row.extend(right_columns.iter().map(|&c| right[c].clone()));
            merged.rows.push(row);
        }

        Ok(merged)
    }

    /// Sum `values` columns within each distinct combination of `keys`, keys sorted
    ///
    /// Missing values are skipped, so an all-blank group sums to zero.
    pub fn group_sum(&self, keys: &[&str], values: &[&str]) -> Result<Self> {
        let key_columns = keys
            .iter()
            .map(|key| self.column_index(key))
            .collect::<Result<Vec<_>>>()?;
        let value_columns = values
            .iter()
            .map(|value| self.column_index(value))
            .collect::<Result<Vec<_>>>()?;

        let mut groups: BTreeMap<Vec<&str>, Vec<f64>> = BTreeMap::new();
        for row in self.rows() {
            let key = key_columns.iter().map(|&c| row.text(c)).collect();
            let sums = groups.entry(key).or_insert_with(|| vec![0.0; values.len()]);
            for (sum, &column) in sums.iter_mut().zip(&value_columns) {
                let value = row.number(column);
                if !value.is_nan() {
                    *sum += value;
                }
            }
        }

        let mut grouped = Self::new(keys.iter().chain(values.iter()).copied());
        for (key, sums) in groups {
            grouped.push_row(
                key.into_iter()
                    .map(str::to_owned)
                    .chain(sums.into_iter().map(format_number)),
            );
        }
        Ok(grouped)
    }

    /// Write the table as CSV, creating or truncating `path`
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new().flexible(true).from_path(path)?;
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush().map_err(|e| Error::io(path, e))?;
        Ok(())
    }
}
