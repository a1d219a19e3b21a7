use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, DataType, Reader};
use tracing::debug;

use crate::error::Error;
use crate::expt_time::TIMESTAMP_FORMAT;
use crate::table::Table;
use crate::Result;

const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map_or(false, |ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

#[derive(Debug, Clone)]
enum Sheets {
    /// One CSV file per sheet, keyed by file stem
    Csv(BTreeMap<String, PathBuf>),
    /// Sheet names of a spreadsheet file, in workbook order
    Spreadsheet(Vec<String>),
}

/// A spreadsheet with named sheets
///
/// On disk a workbook is an Excel or OpenDocument spreadsheet, a directory holding one
/// `<sheet>.csv` per sheet, or a single CSV file which forms a one-sheet workbook named after
/// its file stem.
#[derive(Debug, Clone)]
pub struct Workbook {
    path: PathBuf,
    sheets: Sheets,
}

impl Workbook {
    pub fn open(path: &Path) -> Result<Self> {
        let sheets = if path.is_dir() {
            let mut sheets = BTreeMap::new();
            for entry in fs::read_dir(path).map_err(|e| Error::io(path, e))? {
                let sheet_path = entry.map_err(|e| Error::io(path, e))?.path();
                if has_extension(&sheet_path, &["csv"]) {
                    if let Some(stem) = sheet_path.file_stem().and_then(OsStr::to_str) {
                        sheets.insert(stem.to_owned(), sheet_path.clone());
                    }
                }
            }
            Sheets::Csv(sheets)
        } else if path.is_file() && has_extension(path, &SPREADSHEET_EXTENSIONS) {
            let spreadsheet = open_workbook_auto(path).map_err(|e| Error::spreadsheet(path, e))?;
            Sheets::Spreadsheet(spreadsheet.sheet_names())
        } else if path.is_file() {
            let stem = path
                .file_stem()
                .and_then(OsStr::to_str)
                .unwrap_or_default()
                .to_owned();
            Sheets::Csv(BTreeMap::from([(stem, path.to_path_buf())]))
        } else {
            return Err(Error::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "workbook not found"),
            ));
        };

        let workbook = Self {
            path: path.to_path_buf(),
            sheets,
        };
        debug!(workbook = %path.display(), sheets = workbook.sheet_names().len(), "opened workbook");
        Ok(workbook)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the workbook, the anchor for relative output locations
    pub fn location(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        match &self.sheets {
            Sheets::Csv(sheets) => sheets.keys().map(String::as_str).collect(),
            Sheets::Spreadsheet(names) => names.iter().map(String::as_str).collect(),
        }
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheet_names().contains(&name)
    }

    fn missing(&self, sheet: &str) -> Error {
        Error::MissingSheet {
            workbook: self.path.clone(),
            sheet: sheet.to_owned(),
        }
    }

    pub fn sheet(&self, name: &str) -> Result<Table> {
        if !self.has_sheet(name) {
            return Err(self.missing(name));
        }
        debug!(sheet = name, "reading sheet");
        self.read(name)
    }

    /// The default sheet: the only one for a CSV file, the first by name for a directory and
    /// the first in workbook order for a spreadsheet
    pub fn first_sheet(&self) -> Result<Table> {
        let name = self
            .sheet_names()
            .first()
            .copied()
            .ok_or_else(|| self.missing("<any>"))?;
        debug!(sheet = name, "reading default sheet");
        self.read(name)
    }

    fn read(&self, name: &str) -> Result<Table> {
        match &self.sheets {
            Sheets::Csv(sheets) => {
                let sheet_path = sheets.get(name).ok_or_else(|| self.missing(name))?;
                Table::from_path(sheet_path)
            }
            Sheets::Spreadsheet(_) => {
                let mut spreadsheet =
                    open_workbook_auto(&self.path).map_err(|e| Error::spreadsheet(&self.path, e))?;
                let range = spreadsheet
                    .worksheet_range(name)
                    .map_err(|e| Error::spreadsheet(&self.path, e))?;

                // The first non-blank row holds the headers
                let mut rows = range
                    .rows()
                    .filter(|row| !row.iter().all(|cell| matches!(cell, Data::Empty)));
                let headers = rows
                    .next()
                    .map(|row| {
                        row.iter()
                            .map(|cell| cell_text(cell).trim().to_owned())
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                let mut table = Table::new(headers);
                for row in rows {
                    table.push_row(row.iter().map(cell_text));
                }
                Ok(table)
            }
        }
    }
}

/// Cell contents as the text a CSV export would hold
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell.as_datetime().map_or_else(
            || cell.to_string(),
            |timestamp| timestamp.format(TIMESTAMP_FORMAT).to_string(),
        ),
        _ => cell.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use calamine::Data;
    use tempdir::TempDir;

    use super::{cell_text, Workbook};

    #[test]
    fn directory_workbooks_expose_csv_files_as_sheets() {
        let dir = TempDir::new("workbook_sheets").unwrap();
        let book = dir.path().join("grazing");
        std::fs::create_dir(&book).unwrap();
        std::fs::write(book.join("chla.csv"), "Cruise\nFall2019\n").unwrap();
        std::fs::write(book.join("expt_data.CSV"), "cruise\nFall2019\n").unwrap();
        std::fs::write(book.join("notes.txt"), "ignored").unwrap();

        let workbook = Workbook::open(&book).unwrap();
        assert_eq!(workbook.sheet_names(), ["chla", "expt_data"]);
        assert_eq!(workbook.location(), dir.path());
        assert_eq!(workbook.sheet("chla").unwrap().len(), 1);
        assert_eq!(workbook.sheet("expt_data").unwrap().headers(), ["cruise"]);
        assert!(workbook.sheet("abundance").is_err());
    }

    #[test]
    fn csv_files_are_single_sheet_workbooks() {
        let dir = TempDir::new("workbook_single").unwrap();
        let file = dir.path().join("DEBay_MP_expt1_FP.csv");
        std::fs::write(&file, "cruise,station\nFall2019,algae\n").unwrap();

        let workbook = Workbook::open(&file).unwrap();
        assert!(workbook.has_sheet("DEBay_MP_expt1_FP"));
        assert_eq!(workbook.first_sheet().unwrap().headers(), ["cruise", "station"]);
    }

    #[test]
    fn spreadsheet_sheets_keep_workbook_order() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/DEBay_MP_expt1.xlsx");
        let workbook = Workbook::open(&path).unwrap();
        assert_eq!(workbook.sheet_names(), ["chla", "expt_data"]);

        let chla = workbook.first_sheet().unwrap();
        assert_eq!(chla.headers()[0], "Cruise");
        assert_eq!(chla.len(), 8);
        assert_eq!(chla.texts("Time Point").unwrap()[0], "t0");
        assert!(workbook.sheet("FP_sinking").is_err());
    }

    #[test]
    fn cells_read_like_their_csv_export() {
        assert_eq!(cell_text(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_text(&Data::Int(10)), "10");
        assert_eq!(cell_text(&Data::String("algae".into())), "algae");
        assert_eq!(cell_text(&Data::Empty), "");
    }
}
