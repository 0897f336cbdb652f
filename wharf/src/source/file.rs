use std::fs;
use std::path::{Path, PathBuf};

use calamine::{Data, DataType as _, Reader as _, Xlsx, open_workbook};
use chrono::{NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, WharfResult};
use crate::types::{Cell, StagedRow};

/// One file drop, fully read into memory.
///
/// The file name carries the entity and the batch date as
/// `<entity>_<ddmmyyyy>.<ext>`; every row is stamped with the batch date at
/// midnight. An `.xlsx` drop is decoded as a workbook, anything else as
/// `;`-delimited text. Fields are delivered as text and cast by the database
/// on insert, with decimal commas in delimited files normalized to dots.
pub struct FileExtract {
    path: PathBuf,
    entity: String,
    batch_date: NaiveDate,
    rows: Vec<StagedRow>,
}

impl FileExtract {
    /// Opens and fully reads one file drop.
    pub fn open(path: &Path) -> WharfResult<Self> {
        let name = match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => name,
            None => bail!(
                ErrorKind::ExtractError,
                "extract path has no usable file name",
                path.display().to_string()
            ),
        };
        let (entity, batch_date) = parse_file_name(name)?;
        let create_dt = batch_date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time");

        let rows = match path.extension().and_then(|ext| ext.to_str()) {
            Some("xlsx") => read_workbook(path, create_dt)?,
            _ => read_delimited(path, create_dt)?,
        };

        info!(entity = %entity, %batch_date, rows = rows.len(), "read file extract");

        Ok(Self {
            path: path.to_path_buf(),
            entity,
            batch_date,
            rows,
        })
    }

    /// Logical entity name parsed from the file name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Batch date parsed from the file name.
    pub fn batch_date(&self) -> NaiveDate {
        self.batch_date
    }

    /// The extracted rows, stamped with the batch date.
    pub fn staged_rows(&self) -> &[StagedRow] {
        &self.rows
    }

    /// Moves the processed file into the `archive` directory next to it.
    ///
    /// The archived copy keeps its name with a `.backup` suffix so the same drop
    /// cannot be picked up twice. Returns the archived path.
    pub fn finalize(self) -> WharfResult<PathBuf> {
        let archive_dir = match self.path.parent() {
            Some(parent) => parent.join("archive"),
            None => bail!(
                ErrorKind::ExtractError,
                "extract path has no parent directory",
                self.path.display().to_string()
            ),
        };
        fs::create_dir_all(&archive_dir)?;

        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let archived = archive_dir.join(format!("{file_name}.backup"));
        fs::rename(&self.path, &archived)?;

        info!(from = %self.path.display(), to = %archived.display(), "archived extract");

        Ok(archived)
    }
}

fn read_delimited(path: &Path, create_dt: NaiveDateTime) -> WharfResult<Vec<StagedRow>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let values = record
            .iter()
            .map(|field| Cell::String(field.replace(',', ".")))
            .collect();
        rows.push(StagedRow::new(values, create_dt));
    }
    Ok(rows)
}

fn read_workbook(path: &Path, create_dt: NaiveDateTime) -> WharfResult<Vec<StagedRow>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => bail!(
            ErrorKind::ExtractError,
            "workbook has no sheets",
            path.display().to_string()
        ),
    };

    // The first row carries the headers.
    Ok(range
        .rows()
        .skip(1)
        .map(|row| StagedRow::new(row.iter().map(workbook_cell).collect(), create_dt))
        .collect())
}

/// Renders one workbook cell the way it will be staged.
///
/// Numbers that are whole lose their trailing `.0` so key columns read from a
/// workbook compare equal to their delimited-text form.
fn workbook_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Null,
        Data::String(text) => Cell::String(text.trim().to_owned()),
        Data::Int(value) => Cell::String(value.to_string()),
        Data::Float(value) if value.fract() == 0.0 => Cell::String(format!("{}", *value as i64)),
        Data::Float(value) => Cell::String(value.to_string()),
        Data::Bool(value) => Cell::String(value.to_string()),
        Data::DateTime(_) => match data.as_datetime() {
            Some(stamp) => Cell::String(stamp.to_string()),
            None => Cell::Null,
        },
        other => Cell::String(other.to_string()),
    }
}

/// Splits a file name into its entity and batch date.
pub(crate) fn parse_file_name(name: &str) -> WharfResult<(String, NaiveDate)> {
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    let parsed = stem.rsplit_once('_').and_then(|(entity, date)| {
        NaiveDate::parse_from_str(date, "%d%m%Y")
            .ok()
            .map(|date| (entity.to_owned(), date))
    });

    match parsed {
        Some(parsed) if !parsed.0.is_empty() => Ok(parsed),
        _ => bail!(
            ErrorKind::ExtractError,
            "file name does not carry an entity and batch date",
            name.to_owned()
        ),
    }
}
