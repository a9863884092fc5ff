//! CSV reading and writing
//!
//! Book files carry the columns `title, author, rating, rating_count,
//! description, genres`; genres are joined with ", ". URL lists carry
//! `book_url, genre`.

use crate::extract::BookRecord;
use crate::output::{write_atomic, OutputError, OutputResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Header of every book file
pub const BOOK_COLUMNS: [&str; 6] = [
    "title",
    "author",
    "rating",
    "rating_count",
    "description",
    "genres",
];

/// Column holding item URLs in URL list files
pub const URL_COLUMN: &str = "book_url";

/// One row of a book file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRow {
    pub title: String,
    pub author: String,
    pub rating: Option<f64>,
    pub rating_count: Option<u64>,
    pub description: Option<String>,
    pub genres: String,
}

impl From<&BookRecord> for BookRow {
    fn from(record: &BookRecord) -> Self {
        Self {
            title: record.title.clone(),
            author: record.author.clone(),
            rating: record.rating,
            rating_count: record.rating_count,
            description: record.description.clone(),
            genres: record.genres_joined(),
        }
    }
}

impl From<BookRow> for BookRecord {
    fn from(row: BookRow) -> Self {
        let genres = row
            .genres
            .split(", ")
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            title: row.title,
            author: row.author,
            rating: row.rating,
            rating_count: row.rating_count,
            description: row.description.filter(|d| !d.is_empty()),
            genres,
        }
    }
}

/// One row of a URL list file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRow {
    pub book_url: String,
    pub genre: String,
}

/// Writes `records` to `path`, replacing it atomically
pub fn write_records(path: &Path, records: &[BookRecord]) -> OutputResult<()> {
    write_atomic(path, |temp| {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(temp)?;
        writer.write_record(BOOK_COLUMNS)?;
        for record in records {
            writer.serialize(BookRow::from(record))?;
        }
        writer.flush()?;
        Ok(())
    })
}

/// Reads a book file written by [`write_records`]
pub fn read_records(path: &Path) -> OutputResult<Vec<BookRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();

    for row in reader.deserialize::<BookRow>() {
        records.push(BookRecord::from(row?));
    }

    Ok(records)
}

/// Writes a URL list, replacing it atomically
pub fn write_url_list(path: &Path, rows: &[UrlRow]) -> OutputResult<()> {
    write_atomic(path, |temp| {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(temp)?;
        writer.write_record([URL_COLUMN, "genre"])?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    })
}

/// Reads the non-empty values of `column` from a CSV file with headers
pub fn read_url_column(path: &Path, column: &str) -> OutputResult<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;

    let index = reader
        .headers()?
        .iter()
        .position(|header| header.trim() == column)
        .ok_or_else(|| OutputError::MissingColumn {
            column: column.to_string(),
            path: path.display().to_string(),
        })?;

    let mut values = Vec::new();
    for row in reader.records() {
        let row = row?;
        if let Some(value) = row.get(index).map(str::trim) {
            if !value.is_empty() {
                values.push(value.to_string());
            }
        }
    }

    Ok(values)
}
