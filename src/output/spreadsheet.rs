//! Final dataset export as an `.xlsx` workbook

use crate::extract::BookRecord;
use crate::output::{write_atomic, OutputResult, BOOK_COLUMNS};
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;

const SHEET_NAME: &str = "books";

/// Writes `records` to a single-sheet workbook at `path`
///
/// Columns match the CSV files. Missing values are left as blank cells.
pub fn write_spreadsheet(path: &Path, records: &[BookRecord]) -> OutputResult<()> {
    write_atomic(path, |temp| {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        let header = Format::new().set_bold();
        for (col, name) in BOOK_COLUMNS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *name, &header)?;
        }

        for (index, record) in records.iter().enumerate() {
            let row = index as u32 + 1;

            worksheet.write_string(row, 0, record.title.as_str())?;
            worksheet.write_string(row, 1, record.author.as_str())?;
            if let Some(rating) = record.rating {
                worksheet.write_number(row, 2, rating)?;
            }
            if let Some(count) = record.rating_count {
                worksheet.write_number(row, 3, count as f64)?;
            }
            if let Some(description) = &record.description {
                worksheet.write_string(row, 4, description.as_str())?;
            }
            worksheet.write_string(row, 5, record.genres_joined())?;
        }

        worksheet.set_column_width(0, 40)?;
        worksheet.set_column_width(1, 25)?;
        worksheet.set_column_width(4, 80)?;

        workbook.save(temp)?;
        Ok(())
    })
}
