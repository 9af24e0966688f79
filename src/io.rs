use std::{fs, path::Path};

use polars::{
    frame::DataFrame,
    prelude::{CsvReadOptions, CsvWriter, SerReader, SerWriter},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{DayAheadResult, IoError};

/// Timestamp layout of every CSV this crate writes. Values are UTC wall time.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ================================================================================================
// Traits
// ================================================================================================

/// Common interface of the typed tables passed between pipeline stages.
pub trait Table {
    /// Access the underlying DataFrame.
    fn as_df(&self) -> &DataFrame;
}

pub trait TableName {
    fn base_name(&self) -> String;

    fn filename(&self, ext: FileExtension) -> String {
        format!("{}.{}", self.base_name(), ext)
    }
}

pub trait ToCsv {
    /// Writes the table to `<dir>/<base_name>.csv`.
    ///
    /// # Side Effects
    /// - Creates the directory if missing.
    /// - Overwrites the file if it exists.
    fn to_csv(&self, dir: impl AsRef<Path>) -> DayAheadResult<std::path::PathBuf>;
}

impl<T> ToCsv for T
where
    T: Table + TableName,
{
    fn to_csv(&self, dir: impl AsRef<Path>) -> DayAheadResult<std::path::PathBuf> {
        let dir = dir.as_ref();
        let file_path = dir.join(self.filename(FileExtension::Csv));
        write_csv(self.as_df(), &file_path)?;
        Ok(file_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum FileExtension {
    Csv,
}

// ================================================================================================
// CSV Helpers
// ================================================================================================

/// Reads a CSV file with every column as a string. Empty cells are null.
///
/// Values are parsed by the caller so malformed cells surface as typed errors
/// instead of silently becoming null.
pub fn read_csv_strings(path: impl AsRef<Path>, separator: u8) -> DayAheadResult<DataFrame> {
    let path = path.as_ref();
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|opts| opts.with_separator(separator))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| IoError::ReadFailed(format!("{}: {e}", path.display())).into())
}

/// Writes a frame as CSV with the crate's timestamp and date layout.
pub fn write_csv(df: &DataFrame, path: &Path) -> DayAheadResult<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                IoError::FileSystem(format!(
                    "Failed to create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
    }

    let mut file = fs::File::create(path).map_err(|e| {
        IoError::WriteFailed(format!("Failed to create {}: {e}", path.display()))
    })?;
    let mut df = df.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_datetime_format(Some(DATETIME_FORMAT.to_string()))
        .with_date_format(Some(DATE_FORMAT.to_string()))
        .finish(&mut df)
        .map_err(|e| {
            IoError::WriteFailed(format!("Failed to write CSV to '{}': {e}", path.display()))
                .into()
        })
}
