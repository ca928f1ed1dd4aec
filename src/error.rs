use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no data available: supply a workbook or place the clean CSV next to the binary")]
    NoSource,

    #[error("could not detect the header row in {0}; send the clean CSV or check the sheet")]
    HeaderNotFound(PathBuf),

    #[error("none of the expected columns (Company/Loja/ID_Loja/Data/Hora/Fluxo) found in {0}")]
    NoExpectedColumns(PathBuf),

    #[error("workbook {0} has no readable sheet")]
    NoSheet(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed workbook: {0}")]
    Workbook(#[from] calamine::XlsxError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompareError {
    #[error("select two different stores to compare")]
    SameStore,

    #[error("both groups are named {0:?}; give them different names")]
    SameGroupName(String),

    #[error("select at least one store in {0}")]
    EmptyGroup(String),

    #[error("select at least 2 stores to overlay (got {0})")]
    TooFewStores(usize),

    #[error("not enough data for {0} in this period/hours")]
    MissingSide(String),

    #[error("no data in the selected period/stores/hours")]
    NoData,
}

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}
