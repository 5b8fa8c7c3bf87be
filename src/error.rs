use crate::domain::ledger::LedgerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UssdError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Data error: {0}")]
    DataError(#[from] serde_json::Error),
    #[error("Ledger error: {0}")]
    LedgerError(#[from] LedgerError),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Catalog error: {0}")]
    CatalogError(String),
    #[error("Dialog error: {0}")]
    DialogError(String),
}

pub type Result<T> = std::result::Result<T, UssdError>;
