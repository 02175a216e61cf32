use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SharedError {
    #[error("Invalid report code: {0:?}")]
    InvalidReportCode(String),
}
