use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("error response from the server ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Event paging stopped after {pages} pages at timestamp {resume_at}")]
    PageLimit { pages: usize, resume_at: i64 },

    #[error("Invalid base URL: {0}")]
    BaseUrl(String),
}

pub type Result<T> = std::result::Result<T, NetError>;
