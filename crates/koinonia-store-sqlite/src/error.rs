//! Error type for `koinonia-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] koinonia_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sql error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

/// Collapse into the domain error the HTTP layer maps to status codes.
/// Anything that is not already a domain error becomes opaque storage
/// failure.
impl From<Error> for koinonia_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(inner) => inner,
      Error::Database(inner) => {
        koinonia_core::Error::Storage(inner.to_string())
      }
      Error::Sqlite(inner) => koinonia_core::Error::Storage(inner.to_string()),
      Error::DateParse(msg) => koinonia_core::Error::Storage(msg),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
