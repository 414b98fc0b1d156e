//! Crate-wide error types.

use thiserror::Error;

use crate::live::FetchError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not parse pprof data: {0}")]
    Decode(#[from] pprof_parse::ParseError),

    #[error("could not parse '{side}' profile: {source}")]
    DecodeSide {
        side: &'static str,
        #[source]
        source: pprof_parse::ParseError,
    },

    #[error("no valid sample data found in profile")]
    NoValidSampleData,

    #[error("no common profile types found to diff between the two files")]
    NoCommonDimensions,

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("unknown view '{0}'")]
    UnknownView(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),
}
