use serde::ser::Serializer;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("data unavailable: {0}")]
    DataUnavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("request error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("json decode error: {0}")]
    SimdJson(#[from] simd_json::Error),
    #[error("timestamp parse error: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

impl ReplayError {
    /// True for failures that belong to the upstream data source rather than the engine.
    pub fn is_data_unavailable(&self) -> bool {
        matches!(
            self,
            Self::DataUnavailable(_) | Self::Io(_) | Self::Reqwest(_) | Self::SimdJson(_)
        )
    }
}

impl serde::Serialize for ReplayError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
