//! Timestamp authority selection.

use std::str::FromStr;
use thiserror::Error;

use crate::domain::types::EngineDefaults;

#[derive(Debug, Error)]
pub enum TimestamperError {
    #[error(
        "Invalid timestamper scheme: expected 'digicert' or 'custom:http://...'"
    )]
    InvalidScheme,
}

/// Which RFC 3161 authority the engine asks for a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timestamper {
    Digicert,
    Custom(String),
}

impl FromStr for Timestamper {
    type Err = TimestamperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("digicert") {
            Ok(Timestamper::Digicert)
        } else if let Some(url) = s.strip_prefix("custom:").filter(|u| !u.is_empty()) {
            Ok(Timestamper::Custom(url.to_string()))
        } else {
            Err(TimestamperError::InvalidScheme)
        }
    }
}

impl Timestamper {
    pub fn url(&self) -> String {
        match self {
            Timestamper::Digicert => EngineDefaults::DIGICERT_TSA_URL.to_string(),
            Timestamper::Custom(url) => url.clone(),
        }
    }
}
