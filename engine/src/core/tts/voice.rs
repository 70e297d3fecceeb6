//! Narrator voices.
//!
//! Every voice is English; they differ by the regional endpoint the speech
//! backend is asked to use, which selects the accent.

use serde::{Deserialize, Serialize};

use crate::core::CoreError;

/// English accent variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Us,
    Uk,
    Au,
    In,
    Ca,
}

impl Voice {
    pub const ALL: [Voice; 5] = [Voice::Us, Voice::Uk, Voice::Au, Voice::In, Voice::Ca];

    /// Language code sent to the backend
    pub fn language(&self) -> &'static str {
        "en"
    }

    /// Regional top-level domain selecting the accent
    pub fn tld(&self) -> &'static str {
        match self {
            Voice::Us => "com",
            Voice::Uk => "co.uk",
            Voice::Au => "com.au",
            Voice::In => "co.in",
            Voice::Ca => "ca",
        }
    }

    /// Menu key (`1`-`5`)
    pub fn key(&self) -> &'static str {
        match self {
            Voice::Us => "1",
            Voice::Uk => "2",
            Voice::Au => "3",
            Voice::In => "4",
            Voice::Ca => "5",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Voice::Us => "US English",
            Voice::Uk => "UK English",
            Voice::Au => "Australian English",
            Voice::In => "Indian English",
            Voice::Ca => "Canadian English",
        }
    }
}

impl std::fmt::Display for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Voice {
    type Err = CoreError;

    /// Accepts a menu key (`1`-`5`) or a short name (`us`, `uk`, ...)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "us" => Ok(Voice::Us),
            "2" | "uk" | "gb" => Ok(Voice::Uk),
            "3" | "au" => Ok(Voice::Au),
            "4" | "in" => Ok(Voice::In),
            "5" | "ca" => Ok(Voice::Ca),
            other => Err(CoreError::InvalidInput(format!("Unknown voice: {}", other))),
        }
    }
}
