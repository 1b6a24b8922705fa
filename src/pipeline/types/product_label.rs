use serde::{Serialize, Serializer};

/// Sentinel label used when the product could not be identified.
pub const UNKNOWN_PRODUCT: &str = "unknown product";

/// Product name produced by the identification stage. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProductLabel {
    Identified(String),
    #[default]
    Unknown,
}

impl ProductLabel {
    /// Trimmed, non-empty names become `Identified`; anything else is `Unknown`.
    pub fn from_answer(answer: &str) -> Self {
        let name = answer.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        if name.is_empty() {
            ProductLabel::Unknown
        } else {
            ProductLabel::Identified(name.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProductLabel::Identified(name) => name,
            ProductLabel::Unknown => UNKNOWN_PRODUCT,
        }
    }
}

impl std::fmt::Display for ProductLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProductLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
