//! Language tags reported by transcription

/// Tag assumed when transcription reports no usable language
pub const DEFAULT_LANGUAGE: &str = "en";

/// Languages the prompt composer can name explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Hindi,
    Odia,
}

impl Language {
    /// Look up a normalised tag; `None` for languages without a mapping
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "en" => Some(Self::English),
            "hi" => Some(Self::Hindi),
            "or" => Some(Self::Odia),
            _ => None,
        }
    }

    /// Resolve a tag, falling back to English for unmapped codes
    #[must_use]
    pub fn resolve(code: &str) -> Self {
        Self::from_code(code).unwrap_or(Self::English)
    }

    /// Human-readable name used in prompts
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "Hindi",
            Self::Odia => "Odia",
        }
    }
}

/// Normalise a reported tag to its lowercase primary subtag
///
/// `en-US` becomes `en`; missing, blank or malformed tags become
/// [`DEFAULT_LANGUAGE`].
#[must_use]
pub fn normalize_tag(tag: Option<&str>) -> String {
    let primary = tag
        .map(str::trim)
        .and_then(|t| t.split(['-', '_']).next())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if primary.len() < 2 || primary.len() > 3 || !primary.chars().all(|c| c.is_ascii_alphabetic()) {
        return DEFAULT_LANGUAGE.to_string();
    }
    primary
}
