use serde::{Deserialize, Serialize};

/// Upstream model vendors the assistant can route to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Google,
    Groq,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [Self::Google, Self::Groq];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "google" | "gemini" => Some(Self::Google),
            "groq" => Some(Self::Groq),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Groq => "groq",
        }
    }

    /// Chat model used when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Google => "gemini-3-flash-preview",
            Self::Groq => "llama-3.3-70b-versatile",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
