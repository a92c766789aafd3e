//! Centralized model definitions
//!
//! Adding a model means adding one entry here; the registry picks it up.

/// Model definition with metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDef {
    /// User-facing model ID (e.g., "claude-4.5-sonnet")
    pub id: &'static str,
    /// API name sent to the provider (e.g., "claude-sonnet-4-5-20250929")
    pub api_name: &'static str,
    /// Context window size in tokens
    pub context_window: usize,
}

static MODELS: &[ModelDef] = &[
    ModelDef {
        id: "claude-4.5-opus",
        api_name: "claude-opus-4-5-20251101",
        context_window: 200_000,
    },
    ModelDef {
        id: "claude-4.5-sonnet",
        api_name: "claude-sonnet-4-5-20250929",
        context_window: 200_000,
    },
    ModelDef {
        id: "claude-4.5-haiku",
        api_name: "claude-haiku-4-5-20251001",
        context_window: 200_000,
    },
];

/// Get all available model definitions
pub fn all_models() -> &'static [ModelDef] {
    MODELS
}

/// Look up a model definition by its user-facing ID
pub fn find_model(id: &str) -> Option<&'static ModelDef> {
    MODELS.iter().find(|m| m.id == id)
}
