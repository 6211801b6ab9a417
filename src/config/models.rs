// src/config/models.rs
//! Model identifiers handed to the direct-API providers. Only the pinned /
//! default decision lives here; discovery against provider model lists does not.

use serde::Serialize;

pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4.1";
pub const XAI_DEFAULT_MODEL: &str = "grok-4-1-fast";
pub const OPENROUTER_FREE_MODEL: &str = "openrouter/free";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVendor {
    OpenAi,
    Xai,
    OpenRouter,
}

/// `*_MODEL_POLICY` + `*_MODEL_PIN` for one vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSetting {
    pub policy: String,
    pub pin: Option<String>,
}

impl ModelSetting {
    pub fn new(policy: impl Into<String>, pin: Option<String>) -> Self {
        Self {
            policy: policy.into().trim().to_ascii_lowercase(),
            pin: pin.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
        }
    }

    /// Default policy per vendor when nothing is configured.
    pub fn default_for(vendor: ModelVendor) -> Self {
        match vendor {
            ModelVendor::Xai => Self::new("latest", None),
            ModelVendor::OpenAi | ModelVendor::OpenRouter => Self::new("auto", None),
        }
    }
}

/// Pinned policy with a pin wins; everything else maps to the vendor default.
pub fn select_model(vendor: ModelVendor, setting: &ModelSetting) -> String {
    if setting.policy == "pinned" {
        if let Some(pin) = &setting.pin {
            return pin.clone();
        }
    }
    match vendor {
        ModelVendor::OpenAi => OPENAI_DEFAULT_MODEL,
        // `latest` and `stable` both alias the model that supports x_search.
        ModelVendor::Xai => XAI_DEFAULT_MODEL,
        ModelVendor::OpenRouter => OPENROUTER_FREE_MODEL,
    }
    .to_string()
}
