//! Interface kinds a provider can expose to the gateway

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire dialect of an upstream provider endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    /// OpenAI-compatible API
    OpenAI,
    /// Google AI Studio (Gemini) API
    Gemini,
    /// Anthropic-compatible API
    Anthropic,
}

impl InterfaceKind {
    /// Path appended to the provider's `api_base` for this interface
    pub fn path_suffix(&self) -> &'static str {
        match self {
            InterfaceKind::OpenAI => "/v1",
            InterfaceKind::Gemini => "/v1beta",
            InterfaceKind::Anthropic => "",
        }
    }

    /// Value of `credential_info.custom_llm_provider` on the gateway
    pub fn custom_llm_provider(&self) -> &'static str {
        match self {
            InterfaceKind::OpenAI => "OpenAI_Compatible",
            InterfaceKind::Gemini => "Google_AI_Studio",
            InterfaceKind::Anthropic => "Anthropic",
        }
    }

    /// Config key and model prefix for this interface
    pub fn config_key(&self) -> &'static str {
        match self {
            InterfaceKind::OpenAI => "openai",
            InterfaceKind::Gemini => "gemini",
            InterfaceKind::Anthropic => "anthropic",
        }
    }

    /// Name of the gateway credential for a provider exposing this interface
    pub fn credential_name(&self, service_name: &str) -> String {
        format!("{}-{}", service_name, self.config_key())
    }
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}
