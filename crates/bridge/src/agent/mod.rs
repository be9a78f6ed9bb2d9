//! LLM diagnosis
//!
//! Builds the diagnosis prompt for a firing alert and asks a completion
//! provider for a root-cause analysis.

pub mod prompt;
pub mod provider;

pub use prompt::{build_diagnosis_prompt, SYSTEM_PROMPT};
pub use provider::{
    create_provider, ChatCompletionsProvider, DiagnosisConfig, DiagnosisProvider, MockProvider,
    RigProvider,
};
