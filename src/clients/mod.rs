//! # Upstream Provider Clients
//!
//! Thin wrappers around the two external collaborators:
//! - **completion**: the `CompletionClient` contract and its request/response types
//! - **gemini**: `GeminiClient`, the Generative Language REST implementation
//! - **speech**: the optional `SpeechSynthesizer` contract and Cloud Text-to-Speech client

pub mod completion;
pub mod gemini;
pub mod speech;

#[cfg(test)]
pub(crate) mod testing;

pub use completion::{
    CompletionClient, CompletionError, CompletionRequest, ConversationTurn, GenerationParams,
    ImageInput, ProviderModel, TurnRole, VisionRequest,
};
pub use gemini::GeminiClient;
pub use speech::{
    build_synthesizer, AccessTokenSource, GoogleSpeechClient, ServiceAccountTokens, SpeechAuth, SpeechError,
    SpeechSynthesizer,
};
