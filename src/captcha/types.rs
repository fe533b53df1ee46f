//! CAPTCHA wire shapes and the external solver interface.
//!
//! The solver itself (the ML model behind it) is out of scope; this module
//! only defines the trait boundary and the fetch/verify DTOs.

use serde::Deserialize;

/// A freshly requested CAPTCHA image, ready to hand to an [`ImageSolver`].
#[derive(Debug, Clone)]
pub struct CaptchaImage {
    /// Opaque token identifying this challenge to the verify endpoint.
    pub image_token: String,
    pub bytes: Vec<u8>,
    pub expected_length: u32,
}

/// External collaborator that turns CAPTCHA image bytes into a printable
/// string of the expected length. Its internals (the ML model) are out of
/// scope for this crate; only the interface is specified.
#[async_trait::async_trait]
pub trait ImageSolver: Send + Sync {
    async fn solve(&self, image: &CaptchaImage) -> Result<String, CaptchaError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CaptchaError {
    #[error("solver produced output of wrong length (want {want}, got {got})")]
    WrongLength { want: u32, got: usize },
    #[error("solver API error: {0}")]
    ApiError(String),
    #[error("solver task creation failed: {0}")]
    TaskCreationFailed(String),
    #[error("solver timed out after {0}s")]
    Timeout(u64),
    #[error("solver network error: {0}")]
    NetworkError(String),
    #[error("invalid solver response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Deserialize)]
pub(super) struct GenerateResponseDto {
    pub id: String,
    #[serde(rename = "iloscZnakow")]
    pub ilosc_znakow: u32,
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct VerifyResponseDto {
    pub ok: bool,
    pub token: Option<String>,
}
