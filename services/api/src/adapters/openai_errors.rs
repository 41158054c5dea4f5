//! services/api/src/adapters/openai_errors.rs
//!
//! Translation of `async-openai` errors into the provider failure taxonomy.

use crate::adapters::http::classify_transport;
use async_openai::error::{ApiError, OpenAIError};
use enablement_core::ports::{FailureKind, PortError, ProviderFailure};

/// Classifies an OpenAI API error body by its `code` and `type`.
pub fn classify_api_error(error: &ApiError) -> FailureKind {
    let code = error.code.as_deref().unwrap_or_default();
    let kind = error.r#type.as_deref().unwrap_or_default();
    match (code, kind) {
        ("invalid_api_key", _) | (_, "authentication_error") => FailureKind::AuthError,
        (_, "permission_error") | ("unsupported_country_region_territory", _) => {
            FailureKind::PermissionError
        }
        ("rate_limit_exceeded", _) | ("insufficient_quota", _) | (_, "rate_limit_error") => {
            FailureKind::RateLimited
        }
        (_, "server_overloaded") | ("engine_overloaded", _) => FailureKind::ServiceLoading,
        _ => FailureKind::Unknown,
    }
}

pub fn provider_failure(error: OpenAIError) -> ProviderFailure {
    match error {
        OpenAIError::Reqwest(e) => classify_transport(&e),
        OpenAIError::ApiError(api) => ProviderFailure::new(classify_api_error(&api), api.message),
        other => ProviderFailure::new(FailureKind::Unknown, other.to_string()),
    }
}

/// Port-level view of the same error, for the text-generation collaborator.
pub fn port_error(error: OpenAIError) -> PortError {
    let failure = provider_failure(error);
    match failure.kind {
        FailureKind::AuthError | FailureKind::PermissionError => PortError::Unauthorized,
        FailureKind::Timeout => PortError::Timeout(failure.message),
        _ => PortError::Unexpected(failure.to_string()),
    }
}
