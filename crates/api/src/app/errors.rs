use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use insight_ai::AiError;
use insight_core::DomainError;
use insight_infra::PipelineError;

pub fn pipeline_error_to_response(err: PipelineError) -> axum::response::Response {
    match err {
        PipelineError::Input(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        PipelineError::Engine(AiError::InvalidInput(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        PipelineError::Engine(AiError::InferenceFailed(msg)) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "inference_failed", msg)
        }
        PipelineError::Engine(AiError::ScopeViolation(msg)) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "scope_violation", msg)
        }
        PipelineError::Engine(AiError::Internal(msg)) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
        }
        PipelineError::Persist(e) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "persistence_error", e.to_string())
        }
        PipelineError::Unavailable(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "unavailable", msg),
    }
}

pub fn scope_error(err: DomainError) -> axum::response::Response {
    let code = match err {
        DomainError::MissingScope(_) => "missing_scope",
        DomainError::InvalidId(_) => "invalid_id",
        _ => "validation_error",
    };
    json_error(StatusCode::BAD_REQUEST, code, err.to_string())
}

pub fn body_rejection(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "status": "error",
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
