use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::ActionResult,
};
use tracing::warn;

/// JSON body of an action route. Bodies that do not deserialize are answered
/// with a `Validation` envelope rather than axum's plain-text rejection.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(RejectedInput))]
pub(crate) struct ActionJson<T>(pub(crate) T);

/// Path parameters of an action route, rejected the same way as bodies.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(RejectedInput))]
pub(crate) struct ActionPath<T>(pub(crate) T);

pub(crate) struct RejectedInput(ApiError);

impl From<JsonRejection> for RejectedInput {
    fn from(rejection: JsonRejection) -> Self {
        Self(ApiError::new(ErrorCode::Validation, rejection.body_text()))
    }
}

impl From<PathRejection> for RejectedInput {
    fn from(rejection: PathRejection) -> Self {
        Self(ApiError::new(ErrorCode::Validation, rejection.body_text()))
    }
}

impl IntoResponse for RejectedInput {
    fn into_response(self) -> Response {
        warn!(error = %self.0.message, "request rejected before reaching an action");
        (
            StatusCode::BAD_REQUEST,
            Json(ActionResult::<()>::failed(self.0)),
        )
            .into_response()
    }
}
