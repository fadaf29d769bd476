use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde_json::json;

use pdfqueue_core::QueueError;

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "code": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Handler error: a queue error rendered as `{code, message}`.
#[derive(Debug)]
pub struct ApiError(pub QueueError);

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            QueueError::Conflict | QueueError::TaskBlocked { .. } => StatusCode::CONFLICT,
            QueueError::EmptyQueue | QueueError::NotFound { .. } => StatusCode::NOT_FOUND,
            QueueError::Storage(e) => {
                tracing::error!(error = %e, "queue storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        json_error(status, self.0.code(), self.0.to_string())
    }
}

/// `Json<T>` whose rejections are rendered as `{code, message}` too.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(reject_body(rejection)),
        }
    }
}

fn reject_body(rejection: JsonRejection) -> Response {
    let status = match &rejection {
        JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        _ => StatusCode::BAD_REQUEST,
    };
    json_error(status, "invalid_request", rejection.body_text())
}
