//! Request extractors that report failures in the error envelope.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;
use validator::Validate;

use crate::error::AppError;

/// JSON body that is deserialized and then validated.
///
/// Malformed JSON, a wrong content type and failed field constraints are all
/// reported as `validation_error` (422).
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

/// Query string that reports parse failures as `validation_error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(query_rejection)?;
        Ok(ValidQuery(value))
    }
}

/// Path parameters that report parse failures as `validation_error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(path_rejection)?;
        Ok(ValidPath(value))
    }
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    AppError::validation(
        "Invalid JSON body",
        json!({ "reason": rejection.body_text() }),
    )
}

fn path_rejection(rejection: PathRejection) -> AppError {
    AppError::validation(
        "Invalid path parameters",
        json!({ "reason": rejection.body_text() }),
    )
}

fn query_rejection(rejection: QueryRejection) -> AppError {
    AppError::validation(
        "Invalid query parameters",
        json!({ "reason": rejection.body_text() }),
    )
}
