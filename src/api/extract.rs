use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::RelayError;

/// A JSON request body with known field names.
pub trait RequestFields {
    /// Field names, the required one first.
    const FIELDS: &'static [&'static str];
}

/// `Json<T>` whose rejections come back as [`RelayError::Validation`].
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + RequestFields,
    S: Send + Sync,
{
    type Rejection = RelayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(body_rejection(&rejection, T::FIELDS)),
        }
    }
}

/// Map a body rejection to a validation error.
///
/// Data errors are attributed to the field serde names, falling back to the
/// first field. Anything that is not well-formed JSON is reported on `body`.
fn body_rejection(rejection: &JsonRejection, fields: &'static [&'static str]) -> RelayError {
    let message = rejection.body_text();
    let field = match rejection {
        JsonRejection::JsonDataError(_) => fields
            .iter()
            .copied()
            .find(|name| message.contains(&format!("`{name}`")))
            .or_else(|| fields.first().copied())
            .unwrap_or("body"),
        _ => "body",
    };
    RelayError::validation(field, message)
}
