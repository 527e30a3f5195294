//! Request extractors that report failures through `AppError`.

use crate::error::{AppError, Result};
use crate::photos::Upload;
use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Multipart, Path, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

/// Positive numeric id taken from the single path parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityId(pub i64);

impl<S> FromRequestParts<S> for EntityId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state).await?;
        parse_id(&raw).map(EntityId)
    }
}

/// Parse a strictly positive id.
pub fn parse_id(raw: &str) -> Result<i64> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::Validation(format!("Invalid id '{}'", raw))),
    }
}

/// Typed JSON body. Syntax and type errors become validation errors.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Payload(value))
    }
}

/// Typed query string. Unparsable values become validation errors.
#[derive(Debug, Clone)]
pub struct Params<T>(pub T);

impl<T, S> FromRequestParts<S> for Params<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Params(value))
    }
}

/// Multipart body. A missing or malformed boundary is a validation error.
pub struct Form(pub Multipart);

impl<S> FromRequest<S> for Form
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        Ok(Form(Multipart::from_request(req, state).await?))
    }
}

/// Read exactly one file from multipart field `field`.
pub async fn single_file(Form(mut multipart): Form, field: &str) -> Result<Upload> {
    let mut upload = None;

    while let Some(part) = multipart.next_field().await? {
        if part.name() != Some(field) {
            continue;
        }
        if upload.is_some() {
            return Err(AppError::Validation(format!(
                "Exactly one file must be sent in '{}'",
                field
            )));
        }

        let file_name = part.file_name().map(str::to_string);
        let content_type = part.content_type().map(str::to_string);
        let data = part.bytes().await?.to_vec();
        upload = Some(Upload {
            file_name,
            content_type,
            data,
        });
    }

    upload.ok_or_else(|| {
        AppError::Validation(format!("Exactly one file must be sent in '{}'", field))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(parse_id("0").is_err());
        assert!(parse_id("-3").is_err());
        assert!(parse_id("abc").is_err());
    }
}
