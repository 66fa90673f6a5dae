//! JSON body extraction that reports malformed or missing fields as the
//! documented `Validation` error body instead of axum's default plain-text
//! 422 rejection.

use axum::async_trait;
use axum::extract::{rejection::JsonRejection, FromRequest, Json, Request};
use serde::de::DeserializeOwned;

use crate::error::EngineError;

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = EngineError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let result: Result<Json<T>, JsonRejection> = Json::from_request(req, state).await;
        match result {
            Ok(Json(value)) => Ok(ValidatedJson(value)),
            Err(rejection) => Err(EngineError::validation(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[allow(dead_code)]
        quantity: i64,
    }

    #[tokio::test]
    async fn missing_field_is_reported_as_validation_error() {
        let request = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{}"))
            .unwrap();

        let error = ValidatedJson::<Sample>::from_request(request, &())
            .await
            .unwrap_err();

        assert!(matches!(error, EngineError::Validation(_)));
    }
}
