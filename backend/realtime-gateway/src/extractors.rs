use axum::{
    extract::{FromRequest, Request},
    response::{IntoResponse, Response},
    Json,
};

use crate::handlers::ApiError;

/// JSON body extractor whose rejections use the API error shape instead of
/// axum's plain-text bodies
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let path = req.uri().path().to_string();
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| AppJson(value))
            .map_err(|rejection| {
                tracing::warn!(path = %path, "Rejected request body: {}", rejection);
                ApiError::bad_request(format!("Invalid JSON body: {}", rejection)).into_response()
            })
    }
}
