use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::domain::DomainError;
use serde::Serialize;
use tracing::error;

/// Body for 4xx responses
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

/// Body for 5xx responses, shaped like a failed collection result
#[derive(Debug, Serialize)]
pub struct FailureBody {
    pub ok: bool,
    pub error: String,
}

/// Maps domain failures onto HTTP status codes and JSON bodies
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let client_error = |status: StatusCode, query: Option<String>, err: &DomainError| {
            (
                status,
                Json(ErrorBody {
                    error: err.to_string(),
                    query,
                }),
            )
                .into_response()
        };

        match self.0 {
            DomainError::Unauthorized(_) => client_error(StatusCode::UNAUTHORIZED, None, &self.0),
            DomainError::InvalidQuery(_) => client_error(StatusCode::BAD_REQUEST, None, &self.0),
            DomainError::VehicleNotFound { ref query } => {
                let query = query.clone();
                (
                    StatusCode::NOT_FOUND,
                    Json(ErrorBody {
                        error: format!("no cached position matches `{query}`"),
                        query: Some(query),
                    }),
                )
                    .into_response()
            }
            DomainError::ProviderError(_)
            | DomainError::CacheWriteError(_)
            | DomainError::HistoryWriteError(_)
            | DomainError::RepositoryError(_) => {
                error!(error = %self.0, "request failed");
                internal_error(self.0.to_string())
            }
        }
    }
}

/// 500 with `{ok: false, error}`
pub fn internal_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(FailureBody {
            ok: false,
            error: message,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::{json, Value};

    async fn render(err: DomainError) -> (StatusCode, Value) {
        let response = ApiError(err).into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let (status, body) = render(DomainError::Unauthorized("missing credential".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "Unauthorized: missing credential"}));
    }

    #[tokio::test]
    async fn test_not_found_echoes_query() {
        let (status, body) = render(DomainError::VehicleNotFound {
            query: "ZZ99".into(),
        })
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["query"], json!("ZZ99"));
        assert!(body["error"].as_str().unwrap().contains("ZZ99"));
    }

    #[tokio::test]
    async fn test_server_failures() {
        for err in [
            DomainError::ProviderError("502".into()),
            DomainError::CacheWriteError("pool".into()),
            DomainError::RepositoryError(anyhow::anyhow!("boom")),
        ] {
            let (status, body) = render(err).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body["ok"], json!(false));
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_invalid_query() {
        let (status, _) = render(DomainError::InvalidQuery("empty".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
