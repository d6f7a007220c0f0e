// Mapping of catalog errors onto HTTP responses

use actix_web::{http::StatusCode, HttpResponse, ResponseError};

use crate::api::models::ErrorBody;
use crate::catalog::CatalogError;

const INTERNAL_MESSAGE: &str = "Internal Server Error";

impl ResponseError for CatalogError {
    fn status_code(&self) -> StatusCode {
        match self {
            CatalogError::Validation(_) => StatusCode::BAD_REQUEST,
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::Conflict(_) => StatusCode::CONFLICT,
            CatalogError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            CatalogError::Internal(cause) => {
                tracing::error!(error = ?cause, "request failed");
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorBody { error })
    }
}
