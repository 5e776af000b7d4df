use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::delivery::cart::BelowMinimum;
use crate::delivery::geofence::LocationRejection;
use crate::delivery::settings::SettingsError;
use crate::delivery::window::OrderingClosed;
use crate::services::geocoding::GeocodingError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    /// Business rule said no: out of zone, ordering closed.
    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<LocationRejection> for AppError {
    fn from(rejection: LocationRejection) -> Self {
        match rejection {
            LocationRejection::InvalidCoordinate { .. } => Self::BadRequest(rejection.to_string()),
            LocationRejection::OutOfZone { .. } => Self::Unprocessable(rejection.to_string()),
        }
    }
}

impl From<OrderingClosed> for AppError {
    fn from(closed: OrderingClosed) -> Self {
        Self::Unprocessable(closed.to_string())
    }
}

impl From<BelowMinimum> for AppError {
    fn from(e: BelowMinimum) -> Self {
        Self::Unprocessable(e.to_string())
    }
}

impl From<SettingsError> for AppError {
    fn from(e: SettingsError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<GeocodingError> for AppError {
    fn from(e: GeocodingError) -> Self {
        tracing::warn!(error = %e, "Geocoding failed");
        Self::BadGateway("Address lookup is unavailable right now. Please try again.".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            AppError::Internal(_) | AppError::Database(_) => {
                tracing::error!(error = %self, "Request failed");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_zone_is_unprocessable() {
        let err: AppError = LocationRejection::OutOfZone {
            distance_km: 4.0,
            max_radius_km: 3.5,
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn database_errors_are_internal() {
        let err = AppError::from(sea_orm::DbErr::Custom("boom".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
