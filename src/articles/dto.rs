use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::AppError;

/// Request body for creating or fully updating an article. Updates overwrite
/// every field here; there is no partial merge.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub is_active: bool,
}

impl ArticleRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name must not be empty".into()));
        }
        if self.price <= Decimal::ZERO {
            return Err(AppError::Validation("price must be positive".into()));
        }
        if self.stock < 0 {
            return Err(AppError::Validation("stock must not be negative".into()));
        }
        Ok(())
    }
}

/// Envelope returned by the write endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse {
    pub status_code: u16,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl SuccessResponse {
    pub fn new(status_code: u16, message: &str) -> Self {
        Self {
            status_code,
            message: message.to_string(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}
