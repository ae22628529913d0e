use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::content::SearchResult;

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoginResponse {
    pub name: String,
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckoutRequest {
    pub commit: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckoutResponse {
    pub commit: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SaveRequest {
    pub message: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SaveResponse {
    pub message: String,
}

/// A page as listed by the pages endpoint.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PageSummary {
    pub path: String,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub view: String,
    #[serde(rename = "Type")]
    pub content_type: String,
    pub content: serde_json::Value,
}

impl PageSummary {
    pub fn from_result(result: SearchResult) -> Result<Self, serde_json::Error> {
        let SearchResult { path, model } = result;
        let content = match model.content.as_deref() {
            Some(payload) => payload.to_value()?,
            None => serde_json::Value::Null,
        };
        Ok(Self {
            path,
            id: model.id,
            created_at: model.created_at,
            view: model.view,
            content_type: model.content_type,
            content,
        })
    }
}
