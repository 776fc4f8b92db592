use serde::{Deserialize, Serialize};

use crate::{
    domain::{CardId, CardOrder, DeckId, OwnerId},
    error::{ApiError, ErrorCode},
};

pub const DASHBOARD_PATH: &str = "/dashboard";

pub fn deck_path(deck_id: DeckId) -> String {
    format!("/deck/{}", deck_id.0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDeckInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDeckInput {
    pub id: DeckId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteDeckInput {
    pub id: DeckId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardInput {
    pub deck_id: DeckId,
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCardInput {
    pub id: CardId,
    pub deck_id: DeckId,
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCardInput {
    pub id: CardId,
    pub deck_id: DeckId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderCardsInput {
    pub deck_id: DeckId,
    pub card_orders: Vec<CardOrder>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub user_id: OwnerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Uniform envelope returned by every action. Failures never cross the
/// action boundary as errors; callers branch on `success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
            field: None,
        }
    }

    pub fn failed(error: ApiError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.message),
            code: Some(error.code),
            field: error.field,
        }
    }

    /// Converts the envelope back into a `Result`. A successful envelope
    /// may carry no data (unit actions).
    pub fn into_result(self) -> Result<Option<T>, ApiError> {
        if self.success {
            return Ok(self.data);
        }
        Err(ApiError {
            code: self.code.unwrap_or(ErrorCode::Internal),
            message: self
                .error
                .unwrap_or_else(|| "action failed".to_string()),
            field: self.field,
        })
    }
}

impl ActionResult<()> {
    /// Unit actions report success without a payload.
    pub fn done() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            code: None,
            field: None,
        }
    }
}

impl<T> From<Result<T, ApiError>> for ActionResult<T> {
    fn from(value: Result<T, ApiError>) -> Self {
        match value {
            Ok(data) => Self::ok(data),
            Err(error) => Self::failed(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    ViewsInvalidated { owner_id: OwnerId, paths: Vec<String> },
}

impl ServerEvent {
    pub fn owner_id(&self) -> &OwnerId {
        match self {
            Self::ViewsInvalidated { owner_id, .. } => owner_id,
        }
    }
}
