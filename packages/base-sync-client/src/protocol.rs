//! Request routes, the response envelope, and request/response payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ClientError, Result};

pub mod routes {
    pub const PROJECT_CREATE: &str = "project:create";
    pub const PROJECT_UPDATE: &str = "project:update";
    pub const PROJECT_DELETE: &str = "project:delete";
}

/// Envelope every route answers with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub is_success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub data: Value,
    /// Anything else the server put in the envelope (error messages etc.)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Response {
    pub fn success(data: Value) -> Self {
        Self {
            is_success: true,
            status_code: Some(200),
            data,
            extra: Map::new(),
        }
    }

    pub fn failure(status_code: u16, message: impl Into<String>) -> Self {
        let mut extra = Map::new();
        extra.insert("message".to_string(), Value::String(message.into()));
        Self {
            is_success: false,
            status_code: Some(status_code),
            data: Value::Null,
            extra,
        }
    }

    /// Returns `data` on success, or the whole envelope as a remote error.
    pub fn into_result(self) -> Result<Value> {
        if self.is_success {
            return Ok(self.data);
        }
        let status_code = self.status_code;
        let payload = serde_json::to_value(&self)?;
        Err(ClientError::Remote {
            status_code,
            payload,
        })
    }
}

/// Payload of the snapshot route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSyncBaseRequest {
    pub project_id: String,
}

/// Credentials of the backing spreadsheet service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirtableCredentials {
    pub personal_access_token: String,
    pub base_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub airtable: AirtableCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airtable: Option<AirtableCredentials>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteProjectRequest {
    pub id: String,
}

/// A project as returned by the project routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
