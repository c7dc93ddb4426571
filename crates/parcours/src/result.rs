//! `{success, data?, error?}`: the shape every caller of the engine sees.

use serde::{Deserialize, Serialize};

use crate::error::ParcoursError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        ActionResult {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        ActionResult {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

impl<T> From<Result<T, ParcoursError>> for ActionResult<T> {
    fn from(result: Result<T, ParcoursError>) -> Self {
        match result {
            Ok(data) => ActionResult::ok(data),
            Err(e) => {
                tracing::error!(error = %e, "parcours action failed");
                ActionResult::err(e.user_message())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_omits_error_field() {
        let json = serde_json::to_value(ActionResult::ok(42)).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": 42}));
    }

    #[test]
    fn error_uses_user_message() {
        let result: ActionResult<()> =
            Err(ParcoursError::JourneyNotFound("applicant-9".into())).into();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Parcours non trouvé"));
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("data").is_none());
    }
}
