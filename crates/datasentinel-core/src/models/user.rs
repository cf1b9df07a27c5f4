use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Account identified by email; `is_pro` unlocks prediction
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub is_pro: bool,
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Login form body
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
}

impl LoginRequest {
    /// Trimmed, lower-cased email
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

/// Display name derived from an email: its local part.
pub fn name_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_login_request_normalizes_email() {
        let req = LoginRequest {
            email: "  Ada@Example.COM ".to_string(),
        };
        assert_eq!(req.normalized_email(), "ada@example.com");
    }

    #[test]
    fn test_login_request_rejects_non_email() {
        let req = LoginRequest {
            email: "not-an-email".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_name_from_email() {
        assert_eq!(name_from_email("ada@example.com"), "ada");
        assert_eq!(name_from_email("plain"), "plain");
    }
}
