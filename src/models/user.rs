use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Account role as stored on a user document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    Pending,
    User,
    Blocked,
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 4] = [
        UserRole::Pending,
        UserRole::User,
        UserRole::Blocked,
        UserRole::Admin,
    ];

    pub fn code(self) -> i64 {
        match self {
            UserRole::Pending => 0,
            UserRole::User => 1,
            UserRole::Blocked => 2,
            UserRole::Admin => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<UserRole> {
        Self::ALL.into_iter().find(|role| role.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            UserRole::Pending => "Pending",
            UserRole::User => "User",
            UserRole::Blocked => "Blocked",
            UserRole::Admin => "Admin",
        }
    }
}

/// Display label for a stored role code. Codes written by other tools may
/// not be known here.
pub fn role_label(code: i64) -> &'static str {
    UserRole::from_code(code).map_or("Unknown", UserRole::label)
}

/// A profile document in `users`. Credentials never live here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    pub role: i64,
}

impl User {
    pub fn role_label(&self) -> &'static str {
        role_label(self.role)
    }
}

/// Fields an operator sets when adding or editing a user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub role: i64,
}

impl UserProfile {
    /// Trims every text field and checks the role code.
    pub fn normalized(&self) -> AppResult<UserProfile> {
        let profile = UserProfile {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
            role: self.role,
        };
        let required = [
            ("name", &profile.name),
            ("email", &profile.email),
            ("phone number", &profile.phone_number),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.is_empty()) {
            return Err(AppError::InvalidInput(format!("{} is required", field)));
        }
        if !profile.email.contains('@') {
            return Err(AppError::InvalidInput(format!(
                "'{}' is not an email address",
                profile.email
            )));
        }
        if UserRole::from_code(profile.role).is_none() {
            return Err(AppError::InvalidInput(format!(
                "unknown role code {}",
                profile.role
            )));
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            name: " Ada ".into(),
            email: "ada@example.com".into(),
            phone_number: "+49 30 1234".into(),
            role: 1,
        }
    }

    #[test]
    fn test_role_labels() {
        assert_eq!(role_label(0), "Pending");
        assert_eq!(role_label(3), "Admin");
        assert_eq!(role_label(7), "Unknown");
    }

    #[test]
    fn test_profile_is_trimmed_and_checked() {
        assert_eq!(profile().normalized().unwrap().name, "Ada");

        let mut bad = profile();
        bad.email = "ada".into();
        assert!(matches!(bad.normalized(), Err(AppError::InvalidInput(_))));

        let mut bad = profile();
        bad.role = 9;
        assert!(matches!(bad.normalized(), Err(AppError::InvalidInput(_))));

        let mut bad = profile();
        bad.phone_number = "  ".into();
        assert!(matches!(bad.normalized(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_user_wire_names() {
        let user: User = serde_json::from_value(json!({
            "id": "u1",
            "name": "Ada",
            "email": "ada@example.com",
            "phoneNumber": "123",
            "role": 3
        }))
        .unwrap();
        assert_eq!(user.phone_number, "123");
        assert_eq!(user.role_label(), "Admin");
    }
}
