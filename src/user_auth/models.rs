//! Identity domain types and request/response DTOs.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use validator::Validate;

use super::error::IdentityError;
use super::token::Claims;

/// Role assigned to every registered user. Not settable through registration.
pub const DEFAULT_ROLE: &str = "user";

/// User row as persisted by the user store.
///
/// `hash_password` never leaves the service: this type is not `Serialize`,
/// responses go through [`UserProfile`].
#[derive(Clone, sqlx::FromRow)]
pub struct User {
    pub user_id: i64,
    pub login: String,
    pub email: String,
    pub hash_password: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub phonenumber: String,
    pub address: String,
    pub avatar_path: Option<String>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("user_id", &self.user_id)
            .field("login", &self.login)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("avatar_path", &self.avatar_path)
            .finish_non_exhaustive()
    }
}

/// Row to insert; the store assigns `user_id`.
#[derive(Clone)]
pub struct NewUser {
    pub login: String,
    pub email: String,
    pub hash_password: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub phonenumber: String,
    pub address: String,
}

/// Full profile rewrite. `avatar_path: None` keeps the stored reference.
#[derive(Clone)]
pub struct ProfileUpdate {
    pub login: String,
    pub email: String,
    pub hash_password: String,
    pub first_name: String,
    pub last_name: String,
    pub phonenumber: String,
    pub address: String,
    pub avatar_path: Option<String>,
}

/// Public view of a user (digest omitted)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct UserProfile {
    #[schema(example = 1)]
    pub user_id: i64,
    #[schema(example = "alice")]
    pub login: String,
    #[schema(example = "user")]
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    #[schema(example = "a@x.com")]
    pub email: String,
    pub address: String,
    pub phonenumber: String,
    /// Avatar reference, if one was uploaded
    #[schema(example = "0b8e4f0e-3c1b-4a55-9d0a-7f3c2d1e9a10.png")]
    pub avatar: Option<String>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            login: user.login,
            role: user.role,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            address: user.address,
            phonenumber: user.phonenumber,
            avatar: user.avatar_path,
        }
    }
}

/// User Registration Request
#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "alice")]
    pub login: String,
    #[schema(example = "pw1")]
    pub password: String,
    #[schema(example = "a@x.com")]
    pub email: String,
    /// Accepted for compatibility and ignored: every new user gets role `user`.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phonenumber: String,
    #[serde(default)]
    pub address: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("login", &self.login)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// User Login Request
///
/// Exactly one of `email` or `login` identifies the account.
#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    #[schema(example = "a@x.com")]
    pub email: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
    #[schema(example = "pw1")]
    pub password: String,
}

impl LoginRequest {
    /// Resolve the single identifier this request authenticates with.
    pub fn identifier(&self) -> Result<LoginIdentifier, IdentityError> {
        let email = self.email.as_deref().filter(|s| !s.is_empty());
        let login = self.login.as_deref().filter(|s| !s.is_empty());
        match (email, login) {
            (Some(email), None) => Ok(LoginIdentifier::Email(email.to_string())),
            (None, Some(login)) => Ok(LoginIdentifier::Login(login.to_string())),
            _ => Err(IdentityError::ValidationFailure("identifier")),
        }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

/// Key a login attempt is looked up by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginIdentifier {
    Email(String),
    Login(String),
}

/// Auth Response (session token)
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Profile updated")]
    pub message: String,
}

/// Text fields of the profile update form. All are required non-empty.
#[derive(Default, Clone, Validate)]
pub struct ProfileForm {
    #[validate(length(min = 1))]
    pub login: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub phonenumber: String,
    #[validate(length(min = 1))]
    pub address: String,
}

impl ProfileForm {
    /// Field order used when reporting the first missing field.
    const FIELDS: [&'static str; 7] = [
        "login",
        "password",
        "first_name",
        "last_name",
        "email",
        "phonenumber",
        "address",
    ];

    /// Assign a multipart text field by name; unknown names are ignored.
    pub fn set(&mut self, name: &str, value: String) {
        match name {
            "login" => self.login = value,
            "password" => self.password = value,
            "first_name" => self.first_name = value,
            "last_name" => self.last_name = value,
            "email" => self.email = value,
            "phonenumber" => self.phonenumber = value,
            "address" => self.address = value,
            _ => {}
        }
    }

    /// Check every required field, reporting the first empty one.
    pub fn check(&self) -> Result<(), IdentityError> {
        let Err(errors) = self.validate() else {
            return Ok(());
        };
        let failed = errors.field_errors();
        let field = Self::FIELDS
            .into_iter()
            .find(|name| failed.contains_key(*name))
            .unwrap_or("form");
        Err(IdentityError::ValidationFailure(field))
    }
}

impl fmt::Debug for ProfileForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileForm")
            .field("login", &self.login)
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish_non_exhaustive()
    }
}

/// Multipart schema of `PUT /api/sso/update_user_profile` (documentation only)
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ProfileFormSchema {
    login: String,
    password: String,
    first_name: String,
    last_name: String,
    email: String,
    phonenumber: String,
    address: String,
    /// Optional image (.webp, .jpg, .png)
    #[schema(value_type = Option<String>, format = Binary)]
    avatar: Option<Vec<u8>>,
}

/// Image attached to a profile update.
#[derive(Clone)]
pub struct AvatarUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for AvatarUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvatarUpload")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Identity the access gate established for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub user_id: i64,
    pub login: String,
}

impl From<Claims> for AuthenticatedIdentity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            login: claims.login,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_form() -> ProfileForm {
        ProfileForm {
            login: "alice".into(),
            password: "pw1".into(),
            first_name: "Alice".into(),
            last_name: "Liddell".into(),
            email: "a@x.com".into(),
            phonenumber: "+100".into(),
            address: "Wonderland".into(),
        }
    }

    #[test]
    fn test_profile_form_complete() {
        assert!(full_form().check().is_ok());
    }

    #[test]
    fn test_profile_form_reports_first_missing_field() {
        let mut form = full_form();
        form.email.clear();
        form.address.clear();
        assert_eq!(
            form.check(),
            Err(IdentityError::ValidationFailure("email"))
        );
    }

    #[test]
    fn test_profile_form_set_ignores_unknown() {
        let mut form = ProfileForm::default();
        form.set("login", "bob".into());
        form.set("role", "admin".into());
        assert_eq!(form.login, "bob");
        assert_eq!(form.check(), Err(IdentityError::ValidationFailure("password")));
    }

    #[test]
    fn test_login_identifier_resolution() {
        let by_email: LoginRequest =
            serde_json::from_str(r#"{"email":"a@x.com","password":"pw1"}"#).unwrap();
        assert_eq!(
            by_email.identifier(),
            Ok(LoginIdentifier::Email("a@x.com".into()))
        );

        let by_login: LoginRequest =
            serde_json::from_str(r#"{"login":"alice","password":"pw1"}"#).unwrap();
        assert_eq!(
            by_login.identifier(),
            Ok(LoginIdentifier::Login("alice".into()))
        );

        let both: LoginRequest = serde_json::from_str(
            r#"{"login":"alice","email":"a@x.com","password":"pw1"}"#,
        )
        .unwrap();
        assert!(both.identifier().is_err());

        let neither: LoginRequest = serde_json::from_str(r#"{"password":"pw1"}"#).unwrap();
        assert!(neither.identifier().is_err());
    }

    #[test]
    fn test_register_request_defaults() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"login":"alice","email":"a@x.com","password":"pw1","role":"admin"}"#,
        )
        .unwrap();
        assert_eq!(req.role.as_deref(), Some("admin"));
        assert!(req.first_name.is_empty());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"login":"alice","email":"a@x.com","password":"hunter2"}"#,
        )
        .unwrap();
        assert!(!format!("{:?}", req).contains("hunter2"));
        assert!(!format!("{:?}", full_form()).contains("pw1"));
    }

    #[test]
    fn test_profile_omits_digest() {
        let user = User {
            user_id: 7,
            login: "alice".into(),
            email: "a@x.com".into(),
            hash_password: "$argon2id$secret".into(),
            role: DEFAULT_ROLE.into(),
            first_name: String::new(),
            last_name: String::new(),
            phonenumber: String::new(),
            address: String::new(),
            avatar_path: None,
        };
        assert!(!format!("{:?}", user).contains("argon2"));
        let json = serde_json::to_string(&UserProfile::from(user)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"avatar\":null"));
    }
}
