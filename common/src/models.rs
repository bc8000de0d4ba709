use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::ValidationError;

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const NAME_MAX_LENGTH: usize = 150;
pub const SLUG_MAX_LENGTH: usize = 127;
pub const TITLE_MAX_LENGTH: usize = 127;
pub const SHARE_CODE_MAX_LENGTH: usize = 127;
pub const GENERATED_SHARE_CODE_LENGTH: usize = 32;

lazy_static! {
    static ref SHARE_CODE_RE: Regex = Regex::new(r"^[a-zA-Z0-9]+$").expect("Invalid regex pattern");
}

// ============================================================================
// User Models
// ============================================================================

/// Local user record mirrored from the identity provider on first login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn short_name(&self) -> &str {
        &self.first_name
    }

    /// Superusers hold every permission
    pub fn has_perm(&self, _perm: &str) -> bool {
        self.is_superuser
    }
}

/// Fields needed to create a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

impl NewUser {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: normalize_email(&email.into()),
            first_name: String::new(),
            last_name: String::new(),
            is_staff: false,
            is_superuser: false,
        }
    }

    pub fn with_names(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    /// Superusers are always staff
    pub fn superuser(username: impl Into<String>, email: impl Into<String>) -> Self {
        let mut user = Self::new(username, email);
        user.is_staff = true;
        user.is_superuser = true;
        user
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.trim().is_empty() {
            return Err(ValidationError::MissingField("username".to_string()));
        }
        if self.username.chars().count() > USERNAME_MAX_LENGTH {
            return Err(ValidationError::invalid(
                "username",
                format!("must be at most {} characters", USERNAME_MAX_LENGTH),
            ));
        }
        if self.email.trim().is_empty() {
            return Err(ValidationError::MissingField("email".to_string()));
        }
        if self.first_name.chars().count() > NAME_MAX_LENGTH {
            return Err(ValidationError::invalid(
                "first_name",
                format!("must be at most {} characters", NAME_MAX_LENGTH),
            ));
        }
        if self.last_name.chars().count() > NAME_MAX_LENGTH {
            return Err(ValidationError::invalid(
                "last_name",
                format!("must be at most {} characters", NAME_MAX_LENGTH),
            ));
        }
        Ok(())
    }

    /// Materialize the record with a fresh id and join date
    pub fn into_user(self) -> User {
        User {
            id: Uuid::new_v4(),
            username: self.username,
            email: normalize_email(&self.email),
            first_name: self.first_name,
            last_name: self.last_name,
            is_active: true,
            is_staff: self.is_staff || self.is_superuser,
            is_superuser: self.is_superuser,
            date_joined: Utc::now(),
            last_login: None,
        }
    }
}

/// Trim the address and lowercase its domain part
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

// ============================================================================
// Page Models
// ============================================================================

/// Wiki page owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Page {
    pub id: i64,
    pub user_id: Uuid,
    pub last_updated: DateTime<Utc>,
    pub slug: String,
    pub priority: f64,
    pub title: String,
    pub public: bool,
    pub edit_permission: bool,
    pub share: bool,
    pub share_edit_permission: bool,
    pub share_code: Option<String>,
    pub text: Option<String>,
}

impl Page {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_page_fields(&PageFields {
            slug: &self.slug,
            title: &self.title,
            public: self.public,
            edit_permission: self.edit_permission,
            share: self.share,
            share_edit_permission: self.share_edit_permission,
            share_code: self.share_code.as_deref(),
        })
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Replace every editable field
    pub fn apply_input(&mut self, input: &PageInput) {
        self.slug = input.slug.clone();
        self.priority = input.priority;
        self.title = input.title.clone();
        self.public = input.public;
        self.edit_permission = input.edit_permission;
        self.share = input.share;
        self.share_edit_permission = input.share_edit_permission;
        self.share_code = input.share_code.clone();
        self.text = input.text.clone();
    }

    /// Non-owners may only touch the content
    pub fn apply_content(&mut self, input: &PageInput) {
        self.title = input.title.clone();
        self.text = input.text.clone();
    }

    pub fn apply_settings(&mut self, settings: &PageSettings) {
        self.slug = settings.slug.clone();
        self.priority = settings.priority;
        self.title = settings.title.clone();
        self.public = settings.public;
        self.edit_permission = settings.edit_permission;
        self.share = settings.share;
        self.share_edit_permission = settings.share_edit_permission;
        self.share_code = settings.share_code.clone();
    }
}

/// Editable page fields submitted on create and update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageInput {
    pub slug: String,
    pub priority: f64,
    pub title: String,
    pub public: bool,
    pub edit_permission: bool,
    pub share: bool,
    pub share_edit_permission: bool,
    pub share_code: Option<String>,
    pub text: Option<String>,
}

impl Default for PageInput {
    fn default() -> Self {
        Self {
            slug: String::new(),
            priority: 0.0,
            title: String::new(),
            public: false,
            edit_permission: false,
            share: false,
            share_edit_permission: false,
            share_code: None,
            text: None,
        }
    }
}

impl PageInput {
    /// Blank draft for the new-page form, pre-filled with a share code
    pub fn draft(slug: Option<String>) -> Self {
        Self {
            slug: slug.unwrap_or_default(),
            share_code: Some(generate_share_code()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_page_fields(&PageFields {
            slug: &self.slug,
            title: &self.title,
            public: self.public,
            edit_permission: self.edit_permission,
            share: self.share,
            share_edit_permission: self.share_edit_permission,
            share_code: self.share_code.as_deref(),
        })
    }

    /// Blank share codes count as missing
    pub fn normalized(mut self) -> Self {
        self.slug = self.slug.trim().to_string();
        if self.share_code.as_deref().map(str::trim).is_some_and(str::is_empty) {
            self.share_code = None;
        }
        self
    }
}

/// Settings row of the bulk page-settings form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSettings {
    pub id: i64,
    pub slug: String,
    #[serde(default)]
    pub priority: f64,
    pub title: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub edit_permission: bool,
    #[serde(default)]
    pub share: bool,
    #[serde(default)]
    pub share_edit_permission: bool,
    #[serde(default)]
    pub share_code: Option<String>,
}

impl From<&Page> for PageSettings {
    fn from(page: &Page) -> Self {
        Self {
            id: page.id,
            slug: page.slug.clone(),
            priority: page.priority,
            title: page.title.clone(),
            public: page.public,
            edit_permission: page.edit_permission,
            share: page.share,
            share_edit_permission: page.share_edit_permission,
            share_code: page.share_code.clone(),
        }
    }
}

struct PageFields<'a> {
    slug: &'a str,
    title: &'a str,
    public: bool,
    edit_permission: bool,
    share: bool,
    share_edit_permission: bool,
    share_code: Option<&'a str>,
}

fn validate_page_fields(fields: &PageFields<'_>) -> Result<(), ValidationError> {
    if fields.slug.is_empty() {
        return Err(ValidationError::MissingField("slug".to_string()));
    }
    if fields.slug.chars().count() > SLUG_MAX_LENGTH {
        return Err(ValidationError::invalid(
            "slug",
            format!("must be at most {} characters", SLUG_MAX_LENGTH),
        ));
    }
    if fields.slug.split('/').any(str::is_empty) {
        return Err(ValidationError::invalid(
            "slug",
            "path segments separated by '/' must not be empty",
        ));
    }

    if fields.title.trim().is_empty() {
        return Err(ValidationError::MissingField("title".to_string()));
    }
    if fields.title.chars().count() > TITLE_MAX_LENGTH {
        return Err(ValidationError::invalid(
            "title",
            format!("must be at most {} characters", TITLE_MAX_LENGTH),
        ));
    }

    if let Some(code) = fields.share_code {
        if code.chars().count() > SHARE_CODE_MAX_LENGTH {
            return Err(ValidationError::invalid(
                "share_code",
                format!("must be at most {} characters", SHARE_CODE_MAX_LENGTH),
            ));
        }
        if !SHARE_CODE_RE.is_match(code) {
            return Err(ValidationError::invalid(
                "share_code",
                "only letters and digits are allowed",
            ));
        }
    }

    if fields.edit_permission && !fields.public {
        return Err(ValidationError::ConstraintViolation(
            "edit permission requires the page to be public".to_string(),
        ));
    }
    if fields.share_edit_permission && !fields.share {
        return Err(ValidationError::ConstraintViolation(
            "share edit permission requires sharing to be enabled".to_string(),
        ));
    }

    Ok(())
}

/// Random alphanumeric share code
pub fn generate_share_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SHARE_CODE_LENGTH)
        .map(char::from)
        .collect()
}

// ============================================================================
// Identity Models
// ============================================================================

/// Claims carried by a Cognito id token (or a mock token)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CognitoClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(
        rename = "cognito:username",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Cognito sends a boolean, the mock provider a string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl CognitoClaims {
    /// Local user defaults derived from the claims, when username and email are present
    pub fn to_new_user(&self) -> Option<NewUser> {
        let username = self.username.as_deref().filter(|u| !u.is_empty())?;
        let email = self.email.as_deref().filter(|e| !e.is_empty())?;
        Some(NewUser::new(username, email).with_names(
            self.given_name.clone().unwrap_or_default(),
            self.family_name.clone().unwrap_or_default(),
        ))
    }
}

/// Tokens returned by a successful authentication or refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationResult {
    pub id_token: String,
    pub access_token: String,
    /// Absent on refresh, the original refresh token stays valid
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: String,
}

/// Attributes submitted on sign-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignUpResult {
    pub user_sub: String,
    pub user_confirmed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> PageInput {
        PageInput {
            slug: "guide/setup".to_string(),
            title: "Setup".to_string(),
            ..PageInput::default()
        }
    }

    #[test]
    fn test_normalize_email_lowercases_domain_only() {
        assert_eq!(normalize_email("  John.Doe@Example.COM "), "John.Doe@example.com");
        assert_eq!(normalize_email("not-an-email"), "not-an-email");
        assert_eq!(normalize_email("a@b@Example.ORG"), "a@b@example.org");
    }

    #[test]
    fn test_superuser_is_staff() {
        let user = NewUser::superuser("admin", "admin@example.com").into_user();
        assert!(user.is_staff);
        assert!(user.is_superuser);
        assert!(user.is_active);
        assert!(user.has_perm("wiki.change_page"));
    }

    #[test]
    fn test_regular_user_has_no_perms() {
        let user = NewUser::new("alice", "alice@example.com").into_user();
        assert!(!user.has_perm("wiki.change_page"));
    }

    #[test]
    fn test_inactive_superuser_keeps_perms() {
        let mut user = NewUser::superuser("admin", "admin@example.com").into_user();
        user.is_active = false;
        assert!(user.has_perm("wiki.change_page"));

        user.is_superuser = false;
        user.is_staff = true;
        assert!(!user.has_perm("wiki.change_page"));
    }

    #[test]
    fn test_full_name_and_short_name() {
        let user = NewUser::new("alice", "alice@example.com")
            .with_names("Alice", "Liddell")
            .into_user();
        assert_eq!(user.full_name(), "Alice Liddell");
        assert_eq!(user.short_name(), "Alice");

        let nameless = NewUser::new("bob", "bob@example.com").into_user();
        assert_eq!(nameless.full_name(), "");
    }

    #[test]
    fn test_new_user_requires_username_and_email() {
        assert!(NewUser::new("", "a@example.com").validate().is_err());
        assert!(NewUser::new("alice", "").validate().is_err());
        assert!(NewUser::new("alice", "a@example.com").validate().is_ok());
    }

    #[test]
    fn test_valid_page_input() {
        assert!(valid_input().validate().is_ok());
    }

    #[test]
    fn test_edit_permission_requires_public() {
        let mut input = valid_input();
        input.edit_permission = true;
        assert!(matches!(
            input.validate(),
            Err(ValidationError::ConstraintViolation(_))
        ));

        input.public = true;
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_share_edit_permission_requires_share() {
        let mut input = valid_input();
        input.share_edit_permission = true;
        assert!(input.validate().is_err());

        input.share = true;
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_share_code_must_be_alphanumeric() {
        let mut input = valid_input();
        input.share_code = Some("abc-123".to_string());
        assert!(input.validate().is_err());

        input.share_code = Some("abc123XYZ".to_string());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_slug_segments_must_not_be_empty() {
        for slug in ["", "/guide", "guide/", "guide//setup"] {
            let mut input = valid_input();
            input.slug = slug.to_string();
            assert!(input.validate().is_err(), "slug {:?} should be rejected", slug);
        }
    }

    #[test]
    fn test_title_length_limit() {
        let mut input = valid_input();
        input.title = "t".repeat(TITLE_MAX_LENGTH);
        assert!(input.validate().is_ok());
        input.title = "t".repeat(TITLE_MAX_LENGTH + 1);
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_generated_share_code_shape() {
        let code = generate_share_code();
        assert_eq!(code.len(), GENERATED_SHARE_CODE_LENGTH);
        assert!(SHARE_CODE_RE.is_match(&code));
        assert_ne!(code, generate_share_code());
    }

    #[test]
    fn test_draft_has_share_code() {
        let draft = PageInput::draft(Some("notes".to_string()));
        assert_eq!(draft.slug, "notes");
        assert!(draft.share_code.is_some());
        assert!(!draft.public);
    }

    #[test]
    fn test_normalized_drops_blank_share_code() {
        let mut input = valid_input();
        input.share_code = Some("   ".to_string());
        assert_eq!(input.normalized().share_code, None);
    }

    #[test]
    fn test_page_input_deserializes_with_defaults() {
        let input: PageInput =
            serde_json::from_str(r#"{"slug":"a","title":"A"}"#).unwrap();
        assert_eq!(input.priority, 0.0);
        assert!(!input.public);
        assert_eq!(input.text, None);
    }

    #[test]
    fn test_claims_to_new_user() {
        let claims = CognitoClaims {
            username: Some("alice".to_string()),
            email: Some("alice@Example.com".to_string()),
            given_name: Some("Alice".to_string()),
            ..CognitoClaims::default()
        };
        let new_user = claims.to_new_user().unwrap();
        assert_eq!(new_user.username, "alice");
        assert_eq!(new_user.email, "alice@example.com");
        assert_eq!(new_user.first_name, "Alice");
        assert_eq!(new_user.last_name, "");

        let no_email = CognitoClaims {
            username: Some("alice".to_string()),
            ..CognitoClaims::default()
        };
        assert!(no_email.to_new_user().is_none());
    }

    #[test]
    fn test_claims_read_cognito_username() {
        let claims: CognitoClaims = serde_json::from_value(serde_json::json!({
            "sub": "abc",
            "cognito:username": "alice",
            "email_verified": true,
            "custom:unknown": "ignored"
        }))
        .unwrap();
        assert_eq!(claims.username.as_deref(), Some("alice"));
        assert_eq!(claims.email_verified, Some(serde_json::json!(true)));
    }
}
