//! Accounts, sessions and role capabilities
//!
//! Bearer tokens are 32 random bytes rendered as hex. Only their SHA-256 is
//! persisted, so a leaked sessions table cannot be replayed.

use crate::audit::hash_token;
use crate::error::{TrackerError, Validator};
use crate::models::{Role, Session, User};
use crate::pagination::{PageRequest, Paginated};
use crate::store::Store;
use crate::Result;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const SESSION_TTL_DAYS: i64 = 30;
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ManageContent,
    ManageMedia,
    ViewAllUsers,
    ManageRoles,
}

impl Capability {
    pub const ALL: &'static [Capability] = &[
        Capability::ManageContent,
        Capability::ManageMedia,
        Capability::ViewAllUsers,
        Capability::ManageRoles,
    ];
}

impl Role {
    pub fn can(&self, capability: Capability) -> bool {
        match self {
            Role::SuperAdmin => true,
            Role::Admin => !matches!(capability, Capability::ManageRoles),
            Role::User => false,
        }
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL.iter().copied().filter(|c| self.can(*c)).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleInfo {
    pub role: Role,
    pub capabilities: Vec<Capability>,
}

pub fn roles() -> Vec<RoleInfo> {
    Role::ALL
        .iter()
        .map(|role| RoleInfo {
            role: *role,
            capabilities: role.capabilities(),
        })
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub password_confirmation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginPayload {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RolePayload {
    pub role: Option<String>,
}

/// Issued on register and login; the token is shown exactly once
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|e| TrackerError::Credential(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| TrackerError::Credential(e.to_string()))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "Stored password hash is unreadable");
            false
        }
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub struct AuthService {
    store: Arc<dyn Store>,
    /// Accounts registering with this email start as super admin
    super_admin_email: Option<String>,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            super_admin_email: None,
        }
    }

    pub fn with_super_admin_email(mut self, email: Option<String>) -> Self {
        self.super_admin_email = email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty());
        self
    }

    pub async fn register(&self, payload: RegisterPayload, now: DateTime<Utc>) -> Result<IssuedToken> {
        let email = payload.email.trim().to_lowercase();

        let mut v = Validator::new();
        v.require_text(&payload.name, "name", 100);
        v.check(looks_like_email(&email), "email", "The email must be a valid email address.");
        v.check(
            payload.password.chars().count() >= MIN_PASSWORD_LEN,
            "password",
            &format!("The password must be at least {} characters.", MIN_PASSWORD_LEN),
        );
        if let Some(confirmation) = payload.password_confirmation.as_deref() {
            v.check(
                confirmation == payload.password,
                "password",
                "The password confirmation does not match.",
            );
        }
        v.finish()?;

        let role = if self.super_admin_email.as_deref() == Some(email.as_str()) {
            Role::SuperAdmin
        } else {
            Role::User
        };

        let user = User {
            id: Uuid::new_v4(),
            name: payload.name.trim().to_string(),
            email,
            password_hash: hash_password(&payload.password)?,
            role,
            created_at: now,
        };
        self.store.insert_user(&user).await?;

        info!(user_id = %user.id, role = %user.role, "User registered");
        self.issue(user, now).await
    }

    pub async fn login(&self, payload: LoginPayload, now: DateTime<Utc>) -> Result<IssuedToken> {
        let mut v = Validator::new();
        v.require_text(&payload.email, "email", 255);
        v.check(!payload.password.is_empty(), "password", "The password field is required.");
        v.finish()?;

        let user = self
            .store
            .find_user_by_email(payload.email.trim())
            .await?
            .filter(|user| verify_password(&payload.password, &user.password_hash))
            .ok_or_else(|| TrackerError::Unauthenticated("Invalid credentials".to_string()))?;

        self.issue(user, now).await
    }

    async fn issue(&self, user: User, now: DateTime<Utc>) -> Result<IssuedToken> {
        let token = new_token();
        let expires_at = now + Duration::days(SESSION_TTL_DAYS);

        self.store
            .insert_session(&Session {
                token_hash: hash_token(&token),
                user_id: user.id,
                expires_at,
            })
            .await?;

        Ok(IssuedToken {
            token,
            token_type: "Bearer",
            expires_at,
            user,
        })
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        self.store.delete_session(&hash_token(token)).await
    }

    /// Resolve a bearer token to its user; unknown and expired tokens are 401
    pub async fn authenticate(&self, token: &str, now: DateTime<Utc>) -> Result<User> {
        self.store
            .user_for_session(&hash_token(token), now)
            .await?
            .ok_or_else(|| TrackerError::Unauthenticated("Invalid or expired token".to_string()))
    }

    pub async fn list_users(&self, page: PageRequest) -> Result<Paginated<User>> {
        self.store.list_users(page).await
    }

    pub async fn assign_role(&self, actor: &User, user_id: Uuid, payload: RolePayload) -> Result<User> {
        let role = payload
            .role
            .as_deref()
            .ok_or_else(|| TrackerError::invalid("role", "The role field is required."))?
            .parse::<Role>()
            .map_err(|_| TrackerError::invalid("role", "The selected role is invalid."))?;

        if actor.id == user_id && role != Role::SuperAdmin {
            return Err(TrackerError::invalid("role", "You cannot demote yourself."));
        }

        let user = self
            .store
            .update_user_role(user_id, role)
            .await?
            .ok_or_else(|| TrackerError::not_found("User"))?;

        info!(actor_id = %actor.id, user_id = %user.id, role = %role, "Role assigned");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn service() -> AuthService {
        AuthService::new(Arc::new(InMemoryStore::new()))
            .with_super_admin_email(Some("Root@Example.com".to_string()))
    }

    fn register_payload(email: &str) -> RegisterPayload {
        RegisterPayload {
            name: "Ana".to_string(),
            email: email.to_string(),
            password: "correct horse".to_string(),
            password_confirmation: None,
        }
    }

    #[test]
    fn test_capability_matrix() {
        assert!(Role::User.capabilities().is_empty());
        assert!(Role::Admin.can(Capability::ManageContent));
        assert!(Role::Admin.can(Capability::ViewAllUsers));
        assert!(!Role::Admin.can(Capability::ManageRoles));
        assert_eq!(Role::SuperAdmin.capabilities().len(), Capability::ALL.len());
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret-pass", &hash));
        assert!(!verify_password("wrong-pass", &hash));
        assert!(!verify_password("s3cret-pass", "not a hash"));
    }

    #[tokio::test]
    async fn test_register_login_logout() {
        let service = service();
        let now = Utc::now();

        let issued = service.register(register_payload("ana@example.com"), now).await.unwrap();
        assert_eq!(issued.token.len(), 64);
        assert_eq!(issued.user.role, Role::User);

        let user = service.authenticate(&issued.token, now).await.unwrap();
        assert_eq!(user.id, issued.user.id);

        let relogin = service
            .login(
                LoginPayload {
                    email: "ANA@example.com".to_string(),
                    password: "correct horse".to_string(),
                },
                now,
            )
            .await
            .unwrap();
        assert_ne!(relogin.token, issued.token);

        service.logout(&issued.token).await.unwrap();
        assert!(matches!(
            service.authenticate(&issued.token, now).await,
            Err(TrackerError::Unauthenticated(_))
        ));
        assert!(service.authenticate(&relogin.token, now).await.is_ok());
    }

    #[tokio::test]
    async fn test_bad_credentials_and_expiry() {
        let service = service();
        let now = Utc::now();
        let issued = service.register(register_payload("ana@example.com"), now).await.unwrap();

        let wrong = service
            .login(
                LoginPayload {
                    email: "ana@example.com".to_string(),
                    password: "incorrect".to_string(),
                },
                now,
            )
            .await;
        assert!(matches!(wrong, Err(TrackerError::Unauthenticated(_))));

        let later = now + Duration::days(SESSION_TTL_DAYS + 1);
        assert!(service.authenticate(&issued.token, later).await.is_err());
    }

    #[tokio::test]
    async fn test_registration_validation() {
        let service = service();
        let err = service
            .register(
                RegisterPayload {
                    name: String::new(),
                    email: "nope".to_string(),
                    password: "short".to_string(),
                    password_confirmation: Some("other".to_string()),
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        match err {
            TrackerError::Validation(errors) => {
                assert!(errors.contains_key("name"));
                assert!(errors.contains_key("email"));
                assert_eq!(errors["password"].len(), 2);
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        service.register(register_payload("dup@example.com"), Utc::now()).await.unwrap();
        assert!(matches!(
            service.register(register_payload("dup@example.com"), Utc::now()).await,
            Err(TrackerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_super_admin_bootstrap_and_role_assignment() {
        let service = service();
        let now = Utc::now();
        let root = service.register(register_payload("root@example.com"), now).await.unwrap().user;
        assert_eq!(root.role, Role::SuperAdmin);

        let member = service.register(register_payload("ana@example.com"), now).await.unwrap().user;
        let promoted = service
            .assign_role(&root, member.id, RolePayload { role: Some("admin".to_string()) })
            .await
            .unwrap();
        assert_eq!(promoted.role, Role::Admin);

        let invalid = service
            .assign_role(&root, member.id, RolePayload { role: Some("owner".to_string()) })
            .await;
        assert!(matches!(invalid, Err(TrackerError::Validation(_))));

        let missing = service
            .assign_role(&root, Uuid::new_v4(), RolePayload { role: Some("user".to_string()) })
            .await;
        assert!(matches!(missing, Err(TrackerError::NotFound(_))));
    }
}
