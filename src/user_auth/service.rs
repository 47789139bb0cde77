//! Identity service: registration, login, profile read and profile update.
//!
//! The only owner of business invariants. Lower layers report their own error
//! kinds; they are logged here with operation context and folded into
//! [`IdentityError`].

use chrono::Duration;
use once_cell::sync::Lazy;
use std::sync::Arc;

use super::avatar::{AvatarDelegate, AvatarFile};
use super::error::{IdentityError, StoreError};
use super::models::{
    AuthenticatedIdentity, AvatarUpload, DEFAULT_ROLE, LoginIdentifier, LoginRequest, NewUser,
    ProfileForm, ProfileUpdate, RegisterRequest, UserProfile,
};
use super::password::{hash_password, verify_password};
use super::repository::UserStore;
use super::token::TokenCodec;

/// Digest checked against when the login identifier is unknown, so both
/// rejection paths cost one verification.
static TIMING_DIGEST: Lazy<Option<String>> =
    Lazy::new(|| hash_password("timing-equalizer").ok());

pub struct IdentityService {
    store: Arc<dyn UserStore>,
    avatars: Arc<dyn AvatarDelegate>,
    tokens: Arc<TokenCodec>,
    token_ttl: Duration,
}

impl IdentityService {
    pub fn new(
        store: Arc<dyn UserStore>,
        avatars: Arc<dyn AvatarDelegate>,
        tokens: Arc<TokenCodec>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            avatars,
            tokens,
            token_ttl,
        }
    }

    /// Register a new user and issue a session token for it.
    pub async fn register(&self, req: RegisterRequest) -> Result<String, IdentityError> {
        if req.login.is_empty() {
            return Err(IdentityError::ValidationFailure("login"));
        }
        if req.email.is_empty() {
            return Err(IdentityError::ValidationFailure("email"));
        }
        if req.password.is_empty() {
            return Err(IdentityError::ValidationFailure("password"));
        }

        // 1. Uniqueness checks; the unique constraint on insert is the real guard
        if self
            .store
            .exists_by_email(&req.email)
            .await
            .map_err(|e| internal("register.exists_by_email", e))?
        {
            tracing::warn!(login = %req.login, "registration rejected: email already in use");
            return Err(IdentityError::Conflict);
        }
        if self
            .store
            .exists_by_login(&req.login)
            .await
            .map_err(|e| internal("register.exists_by_login", e))?
        {
            tracing::warn!(login = %req.login, "registration rejected: login already in use");
            return Err(IdentityError::Conflict);
        }

        // 2. Hash password
        let hash_password = hash_password(&req.password).map_err(|e| {
            tracing::error!(op = "register.hash", error = %e, "password hashing failed");
            IdentityError::from(e)
        })?;

        // 3. Persist with the role forced to the default
        let login = req.login;
        let user_id = self
            .store
            .create(NewUser {
                login: login.clone(),
                email: req.email,
                hash_password,
                role: DEFAULT_ROLE.to_string(),
                first_name: req.first_name,
                last_name: req.last_name,
                phonenumber: req.phonenumber,
                address: req.address,
            })
            .await
            .map_err(|e| match e {
                StoreError::ConstraintViolation => {
                    tracing::warn!(login = %login, "registration lost uniqueness race");
                    IdentityError::Conflict
                }
                other => internal("register.create", other),
            })?;

        // 4. Issue token for the new identity; no row survives a failed issue
        let token = match self.tokens.issue(&login, user_id, self.token_ttl) {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(
                    user_id,
                    login = %login,
                    error = %e,
                    "token issue failed after insert"
                );
                if let Err(del) = self.store.delete(user_id).await {
                    tracing::error!(user_id, error = %del, "failed to remove unissued registration");
                }
                return Err(e.into());
            }
        };
        tracing::info!(user_id, login = %login, "user registered");
        Ok(token)
    }

    /// Authenticate by email or login and issue a session token.
    ///
    /// Unknown identifier and wrong password both yield `Unauthorized`.
    pub async fn login(&self, req: LoginRequest) -> Result<String, IdentityError> {
        let identifier = req.identifier()?;
        let lookup = match &identifier {
            LoginIdentifier::Email(email) => self.store.find_by_email(email).await,
            LoginIdentifier::Login(login) => self.store.find_by_login(login).await,
        };

        let user = match lookup {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                if let Some(digest) = TIMING_DIGEST.as_deref() {
                    let _ = verify_password(digest, &req.password);
                }
                tracing::debug!(?identifier, "login rejected");
                return Err(IdentityError::Unauthorized);
            }
            Err(e) => return Err(internal("login.lookup", e)),
        };

        if !verify_password(&user.hash_password, &req.password) {
            tracing::debug!(?identifier, "login rejected");
            return Err(IdentityError::Unauthorized);
        }

        let token = self.tokens.issue(&user.login, user.user_id, self.token_ttl)?;
        tracing::info!(user_id = user.user_id, "user logged in");
        Ok(token)
    }

    /// Validate a bearer token and return the identity it carries.
    pub fn authenticate(&self, token: &str) -> Result<AuthenticatedIdentity, IdentityError> {
        let claims = self.tokens.validate(token)?;
        Ok(AuthenticatedIdentity::from(claims))
    }

    /// Profile of the authenticated user, digest omitted.
    pub async fn get_profile(
        &self,
        identity: &AuthenticatedIdentity,
    ) -> Result<UserProfile, IdentityError> {
        match self.store.find_by_id(identity.user_id).await {
            Ok(user) => Ok(UserProfile::from(user)),
            Err(StoreError::NotFound) => {
                tracing::warn!(user_id = identity.user_id, "token refers to a missing user");
                Err(IdentityError::NotFound)
            }
            Err(e) => Err(internal("get_profile", e)),
        }
    }

    /// Rewrite the profile of the authenticated user.
    ///
    /// Validation runs before anything else; the password is always re-hashed;
    /// the avatar reference changes only when an upload succeeds. A freshly
    /// stored avatar is discarded again if the store update fails.
    pub async fn update_profile(
        &self,
        identity: &AuthenticatedIdentity,
        form: ProfileForm,
        avatar: Option<AvatarUpload>,
    ) -> Result<(), IdentityError> {
        form.check()?;

        let hash_password = hash_password(&form.password).map_err(|e| {
            tracing::error!(op = "update_profile.hash", user_id = identity.user_id, error = %e, "password hashing failed");
            IdentityError::from(e)
        })?;

        let avatar_path = match avatar {
            Some(upload) => {
                let reference = self
                    .avatars
                    .store(upload.bytes, &upload.file_name)
                    .await
                    .map_err(|e| {
                        tracing::error!(
                            op = "update_profile.avatar",
                            user_id = identity.user_id,
                            strategy = self.avatars.name(),
                            error = %e,
                            "avatar store failed"
                        );
                        IdentityError::from(e)
                    })?;
                Some(reference)
            }
            None => None,
        };

        let update = ProfileUpdate {
            login: form.login,
            email: form.email,
            hash_password,
            first_name: form.first_name,
            last_name: form.last_name,
            phonenumber: form.phonenumber,
            address: form.address,
            avatar_path: avatar_path.clone(),
        };

        if let Err(e) = self.store.update_profile(identity.user_id, update).await {
            if let Some(reference) = avatar_path {
                self.discard_avatar(&reference).await;
            }
            return Err(match e {
                StoreError::ConstraintViolation => {
                    tracing::warn!(user_id = identity.user_id, "profile update conflicts with another user");
                    IdentityError::Conflict
                }
                StoreError::NotFound => {
                    tracing::warn!(user_id = identity.user_id, "profile update for missing user");
                    IdentityError::NotFound
                }
                other => internal("update_profile.store", other),
            });
        }

        tracing::info!(user_id = identity.user_id, "profile updated");
        Ok(())
    }

    /// Read back a stored avatar.
    pub async fn avatar(&self, reference: &str) -> Result<AvatarFile, IdentityError> {
        self.avatars.serve(reference).await.map_err(|e| {
            tracing::debug!(reference, error = %e, "avatar not served");
            IdentityError::from(e)
        })
    }

    pub async fn health_check(&self) -> Result<(), IdentityError> {
        self.store
            .health_check()
            .await
            .map_err(|e| internal("health_check", e))
    }

    async fn discard_avatar(&self, reference: &str) {
        if let Err(e) = self.avatars.discard(reference).await {
            tracing::warn!(reference, error = %e, "failed to discard orphaned avatar");
        }
    }
}

fn internal(op: &'static str, e: StoreError) -> IdentityError {
    tracing::error!(op, error = %e, "user store failure");
    IdentityError::from(e)
}
