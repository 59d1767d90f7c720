//! Account registration, verification and identity resolution

use chrono::Utc;
use common::error::DatabaseError;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::rollback_quietly;
use crate::config::MailFailurePolicy;
use crate::error::{ServiceError, ServiceResult};
use crate::jwt::{JwtService, Principal};
use crate::mail::{Mailer, NotificationEmail};
use crate::models::{
    AccountType, LoginCredentials, NewUser, SignupRequest, User, VerificationToken,
};
use crate::password;
use crate::repositories::{Database, TokenStore, UnitOfWork, UserStore, constraints};
use crate::validation::{validate_email, validate_password, validate_username};

/// Result of presenting a verification token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The owner was disabled and is now enabled
    Activated,
    /// The owner was already enabled; nothing changed
    AlreadyActive,
    /// No such token was ever issued
    UnknownToken,
    /// The token exists but its owner does not
    OwnerMissing,
}

impl VerificationOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(
            self,
            VerificationOutcome::Activated | VerificationOutcome::AlreadyActive
        )
    }
}

/// Response for a successful login
#[derive(Debug, Clone, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

fn signup_conflict(err: DatabaseError) -> ServiceError {
    match err.violated_constraint() {
        Some(constraints::USERS_EMAIL) => ServiceError::EmailExists,
        Some(constraints::USERS_USERNAME) => ServiceError::UsernameExists,
        _ => ServiceError::Database(err),
    }
}

/// Validate a registration and persist the disabled user with its first token
///
/// Nothing is written unless every precondition holds. Checks run in a fixed
/// order: field formats, email uniqueness, username uniqueness, then password
/// confirmation.
pub async fn register<T: UnitOfWork>(
    tx: &mut T,
    request: &SignupRequest,
) -> ServiceResult<(User, VerificationToken)> {
    validate_username(&request.username).map_err(ServiceError::InvalidInput)?;
    validate_email(&request.email).map_err(ServiceError::InvalidInput)?;
    validate_password(&request.password).map_err(ServiceError::InvalidInput)?;

    if tx.find_user_by_email(&request.email).await?.is_some() {
        return Err(ServiceError::EmailExists);
    }
    if tx.find_user_by_username(&request.username).await?.is_some() {
        return Err(ServiceError::UsernameExists);
    }
    if request.password != request.confirmed_password {
        return Err(ServiceError::PasswordMismatch);
    }

    let now = Utc::now();
    let new_user = NewUser {
        username: request.username.clone(),
        email: request.email.clone(),
        password_hash: password::hash_password(&request.password)?,
        account_type: AccountType::Private,
        enabled: false,
        created_at: now,
    };
    let user = tx.insert_user(&new_user).await.map_err(signup_conflict)?;

    let token = VerificationToken::issue(user.id, now);
    tx.insert_token(&token).await?;

    Ok((user, token))
}

/// Resolve a token to its owner and enable the account
pub async fn activate<T: UnitOfWork>(tx: &mut T, token: &str) -> ServiceResult<VerificationOutcome> {
    let Some(record) = tx.find_token(token).await? else {
        return Ok(VerificationOutcome::UnknownToken);
    };

    let Some(owner) = tx.find_user_by_id(record.user_id).await? else {
        return Ok(VerificationOutcome::OwnerMissing);
    };

    if owner.enabled {
        return Ok(VerificationOutcome::AlreadyActive);
    }

    if !tx.set_user_enabled(owner.id, true).await? {
        return Ok(VerificationOutcome::OwnerMissing);
    }

    Ok(VerificationOutcome::Activated)
}

/// Look up the user behind an authenticated principal
pub async fn resolve_principal<T: UserStore>(tx: &mut T, principal: &Principal) -> ServiceResult<User> {
    tx.find_user_by_username(&principal.username)
        .await?
        .ok_or_else(|| ServiceError::UserNotFound(principal.username.clone()))
}

/// Account workflows, each run as one unit of work
#[derive(Clone)]
pub struct AccountService<D: Database> {
    db: D,
    mailer: Arc<dyn Mailer>,
    jwt_service: JwtService,
    public_base_url: String,
    mail_failure_policy: MailFailurePolicy,
}

impl<D: Database> AccountService<D> {
    pub fn new(
        db: D,
        mailer: Arc<dyn Mailer>,
        jwt_service: JwtService,
        public_base_url: String,
        mail_failure_policy: MailFailurePolicy,
    ) -> Self {
        Self {
            db,
            mailer,
            jwt_service,
            public_base_url,
            mail_failure_policy,
        }
    }

    /// Register a new, disabled account and send its activation email
    pub async fn signup(&self, request: &SignupRequest) -> ServiceResult<User> {
        info!("Signup attempt for user: {}", request.username);

        let mut tx = self.db.begin().await?;
        let (user, token) = match register(&mut tx, request).await {
            Ok(created) => created,
            Err(e) => {
                rollback_quietly(tx).await;
                return Err(e);
            }
        };

        let email = NotificationEmail::activation(&self.public_base_url, &user.email, &token.token);
        if let Err(e) = self.mailer.send(&email).await {
            error!("Activation email for {} failed: {}", user.username, e);
            match self.mail_failure_policy {
                MailFailurePolicy::Rollback => rollback_quietly(tx).await,
                MailFailurePolicy::Keep => {
                    tx.commit().await?;
                    warn!(
                        "Kept unverified account {} after mail failure; resend activation to recover",
                        user.username
                    );
                }
            }
            return Err(ServiceError::MailDelivery);
        }

        tx.commit().await?;
        info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Activate the account owning `token`
    ///
    /// Unknown tokens and tokens without an owner are a negative result, not
    /// an error.
    pub async fn verify_account(&self, token: &str) -> ServiceResult<bool> {
        Ok(self.verify_account_detailed(token).await?.is_verified())
    }

    pub async fn verify_account_detailed(&self, token: &str) -> ServiceResult<VerificationOutcome> {
        let mut tx = self.db.begin().await?;
        let outcome = match activate(&mut tx, token).await {
            Ok(outcome) => outcome,
            Err(e) => {
                rollback_quietly(tx).await;
                return Err(e);
            }
        };

        match outcome {
            VerificationOutcome::Activated => {
                tx.commit().await?;
                info!("Account activated");
            }
            VerificationOutcome::AlreadyActive => {
                rollback_quietly(tx).await;
                info!("Verification token reused for an active account");
            }
            VerificationOutcome::UnknownToken => {
                rollback_quietly(tx).await;
                warn!("Verification attempted with unknown token");
            }
            VerificationOutcome::OwnerMissing => {
                rollback_quietly(tx).await;
                warn!("Verification token has no owning user");
            }
        }

        Ok(outcome)
    }

    /// Issue a fresh token for a still-disabled account and mail it
    pub async fn resend_activation(&self, email: &str) -> ServiceResult<()> {
        let mut tx = self.db.begin().await?;

        let user = match tx.find_user_by_email(email).await? {
            Some(user) if user.enabled => {
                rollback_quietly(tx).await;
                return Err(ServiceError::AlreadyActive);
            }
            Some(user) => user,
            None => {
                rollback_quietly(tx).await;
                return Err(ServiceError::UserNotFound(email.to_string()));
            }
        };

        let token = VerificationToken::issue(user.id, Utc::now());
        if let Err(e) = tx.insert_token(&token).await {
            rollback_quietly(tx).await;
            return Err(e.into());
        }

        let message = NotificationEmail::activation(&self.public_base_url, &user.email, &token.token);
        if let Err(e) = self.mailer.send(&message).await {
            error!("Activation resend for {} failed: {}", user.username, e);
            rollback_quietly(tx).await;
            return Err(ServiceError::MailDelivery);
        }

        tx.commit().await?;
        info!("Re-sent activation email to {}", user.username);
        Ok(())
    }

    /// Resolve the authenticated principal to its stored user
    pub async fn get_current_user(&self, principal: &Principal) -> ServiceResult<User> {
        let mut tx = self.db.begin().await?;
        let user = resolve_principal(&mut tx, principal).await;
        rollback_quietly(tx).await;
        user
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> ServiceResult<Option<User>> {
        let mut tx = self.db.begin().await?;
        let user = tx.find_user_by_id(id).await;
        rollback_quietly(tx).await;
        Ok(user?)
    }

    /// Check credentials of an enabled account and issue an access token
    pub async fn login(&self, credentials: &LoginCredentials) -> ServiceResult<AccessToken> {
        info!("Login attempt for user: {}", credentials.username);

        let mut tx = self.db.begin().await?;
        let user = tx.find_user_by_username(&credentials.username).await;
        rollback_quietly(tx).await;

        let user = user?.ok_or(ServiceError::InvalidCredentials)?;
        if !password::verify_password(&credentials.password, &user.password_hash)? {
            return Err(ServiceError::InvalidCredentials);
        }
        if !user.enabled {
            return Err(ServiceError::AccountDisabled);
        }

        let access_token = self.jwt_service.generate_access_token(&user)?;
        Ok(AccessToken {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expiry(),
        })
    }

    /// Change the current user's profile visibility
    pub async fn update_account_type(
        &self,
        principal: &Principal,
        account_type: AccountType,
    ) -> ServiceResult<User> {
        let mut tx = self.db.begin().await?;

        let mut user = match resolve_principal(&mut tx, principal).await {
            Ok(user) => user,
            Err(e) => {
                rollback_quietly(tx).await;
                return Err(e);
            }
        };

        if let Err(e) = tx.set_account_type(user.id, account_type).await {
            rollback_quietly(tx).await;
            return Err(e.into());
        }

        tx.commit().await?;
        user.account_type = account_type;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryDatabase;
    use crate::services::testing::{
        FailingMailer, RecordingMailer, account_service, account_service_with_policy,
    };

    fn alice() -> SignupRequest {
        SignupRequest {
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            password: "p1".to_string(),
            confirmed_password: "p1".to_string(),
        }
    }

    fn principal(username: &str) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            username: username.to_string(),
        }
    }

    async fn tokens_of(db: &MemoryDatabase, user_id: Uuid) -> Vec<VerificationToken> {
        let mut tx = db.begin().await.unwrap();
        tx.tokens_for_user(user_id).await.unwrap()
    }

    async fn user_named(db: &MemoryDatabase, username: &str) -> Option<User> {
        let mut tx = db.begin().await.unwrap();
        tx.find_user_by_username(username).await.unwrap()
    }

    #[test]
    fn test_signup_conflict_maps_unique_constraints() {
        assert!(matches!(
            signup_conflict(DatabaseError::UniqueViolation(
                constraints::USERS_EMAIL.to_string()
            )),
            ServiceError::EmailExists
        ));
        assert!(matches!(
            signup_conflict(DatabaseError::UniqueViolation(
                constraints::USERS_USERNAME.to_string()
            )),
            ServiceError::UsernameExists
        ));
        assert!(matches!(
            signup_conflict(DatabaseError::UniqueViolation(
                constraints::TOKENS_TOKEN.to_string()
            )),
            ServiceError::Database(_)
        ));
        assert!(matches!(
            signup_conflict(DatabaseError::Query(sqlx::Error::RowNotFound)),
            ServiceError::Database(_)
        ));
    }

    #[tokio::test]
    async fn test_signup_creates_disabled_user_with_one_token() {
        let db = MemoryDatabase::new();
        let mailer = RecordingMailer::default();
        let service = account_service(db.clone(), Arc::new(mailer.clone()));

        let user = service.signup(&alice()).await.unwrap();
        assert_eq!(user.username, "alice");
        assert!(!user.enabled);
        assert_eq!(user.account_type, AccountType::Private);
        assert_ne!(user.password_hash, "p1");

        let tokens = tokens_of(&db, user.id).await;
        assert_eq!(tokens.len(), 1);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "a@x.com");
        assert!(sent[0].body.contains(&format!(
            "http://localhost:8080/auth/accountVerification/{}",
            tokens[0].token
        )));
    }

    #[tokio::test]
    async fn test_signup_then_verify_enables_account() {
        let db = MemoryDatabase::new();
        let service = account_service(db.clone(), Arc::new(RecordingMailer::default()));

        let user = service.signup(&alice()).await.unwrap();
        let token = tokens_of(&db, user.id).await.remove(0).token;

        assert!(service.verify_account(&token).await.unwrap());
        assert!(user_named(&db, "alice").await.unwrap().enabled);

        // Presenting the token again keeps the account enabled
        assert_eq!(
            service.verify_account_detailed(&token).await.unwrap(),
            VerificationOutcome::AlreadyActive
        );
        assert!(service.verify_account(&token).await.unwrap());
        assert!(user_named(&db, "alice").await.unwrap().enabled);
    }

    #[tokio::test]
    async fn test_unknown_token_is_negative_and_mutates_nothing() {
        let db = MemoryDatabase::new();
        let service = account_service(db.clone(), Arc::new(RecordingMailer::default()));
        service.signup(&alice()).await.unwrap();

        assert_eq!(
            service
                .verify_account_detailed(&Uuid::new_v4().to_string())
                .await
                .unwrap(),
            VerificationOutcome::UnknownToken
        );
        assert!(!service.verify_account("nope").await.unwrap());
        assert!(!user_named(&db, "alice").await.unwrap().enabled);
    }

    #[tokio::test]
    async fn test_token_without_owner_is_negative() {
        let db = MemoryDatabase::new();
        let service = account_service(db.clone(), Arc::new(RecordingMailer::default()));

        let orphan = VerificationToken::issue(Uuid::new_v4(), Utc::now());
        let mut tx = db.begin().await.unwrap();
        tx.insert_token(&orphan).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            service.verify_account_detailed(&orphan.token).await.unwrap(),
            VerificationOutcome::OwnerMissing
        );
        assert!(!service.verify_account(&orphan.token).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_fails_without_persisting() {
        let db = MemoryDatabase::new();
        let mailer = RecordingMailer::default();
        let service = account_service(db.clone(), Arc::new(mailer.clone()));
        service.signup(&alice()).await.unwrap();

        let mut request = alice();
        request.username = "alice2".to_string();
        assert!(matches!(
            service.signup(&request).await,
            Err(ServiceError::EmailExists)
        ));
        assert!(user_named(&db, "alice2").await.is_none());
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_email_check_runs_before_username_check() {
        let db = MemoryDatabase::new();
        let service = account_service(db.clone(), Arc::new(RecordingMailer::default()));
        service.signup(&alice()).await.unwrap();

        // Both taken: email wins
        assert!(matches!(
            service.signup(&alice()).await,
            Err(ServiceError::EmailExists)
        ));

        let mut request = alice();
        request.email = "other@x.com".to_string();
        assert!(matches!(
            service.signup(&request).await,
            Err(ServiceError::UsernameExists)
        ));
    }

    #[tokio::test]
    async fn test_password_mismatch_fails_without_persisting() {
        let db = MemoryDatabase::new();
        let mailer = RecordingMailer::default();
        let service = account_service(db.clone(), Arc::new(mailer.clone()));

        let mut request = alice();
        request.confirmed_password = "p2".to_string();
        assert!(matches!(
            service.signup(&request).await,
            Err(ServiceError::PasswordMismatch)
        ));
        assert!(user_named(&db, "alice").await.is_none());
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_fields_are_invalid_input() {
        let service = account_service(MemoryDatabase::new(), Arc::new(RecordingMailer::default()));

        let mut request = alice();
        request.email = "not-an-email".to_string();
        assert!(matches!(
            service.signup(&request).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_mail_failure_with_rollback_policy_leaves_no_rows() {
        let db = MemoryDatabase::new();
        let service = account_service_with_policy(
            db.clone(),
            Arc::new(FailingMailer),
            MailFailurePolicy::Rollback,
        );

        assert!(matches!(
            service.signup(&alice()).await,
            Err(ServiceError::MailDelivery)
        ));
        assert!(user_named(&db, "alice").await.is_none());

        // The same registration can be retried once mail works again
        let service = account_service(db.clone(), Arc::new(RecordingMailer::default()));
        assert!(service.signup(&alice()).await.is_ok());
    }

    #[tokio::test]
    async fn test_mail_failure_with_keep_policy_is_recoverable() {
        let db = MemoryDatabase::new();
        let failing = account_service_with_policy(
            db.clone(),
            Arc::new(FailingMailer),
            MailFailurePolicy::Keep,
        );

        assert!(matches!(
            failing.signup(&alice()).await,
            Err(ServiceError::MailDelivery)
        ));
        let kept = user_named(&db, "alice").await.unwrap();
        assert!(!kept.enabled);
        assert!(matches!(
            failing.signup(&alice()).await,
            Err(ServiceError::EmailExists)
        ));

        let mailer = RecordingMailer::default();
        let service = account_service(db.clone(), Arc::new(mailer.clone()));
        service.resend_activation("a@x.com").await.unwrap();

        let tokens = tokens_of(&db, kept.id).await;
        assert_eq!(tokens.len(), 2);
        assert!(mailer.sent()[0].body.contains(&tokens[1].token));

        assert!(service.verify_account(&tokens[1].token).await.unwrap());
        assert!(user_named(&db, "alice").await.unwrap().enabled);
    }

    #[tokio::test]
    async fn test_resend_activation_rules() {
        let db = MemoryDatabase::new();
        let service = account_service(db.clone(), Arc::new(RecordingMailer::default()));

        assert!(matches!(
            service.resend_activation("ghost@x.com").await,
            Err(ServiceError::UserNotFound(_))
        ));

        let user = service.signup(&alice()).await.unwrap();
        let token = tokens_of(&db, user.id).await.remove(0).token;
        service.verify_account(&token).await.unwrap();

        assert!(matches!(
            service.resend_activation("a@x.com").await,
            Err(ServiceError::AlreadyActive)
        ));
    }

    #[tokio::test]
    async fn test_failed_resend_issues_no_token() {
        let db = MemoryDatabase::new();
        let user = account_service(db.clone(), Arc::new(RecordingMailer::default()))
            .signup(&alice())
            .await
            .unwrap();

        let failing = account_service(db.clone(), Arc::new(FailingMailer));
        assert!(matches!(
            failing.resend_activation("a@x.com").await,
            Err(ServiceError::MailDelivery)
        ));
        assert_eq!(tokens_of(&db, user.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_current_user_resolution() {
        let service = account_service(MemoryDatabase::new(), Arc::new(RecordingMailer::default()));
        let user = service.signup(&alice()).await.unwrap();

        let current = service.get_current_user(&principal("alice")).await.unwrap();
        assert_eq!(current.id, user.id);

        assert!(matches!(
            service.get_current_user(&principal("mallory")).await,
            Err(ServiceError::UserNotFound(name)) if name == "mallory"
        ));
    }

    #[tokio::test]
    async fn test_get_user_by_id_is_optional() {
        let service = account_service(MemoryDatabase::new(), Arc::new(RecordingMailer::default()));
        let user = service.signup(&alice()).await.unwrap();

        assert_eq!(
            service.get_user_by_id(user.id).await.unwrap().map(|u| u.username),
            Some("alice".to_string())
        );
        assert!(service.get_user_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_requires_activation_and_correct_password() {
        let db = MemoryDatabase::new();
        let service = account_service(db.clone(), Arc::new(RecordingMailer::default()));
        let user = service.signup(&alice()).await.unwrap();

        let credentials = LoginCredentials {
            username: "alice".to_string(),
            password: "p1".to_string(),
        };
        assert!(matches!(
            service.login(&credentials).await,
            Err(ServiceError::AccountDisabled)
        ));

        let token = tokens_of(&db, user.id).await.remove(0).token;
        service.verify_account(&token).await.unwrap();

        let access = service.login(&credentials).await.unwrap();
        assert_eq!(access.token_type, "Bearer");
        assert!(!access.access_token.is_empty());

        let wrong = LoginCredentials {
            username: "alice".to_string(),
            password: "nope".to_string(),
        };
        assert!(matches!(
            service.login(&wrong).await,
            Err(ServiceError::InvalidCredentials)
        ));

        let unknown = LoginCredentials {
            username: "bob".to_string(),
            password: "p1".to_string(),
        };
        assert!(matches!(
            service.login(&unknown).await,
            Err(ServiceError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_update_account_type() {
        let db = MemoryDatabase::new();
        let service = account_service(db.clone(), Arc::new(RecordingMailer::default()));
        service.signup(&alice()).await.unwrap();

        let updated = service
            .update_account_type(&principal("alice"), AccountType::Public)
            .await
            .unwrap();
        assert_eq!(updated.account_type, AccountType::Public);
        assert_eq!(
            user_named(&db, "alice").await.unwrap().account_type,
            AccountType::Public
        );
    }
}
