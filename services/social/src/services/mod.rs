//! Business workflows over the stores

use tracing::warn;

use crate::repositories::UnitOfWork;

pub mod accounts;
pub mod network;

pub use accounts::AccountService;
pub use network::NetworkService;

/// Roll back a unit of work, logging instead of failing
///
/// Used on paths that already carry an error or only read.
async fn rollback_quietly<T: UnitOfWork>(tx: T) {
    if let Err(e) = tx.rollback().await {
        warn!("Rollback failed: {}", e);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    use super::AccountService;
    use crate::config::MailFailurePolicy;
    use crate::jwt::JwtService;
    use crate::mail::{MailError, Mailer, NotificationEmail};
    use crate::repositories::MemoryDatabase;

    pub const TEST_JWT_SECRET: &str = "test-secret";

    /// Keeps every message it is asked to send
    #[derive(Clone, Default)]
    pub struct RecordingMailer {
        sent: Arc<Mutex<Vec<NotificationEmail>>>,
    }

    impl RecordingMailer {
        pub fn sent(&self) -> Vec<NotificationEmail> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &NotificationEmail) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    /// Refuses every message
    pub struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _email: &NotificationEmail) -> Result<(), MailError> {
            Err(MailError::Transport("relay down".to_string()))
        }
    }

    pub fn account_service(
        db: MemoryDatabase,
        mailer: Arc<dyn Mailer>,
    ) -> AccountService<MemoryDatabase> {
        account_service_with_policy(db, mailer, MailFailurePolicy::Rollback)
    }

    pub fn account_service_with_policy(
        db: MemoryDatabase,
        mailer: Arc<dyn Mailer>,
        policy: MailFailurePolicy,
    ) -> AccountService<MemoryDatabase> {
        AccountService::new(
            db,
            mailer,
            JwtService::new(TEST_JWT_SECRET, 900),
            "http://localhost:8080".to_string(),
            policy,
        )
    }
}
