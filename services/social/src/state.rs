//! Application state shared across handlers

use std::sync::Arc;

use crate::config::AppConfig;
use crate::jwt::JwtService;
use crate::mail::Mailer;
use crate::repositories::Database;
use crate::services::{AccountService, NetworkService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState<D: Database> {
    pub db: D,
    pub jwt_service: JwtService,
    pub accounts: AccountService<D>,
    pub network: NetworkService<D>,
}

impl<D: Database> AppState<D> {
    pub fn new(db: D, mailer: Arc<dyn Mailer>, config: &AppConfig) -> Self {
        let jwt_service = JwtService::new(&config.jwt_secret, config.jwt_expiry_seconds);
        let accounts = AccountService::new(
            db.clone(),
            mailer,
            jwt_service.clone(),
            config.public_base_url.clone(),
            config.mail_failure_policy,
        );
        let network = NetworkService::new(db.clone());

        Self {
            db,
            jwt_service,
            accounts,
            network,
        }
    }
}
