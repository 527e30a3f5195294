//! Application state shared across handlers.

use crate::accounts::AccountService;
use crate::auth::AuthService;
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::library::{CatalogService, ShelfService};
use crate::photos::PhotoStore;
use crate::social::SocialService;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database connection.
    pub db: Database,
    /// Authentication service.
    pub auth: Arc<AuthService>,
    /// Account management.
    pub accounts: AccountService,
    /// Book catalog.
    pub catalog: CatalogService,
    /// User shelves.
    pub shelf: ShelfService,
    /// Friend requests.
    pub social: SocialService,
    /// Photo files.
    pub photos: PhotoStore,
}

impl AppState {
    /// Wire every service to `db`. Fails when no signing secret is configured.
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let auth = AuthService::new(db.clone(), config.jwt_secret()?, config.auth.token_hours);
        let photos = PhotoStore::new(&config.storage);

        Ok(Self {
            auth: Arc::new(auth),
            accounts: AccountService::new(db.clone()),
            catalog: CatalogService::new(db.clone()),
            shelf: ShelfService::new(db.clone()),
            social: SocialService::new(db.clone()),
            photos,
            config: Arc::new(config),
            db,
        })
    }
}
