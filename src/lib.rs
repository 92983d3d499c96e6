//! Lending core
//!
//! Tracks physical copies of books, which of them are lent out, and when
//! each loan falls due, on top of a SQLite database. Presentation shells
//! drive [`services::LendingService`] and render its structured results.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult, ErrorCode};
pub use models::{AvailableTitle, BookCopy, BorrowedCopy, CopyStatus, Loan, ReturnOutcome};
pub use services::{Clock, LendingService, SystemClock};

/// Application state handed to a presentation shell
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    repository: repository::Repository,
}

impl AppState {
    /// Open the configured database and build the services over it
    pub async fn open(config: AppConfig, clock: Arc<dyn Clock>) -> AppResult<Self> {
        let repository = repository::Repository::connect(&config.database).await?;
        Ok(Self {
            config: Arc::new(config),
            services: Arc::new(services::Services::new(repository.clone(), clock)),
            repository,
        })
    }

    /// Release the database connections
    pub async fn close(&self) {
        self.repository.close().await;
    }

    pub fn lending(&self) -> &LendingService {
        &self.services.lending
    }
}
