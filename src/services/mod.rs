//! Business logic services

pub mod clock;
pub mod lending;

use std::sync::Arc;

use crate::repository::Repository;

pub use clock::{Clock, SystemClock};
pub use lending::LendingService;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub lending: lending::LendingService,
}

impl Services {
    /// Create all services with the given repository and time source
    pub fn new(repository: Repository, clock: Arc<dyn Clock>) -> Self {
        Self {
            lending: lending::LendingService::new(repository, clock),
        }
    }
}
