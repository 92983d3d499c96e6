//! Shared helpers for the integration tests

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::sync::{Arc, Mutex};

use lending_core::{config::DatabaseConfig, repository::Repository, Clock, LendingService};

/// Clock that only moves when told to
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    pub fn starting_at(now: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn set(&self, to: NaiveDateTime) {
        *self.now.lock().unwrap() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }
}

/// 2024-01-15 09:00:00
pub fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

pub async fn memory_repository() -> Repository {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    };
    Repository::connect(&config)
        .await
        .expect("Failed to open in-memory database")
}

/// Lending service over a fresh in-memory database, with its clock at [`t0`]
pub async fn setup() -> (LendingService, ManualClock, Repository) {
    let repository = memory_repository().await;
    let clock = ManualClock::starting_at(t0());
    let service = LendingService::new(repository.clone(), Arc::new(clock.clone()));
    (service, clock, repository)
}
