//! Lending service: the copy state machine
//!
//! A copy moves `Available --borrow--> Borrowed --return--> Available`, and
//! can be removed from either state. Borrow, return and remove each take the
//! write lock, read the copy, validate the transition and write it back inside
//! one transaction, so two callers can never both move the same copy; the
//! second waits for the first and then sees its result.
//!
//! A return after the due date reports [`ReturnOutcome::Late`] and leaves the
//! loan in place; [`LendingService::force_return`] is the way to reclaim such
//! a copy.

use chrono::{NaiveDateTime, SubsecRound};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::copy::{
        AvailableTitle, BookCopy, BorrowedCopy, CopyUpdate, Loan, NewCopy, Removed, ReturnOutcome,
        StatusCounts,
    },
    repository::Repository,
};

use super::clock::Clock;

#[derive(Clone)]
pub struct LendingService {
    repository: Repository,
    clock: Arc<dyn Clock>,
}

impl LendingService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    fn now(&self) -> NaiveDateTime {
        self.clock.now().trunc_subsecs(0)
    }

    /// Add a new copy to the collection
    pub async fn add_copy(&self, title: &str, author: &str, pages: i64) -> AppResult<i64> {
        let copy = NewCopy::new(title, author, pages);
        copy.validate()?;
        if copy.title.trim().is_empty() || copy.author.trim().is_empty() {
            return Err(AppError::Validation("Title and author must not be blank".to_string()));
        }

        let id = self.repository.copies.create(&copy).await?;
        tracing::info!("Added copy {} of '{}' by {}", id, copy.title, copy.author);
        Ok(id)
    }

    /// Get a single copy
    pub async fn get_copy(&self, id: i64) -> AppResult<BookCopy> {
        self.repository.copies.get(id).await
    }

    /// Lend an available copy for one loan period starting now
    pub async fn borrow_copy(&self, id: i64, borrower: &str) -> AppResult<Loan> {
        if borrower.trim().is_empty() {
            return Err(AppError::Validation("Borrower must not be blank".to_string()));
        }

        let mut tx = self.repository.pool.begin().await?;
        self.repository.copies.lock_for_write(&mut tx, id).await?;
        let copy = self.repository.copies.get_in(&mut tx, id).await?;

        if copy.is_borrowed() {
            tracing::warn!("Refused to lend copy {}: already borrowed", id);
            return Err(AppError::AlreadyBorrowed(id));
        }

        let loan = Loan::starting_at(borrower, self.now());
        self.repository
            .copies
            .update_in(&mut tx, id, &CopyUpdate::start_loan(loan.clone()))
            .await?;
        tx.commit().await?;

        tracing::info!("Copy {} lent to {} until {}", id, loan.borrower, loan.due_at);
        Ok(loan)
    }

    /// Take a copy back.
    ///
    /// On or before the due date the loan is cleared and the copy is available
    /// again. After it, the outcome is `Late` and nothing is written.
    pub async fn return_copy(&self, id: i64) -> AppResult<ReturnOutcome> {
        let mut tx = self.repository.pool.begin().await?;
        self.repository.copies.lock_for_write(&mut tx, id).await?;
        let loan = self.current_loan(&mut tx, id).await?;

        let now = self.now();
        if loan.is_late_at(now) {
            tracing::warn!(
                "Copy {} returned late by {} (due {}, now {})",
                id,
                loan.borrower,
                loan.due_at,
                now
            );
            return Ok(ReturnOutcome::Late);
        }

        self.repository
            .copies
            .update_in(&mut tx, id, &CopyUpdate::clear_loan())
            .await?;
        tx.commit().await?;

        tracing::info!("Copy {} returned by {}", id, loan.borrower);
        Ok(ReturnOutcome::OnTime)
    }

    /// Clear the loan of a borrowed copy whatever its due date, returning the
    /// loan that was closed
    pub async fn force_return(&self, id: i64) -> AppResult<Loan> {
        let mut tx = self.repository.pool.begin().await?;
        self.repository.copies.lock_for_write(&mut tx, id).await?;
        let loan = self.current_loan(&mut tx, id).await?;

        self.repository
            .copies
            .update_in(&mut tx, id, &CopyUpdate::clear_loan())
            .await?;
        tx.commit().await?;

        tracing::info!("Copy {} reclaimed from {} (due {})", id, loan.borrower, loan.due_at);
        Ok(loan)
    }

    /// Delete a copy, borrowed or not
    pub async fn remove_copy(&self, id: i64) -> AppResult<Removed> {
        let mut tx = self.repository.pool.begin().await?;
        self.repository.copies.lock_for_write(&mut tx, id).await?;
        let copy = self.repository.copies.get_in(&mut tx, id).await?;
        self.repository.copies.delete_in(&mut tx, id).await?;
        tx.commit().await?;

        if let Some(loan) = &copy.loan {
            tracing::warn!("Removed copy {} while lent to {}", id, loan.borrower);
        } else {
            tracing::info!("Removed copy {}", id);
        }
        Ok(Removed { copy })
    }

    /// Available titles with their number of free copies
    pub async fn list_available(&self) -> AppResult<Vec<AvailableTitle>> {
        tracing::debug!("Listing available titles");
        self.repository.copies.list_available_grouped().await
    }

    /// Copies currently lent out
    pub async fn list_borrowed(&self) -> AppResult<Vec<BorrowedCopy>> {
        tracing::debug!("Listing borrowed copies");
        self.repository.copies.list_borrowed().await
    }

    /// Copies whose due date has passed
    pub async fn list_overdue(&self) -> AppResult<Vec<BorrowedCopy>> {
        self.repository.copies.list_overdue(self.now()).await
    }

    pub async fn counts(&self) -> AppResult<StatusCounts> {
        self.repository.copies.count_by_status().await
    }

    async fn current_loan(&self, conn: &mut sqlx::SqliteConnection, id: i64) -> AppResult<Loan> {
        self.repository
            .copies
            .get_in(conn, id)
            .await?
            .loan
            .ok_or(AppError::AlreadyAvailable(id))
    }
}
