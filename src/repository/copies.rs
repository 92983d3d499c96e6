//! Copies repository: durable CRUD over the `books` table

use chrono::NaiveDateTime;
use sqlx::{Executor, Pool, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    error::{AppError, AppResult},
    models::copy::{
        format_timestamp, AvailableTitle, BookCopy, BorrowedCopy, CopyStatus, CopyUpdate,
        LoanChange, NewCopy, StatusCounts,
    },
};

const SELECT_COPY: &str = r#"
    SELECT id, title, author, pages, borrower, borrowed_at, return_at, status
    FROM books
    WHERE id = ?
"#;

#[derive(Clone)]
pub struct CopiesRepository {
    pool: Pool<Sqlite>,
}

impl CopiesRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Insert a new available copy and return its id
    pub async fn create(&self, copy: &NewCopy) -> AppResult<i64> {
        let result = sqlx::query(
            "INSERT INTO books (title, author, pages, status) VALUES (?, ?, ?, ?)",
        )
        .bind(&copy.title)
        .bind(&copy.author)
        .bind(copy.pages)
        .bind(CopyStatus::Available.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Get copy by ID
    pub async fn get(&self, id: i64) -> AppResult<BookCopy> {
        fetch_copy(&self.pool, id).await
    }

    /// Take the database write lock as the first statement of a transaction.
    ///
    /// A deferred transaction that reads before writing cannot wait for a
    /// concurrent writer; starting with a write makes it queue on the busy
    /// timeout instead, the same as `BEGIN IMMEDIATE`.
    pub async fn lock_for_write(&self, conn: &mut SqliteConnection, id: i64) -> AppResult<()> {
        sqlx::query("UPDATE books SET id = id WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Get copy by ID inside an open transaction
    pub async fn get_in(&self, conn: &mut SqliteConnection, id: i64) -> AppResult<BookCopy> {
        fetch_copy(conn, id).await
    }

    /// Apply a partial update and return the updated copy
    pub async fn update(&self, id: i64, update: &CopyUpdate) -> AppResult<BookCopy> {
        let mut tx = self.pool.begin().await?;
        let copy = self.update_in(&mut tx, id, update).await?;
        tx.commit().await?;
        Ok(copy)
    }

    /// Partial update inside an open transaction
    pub async fn update_in(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        update: &CopyUpdate,
    ) -> AppResult<BookCopy> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE books SET title = COALESCE(");
        query
            .push_bind(update.title.clone())
            .push(", title), author = COALESCE(")
            .push_bind(update.author.clone())
            .push(", author), pages = COALESCE(")
            .push_bind(update.pages)
            .push(", pages)");

        match &update.loan {
            LoanChange::Keep => {}
            LoanChange::Start(loan) => {
                query
                    .push(", borrower = ")
                    .push_bind(loan.borrower.clone())
                    .push(", borrowed_at = ")
                    .push_bind(format_timestamp(&loan.borrowed_at))
                    .push(", return_at = ")
                    .push_bind(format_timestamp(&loan.due_at))
                    .push(", status = ")
                    .push_bind(CopyStatus::Borrowed.as_str());
            }
            LoanChange::Clear => {
                query
                    .push(", borrower = NULL, borrowed_at = NULL, return_at = NULL, status = ")
                    .push_bind(CopyStatus::Available.as_str());
            }
        }

        query.push(" WHERE id = ").push_bind(id);

        let result = query.build().execute(&mut *conn).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(id));
        }

        fetch_copy(conn, id).await
    }

    /// Delete a copy (hard delete)
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let mut conn = self.pool.acquire().await?;
        self.delete_in(&mut conn, id).await
    }

    /// Delete a copy inside an open transaction
    pub async fn delete_in(&self, conn: &mut SqliteConnection, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(id));
        }
        Ok(())
    }

    /// Available copies grouped by title, one row per title.
    ///
    /// The representative row of each group is its lowest copy id, and groups
    /// are ordered by that id.
    pub async fn list_available_grouped(&self) -> AppResult<Vec<AvailableTitle>> {
        let titles = sqlx::query_as::<_, AvailableTitle>(
            r#"
            SELECT b.id, b.title, b.author, b.pages, g.count_available
            FROM (
                SELECT title, MIN(id) AS id, COUNT(*) AS count_available
                FROM books
                WHERE status = ?
                GROUP BY title
            ) g
            JOIN books b ON b.id = g.id
            ORDER BY b.id
            "#,
        )
        .bind(CopyStatus::Available.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(titles)
    }

    /// Borrowed copies ordered by id
    pub async fn list_borrowed(&self) -> AppResult<Vec<BorrowedCopy>> {
        let copies = sqlx::query_as::<_, BorrowedCopy>(
            "SELECT id, borrower, title, return_at FROM books WHERE status = ? ORDER BY id",
        )
        .bind(CopyStatus::Borrowed.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(copies)
    }

    /// Borrowed copies whose due date is strictly before `now`
    pub async fn list_overdue(&self, now: NaiveDateTime) -> AppResult<Vec<BorrowedCopy>> {
        // Fixed-width timestamps compare correctly as text
        let copies = sqlx::query_as::<_, BorrowedCopy>(
            r#"
            SELECT id, borrower, title, return_at
            FROM books
            WHERE status = ? AND return_at < ?
            ORDER BY return_at, id
            "#,
        )
        .bind(CopyStatus::Borrowed.as_str())
        .bind(format_timestamp(&now))
        .fetch_all(&self.pool)
        .await?;

        Ok(copies)
    }

    /// Count copies per status
    pub async fn count_by_status(&self) -> AppResult<StatusCounts> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM books GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            match status.parse::<CopyStatus>() {
                Ok(CopyStatus::Available) => counts.available = count,
                Ok(CopyStatus::Borrowed) => counts.borrowed = count,
                Err(e) => return Err(AppError::Storage(sqlx::Error::Decode(e.into()))),
            }
        }
        Ok(counts)
    }
}

async fn fetch_copy<'e, E>(executor: E, id: i64) -> AppResult<BookCopy>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, BookCopy>(SELECT_COPY)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound(id))
}
