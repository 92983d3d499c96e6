//! Book copy model, loan fields and the listing projections

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Text layout of every persisted timestamp
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Length of a loan in days
pub const LOAN_PERIOD_DAYS: i64 = 7;

pub fn loan_period() -> Duration {
    Duration::days(LOAN_PERIOD_DAYS)
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
}

// ---------------------------------------------------------------------------
// CopyStatus
// ---------------------------------------------------------------------------

/// Circulation status of a copy, stored as its variant name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CopyStatus {
    Available,
    Borrowed,
}

impl CopyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyStatus::Available => "Available",
            CopyStatus::Borrowed => "Borrowed",
        }
    }
}

impl FromStr for CopyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Available" => Ok(CopyStatus::Available),
            "Borrowed" => Ok(CopyStatus::Borrowed),
            other => Err(format!("unknown copy status '{}'", other)),
        }
    }
}

impl fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Loan
// ---------------------------------------------------------------------------

/// Loan fields of a borrowed copy.
///
/// `due_at` is always exactly one loan period after `borrowed_at`; build new
/// loans with [`Loan::starting_at`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Loan {
    pub borrower: String,
    pub borrowed_at: NaiveDateTime,
    pub due_at: NaiveDateTime,
}

impl Loan {
    pub fn starting_at(borrower: impl Into<String>, borrowed_at: NaiveDateTime) -> Self {
        Self {
            borrower: borrower.into(),
            borrowed_at,
            due_at: borrowed_at + loan_period(),
        }
    }

    /// A return at `now` is late only strictly after the due date
    pub fn is_late_at(&self, now: NaiveDateTime) -> bool {
        now > self.due_at
    }
}

// ---------------------------------------------------------------------------
// BookCopy
// ---------------------------------------------------------------------------

/// One physical copy of a title, as stored in the `books` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookCopy {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub pages: i64,
    pub status: CopyStatus,
    pub loan: Option<Loan>,
}

impl BookCopy {
    pub fn is_borrowed(&self) -> bool {
        self.status == CopyStatus::Borrowed
    }
}

fn decode_error(column: &str, message: impl Into<String>) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: message.into().into(),
    }
}

fn timestamp_column(row: &SqliteRow, column: &str) -> sqlx::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| parse_timestamp(&s).map_err(|e| decode_error(column, format!("'{}': {}", s, e))))
        .transpose()
}

impl<'r> FromRow<'r, SqliteRow> for BookCopy {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        let id: i64 = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        let status = CopyStatus::from_str(&status).map_err(|e| decode_error("status", e))?;

        let borrower: Option<String> = row.try_get("borrower")?;
        let borrowed_at = timestamp_column(row, "borrowed_at")?;
        let due_at = timestamp_column(row, "return_at")?;

        // Rows breaking the status/loan invariant are reported, not repaired
        let loan = match (status, borrower, borrowed_at, due_at) {
            (CopyStatus::Available, None, None, None) => None,
            (CopyStatus::Borrowed, Some(borrower), Some(borrowed_at), Some(due_at)) => {
                if due_at != borrowed_at + loan_period() {
                    return Err(decode_error(
                        "return_at",
                        format!("copy {} due date is not {} days after borrow date", id, LOAN_PERIOD_DAYS),
                    ));
                }
                Some(Loan { borrower, borrowed_at, due_at })
            }
            _ => {
                return Err(decode_error(
                    "status",
                    format!("copy {} loan fields do not match status {}", id, status),
                ))
            }
        };

        Ok(Self {
            id,
            title: row.try_get("title")?,
            author: row.try_get("author")?,
            pages: row.try_get("pages")?,
            status,
            loan,
        })
    }
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// One line of the availability listing: a title with its free copies.
/// `id` is the lowest copy id among the available copies of that title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct AvailableTitle {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub pages: i64,
    pub count_available: i64,
}

/// One line of the loan listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BorrowedCopy {
    pub id: i64,
    pub borrower: String,
    pub title: String,
    pub due_at: NaiveDateTime,
}

impl<'r> FromRow<'r, SqliteRow> for BorrowedCopy {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        let due_at = timestamp_column(row, "return_at")?
            .ok_or_else(|| decode_error("return_at", "borrowed copy without due date"))?;

        Ok(Self {
            id: row.try_get("id")?,
            borrower: row.try_get("borrower")?,
            title: row.try_get("title")?,
            due_at,
        })
    }
}

/// Number of copies per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub available: i64,
    pub borrowed: i64,
}

// ---------------------------------------------------------------------------
// Inputs and outcomes
// ---------------------------------------------------------------------------

/// Create copy request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewCopy {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author must not be empty"))]
    pub author: String,
    #[validate(range(min = 1, message = "Pages must be a positive number"))]
    pub pages: i64,
}

impl NewCopy {
    pub fn new(title: impl Into<String>, author: impl Into<String>, pages: i64) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            pages,
        }
    }
}

/// What an update does to the loan columns and the status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoanChange {
    #[default]
    Keep,
    /// Fill the loan columns and mark the copy Borrowed
    Start(Loan),
    /// Null the loan columns and mark the copy Available
    Clear,
}

/// Partial update of a copy; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct CopyUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub pages: Option<i64>,
    pub loan: LoanChange,
}

impl CopyUpdate {
    pub fn start_loan(loan: Loan) -> Self {
        Self {
            loan: LoanChange::Start(loan),
            ..Default::default()
        }
    }

    pub fn clear_loan() -> Self {
        Self {
            loan: LoanChange::Clear,
            ..Default::default()
        }
    }
}

/// Result of a plain return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReturnOutcome {
    /// Returned on or before the due date; the copy is available again
    OnTime,
    /// Returned after the due date; the copy stays borrowed
    Late,
}

/// A copy that has been deleted, as it was just before deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Removed {
    pub copy: BookCopy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_status_text() {
        assert_eq!(CopyStatus::Available.to_string(), "Available");
        assert_eq!("Borrowed".parse::<CopyStatus>(), Ok(CopyStatus::Borrowed));
        assert!("borrowed".parse::<CopyStatus>().is_err());
    }

    #[test]
    fn test_loan_is_seven_days() {
        let loan = Loan::starting_at("Alice", at(1, 9, 30, 0));
        assert_eq!(loan.due_at, at(8, 9, 30, 0));
        assert_eq!(loan.due_at - loan.borrowed_at, Duration::hours(7 * 24));
    }

    #[test]
    fn test_due_boundary_is_on_time() {
        let loan = Loan::starting_at("Bob", at(1, 12, 0, 0));
        assert!(!loan.is_late_at(at(8, 12, 0, 0)));
        assert!(loan.is_late_at(at(8, 12, 0, 1)));
        assert!(!loan.is_late_at(at(4, 0, 0, 0)));
    }

    #[test]
    fn test_timestamp_format() {
        let ts = at(5, 7, 3, 9);
        assert_eq!(format_timestamp(&ts), "2024-03-05 07:03:09");
        assert_eq!(parse_timestamp("2024-03-05 07:03:09").unwrap(), ts);
        assert!(parse_timestamp("2024-03-05T07:03:09").is_err());
    }

    #[test]
    fn test_outcomes_serialize_for_shells() {
        assert_eq!(serde_json::to_value(ReturnOutcome::Late).unwrap(), "Late");

        let borrowed = BorrowedCopy {
            id: 3,
            borrower: "Alice".to_string(),
            title: "Dune".to_string(),
            due_at: at(8, 9, 0, 0),
        };
        assert_eq!(
            serde_json::to_value(&borrowed).unwrap(),
            serde_json::json!({
                "id": 3,
                "borrower": "Alice",
                "title": "Dune",
                "due_at": "2024-03-08T09:00:00"
            })
        );
    }

    #[test]
    fn test_new_copy_validation() {
        assert!(NewCopy::new("Dune", "Herbert", 412).validate().is_ok());
        assert!(NewCopy::new("", "Herbert", 412).validate().is_err());
        assert!(NewCopy::new("Dune", "", 412).validate().is_err());
        assert!(NewCopy::new("Dune", "Herbert", 0).validate().is_err());
        assert!(NewCopy::new("Dune", "Herbert", -3).validate().is_err());
    }
}
