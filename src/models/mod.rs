//! Data models for the lending core

pub mod copy;

// Re-export commonly used types
pub use copy::{
    AvailableTitle, BookCopy, BorrowedCopy, CopyStatus, CopyUpdate, Loan, LoanChange, NewCopy,
    Removed, ReturnOutcome, StatusCounts,
};
