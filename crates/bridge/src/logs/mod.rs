//! Log context gathering for firing alerts.
//!
//! A closed catalog maps service identifiers to the two log files kept for
//! that service; the reader tails those files into a [`LogBundle`] that is
//! used as evidence in the diagnosis prompt.

pub mod catalog;
pub mod reader;

pub use catalog::{LogCatalog, LogSource, LogTarget};
pub use reader::{
    FileExcerpt, LogBundle, LogContextReader, LogContextSource, DIRECTORY_NOT_FOUND, EMPTY_LOGS,
    TAIL_LINES,
};
