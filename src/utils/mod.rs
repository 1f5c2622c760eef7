//! Utility modules.

pub mod file;
pub mod retry;

pub use file::{calculate_checksum, collect_files, is_document_file, is_text_file, read_file_bytes};
pub use retry::{RetryPolicy, Transient, with_retry};
