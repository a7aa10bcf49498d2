//! Utility helpers shared by the Lister engine and CLI.
//!
//! - `merge`: structural JSON merging where `null` means "not given", and dotted-path lookup
//! - `http`: list request execution, strict response parsing and collection extraction
//! - `text_processing`: secret redaction for logs and error messages
//! - `path_processing`: `~` expansion for configuration paths

pub mod http;
pub mod merge;
pub mod path_processing;
pub mod text_processing;

pub use merge::{deep_merge_defined, merge_defined_maps, value_at_path};
pub use path_processing::expand_tilde;
pub use text_processing::redact_sensitive;
