//! # Lister Engine
//!
//! The Lister engine powers remote-data-backed pickers: single or multiple
//! choice with search, filters and confirm/cancel semantics, against arbitrary
//! list endpoints.
//!
//! ## Key Features
//!
//! - **Definitions**: Named base definitions merged with call-site patches
//! - **Inference**: Deterministic option-value key inference for standalone definitions
//! - **Fetching**: Request building, row selection and mapping with a shared response cache
//! - **Sessions**: Open/reuse per owner, debounced search, stale-result rejection
//! - **Display**: Trigger summaries and hand-off of outcomes to form fields
//!
//! ## Usage
//!
//! ```rust
//! use lister_engine::{DefinitionRef, DefinitionRegistry};
//!
//! let registry = DefinitionRegistry::from_document(r#"
//! definitions:
//!   users:
//!     endpoint: /users
//!     mapping:
//!       optionValue: id
//!       optionLabel: name
//! "#)?;
//!
//! let definition = registry.resolve(&DefinitionRef::named("users")).expect("users definition");
//! assert_eq!(definition.source.endpoint, "/users");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`resolve`**: Definition merging
//! - **`registry`**: Named definitions and definition references
//! - **`inference`**: Option-value key inference
//! - **`fetch`**: Transport seam, response cache and row mapping
//! - **`session`**: The [`Lister`] facade and the session store
//! - **`display`**: Selection summaries and field commit helpers
//! - **`config`**: Engine configuration

pub mod config;
pub mod display;
pub mod error;
pub mod fetch;
pub mod inference;
pub mod registry;
pub mod resolve;
pub mod session;

pub use config::ListerConfig;
pub use display::{DisplayOptions, FieldHost, TriggerSummary, ValueAction, ValueChangeDetail, commit_clear, commit_outcome, summarize_selection};
pub use error::ListerError;
pub use fetch::{FetchPolicy, FetchResult, FetchService, HttpTransport, NullTransport, Transport};
pub use inference::{InferredKey, infer_option_value_key};
pub use registry::{DefinitionRef, DefinitionRegistry};
pub use resolve::merge_definition;
pub use session::{
    Lister, OpenHandle, OpenOptions, PickerPermissions, RefreshMode, RenderOption, SearchMode, Session, SessionId, StoreSnapshot,
};
