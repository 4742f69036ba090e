//! Unified client interface.
//!
//! Developer-friendly goal: keep the public surface small and predictable.
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;
pub mod credentials;
pub mod error_classification;
pub mod types;
pub mod validation;

pub use builder::UnifiedClientBuilder;
pub use core::UnifiedClient;
pub use credentials::Credentials;
pub use types::{CancelHandle, EventStream};
pub use validation::{Adjustment, ValidatedConfig};
