//! # API Shared
//!
//! Wire definitions for the close-out forms APIs.
//!
//! Contains:
//! - Request and response bodies (`wire` module), serialised in camelCase and described for
//!   OpenAPI
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` and `closeout-cli`.

pub mod health;
pub mod wire;

pub use health::HealthService;
pub use wire::*;
