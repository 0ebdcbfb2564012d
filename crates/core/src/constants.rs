//! Constants used throughout the closeout core crate.
//!
//! This module contains path, naming and limit constants to ensure
//! consistency across the codebase and make maintenance easier.

use std::time::Duration;

/// Crate version, reported at startup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default root prefix under which every workspace lives.
pub const DEFAULT_ROOT_PREFIX: &str = "/forms";

/// File name of the fallback asset, relative to the root prefix.
pub const FALLBACK_ASSET_NAME: &str = "logo.png";

/// File name of the generated report inside a workspace.
pub const REPORT_FILE_NAME: &str = "report.html";

/// Separator between a base workspace name and its version number.
pub const VERSION_SUFFIX: &str = "_ver";

/// Default ceiling on allocator passes through the existence check.
pub const DEFAULT_MAX_ALLOCATION_ATTEMPTS: u32 = 25;

/// Default ceiling on the version number the allocator will probe.
pub const DEFAULT_MAX_VERSION_SUFFIX: u32 = 1_000;

/// Default number of image downloads in flight per section.
pub const DEFAULT_IMAGE_FAN_OUT: usize = 4;

/// Largest accepted image fan-out.
pub const MAX_IMAGE_FAN_OUT: usize = 8;

/// Default deadline for a single store call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Media type used for embedded images whose type cannot be sniffed.
pub const DEFAULT_IMAGE_MEDIA_TYPE: &str = "image/jpeg";

/// Lower-cased words that mark a section as expecting photographic evidence.
pub const PHOTO_KEYWORDS: &[&str] = &["photo", "תמונה", "תמונות"];
