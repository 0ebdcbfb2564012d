//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Request handling never reads process-wide environment variables;
//! the `*_from_env_value` helpers take the raw value so binaries decide where it comes from.

use crate::constants::{
    DEFAULT_IMAGE_FAN_OUT, DEFAULT_MAX_ALLOCATION_ATTEMPTS, DEFAULT_MAX_VERSION_SUFFIX,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_ROOT_PREFIX, FALLBACK_ASSET_NAME, MAX_IMAGE_FAN_OUT,
    REPORT_FILE_NAME,
};
use crate::{FormsError, FormsResult};
use closeout_store::path;
use closeout_types::PathSegment;
use std::str::FromStr;
use std::time::Duration;

/// Limits applied to core operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Deadline for every individual store call
    pub request_timeout: Duration,
    /// Passes the allocator may make through its existence check
    pub max_allocation_attempts: u32,
    /// Highest `_verN` suffix the allocator will probe
    pub max_version_suffix: u32,
    /// Image downloads in flight per report section
    pub image_fan_out: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_allocation_attempts: DEFAULT_MAX_ALLOCATION_ATTEMPTS,
            max_version_suffix: DEFAULT_MAX_VERSION_SUFFIX,
            image_fan_out: DEFAULT_IMAGE_FAN_OUT,
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    root_prefix: String,
    fallback_asset: String,
    limits: Limits,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `fallback_asset` defaults to `logo.png` directly under the root prefix.
    ///
    /// # Errors
    ///
    /// Returns `FormsError::InvalidInput` if the root prefix is not an absolute store path
    /// below `/`, the fallback asset does not live under the root prefix, or a limit is out
    /// of range.
    pub fn new(
        root_prefix: impl Into<String>,
        fallback_asset: Option<String>,
        limits: Limits,
    ) -> FormsResult<Self> {
        let root_prefix = root_prefix.into();
        let root_prefix = root_prefix.trim_end_matches('/').to_string();
        if root_prefix.is_empty() {
            return Err(FormsError::InvalidInput(
                "root prefix cannot be the store root".into(),
            ));
        }
        path::validate(&root_prefix)
            .map_err(|e| FormsError::InvalidInput(format!("root prefix: {e}")))?;

        let fallback_asset =
            fallback_asset.unwrap_or_else(|| path::join(&root_prefix, FALLBACK_ASSET_NAME));
        path::validate(&fallback_asset)
            .map_err(|e| FormsError::InvalidInput(format!("fallback asset: {e}")))?;
        if fallback_asset == root_prefix || !path::is_within(&fallback_asset, &root_prefix) {
            return Err(FormsError::InvalidInput(format!(
                "fallback asset {fallback_asset} must live under {root_prefix}"
            )));
        }

        if limits.request_timeout.is_zero() {
            return Err(FormsError::InvalidInput(
                "request timeout must be positive".into(),
            ));
        }
        if limits.max_allocation_attempts == 0 {
            return Err(FormsError::InvalidInput(
                "max allocation attempts must be at least 1".into(),
            ));
        }
        if limits.max_version_suffix == 0 {
            return Err(FormsError::InvalidInput(
                "max version suffix must be at least 1".into(),
            ));
        }
        if !(1..=MAX_IMAGE_FAN_OUT).contains(&limits.image_fan_out) {
            return Err(FormsError::InvalidInput(format!(
                "image fan-out must be between 1 and {MAX_IMAGE_FAN_OUT}"
            )));
        }

        Ok(Self {
            root_prefix,
            fallback_asset,
            limits,
        })
    }

    /// Configuration rooted at `/forms` with default limits.
    pub fn with_defaults() -> Self {
        Self {
            root_prefix: DEFAULT_ROOT_PREFIX.into(),
            fallback_asset: path::join(DEFAULT_ROOT_PREFIX, FALLBACK_ASSET_NAME),
            limits: Limits::default(),
        }
    }

    pub fn root_prefix(&self) -> &str {
        &self.root_prefix
    }

    pub fn fallback_asset(&self) -> &str {
        &self.fallback_asset
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn request_timeout(&self) -> Duration {
        self.limits.request_timeout
    }

    /// Path of the workspace for a folder name: `{root}/{folder}`.
    pub fn workspace_path(&self, folder: &PathSegment) -> String {
        path::join(&self.root_prefix, folder.as_str())
    }

    /// Path of the report document inside a workspace.
    pub fn report_path(&self, workspace_path: &str) -> String {
        path::join(workspace_path, REPORT_FILE_NAME)
    }

    /// Returns true if the workspace at `workspace_path` would contain or replace the
    /// fallback asset.
    pub fn is_reserved_workspace(&self, workspace_path: &str) -> bool {
        path::is_within(&self.fallback_asset, workspace_path)
    }

    /// Workspace path for `folder`, unless it is reserved for the fallback asset.
    ///
    /// # Errors
    ///
    /// Returns `FormsError::InvalidInput` if the workspace would contain or replace the
    /// fallback asset.
    pub fn checked_workspace_path(&self, folder: &PathSegment) -> FormsResult<String> {
        let workspace = self.workspace_path(folder);
        if self.is_reserved_workspace(&workspace) {
            return Err(FormsError::InvalidInput(format!(
                "Invalid folderName: {folder} is reserved"
            )));
        }
        Ok(workspace)
    }

    /// Returns true if `candidate` is a well-formed path strictly below the root prefix.
    pub fn is_workspace_path(&self, candidate: &str) -> bool {
        path::validate(candidate).is_ok()
            && candidate != self.root_prefix
            && path::is_within(candidate, &self.root_prefix)
    }
}

/// Environment variable names read by the binaries.
pub mod env {
    pub const ROOT: &str = "FORMS_ROOT";
    pub const FALLBACK_ASSET: &str = "FORMS_FALLBACK_ASSET";
    pub const REQUEST_TIMEOUT_SECS: &str = "FORMS_REQUEST_TIMEOUT_SECS";
    pub const MAX_ALLOCATION_ATTEMPTS: &str = "FORMS_MAX_ALLOCATION_ATTEMPTS";
    pub const IMAGE_FAN_OUT: &str = "FORMS_IMAGE_FAN_OUT";
}

impl CoreConfig {
    /// Build the configuration from raw environment values.
    ///
    /// `lookup` returns the value of a variable, or `None` if it is unset. Binaries pass
    /// `|name| std::env::var(name).ok()`.
    ///
    /// # Errors
    ///
    /// Returns `FormsError::InvalidInput` if a value does not parse or the resulting
    /// configuration is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> FormsResult<Self> {
        let root_prefix = lookup(env::ROOT)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ROOT_PREFIX.into());
        let fallback_asset = lookup(env::FALLBACK_ASSET).filter(|v| !v.trim().is_empty());
        let limits = Limits {
            request_timeout: timeout_from_env_value(
                env::REQUEST_TIMEOUT_SECS,
                lookup(env::REQUEST_TIMEOUT_SECS),
            )?,
            max_allocation_attempts: parse_env_value(
                env::MAX_ALLOCATION_ATTEMPTS,
                lookup(env::MAX_ALLOCATION_ATTEMPTS),
                DEFAULT_MAX_ALLOCATION_ATTEMPTS,
            )?,
            image_fan_out: parse_env_value(
                env::IMAGE_FAN_OUT,
                lookup(env::IMAGE_FAN_OUT),
                DEFAULT_IMAGE_FAN_OUT,
            )?,
            ..Limits::default()
        };
        Self::new(root_prefix.trim(), fallback_asset, limits)
    }
}

/// Parse an optional environment value, falling back to `default` when unset or blank.
///
/// # Errors
///
/// Returns `FormsError::InvalidInput` naming `name` if the value does not parse.
pub fn parse_env_value<T: FromStr>(name: &str, value: Option<String>, default: T) -> FormsResult<T>
where
    T::Err: std::fmt::Display,
{
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v
            .parse::<T>()
            .map_err(|e| FormsError::InvalidInput(format!("{name}: {e}"))),
    }
}

/// Parse a timeout given in whole seconds.
pub fn timeout_from_env_value(name: &str, value: Option<String>) -> FormsResult<Duration> {
    let secs = parse_env_value(name, value, DEFAULT_REQUEST_TIMEOUT.as_secs())?;
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_place_fallback_under_root() {
        let cfg = CoreConfig::new("/forms/", None, Limits::default()).unwrap();
        assert_eq!(cfg.root_prefix(), "/forms");
        assert_eq!(cfg.fallback_asset(), "/forms/logo.png");
        assert_eq!(cfg.fallback_asset(), CoreConfig::with_defaults().fallback_asset());
    }

    #[test]
    fn test_rejects_fallback_outside_root() {
        let result = CoreConfig::new("/forms", Some("/other/logo.png".into()), Limits::default());
        assert!(matches!(result, Err(FormsError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_relative_or_root_prefix() {
        assert!(CoreConfig::new("forms", None, Limits::default()).is_err());
        assert!(CoreConfig::new("/", None, Limits::default()).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_limits() {
        let limits = Limits {
            image_fan_out: 9,
            ..Limits::default()
        };
        assert!(CoreConfig::new("/forms", None, limits).is_err());

        let limits = Limits {
            max_allocation_attempts: 0,
            ..Limits::default()
        };
        assert!(CoreConfig::new("/forms", None, limits).is_err());
    }

    #[test]
    fn test_workspace_and_report_paths() {
        let cfg = CoreConfig::with_defaults();
        let folder = PathSegment::new("branch12").unwrap();
        let workspace = cfg.workspace_path(&folder);
        assert_eq!(workspace, "/forms/branch12");
        assert_eq!(cfg.report_path(&workspace), "/forms/branch12/report.html");
        assert!(cfg.is_workspace_path(&workspace));
        assert!(!cfg.is_workspace_path("/forms"));
        assert!(!cfg.is_workspace_path("/elsewhere/branch12"));
        assert!(!cfg.is_workspace_path("/forms/../etc"));
    }

    #[test]
    fn test_fallback_asset_location_is_reserved() {
        let cfg = CoreConfig::with_defaults();
        let logo = PathSegment::new("logo.png").unwrap();
        assert!(cfg.is_reserved_workspace("/forms/logo.png"));
        assert!(matches!(
            cfg.checked_workspace_path(&logo),
            Err(FormsError::InvalidInput(_))
        ));
        assert_eq!(
            cfg.checked_workspace_path(&PathSegment::new("logo.png_ver1").unwrap())
                .unwrap(),
            "/forms/logo.png_ver1"
        );

        let nested =
            CoreConfig::new("/forms", Some("/forms/assets/logo.png".into()), Limits::default())
                .unwrap();
        assert!(nested
            .checked_workspace_path(&PathSegment::new("assets").unwrap())
            .is_err());
        assert!(nested
            .checked_workspace_path(&PathSegment::new("logo.png").unwrap())
            .is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let cfg = CoreConfig::from_lookup(|name| match name {
            env::ROOT => Some("/closeout".into()),
            env::IMAGE_FAN_OUT => Some("2".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.root_prefix(), "/closeout");
        assert_eq!(cfg.fallback_asset(), "/closeout/logo.png");
        assert_eq!(cfg.limits().image_fan_out, 2);
        assert_eq!(cfg.request_timeout(), DEFAULT_REQUEST_TIMEOUT);

        let defaults = CoreConfig::from_lookup(|_| None).unwrap();
        assert_eq!(defaults.root_prefix(), DEFAULT_ROOT_PREFIX);

        let bad = CoreConfig::from_lookup(|name| {
            (name == env::IMAGE_FAN_OUT).then(|| "0".to_string())
        });
        assert!(bad.is_err());
    }

    #[test]
    fn test_parse_env_value() {
        assert_eq!(parse_env_value("N", None, 4usize).unwrap(), 4);
        assert_eq!(parse_env_value("N", Some("  ".into()), 4usize).unwrap(), 4);
        assert_eq!(parse_env_value("N", Some("6".into()), 4usize).unwrap(), 6);
        assert!(parse_env_value("N", Some("six".into()), 4usize).is_err());
        assert_eq!(
            timeout_from_env_value("T", Some("3".into())).unwrap(),
            Duration::from_secs(3)
        );
    }
}
