// common/src/runtime.rs
//! Deployment-environment markers and the policies derived from them.
//!
//! Markers are read from the raw environment. `RUN_MODE` defaults to
//! "development" for config-file selection, but an unset `RUN_MODE` is not a
//! development marker here.
const PRODUCTION: &str = "production";
const DEV_PLATFORM_VALUES: &[&str] = &["development", "preview-local"];
const NON_PRODUCTION_RUN_MODES: &[&str] = &["development", "dev", "local", "test"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeMarkers {
    /// `RUN_MODE`
    pub run_mode: Option<String>,
    /// `PLATFORM_ENV`, set by the hosting platform
    pub platform_env: Option<String>,
}

impl RuntimeMarkers {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
        };
        Self {
            run_mode: read("RUN_MODE"),
            platform_env: read("PLATFORM_ENV"),
        }
    }

    pub fn is_production(&self) -> bool {
        self.run_mode.as_deref() == Some(PRODUCTION)
            || self.platform_env.as_deref() == Some(PRODUCTION)
    }

    fn is_dev_platform(&self) -> bool {
        self.platform_env
            .as_deref()
            .map_or(false, |v| DEV_PLATFORM_VALUES.contains(&v))
    }

    fn is_non_production_mode(&self) -> bool {
        self.run_mode
            .as_deref()
            .map_or(false, |v| NON_PRODUCTION_RUN_MODES.contains(&v))
    }

    /// An explicit local/dev context with no production marker anywhere.
    pub fn is_development(&self) -> bool {
        !self.is_production() && (self.is_dev_platform() || self.is_non_production_mode())
    }

    /// Whether privileged endpoints may accept a bare, unsigned address.
    ///
    /// Precedence: explicit override, production marker (off), dev platform
    /// marker (on), non-production run mode (on), otherwise off.
    pub fn dev_fallback_enabled(&self, explicit: Option<bool>) -> bool {
        if let Some(flag) = explicit {
            return flag;
        }
        if self.is_production() {
            return false;
        }
        self.is_dev_platform() || self.is_non_production_mode()
    }
}
