//! Application context configuration
//!
//! [`ContextConfig`] decides how a context reacts to lifecycle misuse and to
//! failing finish hooks. Defaults reproduce the plain behavior: a repeated
//! `finish()` is a no-op, hooks added after finishing are rejected, and the
//! first failing hook aborts the rest.
//!
//! Configuration can be loaded from TOML or JSON, overridden from
//! `APPLICABLES_*` environment variables, or set key by key.

pub mod validation;

use crate::{ApplicationError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub use validation::{ConfigValidator, ValidationError, ValidationResult};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "APPLICABLES_";

/// Upper bound for `initial_hook_capacity`
pub const MAX_INITIAL_HOOK_CAPACITY: usize = 4096;

/// What `finish()` does on a context that is already finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatFinishPolicy {
    /// Return `Ok(())` without running anything
    #[default]
    Ignore,
    /// Fail with [`ApplicationError::AlreadyFinished`]
    Reject,
}

/// What `add_finish_hook()` does on a context that is already finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateHookPolicy {
    /// Fail with [`ApplicationError::AlreadyFinished`]
    #[default]
    Reject,
    /// Drop the hook without running it
    Ignore,
}

/// How a failing finish hook affects the hooks after it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookFailurePolicy {
    /// Stop at the first failure and propagate it
    #[default]
    Abort,
    /// Run every hook, then report all failures together
    Isolate,
}

macro_rules! policy_from_str {
    ($ty:ty, $($text:literal => $variant:path),+ $(,)?) => {
        impl FromStr for $ty {
            type Err = ApplicationError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($variant),)+
                    other => Err(ApplicationError::invalid(format!(
                        "Unknown {} value: {other}",
                        stringify!($ty)
                    ))),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let text = match self {
                    $($variant => $text,)+
                };
                f.write_str(text)
            }
        }
    };
}

policy_from_str!(
    RepeatFinishPolicy,
    "ignore" => RepeatFinishPolicy::Ignore,
    "reject" => RepeatFinishPolicy::Reject,
);
policy_from_str!(
    LateHookPolicy,
    "reject" => LateHookPolicy::Reject,
    "ignore" => LateHookPolicy::Ignore,
);
policy_from_str!(
    HookFailurePolicy,
    "abort" => HookFailurePolicy::Abort,
    "isolate" => HookFailurePolicy::Isolate,
);

/// Configuration shared by application contexts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Behavior of a second `finish()`
    pub repeat_finish: RepeatFinishPolicy,
    /// Behavior of `add_finish_hook()` after finishing
    pub late_hook: LateHookPolicy,
    /// Behavior after a failing finish hook
    pub hook_failure: HookFailurePolicy,
    /// Maximum number of hooks a context accepts; `None` is unbounded
    pub max_finish_hooks: Option<usize>,
    /// Preallocated hook slots per context
    pub initial_hook_capacity: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            repeat_finish: RepeatFinishPolicy::default(),
            late_hook: LateHookPolicy::default(),
            hook_failure: HookFailurePolicy::default(),
            max_finish_hooks: None,
            initial_hook_capacity: 1,
        }
    }
}

impl ContextConfig {
    /// Use the given repeat-finish policy
    pub fn with_repeat_finish(mut self, policy: RepeatFinishPolicy) -> Self {
        self.repeat_finish = policy;
        self
    }

    /// Use the given late-hook policy
    pub fn with_late_hook(mut self, policy: LateHookPolicy) -> Self {
        self.late_hook = policy;
        self
    }

    /// Use the given hook-failure policy
    pub fn with_hook_failure(mut self, policy: HookFailurePolicy) -> Self {
        self.hook_failure = policy;
        self
    }

    /// Bound the number of hooks per context
    pub fn with_max_finish_hooks(mut self, limit: usize) -> Self {
        self.max_finish_hooks = Some(limit);
        self
    }

    /// Load configuration from a `.toml` or `.json` file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ApplicationError::config(format!("Failed to read config file: {e}"))
        })?;

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| ApplicationError::config(format!("Invalid TOML: {e}")))?,
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| ApplicationError::config(format!("Invalid JSON: {e}")))?,
            _ => return Err(ApplicationError::config("Unsupported file format")),
        };

        config.validate()?;
        tracing::debug!(path = %path.display(), ?config, "loaded context configuration");
        Ok(config)
    }

    /// Apply `APPLICABLES_*` environment overrides
    pub fn merge_with_env(&mut self) -> Result<()> {
        for key in [
            "repeat_finish",
            "late_hook",
            "hook_failure",
            "max_finish_hooks",
            "initial_hook_capacity",
        ] {
            let var = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());
            if let Ok(value) = std::env::var(&var) {
                self.set_from_string(key, &value)
                    .map_err(|e| ApplicationError::invalid(format!("{var}: {e}")))?;
            }
        }
        Ok(())
    }

    /// Take every non-default value from `other`
    pub fn merge_with(&mut self, other: &Self) {
        let defaults = Self::default();
        if other.repeat_finish != defaults.repeat_finish {
            self.repeat_finish = other.repeat_finish;
        }
        if other.late_hook != defaults.late_hook {
            self.late_hook = other.late_hook;
        }
        if other.hook_failure != defaults.hook_failure {
            self.hook_failure = other.hook_failure;
        }
        if other.max_finish_hooks != defaults.max_finish_hooks {
            self.max_finish_hooks = other.max_finish_hooks;
        }
        if other.initial_hook_capacity != defaults.initial_hook_capacity {
            self.initial_hook_capacity = other.initial_hook_capacity;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let mut validator = ConfigValidator::new();
        validator.custom(
            "max_finish_hooks",
            &self.max_finish_hooks,
            |limit| *limit != Some(0),
            "must be at least 1 when set",
        );
        validator.range(
            "initial_hook_capacity",
            self.initial_hook_capacity,
            None,
            Some(MAX_INITIAL_HOOK_CAPACITY),
        );
        validator.result()?;
        Ok(())
    }

    /// Set a single value from its textual form
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "repeat_finish" | "repeat-finish" => self.repeat_finish = value.parse()?,
            "late_hook" | "late-hook" => self.late_hook = value.parse()?,
            "hook_failure" | "hook-failure" => self.hook_failure = value.parse()?,
            "max_finish_hooks" | "max-finish-hooks" => {
                self.max_finish_hooks = match value.trim() {
                    "" | "none" | "unbounded" => None,
                    limit => Some(limit.parse().map_err(|_| {
                        ApplicationError::invalid(format!("Invalid hook limit: {limit}"))
                    })?),
                };
            }
            "initial_hook_capacity" | "initial-hook-capacity" => {
                self.initial_hook_capacity = value.trim().parse().map_err(|_| {
                    ApplicationError::invalid(format!("Invalid hook capacity: {value}"))
                })?;
            }
            _ => {
                return Err(ApplicationError::invalid(format!(
                    "Unknown configuration key: {key}"
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ContextConfig::default();
        assert_eq!(config.repeat_finish, RepeatFinishPolicy::Ignore);
        assert_eq!(config.late_hook, LateHookPolicy::Reject);
        assert_eq!(config.hook_failure, HookFailurePolicy::Abort);
        assert_eq!(config.max_finish_hooks, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_hook_limit_rejected() {
        let config = ContextConfig::default().with_max_finish_hooks(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_finish_hooks"));
    }

    #[test]
    fn test_capacity_bound() {
        let config = ContextConfig {
            initial_hook_capacity: MAX_INITIAL_HOOK_CAPACITY + 1,
            ..ContextConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_set_from_string() {
        let mut config = ContextConfig::default();
        config.set_from_string("repeat-finish", "Reject").unwrap();
        config.set_from_string("hook_failure", "isolate").unwrap();
        config.set_from_string("max_finish_hooks", "8").unwrap();
        assert_eq!(config.repeat_finish, RepeatFinishPolicy::Reject);
        assert_eq!(config.hook_failure, HookFailurePolicy::Isolate);
        assert_eq!(config.max_finish_hooks, Some(8));

        config.set_from_string("max_finish_hooks", "unbounded").unwrap();
        assert_eq!(config.max_finish_hooks, None);

        assert!(config.set_from_string("late_hook", "maybe").is_err());
        assert!(config.set_from_string("colour", "blue").is_err());
    }

    #[test]
    fn test_merge_takes_non_defaults() {
        let mut base = ContextConfig::default().with_max_finish_hooks(4);
        let overlay = ContextConfig::default().with_late_hook(LateHookPolicy::Ignore);
        base.merge_with(&overlay);
        assert_eq!(base.late_hook, LateHookPolicy::Ignore);
        assert_eq!(base.max_finish_hooks, Some(4));
    }

    #[test]
    fn test_load_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "repeat_finish = \"reject\"\nmax_finish_hooks = 3").unwrap();

        let config = ContextConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.repeat_finish, RepeatFinishPolicy::Reject);
        assert_eq!(config.max_finish_hooks, Some(3));
        assert_eq!(config.hook_failure, HookFailurePolicy::Abort);
    }

    #[test]
    fn test_load_json_validates() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"max_finish_hooks": 0}}"#).unwrap();

        let err = ContextConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ApplicationError::Invalid { .. }));
    }

    #[test]
    fn test_load_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = ContextConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ApplicationError::Config { .. }));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("APPLICABLES_HOOK_FAILURE", "isolate");
        std::env::set_var("APPLICABLES_MAX_FINISH_HOOKS", "16");
        let mut config = ContextConfig::default();
        let result = config.merge_with_env();
        std::env::remove_var("APPLICABLES_HOOK_FAILURE");
        std::env::remove_var("APPLICABLES_MAX_FINISH_HOOKS");

        result.unwrap();
        assert_eq!(config.hook_failure, HookFailurePolicy::Isolate);
        assert_eq!(config.max_finish_hooks, Some(16));
    }

    #[test]
    #[serial]
    fn test_env_override_reports_variable() {
        std::env::set_var("APPLICABLES_LATE_HOOK", "sometimes");
        let mut config = ContextConfig::default();
        let result = config.merge_with_env();
        std::env::remove_var("APPLICABLES_LATE_HOOK");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("APPLICABLES_LATE_HOOK"));
    }

    #[test]
    fn test_policy_display_round_trip() {
        assert_eq!(HookFailurePolicy::Isolate.to_string(), "isolate");
        assert_eq!("IGNORE".parse::<RepeatFinishPolicy>().unwrap(), RepeatFinishPolicy::Ignore);
    }
}
