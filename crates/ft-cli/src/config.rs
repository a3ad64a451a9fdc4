//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use ft_core::activity::DEFAULT_POINTER_DEBOUNCE_MS;
use ft_core::display::DEFAULT_DAILY_FOCUS_GOAL_MS;
use ft_core::watchdog::DEFAULT_INACTIVITY_LIMIT_MS;
use ft_core::{ActivityKind, ReporterConfig};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Unix socket the daemon listens on.
    pub socket_path: PathBuf,
    /// Focus freezes after this long without activity.
    pub inactivity_limit_ms: u64,
    /// Minimum gap between two reported pointer moves.
    pub pointer_debounce_ms: u64,
    pub daily_focus_goal_ms: u64,
    /// How often `status --watch` redraws.
    pub refresh_interval_ms: u64,
    /// Activity kinds that count as liveness.
    pub activity_kinds: Vec<ActivityKind>,
    /// Program run with `<title> <message>` for each notice.
    pub notify_command: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("socket_path", &self.socket_path)
            .field("inactivity_limit_ms", &self.inactivity_limit_ms)
            .field("pointer_debounce_ms", &self.pointer_debounce_ms)
            .field("daily_focus_goal_ms", &self.daily_focus_goal_ms)
            .field("refresh_interval_ms", &self.refresh_interval_ms)
            .field("activity_kinds", &self.activity_kinds)
            .field("notify_command", &self.notify_command.is_some())
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        let runtime_dir = dirs_runtime_path().unwrap_or_else(|| data_dir.clone());
        Self {
            database_path: data_dir.join("ft.db"),
            socket_path: runtime_dir.join("ft.sock"),
            inactivity_limit_ms: DEFAULT_INACTIVITY_LIMIT_MS,
            pointer_debounce_ms: DEFAULT_POINTER_DEBOUNCE_MS,
            daily_focus_goal_ms: DEFAULT_DAILY_FOCUS_GOAL_MS,
            refresh_interval_ms: 1_000,
            activity_kinds: ActivityKind::ALL.to_vec(),
            notify_command: None,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // FT_* environment variables win.
        figment = figment.merge(Env::prefixed("FT_"));

        figment.extract()
    }

    /// Reporter settings for page contexts.
    #[must_use]
    pub fn reporter_config(&self) -> ReporterConfig {
        ReporterConfig {
            pointer_debounce_ms: self.pointer_debounce_ms,
            enabled_kinds: self.activity_kinds.clone(),
        }
    }
}

/// Returns the platform-specific config directory for ft.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ft"))
}

/// Returns the platform-specific data directory for ft.
///
/// On Linux: `~/.local/share/ft`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("ft"))
}

/// Returns the per-user runtime directory for ft, if the platform has one.
///
/// On Linux: `$XDG_RUNTIME_DIR/ft`
pub fn dirs_runtime_path() -> Option<PathBuf> {
    dirs::runtime_dir().map(|p| p.join("ft"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_ft() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "ft");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("ft.db"));
    }

    #[test]
    fn test_defaults_match_session_constants() {
        let config = Config::default();
        assert_eq!(config.inactivity_limit_ms, 5_000);
        assert_eq!(config.pointer_debounce_ms, 1_000);
        assert_eq!(config.daily_focus_goal_ms, 10_000);
        assert_eq!(config.refresh_interval_ms, 1_000);
        assert_eq!(config.activity_kinds.len(), ActivityKind::ALL.len());
        assert_eq!(config.reporter_config(), ReporterConfig::default());
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("ft.toml");
        std::fs::write(
            &path,
            r#"
inactivity_limit_ms = 60000
daily_focus_goal_ms = 7200000
activity_kinds = ["click", "keyboard"]
notify_command = "notify-send"
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.inactivity_limit_ms, 60_000);
        assert_eq!(config.daily_focus_goal_ms, 7_200_000);
        assert_eq!(
            config.activity_kinds,
            vec![ActivityKind::Click, ActivityKind::KeyDown]
        );
        assert_eq!(config.notify_command.as_deref(), Some("notify-send"));
    }

    #[test]
    fn test_unknown_activity_kind_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("ft.toml");
        std::fs::write(&path, "activity_kinds = [\"scroll\"]\n").unwrap();
        assert!(Config::load_from(Some(&path)).is_err());
    }
}
