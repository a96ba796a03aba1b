//! Build mode selection.

use std::fmt;
use std::str::FromStr;

/// Development vs production behavior switch.
///
/// Resolved once per build session and threaded through every component as
/// an immutable value; nothing mutates it mid-session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    /// Resolve the mode from an explicit flag and an environment value.
    ///
    /// The explicit flag wins, then the environment variable; absence of
    /// both defaults to development.
    pub fn resolve(explicit: Option<BuildMode>, env: Option<&str>) -> BuildMode {
        if let Some(mode) = explicit {
            return mode;
        }

        match env {
            Some(value) => value.parse().unwrap_or_default(),
            None => BuildMode::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == BuildMode::Production
    }
}

impl FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(BuildMode::Development),
            "production" | "prod" => Ok(BuildMode::Production),
            other => Err(format!("unknown build mode: {other}")),
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Development => write!(f, "development"),
            BuildMode::Production => write!(f, "production"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flag_wins_over_env() {
        let mode = BuildMode::resolve(Some(BuildMode::Production), Some("development"));
        assert_eq!(mode, BuildMode::Production);
    }

    #[test]
    fn env_value_used_when_no_flag() {
        let mode = BuildMode::resolve(None, Some("production"));
        assert_eq!(mode, BuildMode::Production);
    }

    #[test]
    fn defaults_to_development() {
        assert_eq!(BuildMode::resolve(None, None), BuildMode::Development);
        assert_eq!(BuildMode::resolve(None, Some("nonsense")), BuildMode::Development);
    }

    #[test]
    fn parses_short_forms() {
        assert_eq!("dev".parse::<BuildMode>().unwrap(), BuildMode::Development);
        assert_eq!("prod".parse::<BuildMode>().unwrap(), BuildMode::Production);
    }
}
