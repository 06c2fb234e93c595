use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::ActionGraphError;

/// Category of an action. Each kind has its own execute task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Build,
    Deploy,
    Test,
    Run,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Build,
        ActionKind::Deploy,
        ActionKind::Test,
        ActionKind::Run,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Build => "build",
            ActionKind::Deploy => "deploy",
            ActionKind::Test => "test",
            ActionKind::Run => "run",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ActionGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(ActionKind::Build),
            "deploy" => Ok(ActionKind::Deploy),
            "test" => Ok(ActionKind::Test),
            "run" => Ok(ActionKind::Run),
            other => Err(ActionGraphError::ConfigError(format!(
                "unknown action kind '{other}' (expected build, deploy, test or run)"
            ))),
        }
    }
}

/// Reference to one action: kind plus name, written `build.api`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionRef {
    pub kind: ActionKind,
    pub name: String,
}

impl ActionRef {
    pub fn new(kind: ActionKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

impl FromStr for ActionRef {
    type Err = ActionGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, name) = s.split_once('.').ok_or_else(|| {
            ActionGraphError::ConfigError(format!(
                "invalid action reference '{s}' (expected <kind>.<name>)"
            ))
        })?;

        if !is_valid_name(name) {
            return Err(ActionGraphError::ConfigError(format!(
                "invalid action name '{name}' in reference '{s}'"
            )));
        }

        Ok(ActionRef::new(kind.parse()?, name))
    }
}

/// Names are non-empty and made of ASCII alphanumerics, `-` and `_`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_refs() {
        let r: ActionRef = "deploy.web".parse().unwrap();
        assert_eq!(r, ActionRef::new(ActionKind::Deploy, "web"));
        assert_eq!(r.to_string(), "deploy.web");
    }

    #[test]
    fn rejects_malformed_refs() {
        assert!("api".parse::<ActionRef>().is_err());
        assert!("compile.api".parse::<ActionRef>().is_err());
        assert!("build.".parse::<ActionRef>().is_err());
        assert!("build.a.b".parse::<ActionRef>().is_err());
    }
}
