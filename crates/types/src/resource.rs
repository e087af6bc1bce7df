//! Remote resource collections addressable by the console.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A REST collection holding editable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Workflows,
    Agents,
    ModelProviders,
}

impl ResourceKind {
    /// Collection path segment, relative to the API base URL.
    pub fn collection_path(&self) -> &'static str {
        match self {
            Self::Workflows => "workflows",
            Self::Agents => "agents",
            Self::ModelProviders => "model-providers",
        }
    }

    /// Singular noun for messages ("workflow w1 not found").
    pub fn singular(&self) -> &'static str {
        match self {
            Self::Workflows => "workflow",
            Self::Agents => "agent",
            Self::ModelProviders => "model provider",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_path())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "workflow" | "workflows" => Ok(Self::Workflows),
            "agent" | "agents" => Ok(Self::Agents),
            "model-provider" | "model-providers" | "provider" | "providers" => Ok(Self::ModelProviders),
            other => Err(format!("unknown resource kind '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_singular_and_plural_names() {
        assert_eq!("workflow".parse::<ResourceKind>(), Ok(ResourceKind::Workflows));
        assert_eq!("Agents".parse::<ResourceKind>(), Ok(ResourceKind::Agents));
        assert_eq!("providers".parse::<ResourceKind>(), Ok(ResourceKind::ModelProviders));
        assert!("threads".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn collection_paths() {
        assert_eq!(ResourceKind::ModelProviders.collection_path(), "model-providers");
        assert_eq!(ResourceKind::Workflows.to_string(), "workflows");
    }
}
