use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::InputError;

static MAVEN_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("-?maven-?").expect("valid regex"));
static PLUGIN_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("-?plugin-?").expect("valid regex"));

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PluginDescriptor {
    #[serde(alias = "groupId")]
    pub group_id: String,
    #[serde(alias = "artifactId")]
    pub artifact_id: String,
    #[serde(default)]
    pub version: String,
    /// Title of the plugin overview page. Falls back to the artifact id.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "goalPrefix")]
    pub goal_prefix: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "mojos")]
    pub goals: Vec<GoalDescriptor>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct GoalDescriptor {
    #[serde(alias = "goal")]
    pub name: String,
    #[serde(default, alias = "fullGoalName")]
    pub full_goal_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, alias = "defaultValue")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PluginDescriptor {
    pub fn goal_prefix(&self) -> String {
        match self.goal_prefix.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => prefix.to_string(),
            _ => goal_prefix_from_artifact_id(&self.artifact_id),
        }
    }

    /// Title of the plugin overview page, the parent of every goal page.
    pub fn root_title(&self) -> &str {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => self.artifact_id.trim(),
        }
    }

    pub fn coordinates(&self) -> String {
        format!("{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }

    /// `prefix:goal`, unless the producer supplied a full name.
    pub fn full_goal_name(&self, goal: &GoalDescriptor) -> String {
        match goal.full_goal_name.trim() {
            "" => format!("{}:{}", self.goal_prefix(), goal.canonical_title()),
            name => name.to_string(),
        }
    }

    /// Fill in full goal names that the producer left out.
    fn complete(mut self) -> Self {
        let names: Vec<String> = self
            .goals
            .iter()
            .map(|goal| self.full_goal_name(goal))
            .collect();
        for (goal, name) in self.goals.iter_mut().zip(names) {
            goal.full_goal_name = name;
        }
        self
    }
}

impl GoalDescriptor {
    /// Page title of the goal. Derived from the goal name alone so that
    /// cross-links stay stable across renders.
    pub fn canonical_title(&self) -> &str {
        self.name.trim()
    }
}

/// Derive the goal prefix the way the build tool does: `maven-plugin-plugin`
/// is special-cased, everything else loses its `maven` and `plugin`
/// fragments.
pub fn goal_prefix_from_artifact_id(artifact_id: &str) -> String {
    if artifact_id == "maven-plugin-plugin" {
        return "plugin".to_string();
    }
    let without_maven = MAVEN_FRAGMENT.replace_all(artifact_id, "");
    PLUGIN_FRAGMENT.replace_all(&without_maven, "").into_owned()
}

/// Load a descriptor exported by the build tool as JSON or YAML.
pub fn load_descriptor(path: &Path) -> Result<PluginDescriptor> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase);
    let parsed: PluginDescriptor = match extension.as_deref() {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?,
        _ => bail!(
            "unsupported descriptor format (expected .json, .yaml or .yml): {}",
            path.display()
        ),
    };
    Ok(parsed.complete())
}

/// Reject descriptors whose pages could not converge by title.
///
/// Page titles are unique per space regardless of case, so titles are
/// compared case-insensitively.
pub fn validate_descriptor(descriptor: &PluginDescriptor) -> Result<(), InputError> {
    if descriptor.artifact_id.trim().is_empty() {
        return Err(InputError::EmptyArtifactId);
    }
    let root_key = descriptor.root_title().to_lowercase();
    let mut full_names = BTreeSet::new();
    let mut titles: BTreeMap<String, String> = BTreeMap::new();

    for (index, goal) in descriptor.goals.iter().enumerate() {
        let title = goal.canonical_title();
        if title.is_empty() {
            return Err(InputError::EmptyGoalName { index });
        }
        let full_name = descriptor.full_goal_name(goal);
        if !full_names.insert(full_name.clone()) {
            return Err(InputError::DuplicateGoal(full_name));
        }
        let key = title.to_lowercase();
        if key == root_key {
            return Err(InputError::TitleClashesWithRoot {
                goal: full_name,
                title: title.to_string(),
            });
        }
        if let Some(first) = titles.insert(key, full_name.clone()) {
            return Err(InputError::DuplicateTitle {
                title: title.to_string(),
                first,
                second: full_name,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn sample_descriptor() -> PluginDescriptor {
    PluginDescriptor {
        group_id: "org.example".to_string(),
        artifact_id: "demo".to_string(),
        version: "1.0.0".to_string(),
        name: None,
        goal_prefix: None,
        description: String::new(),
        goals: vec![GoalDescriptor {
            name: "build".to_string(),
            full_goal_name: "demo:build".to_string(),
            description: String::new(),
            parameters: vec![ParameterDescriptor {
                name: "verbose".to_string(),
                value_type: "bool".to_string(),
                required: false,
                default_value: None,
                description: None,
            }],
        }],
    }
}

#[cfg(test)]
pub(crate) fn goal(name: &str) -> GoalDescriptor {
    GoalDescriptor {
        name: name.to_string(),
        full_goal_name: format!("demo:{name}"),
        description: format!("Runs {name}."),
        parameters: Vec::new(),
    }
}
