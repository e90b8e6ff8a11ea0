//! Amplify build specification. Rendered to the YAML document amplify
//! expects in the app's `BuildSpec` property.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const BUILD_SPEC_VERSION: &str = "1.0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phases {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_build: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_build: Option<Phase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifacts {
    pub base_directory: String,
    pub files: Vec<String>,
}

impl Default for Artifacts {
    fn default() -> Self {
        Self {
            base_directory: "/".to_string(),
            files: vec!["**/*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frontend {
    pub phases: Phases,
    pub artifacts: Artifacts,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSpec {
    pub version: String,
    pub frontend: Frontend,
}

impl Default for BuildSpec {
    /// a static site needs no real build: the repository content
    /// is published as is.
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert("AMPLIFY_MONOREPO_APP_ROOT".to_string(), "/".to_string());
        BuildSpec {
            version: BUILD_SPEC_VERSION.to_string(),
            frontend: Frontend {
                phases: Phases {
                    build: Some(Phase { commands: vec!["echo 'Building static site'".to_string()] }),
                    ..Default::default()
                },
                artifacts: Artifacts::default(),
                env,
            },
        }
    }
}

impl BuildSpec {
    pub fn with_build_commands(commands: Vec<String>) -> Self {
        let mut spec = BuildSpec::default();
        spec.frontend.phases.build = Some(Phase { commands });
        spec
    }

    /// commands of every declared phase, in execution order.
    pub fn commands(&self) -> Vec<&str> {
        let phases = &self.frontend.phases;
        [&phases.pre_build, &phases.build, &phases.post_build]
            .into_iter()
            .flatten()
            .flat_map(|p| p.commands.iter().map(|c| c.as_str()))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.commands().is_empty() {
            return Err(Error::InvalidBuildSpec("must declare at least one build command".into()));
        }
        if self.commands().iter().any(|c| c.trim().is_empty()) {
            return Err(Error::InvalidBuildSpec("build commands must not be empty".into()));
        }
        if self.frontend.artifacts.files.is_empty() {
            return Err(Error::InvalidBuildSpec("artifacts must list at least one file pattern".into()));
        }
        if self.frontend.artifacts.base_directory.is_empty() {
            return Err(Error::InvalidBuildSpec("artifacts baseDirectory must not be empty".into()));
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        self.validate()?;
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_spec_renders_static_site_build() {
        let yaml = BuildSpec::default().to_yaml().unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value["version"].as_str(), Some("1.0"));
        let frontend = &value["frontend"];
        assert_eq!(frontend["phases"]["build"]["commands"][0].as_str(), Some("echo 'Building static site'"));
        assert!(frontend["phases"].get("preBuild").is_none());
        assert_eq!(frontend["artifacts"]["baseDirectory"].as_str(), Some("/"));
        assert_eq!(frontend["artifacts"]["files"][0].as_str(), Some("**/*"));
        assert_eq!(frontend["env"]["AMPLIFY_MONOREPO_APP_ROOT"].as_str(), Some("/"));
    }

    #[test]
    fn phases_keep_execution_order() {
        let mut spec = BuildSpec::with_build_commands(vec!["make".into()]);
        spec.frontend.phases.pre_build = Some(Phase { commands: vec!["npm ci".into()] });
        spec.frontend.phases.post_build = Some(Phase { commands: vec!["echo done".into()] });
        assert_eq!(spec.commands(), vec!["npm ci", "make", "echo done"]);

        let yaml = spec.to_yaml().unwrap();
        let pre = yaml.find("preBuild").unwrap();
        let build = yaml.find("build:").unwrap();
        let post = yaml.find("postBuild").unwrap();
        assert!(pre < build && build < post);
    }

    #[test]
    fn empty_specs_are_rejected() {
        let spec = BuildSpec::with_build_commands(vec![]);
        assert!(matches!(spec.to_yaml(), Err(Error::InvalidBuildSpec(_))));

        let mut spec = BuildSpec::default();
        spec.frontend.artifacts.files.clear();
        assert!(spec.validate().is_err());
    }
}
