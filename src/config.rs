use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::regions::{verify_account, verify_region};

pub const ACCOUNT_ENV_VAR: &str = "CDK_DEFAULT_ACCOUNT";
pub const REGION_ENV_VAR: &str = "CDK_DEFAULT_REGION";
pub const DEFAULT_CONFIG_FILE: &str = "amplify_site.toml";

/// target account and region. Either can be left empty, in which case
/// the aws sdk's default provider chain resolves it at deploy time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackEnvironment {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl StackEnvironment {
    pub fn new(account: Option<String>, region: Option<String>) -> Result<Self> {
        let account = account.filter(|a| !a.is_empty());
        let region = region.filter(|r| !r.is_empty());
        if let Some(account) = &account {
            verify_account(account)?;
        }
        if let Some(region) = &region {
            verify_region(region)?;
        }
        Ok(Self { account, region })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(std::env::var(ACCOUNT_ENV_VAR).ok(), std::env::var(REGION_ENV_VAR).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub stack_name: String,
    pub repository_name: String,
    pub repository_description: String,
    pub app_name: String,
    /// local directory whose files become the first commit of the repository.
    pub site_dir: PathBuf,
    pub branch: String,
    pub environment_variables: BTreeMap<String, String>,
    pub build_commands: Vec<String>,
    /// bucket the repository seed archive is uploaded to. Derived
    /// from the account and region when left empty.
    pub asset_bucket: Option<String>,
    /// also start a release build when the trigger resource gets updated.
    pub trigger_on_update: bool,
    pub out_dir: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let mut environment_variables = BTreeMap::new();
        environment_variables.insert("AMPLIFY_MONOREPO_APP_ROOT".to_string(), "/".to_string());
        Self {
            stack_name: "AmplifyStaticSiteStack".into(),
            repository_name: "static-site-repo".into(),
            repository_description: "Repository for the static website".into(),
            app_name: "StaticSiteAmplifyApp".into(),
            site_dir: PathBuf::from("site"),
            branch: "main".into(),
            environment_variables,
            build_commands: vec!["echo 'Building static site'".into()],
            asset_bucket: None,
            trigger_on_update: false,
            out_dir: PathBuf::from("cdk.out"),
        }
    }
}

impl SiteConfig {
    pub fn from_toml_str(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&contents).map_err(|e| Error::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// loads `path` when given, otherwise the default config file if one
    /// exists in the working directory, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let conf = SiteConfig::from_toml_str(r#"
            site_dir = "public"
            trigger_on_update = true
        "#).unwrap();
        assert_eq!(conf.site_dir, PathBuf::from("public"));
        assert!(conf.trigger_on_update);
        assert_eq!(conf.stack_name, "AmplifyStaticSiteStack");
        assert_eq!(conf.repository_name, "static-site-repo");
        assert_eq!(conf.environment_variables["AMPLIFY_MONOREPO_APP_ROOT"], "/");
    }

    #[test]
    fn unknown_types_fail_to_parse() {
        assert!(SiteConfig::from_toml_str("trigger_on_update = \"yes\"").is_err());
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = SiteConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn absent_environment_is_tolerated() {
        let env = StackEnvironment::new(None, Some(String::new())).unwrap();
        assert_eq!(env, StackEnvironment::default());
        let env = StackEnvironment::new(Some("123456789012".into()), Some("us-west-2".into())).unwrap();
        assert_eq!(env.region.as_deref(), Some("us-west-2"));
        assert!(StackEnvironment::new(None, Some("nowhere-1".into())).is_err());
    }

    #[test]
    fn regions_newer_than_the_sdk_are_accepted() {
        let env = StackEnvironment::new(None, Some("ap-southeast-5".into())).unwrap();
        assert_eq!(env.region.as_deref(), Some("ap-southeast-5"));
    }
}
