use serde::Serialize;
use serde_json::Value;

use crate::cfn::CfnResource;
use super::to_properties;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3Location {
    pub bucket: Value,
    pub key: Value,
}

/// initial content of a repository, committed once when the
/// repository gets created.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RepositoryCode {
    pub s3: S3Location,
    pub branch_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Repository {
    pub repository_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub repository_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<RepositoryCode>,
}

impl CfnResource for Repository {
    fn type_string(&self) -> &'static str {
        "AWS::CodeCommit::Repository"
    }

    fn properties(&self) -> serde_json::Result<Value> {
        to_properties(self)
    }

    fn validate(&self) -> Result<(), String> {
        let name = &self.repository_name;
        if name.is_empty() || name.len() > 100 {
            return Err(format!("Invalid repository name {:?}\nMust be between 1 and 100 characters", name));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-') {
            return Err(format!("Invalid repository name {:?}\nMay only contain letters, digits, '.', '_' and '-'", name));
        }
        if name.ends_with(".git") {
            return Err(format!("Invalid repository name {:?}\nMay not end in .git", name));
        }
        if self.repository_description.len() > 1000 {
            return Err("Repository description must be at most 1000 characters".into());
        }
        if let Some(code) = &self.code {
            if code.branch_name.is_empty() {
                return Err("Initial code must name a branch".into());
            }
        }
        Ok(())
    }
}
