use serde::Serialize;
use serde_json::Value;

use crate::cfn::CfnResource;
use super::to_properties;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct App {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// clone url of the source repository.
    pub repository: Value,
    /// role amplify assumes to pull from the repository.
    #[serde(rename = "IAMServiceRole")]
    pub iam_service_role: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub environment_variables: Vec<EnvironmentVariable>,
    pub build_spec: String,
    pub platform: String,
}

impl CfnResource for App {
    fn type_string(&self) -> &'static str {
        "AWS::Amplify::App"
    }

    fn properties(&self) -> serde_json::Result<Value> {
        to_properties(self)
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() || self.name.len() > 255 {
            return Err(format!("Invalid app name {:?}\nMust be between 1 and 255 characters", self.name));
        }
        if self.build_spec.is_empty() {
            return Err("App must have a build spec".into());
        }
        for var in self.environment_variables.iter() {
            if var.name.is_empty() {
                return Err("Environment variable names must not be empty".into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Branch {
    pub app_id: Value,
    pub branch_name: String,
    pub enable_auto_build: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

impl CfnResource for Branch {
    fn type_string(&self) -> &'static str {
        "AWS::Amplify::Branch"
    }

    fn properties(&self) -> serde_json::Result<Value> {
        to_properties(self)
    }

    fn validate(&self) -> Result<(), String> {
        if self.branch_name.is_empty() || self.branch_name.len() > 255 {
            return Err(format!("Invalid branch name {:?}\nMust be between 1 and 255 characters", self.branch_name));
        }
        if let Some(stage) = &self.stage {
            let valid = ["PRODUCTION", "BETA", "DEVELOPMENT", "EXPERIMENTAL", "PULL_REQUEST"];
            if !valid.contains(&stage.as_str()) {
                return Err(format!("Invalid branch stage {:?}\nMust be one of {:?}", stage, valid));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfn::get_att;

    #[test]
    fn app_serializes_iam_role_key() {
        let app = App {
            name: "StaticSiteAmplifyApp".into(),
            description: String::new(),
            repository: get_att("StaticSiteRepo", "CloneUrlHttp"),
            iam_service_role: get_att("StaticSiteAmplifyAppRole", "Arn"),
            environment_variables: vec![EnvironmentVariable { name: "A".into(), value: "/".into() }],
            build_spec: "version: '1.0'\n".into(),
            platform: "WEB".into(),
        };
        let props = app.properties().unwrap();
        assert_eq!(props["IAMServiceRole"]["Fn::GetAtt"][0], "StaticSiteAmplifyAppRole");
        assert_eq!(props["EnvironmentVariables"][0]["Name"], "A");
        assert!(props.get("Description").is_none());
        assert!(app.validate().is_ok());
    }

    #[test]
    fn branch_stage_must_be_known() {
        let mut branch = Branch {
            app_id: get_att("App", "AppId"),
            branch_name: "main".into(),
            enable_auto_build: true,
            stage: Some("PRODUCTION".into()),
        };
        assert!(branch.validate().is_ok());
        assert_eq!(branch.properties().unwrap()["EnableAutoBuild"], true);
        branch.stage = Some("LIVE".into());
        assert!(branch.validate().is_err());
    }
}
