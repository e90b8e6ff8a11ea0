use serde::Serialize;
use serde_json::Value;

use crate::cfn::CfnResource;
use super::to_properties;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    pub policy_name: String,
    pub policy_document: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Role {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub assume_role_policy_document: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<Policy>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub managed_policy_arns: Vec<String>,
}

impl CfnResource for Role {
    fn type_string(&self) -> &'static str {
        "AWS::IAM::Role"
    }

    fn properties(&self) -> serde_json::Result<Value> {
        to_properties(self)
    }

    fn validate(&self) -> Result<(), String> {
        if self.description.len() > 1000 {
            return Err("Role description must be at most 1000 characters".into());
        }
        for policy in self.policies.iter() {
            if policy.policy_name.is_empty() || policy.policy_name.len() > 128 {
                return Err(format!("Invalid policy name {:?}\nMust be between 1 and 128 characters", policy.policy_name));
            }
        }
        Ok(())
    }
}
