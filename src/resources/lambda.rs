use serde::Serialize;
use serde_json::Value;

use crate::cfn::CfnResource;
use super::to_properties;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InlineCode {
    pub zip_file: String,
}

/// a lambda function whose source is inlined into the template.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Function {
    pub runtime: String,
    pub handler: String,
    pub role: Value,
    pub code: InlineCode,
    pub timeout: u32,
}

impl CfnResource for Function {
    fn type_string(&self) -> &'static str {
        "AWS::Lambda::Function"
    }

    fn properties(&self) -> serde_json::Result<Value> {
        to_properties(self)
    }

    fn validate(&self) -> Result<(), String> {
        if self.timeout < 1 || self.timeout > 900 {
            return Err(format!("Invalid timeout {:?}\nMust be between 1 and 900", self.timeout));
        }
        // inline ZipFile code is capped by cloudformation
        if self.code.zip_file.len() > 4096 {
            return Err("Inline function code must be at most 4096 characters".into());
        }
        Ok(())
    }
}
