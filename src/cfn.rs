use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// a single cloudformation resource type. Implementors provide
/// the `Type` string and the `Properties` object that end up in the template.
pub trait CfnResource {
    fn type_string(&self) -> &'static str;
    fn properties(&self) -> serde_json::Result<Value>;
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// a resource as declared in a stack, before it gets written to a template.
pub struct Resource {
    /// the logical id of the resource in cloudformation.
    pub name: String,
    pub properties: Box<dyn CfnResource>,
    /// logical ids this resource must be created after, on top of
    /// whatever its `Ref`/`Fn::GetAtt` usages already imply.
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn new<R: CfnResource + 'static>(name: &str, properties: R) -> Self {
        Self {
            name: name.to_string(),
            properties: Box::new(properties),
            depends_on: vec![],
        }
    }

    pub fn depends_on(mut self, logical_id: &str) -> Self {
        self.depends_on.push(logical_id.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedResource {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateParameter {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Default", default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateOutput {
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Value")]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub version: String,
    #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "Parameters", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, TemplateParameter>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, SavedResource>,
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, TemplateOutput>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: String::new(),
            parameters: Default::default(),
            resources: Default::default(),
            outputs: Default::default(),
        }
    }
}

impl Template {
    /// validates every resource and collects them into a template.
    /// logical ids must be unique and alphanumeric.
    pub fn from_resources(resources: &[Resource]) -> Result<Template> {
        let mut out_template = Template::default();
        for resource in resources.iter() {
            verify_resource_name(&resource.name)?;
            if let Err(message) = resource.properties.validate() {
                return Err(Error::InvalidResource { resource: resource.name.clone(), message });
            }
            let saved_resource = SavedResource {
                ty: resource.properties.type_string().to_string(),
                properties: resource.properties.properties()?,
                depends_on: resource.depends_on.clone(),
            };
            if out_template.resources.insert(resource.name.clone(), saved_resource).is_some() {
                return Err(Error::DuplicateLogicalId(resource.name.clone()));
            }
        }
        for (name, resource) in out_template.resources.iter() {
            for dep in resource.depends_on.iter() {
                if !out_template.resources.contains_key(dep) {
                    return Err(Error::InvalidResource {
                        resource: name.clone(),
                        message: format!("DependsOn references unknown resource '{dep}'"),
                    });
                }
            }
        }
        Ok(out_template)
    }

    pub fn add_parameter(&mut self, name: &str, description: &str, default: Option<&str>) {
        self.parameters.insert(name.to_string(), TemplateParameter {
            ty: "String".to_string(),
            description: description.to_string(),
            default: default.map(|d| d.to_string()),
        });
    }

    pub fn add_output(&mut self, name: &str, description: &str, value: Value) {
        self.outputs.insert(name.to_string(), TemplateOutput {
            description: description.to_string(),
            value,
        });
    }

    /// all resources of the given cloudformation type, by logical id.
    pub fn resources_of_type<'a>(&'a self, ty: &'a str) -> impl Iterator<Item = (&'a String, &'a SavedResource)> + 'a {
        self.resources.iter().filter(move |(_, r)| r.ty == ty)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub fn get_ref(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

pub fn join(separator: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [separator, parts] })
}

/// `(effect, action, resource)` statements into an IAM policy document.
pub fn create_policy_doc(statements: &[(&str, &str, Value)]) -> Value {
    let statements: Vec<Value> = statements.iter().map(|(effect, action, resource)| {
        json!({
            "Effect": effect,
            "Action": action,
            "Resource": resource,
        })
    }).collect();
    json!({
        "Version": "2012-10-17",
        "Statement": statements,
    })
}

pub fn create_assume_role_policy_doc(service: &str) -> Value {
    let mut principal = Map::new();
    principal.insert("Service".to_string(), Value::String(service.to_string()));
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": principal,
            "Action": "sts:AssumeRole",
        }],
    })
}

pub fn verify_resource_name(resource_name: &str) -> Result<()> {
    if resource_name.len() > 255 {
        return Err(Error::InvalidResourceName(resource_name.into(), "must be less than 255 characters".into()));
    }
    if resource_name.is_empty() {
        return Err(Error::InvalidResourceName(resource_name.into(), "Must contain at least 1 character".into()));
    }
    if !resource_name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::InvalidResourceName(resource_name.into(), "Must contain only alphanumeric characters [A-Za-z0-9]".into()));
    }
    Ok(())
}

/// returns the stack name to deploy under. An empty name falls back to
/// `default_name` with underscores turned into hyphens.
pub fn validate_stack_name(default_name: &str, current_stack_name: &str) -> Result<String> {
    let stack_name = if current_stack_name.is_empty() {
        let mut stack_name = default_name.replace('_', "-");
        stack_name.truncate(128);
        stack_name
    } else {
        current_stack_name.to_string()
    };
    // A stack name can contain only alphanumeric characters (case sensitive) and hyphens.
    // It must start with an alphabetical character and can't be longer than 128 characters.
    match stack_name.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Err(Error::InvalidStackName(stack_name)),
    }
    if !stack_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(Error::InvalidStackName(stack_name));
    }
    if stack_name.len() > 128 {
        return Err(Error::InvalidStackName(stack_name));
    }
    Ok(stack_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(&'static str);

    impl CfnResource for Dummy {
        fn type_string(&self) -> &'static str {
            "AWS::Dummy::Thing"
        }
        fn properties(&self) -> serde_json::Result<Value> {
            Ok(json!({ "Name": self.0 }))
        }
        fn validate(&self) -> std::result::Result<(), String> {
            if self.0.is_empty() {
                return Err("Name must not be empty".into());
            }
            Ok(())
        }
    }

    struct Unserializable;

    impl CfnResource for Unserializable {
        fn type_string(&self) -> &'static str {
            "AWS::Dummy::Thing"
        }
        fn properties(&self) -> serde_json::Result<Value> {
            // json object keys must be strings
            let mut props = BTreeMap::new();
            props.insert((1u8, 2u8), "value");
            serde_json::to_value(props)
        }
    }

    #[test]
    fn property_serialization_errors_are_surfaced() {
        let resources = vec![Resource::new("Broken", Unserializable)];
        let err = Template::from_resources(&resources).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn stack_name_defaults_from_module_name() {
        assert_eq!(validate_stack_name("my_stack", "").unwrap(), "my-stack");
        assert_eq!(validate_stack_name("ignored", "Explicit-Name").unwrap(), "Explicit-Name");
    }

    #[test]
    fn stack_name_rejects_bad_characters() {
        assert!(validate_stack_name("", "1abc").is_err());
        assert!(validate_stack_name("", "abc.def").is_err());
        assert!(validate_stack_name("", &"a".repeat(129)).is_err());
        assert!(validate_stack_name("", "").is_err());
    }

    #[test]
    fn resource_names_must_be_alphanumeric() {
        assert!(verify_resource_name("StaticSiteRepo").is_ok());
        let err = verify_resource_name("Amplify_Build_Trigger").unwrap_err();
        assert!(err.to_string().contains("alphanumeric"));
        assert!(verify_resource_name("").is_err());
    }

    #[test]
    fn duplicate_logical_ids_are_rejected() {
        let resources = vec![
            Resource::new("Thing", Dummy("a")),
            Resource::new("Thing", Dummy("b")),
        ];
        let err = Template::from_resources(&resources).unwrap_err();
        assert!(matches!(err, Error::DuplicateLogicalId(ref id) if id == "Thing"));
    }

    #[test]
    fn invalid_resource_reports_its_name() {
        let resources = vec![Resource::new("Broken", Dummy(""))];
        let err = Template::from_resources(&resources).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'Broken'"));
        assert!(msg.contains("Name must not be empty"));
    }

    #[test]
    fn depends_on_must_point_at_a_declared_resource() {
        let resources = vec![Resource::new("A", Dummy("a")).depends_on("Missing")];
        assert!(Template::from_resources(&resources).is_err());

        let resources = vec![
            Resource::new("A", Dummy("a")).depends_on("B"),
            Resource::new("B", Dummy("b")),
        ];
        let template = Template::from_resources(&resources).unwrap();
        assert_eq!(template.resources["A"].depends_on, vec!["B".to_string()]);
    }

    #[test]
    fn template_serializes_with_cloudformation_keys() {
        let mut template = Template::from_resources(&[Resource::new("A", Dummy("a"))]).unwrap();
        template.add_output("Out", "an output", get_att("A", "Arn"));
        let value: Value = serde_json::from_str(&template.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(value["Resources"]["A"]["Type"], "AWS::Dummy::Thing");
        assert!(value["Resources"]["A"].get("DependsOn").is_none());
        assert_eq!(value["Outputs"]["Out"]["Value"]["Fn::GetAtt"][1], "Arn");
        assert!(value.get("Parameters").is_none());
    }
}
