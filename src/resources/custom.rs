use serde::Serialize;
use serde_json::Value;

use crate::cfn::CfnResource;
use super::to_properties;

pub const RELEASE_JOB_TYPE: &str = "RELEASE";

/// handler behind the build trigger. It starts an amplify job when the
/// resource is created (and on update only when `FireOnUpdate` is set).
/// Every other request is acknowledged without side effects.
pub const TRIGGER_HANDLER_SOURCE: &str = r#"const { AmplifyClient, StartJobCommand } = require('@aws-sdk/client-amplify');
const response = require('cfn-response');
const amplify = new AmplifyClient({});
exports.handler = async function(event, context) {
    const props = event.ResourceProperties;
    const physicalId = event.PhysicalResourceId || props.PhysicalResourceId;
    const fire = event.RequestType === 'Create'
        || (event.RequestType === 'Update' && props.FireOnUpdate === 'true');
    if (!fire) {
        return response.send(event, context, response.SUCCESS, {}, physicalId);
    }
    try {
        const out = await amplify.send(new StartJobCommand({
            appId: props.AppId,
            branchName: props.BranchName,
            jobType: props.JobType,
            jobReason: props.JobReason,
        }));
        return response.send(event, context, response.SUCCESS, { JobId: out.jobSummary.jobId }, physicalId);
    } catch (err) {
        console.log(err);
        return response.send(event, context, response.FAILED, { Error: String(err) }, physicalId);
    }
};
"#;

/// a fire-once custom resource that asks amplify to start a job
/// for the given app and branch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildTrigger {
    pub service_token: Value,
    pub app_id: Value,
    pub branch_name: Value,
    pub job_type: String,
    pub job_reason: String,
    pub physical_resource_id: String,
    /// custom resource properties reach the handler as strings.
    pub fire_on_update: String,
    /// cloudformation only sends an Update when a property changes, so this
    /// carries a digest of everything a new release should follow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
}

impl BuildTrigger {
    pub fn fires_on_update(&self) -> bool {
        self.fire_on_update == "true"
    }
}

impl CfnResource for BuildTrigger {
    fn type_string(&self) -> &'static str {
        "Custom::AmplifyBuildTrigger"
    }

    fn properties(&self) -> serde_json::Result<Value> {
        to_properties(self)
    }

    fn validate(&self) -> Result<(), String> {
        let valid = [RELEASE_JOB_TYPE, "RETRY", "MANUAL", "WEB_HOOK"];
        if !valid.contains(&self.job_type.as_str()) {
            return Err(format!("Invalid job type {:?}\nMust be one of {:?}", self.job_type, valid));
        }
        if self.physical_resource_id.is_empty() {
            return Err("Build trigger must have a physical resource id".into());
        }
        if self.fire_on_update != "true" && self.fire_on_update != "false" {
            return Err(format!("Invalid FireOnUpdate {:?}\nMust be 'true' or 'false'", self.fire_on_update));
        }
        if self.fires_on_update() && self.config_hash.is_none() {
            return Err("A trigger that fires on update needs a ConfigHash to ever see an update".into());
        }
        Ok(())
    }
}
