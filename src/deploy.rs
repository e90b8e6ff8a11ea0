//! pushes a synthesized assembly to AWS: uploads the repository seed,
//! then creates or updates the cloudformation stack and waits for it.

use std::collections::BTreeMap;

use aws_config::meta::region::RegionProviderChain;
use aws_sdk_cloudformation::types::{Capability, OnFailure, Parameter, Stack, StackStatus};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use tracing::{debug, info, warn};

use crate::assets::AssetManifestEntry;
use crate::config::StackEnvironment;
use crate::error::{Error, Result};
use crate::stack::{CloudAssembly, SEED_BUCKET_PARAM, SEED_KEY_PARAM};

const POLL_INTERVAL_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOperation {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackState {
    Complete,
    InProgress,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub operation: StackOperation,
    pub outputs: BTreeMap<String, String>,
}

/// bucket the seed archive goes to when none is configured.
pub fn default_asset_bucket(account: &str, region: &str) -> String {
    format!("amplify-site-assets-{account}-{region}")
}

pub fn classify_status(status: &StackStatus, reason: Option<&str>) -> StackState {
    match status {
        StackStatus::CreateComplete |
        StackStatus::UpdateComplete |
        StackStatus::ImportComplete => StackState::Complete,

        // a deploy never asks for a delete, so this is the create rolling back
        StackStatus::DeleteComplete => StackState::Failed(
            reason.unwrap_or("stack was deleted after a failed create").to_string(),
        ),

        StackStatus::CreateInProgress |
        StackStatus::DeleteInProgress |
        StackStatus::ImportInProgress |
        StackStatus::ImportRollbackInProgress |
        StackStatus::ReviewInProgress |
        StackStatus::RollbackInProgress |
        StackStatus::UpdateCompleteCleanupInProgress |
        StackStatus::UpdateInProgress |
        StackStatus::UpdateRollbackCompleteCleanupInProgress |
        StackStatus::UpdateRollbackInProgress => StackState::InProgress,

        // rollbacks that finished still mean the requested change did not land
        _ => StackState::Failed(reason.unwrap_or("Failed to get stack failure reason").to_string()),
    }
}

fn is_missing_stack_error(e_str: &str) -> bool {
    e_str.contains("does not exist")
}

pub struct Deployer {
    cfn: aws_sdk_cloudformation::Client,
    s3: aws_sdk_s3::Client,
    sts: aws_sdk_sts::Client,
    region: String,
}

impl Deployer {
    /// loads credentials and region from the environment. A region set on
    /// `environment` wins over the sdk's default provider chain.
    pub async fn new(environment: &StackEnvironment) -> Result<Self> {
        let region_provider = RegionProviderChain::first_try(
            environment.region.clone().map(aws_sdk_cloudformation::config::Region::new),
        ).or_default_provider();
        let shared_config = aws_config::from_env().region(region_provider).load().await;
        let region = shared_config.region()
            .map(|r| r.to_string())
            .ok_or_else(|| Error::InvalidEnvironment("No region configured. Set CDK_DEFAULT_REGION or AWS_REGION".into()))?;
        Ok(Self {
            cfn: aws_sdk_cloudformation::Client::new(&shared_config),
            s3: aws_sdk_s3::Client::new(&shared_config),
            sts: aws_sdk_sts::Client::new(&shared_config),
            region,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// the account of the current credentials. When the assembly names an
    /// account, the two must match.
    pub async fn resolve_account(&self, environment: &StackEnvironment) -> Result<String> {
        let identity = self.sts.get_caller_identity().send().await.map_err(Error::aws)?;
        let caller = identity.account()
            .ok_or_else(|| Error::Aws("Caller identity has no account".into()))?
            .to_string();
        if let Some(declared) = &environment.account {
            if declared != &caller {
                return Err(Error::InvalidEnvironment(format!(
                    "Stack targets account {declared} but credentials belong to {caller}"
                )));
            }
        }
        Ok(caller)
    }

    pub async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        if self.s3.head_bucket().bucket(bucket).send().await.is_ok() {
            debug!(bucket, "asset bucket exists");
            return Ok(());
        }
        info!(bucket, region = %self.region, "creating asset bucket");
        // us-east-1 rejects an explicit location constraint
        let configuration = if self.region == "us-east-1" {
            None
        } else {
            Some(CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build())
        };
        self.s3.create_bucket()
            .bucket(bucket)
            .set_create_bucket_configuration(configuration)
            .send()
            .await
            .map_err(Error::aws)?;
        Ok(())
    }

    /// uploads the archive under its content hash. Existing keys are left
    /// alone since the same key always means the same content.
    pub async fn upload_asset(&self, bucket: &str, asset: &AssetManifestEntry, archive: &[u8]) -> Result<()> {
        let key = &asset.object_key;
        if self.s3.head_object().bucket(bucket).key(key).send().await.is_ok() {
            info!(bucket, key = %key, "asset already uploaded");
            return Ok(());
        }
        info!(bucket, key = %key, files = asset.file_count, "uploading asset");
        self.s3.put_object()
            .bucket(bucket)
            .key(key)
            .content_type("application/zip")
            .body(ByteStream::from(archive.to_vec()))
            .send()
            .await
            .map_err(Error::aws)?;
        Ok(())
    }

    pub async fn does_stack_exist(&self, name: &str) -> Result<bool> {
        match self.cfn.describe_stacks().stack_name(name).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let e_str = format!("{:#?}", e);
                if is_missing_stack_error(&e_str) {
                    return Ok(false);
                }
                Err(Error::Aws(e_str))
            }
        }
    }

    /// `None` when the stack is gone.
    pub async fn describe_stack(&self, name: &str) -> Result<Option<Stack>> {
        match self.cfn.describe_stacks().stack_name(name).send().await {
            Ok(d) => Ok(d.stacks().and_then(|s| s.first()).cloned()),
            Err(e) => {
                let e_str = format!("{:#?}", e);
                if is_missing_stack_error(&e_str) {
                    return Ok(None);
                }
                Err(Error::Aws(e_str))
            }
        }
    }

    pub async fn create_or_update_stack(&self, name: &str, body: &str, parameters: Vec<Parameter>) -> Result<StackOperation> {
        let capabilities = vec![Capability::CapabilityIam, Capability::CapabilityNamedIam];
        if self.does_stack_exist(name).await? {
            info!(stack = name, "updating stack");
            let res = self.cfn
                .update_stack()
                .stack_name(name)
                .template_body(body)
                .set_capabilities(Some(capabilities))
                .set_parameters(Some(parameters))
                .send()
                .await;
            match res {
                Ok(_) => Ok(StackOperation::Updated),
                Err(e) => {
                    let e_str = format!("{:#?}", e);
                    if e_str.contains("No updates are to be performed") {
                        info!(stack = name, "no changes");
                        return Ok(StackOperation::Unchanged);
                    }
                    Err(Error::Aws(e_str))
                }
            }
        } else {
            info!(stack = name, "creating stack");
            self.cfn
                .create_stack()
                .stack_name(name)
                .template_body(body)
                .on_failure(OnFailure::Delete)
                .set_capabilities(Some(capabilities))
                .set_parameters(Some(parameters))
                .send()
                .await
                .map_err(Error::aws)?;
            Ok(StackOperation::Created)
        }
    }

    /// polls until the stack settles and returns its outputs.
    pub async fn wait_for_output(&self, name: &str) -> Result<BTreeMap<String, String>> {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_millis(POLL_INTERVAL_MS)).await;
            let stack = match self.describe_stack(name).await? {
                Some(stack) => stack,
                None => {
                    return Err(Error::StackFailed {
                        stack: name.to_string(),
                        reason: "stack no longer exists, it was rolled back and deleted".into(),
                    });
                }
            };
            let status = stack.stack_status()
                .ok_or_else(|| Error::Aws(format!("Stack {name} has no status")))?;
            match classify_status(status, stack.stack_status_reason()) {
                StackState::InProgress => {
                    debug!(stack = name, status = ?status, "waiting");
                }
                StackState::Failed(reason) => {
                    return Err(Error::StackFailed { stack: name.to_string(), reason });
                }
                StackState::Complete => {
                    let mut out = BTreeMap::new();
                    for output in stack.outputs().unwrap_or_default() {
                        if let (Some(key), Some(val)) = (output.output_key(), output.output_value()) {
                            out.insert(key.to_string(), val.to_string());
                        }
                    }
                    return Ok(out);
                }
            }
        }
    }

    pub async fn deploy(&self, assembly: &CloudAssembly, seed_archive: &[u8], asset_bucket: Option<&str>) -> Result<DeployOutcome> {
        let account = self.resolve_account(&assembly.environment).await?;
        let bucket = match asset_bucket {
            Some(b) => b.to_string(),
            None => default_asset_bucket(&account, &self.region),
        };
        let asset = assembly.seed_asset()
            .ok_or_else(|| Error::Asset { path: assembly.stack_name.clone(), message: "Assembly has no seed asset".into() })?;
        self.ensure_bucket(&bucket).await?;
        self.upload_asset(&bucket, asset, seed_archive).await?;

        let parameters = vec![
            Parameter::builder().parameter_key(SEED_BUCKET_PARAM).parameter_value(&bucket).build(),
            Parameter::builder().parameter_key(SEED_KEY_PARAM).parameter_value(&asset.object_key).build(),
        ];
        let body = assembly.template_body()?;
        let operation = self.create_or_update_stack(&assembly.stack_name, &body, parameters).await?;
        let outputs = self.wait_for_output(&assembly.stack_name).await?;
        if operation == StackOperation::Updated && !assembly.trigger_fires_on_update() {
            warn!(stack = %assembly.stack_name, "stack updated; the build trigger only starts a release on create unless trigger_on_update is set");
        }
        Ok(DeployOutcome { operation, outputs })
    }

    pub async fn destroy(&self, name: &str) -> Result<()> {
        if !self.does_stack_exist(name).await? {
            info!(stack = name, "stack does not exist");
            return Ok(());
        }
        info!(stack = name, "deleting stack");
        self.cfn.delete_stack().stack_name(name).send().await.map_err(Error::aws)?;
        loop {
            tokio::time::sleep(tokio::time::Duration::from_millis(POLL_INTERVAL_MS)).await;
            let stack = match self.describe_stack(name).await? {
                Some(stack) => stack,
                None => return Ok(()),
            };
            match stack.stack_status() {
                Some(StackStatus::DeleteComplete) => return Ok(()),
                Some(StackStatus::DeleteFailed) => {
                    return Err(Error::StackFailed {
                        stack: name.to_string(),
                        reason: stack.stack_status_reason().unwrap_or("delete failed").to_string(),
                    });
                }
                status => debug!(stack = name, status = ?status, "waiting for delete"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_successes_complete() {
        assert_eq!(classify_status(&StackStatus::CreateComplete, None), StackState::Complete);
        assert_eq!(classify_status(&StackStatus::UpdateComplete, None), StackState::Complete);
    }

    #[test]
    fn deleted_stack_is_not_a_successful_deploy() {
        let state = classify_status(&StackStatus::DeleteComplete, None);
        assert_eq!(state, StackState::Failed("stack was deleted after a failed create".into()));
    }

    #[test]
    fn transitions_keep_waiting() {
        assert_eq!(classify_status(&StackStatus::CreateInProgress, None), StackState::InProgress);
        assert_eq!(classify_status(&StackStatus::UpdateCompleteCleanupInProgress, None), StackState::InProgress);
    }

    #[test]
    fn rollbacks_surface_the_reason() {
        let state = classify_status(&StackStatus::UpdateRollbackComplete, Some("Resource creation cancelled"));
        assert_eq!(state, StackState::Failed("Resource creation cancelled".into()));
        let state = classify_status(&StackStatus::CreateFailed, None);
        assert_eq!(state, StackState::Failed("Failed to get stack failure reason".into()));
    }

    #[test]
    fn default_bucket_is_scoped_to_account_and_region() {
        assert_eq!(default_asset_bucket("123456789012", "eu-west-1"), "amplify-site-assets-123456789012-eu-west-1");
    }

    #[test]
    fn missing_stack_errors_are_recognized() {
        assert!(is_missing_stack_error("ValidationError: Stack with id foo does not exist"));
        assert!(!is_missing_stack_error("AccessDenied"));
    }
}
