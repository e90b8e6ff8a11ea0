//! The static site stack: a CodeCommit repository seeded from a local
//! directory, an Amplify app building from it, one auto-building branch,
//! and a trigger that starts the first release once everything exists.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::assets::{package_directory, AssetManifestEntry, PackagedAsset};
use crate::build_spec::BuildSpec;
use crate::cfn::{
    create_assume_role_policy_doc, create_policy_doc, get_att, get_ref, join, validate_stack_name,
    Resource, Template,
};
use crate::config::{SiteConfig, StackEnvironment};
use crate::error::Result;
use crate::resources::{
    custom::{RELEASE_JOB_TYPE, TRIGGER_HANDLER_SOURCE},
    lambda::InlineCode,
    App, Branch, BuildTrigger, EnvironmentVariable, Function, Policy, Repository, RepositoryCode,
    Role, S3Location,
};

pub const REPOSITORY_ID: &str = "StaticSiteRepo";
pub const APP_ID: &str = "StaticSiteAmplifyApp";
pub const APP_ROLE_ID: &str = "StaticSiteAmplifyAppRole";
pub const TRIGGER_ID: &str = "AmplifyBuildTrigger";
pub const TRIGGER_FUNCTION_ID: &str = "AmplifyBuildTriggerFunction";
pub const TRIGGER_ROLE_ID: &str = "AmplifyBuildTriggerRole";

pub const SEED_BUCKET_PARAM: &str = "SeedAssetBucket";
pub const SEED_KEY_PARAM: &str = "SeedAssetKey";

pub const URL_OUTPUT: &str = "AmplifyAppURL";
pub const CLONE_URL_OUTPUT: &str = "CodeCommitRepoURL";

pub const TRIGGER_PHYSICAL_ID: &str = "app-build-trigger";
pub const TRIGGER_JOB_REASON: &str = "Auto Start build";

pub const MANIFEST_FILE: &str = "manifest.json";

/// digest of the inputs a release build depends on: the rendered build
/// spec, the app environment and the seed content.
pub fn site_config_hash(build_spec_yaml: &str, environment_variables: &BTreeMap<String, String>, seed_hash: &str) -> String {
    let mut adler = adler::Adler32::new();
    adler.write_slice(build_spec_yaml.as_bytes());
    for (name, value) in environment_variables.iter() {
        adler.write_slice(&[0]);
        adler.write_slice(name.as_bytes());
        adler.write_slice(b"=");
        adler.write_slice(value.as_bytes());
    }
    adler.write_slice(&[0]);
    adler.write_slice(seed_hash.as_bytes());
    format!("{:08x}", adler.checksum())
}

/// logical id of the branch resource: the app id followed by
/// the alphanumeric characters of the branch name.
pub fn branch_logical_id(branch: &str) -> String {
    let suffix: String = branch.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    format!("{APP_ID}{suffix}")
}

/// everything the deployer needs, without any AWS access: the template,
/// the environment it targets, and the assets it expects to be uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudAssembly {
    pub stack_name: String,
    pub environment: StackEnvironment,
    pub template: Template,
    pub assets: Vec<AssetManifestEntry>,
}

#[derive(Debug, Serialize)]
struct AssemblyManifest<'a> {
    stack_name: &'a str,
    template_file: String,
    environment: &'a StackEnvironment,
    assets: &'a [AssetManifestEntry],
}

impl CloudAssembly {
    pub fn template_file_name(&self) -> String {
        format!("{}.template.json", self.stack_name)
    }

    pub fn seed_asset(&self) -> Option<&AssetManifestEntry> {
        self.assets.first()
    }

    /// whether the build trigger starts a release on stack updates too.
    pub fn trigger_fires_on_update(&self) -> bool {
        self.template.resources.get(TRIGGER_ID)
            .map(|r| r.properties["FireOnUpdate"] == "true")
            .unwrap_or(false)
    }

    pub fn template_body(&self) -> Result<String> {
        self.template.to_json_pretty()
    }

    /// writes the template and a manifest describing it into `out_dir`.
    pub fn write_to(&self, out_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(out_dir)?;
        let template_path = out_dir.join(self.template_file_name());
        std::fs::write(&template_path, self.template_body()?)?;

        let manifest = AssemblyManifest {
            stack_name: &self.stack_name,
            template_file: self.template_file_name(),
            environment: &self.environment,
            assets: &self.assets,
        };
        let manifest_path = out_dir.join(MANIFEST_FILE);
        std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
        info!(path = %template_path.display(), "wrote template");
        Ok(vec![template_path, manifest_path])
    }
}

pub struct StaticSiteStack {
    pub stack_name: String,
    pub environment: StackEnvironment,
    pub build_spec: BuildSpec,
    pub branch_id: String,
    resources: Vec<Resource>,
    seed: PackagedAsset,
}

impl StaticSiteStack {
    /// packages `config.site_dir` and declares the stack around it.
    pub fn declare(config: &SiteConfig, environment: StackEnvironment) -> Result<Self> {
        let seed = package_directory(&config.site_dir)?;
        Self::with_seed(config, environment, seed)
    }

    pub fn with_seed(config: &SiteConfig, environment: StackEnvironment, seed: PackagedAsset) -> Result<Self> {
        let stack_name = validate_stack_name("amplify_static_site_stack", &config.stack_name)?;
        let mut build_spec = BuildSpec::with_build_commands(config.build_commands.clone());
        build_spec.frontend.env = config.environment_variables.clone();
        let build_spec_yaml = build_spec.to_yaml()?;
        let branch_id = branch_logical_id(&config.branch);

        let mut resources = vec![];

        let repository = Repository {
            repository_name: config.repository_name.clone(),
            repository_description: config.repository_description.clone(),
            code: Some(RepositoryCode {
                s3: S3Location { bucket: get_ref(SEED_BUCKET_PARAM), key: get_ref(SEED_KEY_PARAM) },
                branch_name: config.branch.clone(),
            }),
        };
        resources.push(Resource::new(REPOSITORY_ID, repository));

        let app_role = Role {
            description: format!("Lets amplify pull from {}", config.repository_name),
            assume_role_policy_document: create_assume_role_policy_doc("amplify.amazonaws.com"),
            policies: vec![Policy {
                policy_name: "codecommit-pull".into(),
                policy_document: create_policy_doc(&[
                    ("Allow", "codecommit:GitPull", get_att(REPOSITORY_ID, "Arn")),
                ]),
            }],
            managed_policy_arns: vec![],
        };
        resources.push(Resource::new(APP_ROLE_ID, app_role));

        let app = App {
            name: config.app_name.clone(),
            description: String::new(),
            repository: get_att(REPOSITORY_ID, "CloneUrlHttp"),
            iam_service_role: get_att(APP_ROLE_ID, "Arn"),
            environment_variables: config.environment_variables.iter()
                .map(|(name, value)| EnvironmentVariable { name: name.clone(), value: value.clone() })
                .collect(),
            build_spec: build_spec_yaml.clone(),
            platform: "WEB".into(),
        };
        resources.push(Resource::new(APP_ID, app));

        let branch = Branch {
            app_id: get_att(APP_ID, "AppId"),
            branch_name: config.branch.clone(),
            enable_auto_build: true,
            stage: None,
        };
        resources.push(Resource::new(&branch_id, branch));

        let trigger_role = Role {
            description: "Starts the first amplify release build".into(),
            assume_role_policy_document: create_assume_role_policy_doc("lambda.amazonaws.com"),
            policies: vec![Policy {
                policy_name: "amplify-start-job".into(),
                policy_document: create_policy_doc(&[
                    ("Allow", "amplify:StartJob", join("", vec![get_att(&branch_id, "Arn"), Value::from("/jobs/*")])),
                ]),
            }],
            managed_policy_arns: vec![
                "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole".into(),
            ],
        };
        resources.push(Resource::new(TRIGGER_ROLE_ID, trigger_role));

        let trigger_function = Function {
            runtime: "nodejs20.x".into(),
            handler: "index.handler".into(),
            role: get_att(TRIGGER_ROLE_ID, "Arn"),
            code: InlineCode { zip_file: TRIGGER_HANDLER_SOURCE.into() },
            timeout: 60,
        };
        resources.push(Resource::new(TRIGGER_FUNCTION_ID, trigger_function));

        let trigger = BuildTrigger {
            service_token: get_att(TRIGGER_FUNCTION_ID, "Arn"),
            app_id: get_att(APP_ID, "AppId"),
            branch_name: get_att(&branch_id, "BranchName"),
            job_type: RELEASE_JOB_TYPE.into(),
            job_reason: TRIGGER_JOB_REASON.into(),
            physical_resource_id: TRIGGER_PHYSICAL_ID.into(),
            fire_on_update: config.trigger_on_update.to_string(),
            config_hash: config.trigger_on_update.then(|| {
                site_config_hash(&build_spec_yaml, &config.environment_variables, &seed.manifest.hash)
            }),
        };
        resources.push(Resource::new(TRIGGER_ID, trigger).depends_on(&branch_id));

        debug!(stack = %stack_name, resources = resources.len(), "declared stack");
        Ok(Self { stack_name, environment, build_spec, branch_id, resources, seed })
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn seed_archive(&self) -> &[u8] {
        &self.seed.archive
    }

    pub fn synth(&self) -> Result<CloudAssembly> {
        let mut template = Template::from_resources(&self.resources)?;
        template.description = "Static website hosted on Amplify, sourced from a CodeCommit repository".into();
        template.add_parameter(SEED_BUCKET_PARAM, "Bucket holding the initial repository content", None);
        template.add_parameter(
            SEED_KEY_PARAM,
            "Object key of the initial repository content",
            Some(&self.seed.manifest.object_key),
        );

        let branch_name = get_att(&self.branch_id, "BranchName");
        template.add_output(
            URL_OUTPUT,
            "URL of the Amplify app",
            join("", vec![
                Value::from("https://"),
                branch_name,
                Value::from("."),
                get_att(APP_ID, "DefaultDomain"),
            ]),
        );
        template.add_output(
            CLONE_URL_OUTPUT,
            "CodeCommit repository clone URL",
            get_att(REPOSITORY_ID, "CloneUrlHttp"),
        );

        Ok(CloudAssembly {
            stack_name: self.stack_name.clone(),
            environment: self.environment.clone(),
            template,
            assets: vec![self.seed.manifest.clone()],
        })
    }
}
