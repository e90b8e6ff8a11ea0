use std::path::PathBuf;

use amplify_site::{
    config::{ACCOUNT_ENV_VAR, REGION_ENV_VAR},
    Deployer, SiteConfig, StackEnvironment, StackOperation, StaticSiteStack,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// amplify-site - deploy a static website from a local folder to AWS Amplify
#[derive(Parser, Debug)]
#[command(name = "amplify-site")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file (default: amplify_site.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    target: Target,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct Target {
    /// Account to deploy into
    #[arg(long, global = true, env = ACCOUNT_ENV_VAR)]
    account: Option<String>,

    /// Region to deploy into
    #[arg(long, global = true, env = REGION_ENV_VAR)]
    region: Option<String>,

    /// Override the stack name
    #[arg(long, global = true)]
    stack_name: Option<String>,

    /// Override the directory that seeds the repository
    #[arg(long, global = true)]
    site_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the cloudformation template and manifest without deploying
    Synth {
        /// Directory to write the template into
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Don't print the template to stdout
        #[arg(short, long)]
        quiet: bool,
    },

    /// Upload the site content and create or update the stack
    Deploy {
        /// Bucket for the repository seed archive
        #[arg(long)]
        asset_bucket: Option<String>,

        /// Also start a release build when the stack gets updated
        #[arg(long)]
        trigger_on_update: bool,
    },

    /// Delete the stack
    Destroy,
}

fn apply_overrides(mut config: SiteConfig, cli: &Cli) -> SiteConfig {
    if let Some(stack_name) = &cli.target.stack_name {
        config.stack_name = stack_name.clone();
    }
    if let Some(site_dir) = &cli.target.site_dir {
        config.site_dir = site_dir.clone();
    }
    match &cli.command {
        Commands::Synth { out_dir: Some(out_dir), .. } => {
            config.out_dir = out_dir.clone();
        }
        Commands::Deploy { asset_bucket, trigger_on_update } => {
            if asset_bucket.is_some() {
                config.asset_bucket = asset_bucket.clone();
            }
            if *trigger_on_update {
                config.trigger_on_update = true;
            }
        }
        _ => {}
    }
    config
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let config = SiteConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load config")?;
    let config = apply_overrides(config, &cli);
    let environment = StackEnvironment::new(cli.target.account.clone(), cli.target.region.clone())?;

    match cli.command {
        Commands::Synth { quiet, .. } => cmd_synth(&config, environment, quiet),
        Commands::Deploy { .. } => cmd_deploy(&config, environment),
        Commands::Destroy => cmd_destroy(&config, environment),
    }
}

fn cmd_synth(config: &SiteConfig, environment: StackEnvironment, quiet: bool) -> Result<()> {
    let stack = StaticSiteStack::declare(config, environment)
        .with_context(|| format!("Failed to declare stack from {}", config.site_dir.display()))?;
    let assembly = stack.synth()?;
    assembly.write_to(&config.out_dir)
        .with_context(|| format!("Failed to write assembly to {}", config.out_dir.display()))?;
    if !quiet {
        println!("{}", assembly.template_body()?);
    }
    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

fn cmd_deploy(config: &SiteConfig, environment: StackEnvironment) -> Result<()> {
    let stack = StaticSiteStack::declare(config, environment)
        .with_context(|| format!("Failed to declare stack from {}", config.site_dir.display()))?;
    let assembly = stack.synth()?;
    assembly.write_to(&config.out_dir)?;

    let outcome = runtime()?.block_on(async {
        let deployer = Deployer::new(&assembly.environment).await?;
        info!(stack = %assembly.stack_name, region = deployer.region(), "deploying");
        deployer.deploy(&assembly, stack.seed_archive(), config.asset_bucket.as_deref()).await
    }).with_context(|| format!("Failed to deploy stack {}", assembly.stack_name))?;

    let verb = match outcome.operation {
        StackOperation::Created => "created",
        StackOperation::Updated => "updated",
        StackOperation::Unchanged => "unchanged",
    };
    println!("{} {}", assembly.stack_name, verb);
    println!("{}", serde_json::to_string_pretty(&outcome.outputs)?);
    Ok(())
}

fn cmd_destroy(config: &SiteConfig, environment: StackEnvironment) -> Result<()> {
    let stack_name = amplify_site::cfn::validate_stack_name("amplify_static_site_stack", &config.stack_name)?;
    runtime()?.block_on(async {
        let deployer = Deployer::new(&environment).await?;
        deployer.destroy(&stack_name).await
    }).with_context(|| format!("Failed to destroy stack {stack_name}"))?;
    println!("{stack_name} destroyed");
    Ok(())
}
