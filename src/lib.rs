//! Declares a static website stack on AWS: a CodeCommit repository seeded
//! from a local directory, an Amplify app that builds from it, an
//! auto-building branch, and a one-shot trigger for the first release.
//!
//! ```no_run
//! use amplify_site::{SiteConfig, StackEnvironment, StaticSiteStack};
//!
//! let config = SiteConfig::default();
//! let stack = StaticSiteStack::declare(&config, StackEnvironment::from_env()?)?;
//! let assembly = stack.synth()?;
//! assembly.write_to(&config.out_dir)?;
//! # Ok::<(), amplify_site::Error>(())
//! ```

pub mod assets;
pub mod build_spec;
pub mod cfn;
pub mod config;
pub mod deploy;
pub mod error;
pub mod regions;
pub mod resources;
pub mod stack;

pub use build_spec::BuildSpec;
pub use config::{SiteConfig, StackEnvironment};
pub use deploy::{DeployOutcome, Deployer, StackOperation};
pub use error::{Error, Result};
pub use stack::{CloudAssembly, StaticSiteStack};
