//! AWS provider for StackFlow
//!
//! Implements [`stackflow_cloud::CloudProvider`] on top of `aws-sdk-ec2`.
//!
//! # Supported resources
//!
//! - VPC, internet gateway, subnet
//! - Route table and subnet association
//! - Security group (ingress/egress rules)
//! - EC2 instance with a single network interface and boot script
//!
//! # Requirements
//!
//! Credentials and region come from the standard AWS chain (environment,
//! `~/.aws/config`, instance profile). `--region`/`--profile` override it.
//!
//! # Example
//!
//! ```ignore
//! use stackflow_cloud::CloudProvider;
//! use stackflow_cloud_aws::AwsProvider;
//!
//! let provider = AwsProvider::connect(Some("eu-central-1"), None).await;
//! let auth = provider.check_auth().await?;
//! if !auth.authenticated {
//!     panic!("Not authenticated: {:?}", auth.error);
//! }
//! ```

pub mod convert;
pub mod ec2;
pub mod error;
pub mod provider;

pub use error::{AwsError, Result};
pub use provider::{AwsProvider, PROVIDER_NAME};
