//! Upstream package registries.

use async_trait::async_trait;
use thiserror::Error;

use crate::package::{PackageDescriptor, PackageId};

mod nuget;
pub use nuget::NuGetRegistry;
pub use nuget::parse_package_entry;

/// Errors a registry lookup can end with.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
	/// The registry answered but has no such package version.
	#[error("package {0} not found in registry")]
	NotFound(PackageId),
	/// The registry could not be reached or its answer could not be read.
	#[error("registry unavailable: {0}")]
	Unavailable(String),
}

impl From<reqwest::Error> for RegistryError {
	fn from(e: reqwest::Error) -> Self {
		RegistryError::Unavailable(e.to_string())
	}
}

impl From<quick_xml::Error> for RegistryError {
	fn from(e: quick_xml::Error) -> Self {
		RegistryError::Unavailable(format!("malformed descriptor: {}", e))
	}
}

/// Resolves package descriptors from an external feed.
#[async_trait]
pub trait RegistryClient: Send + Sync {
	async fn fetch(&self, name: &str, version: &str) -> Result<PackageDescriptor, RegistryError>;
}
