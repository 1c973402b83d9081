//! Labels, keys and properties of the stored graph.

use crate::graph_store::{Properties, VertexKey};
use crate::package::{PackageDescriptor, PackageId};

pub const PACKAGE_LABEL: &str = "package";
pub const LICENSE_LABEL: &str = "license";

/// `package -> package`, carries `framework`.
pub const DEPENDS_ON_EDGE: &str = "dependsOn";
/// `package -> descriptor license`.
pub const LICENSE_EDGE: &str = "license";
/// `package -> caller license`.
pub const LICENSED_EDGE: &str = "licensed";
/// `descriptor license -> caller license`.
pub const OF_TYPE_EDGE: &str = "ofType";

pub fn package_key(id: &PackageId) -> VertexKey {
	VertexKey::new(PACKAGE_LABEL, "id", id.to_string())
}

/// Licenses named by a package descriptor are keyed by their reference.
pub fn descriptor_license_key(reference: &str) -> VertexKey {
	VertexKey::new(LICENSE_LABEL, "name", reference)
}

/// Licenses supplied with an ingest request are keyed by their label.
pub fn caller_license_key(label: &str) -> VertexKey {
	VertexKey::new(LICENSE_LABEL, "id", label)
}

pub fn package_properties(descriptor: &PackageDescriptor) -> Properties {
	Properties::from([
		("id".to_string(), descriptor.id().to_string()),
		("name".to_string(), descriptor.name().to_string()),
		("version".to_string(), descriptor.version().to_string()),
		("licenseUrl".to_string(), descriptor.license_reference.clone()),
		("downloadUrl".to_string(), descriptor.download_location.clone()),
	])
}

pub fn framework_properties(framework: &str) -> Properties {
	Properties::from([("framework".to_string(), framework.to_string())])
}
