//! The two license concepts of the graph.
//!
//! A package descriptor names its own license reference, attached while crawling.
//! An ingest request names a second license label, assigned once the crawl is done and
//! linked through the descriptor's license vertex.

use crate::graph_store::{Properties, VertexId};
use crate::package::PackageDescriptor;
use crate::schema::*;
use crate::upsert::GraphUpsert;
use crate::Error;

/// Ensures the descriptor's license vertex and the `license` edge to it.
///
/// Returns the license vertex, or `None` when the descriptor names no license.
pub async fn attach_license_from_descriptor(upsert: &GraphUpsert, package: &VertexId, descriptor: &PackageDescriptor) -> crate::Result<Option<VertexId>> {
	if descriptor.license_reference.is_empty() {
		log::warn!("Package {} has no license reference", descriptor.id());
		return Ok(None);
	}

	log::debug!("Store license {} for {}", descriptor.license_reference, descriptor.id());
	let license = upsert.ensure_vertex(
		&descriptor_license_key(&descriptor.license_reference),
		Properties::from([("name".to_string(), descriptor.license_reference.clone())]),
	).await?;
	upsert.ensure_edge(LICENSE_EDGE, package, &license, Properties::new()).await?;

	Ok(Some(license))
}

/// Links `package` and its descriptor license to the caller supplied `caller_label` license.
///
/// # Parameters
/// - `package` - The package vertex, as returned by the crawl.
/// - `license_reference` - The package descriptor's own license reference.
/// - `caller_label` - License label from the ingest request.
///
/// # Errors
/// - [`InvalidState`](Error::InvalidState) when the package has no descriptor license attached,
/// which means the crawl didn't run for it or didn't get that far.
pub async fn assign_caller_license(upsert: &GraphUpsert, package: &VertexId, license_reference: &str, caller_label: &str) -> crate::Result<()> {
	log::info!("Assign license {} to package vertex {}", caller_label, package);

	if license_reference.is_empty() {
		return Err(Error::InvalidState(format!("package vertex {} has no license reference to assign {} through", package, caller_label)));
	}

	let descriptor_license = upsert.find_vertex(&descriptor_license_key(license_reference)).await?
		.ok_or_else(|| Error::InvalidState(format!("license {} has not been stored", license_reference)))?;

	if upsert.store().find_edge(LICENSE_EDGE, package, &descriptor_license, &Properties::new()).await?.is_none() {
		return Err(Error::InvalidState(format!("package vertex {} is not linked to license {}", package, license_reference)));
	}

	let caller_license = upsert.ensure_vertex(
		&caller_license_key(caller_label),
		Properties::from([("name".to_string(), caller_label.to_string())]),
	).await?;

	upsert.ensure_edge(LICENSED_EDGE, package, &caller_license, Properties::new()).await?;
	upsert.ensure_edge(OF_TYPE_EDGE, &descriptor_license, &caller_license, Properties::new()).await?;

	Ok(())
}
