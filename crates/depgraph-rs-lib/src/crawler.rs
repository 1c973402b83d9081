//! Walks a package's dependency tree through a registry and records it in the graph.
//!
//! The walk is depth first, each dependency is fully stored before its next sibling is fetched.
//! A package is fetched at most once per crawl, so cycles and diamonds terminate.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::graph_store::VertexId;
use crate::package::{PackageDescriptor, PackageId, RawDependency};
use crate::registry::{RegistryClient, RegistryError};
use crate::schema::*;
use crate::upsert::GraphUpsert;
use crate::Error;

mod builder;
pub use builder::CrawlerBuilder;

mod visited;
use visited::{Visit, VisitedSet};

/// A dependency that was given up on while the rest of the crawl carried on.
#[derive(Debug)]
pub struct SkippedBranch {
	pub parent: PackageId,
	pub dependency: RawDependency,
	pub reason: Error,
}

impl std::fmt::Display for SkippedBranch {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} -> {} {}: {}", self.parent, self.dependency.name, self.dependency.version_constraint, self.reason)
	}
}

#[derive(Debug)]
pub struct CrawlReport {
	/// Id of the root package as the registry returned it.
	pub root: PackageId,
	pub root_vertex: VertexId,
	/// License reference of the root descriptor, empty if it had none.
	pub license_reference: String,
	/// Distinct package vertices this crawl stored or found.
	pub packages_stored: usize,
	pub skipped: Vec<SkippedBranch>,
}

type VisitFuture<'s> = Pin<Box<dyn Future<Output = crate::Result<VertexId>> + Send + 's>>;

/// Single use, build with [`CrawlerBuilder`].
pub struct DependencyCrawler<'a> {
	registry: &'a dyn RegistryClient,
	upsert: &'a GraphUpsert,
	framework_filter: String,
	deadline: Option<Instant>,
	fetch_retries: u32,
	retry_backoff: Duration,

	visited: VisitedSet,
	skipped: Mutex<Vec<SkippedBranch>>,
}

impl<'a> DependencyCrawler<'a> {
	/// Crawls `name` at `version` and everything it depends on for the framework filter.
	///
	/// # Errors
	/// Any failure on the root package itself. Failures below the root are
	/// collected in [`CrawlReport::skipped`] instead.
	/// - [`InvalidArgument`](Error::InvalidArgument) when `name` or `version` is empty.
	/// - [`Registry`](Error::Registry) when the root can't be fetched.
	/// - [`Store`](Error::Store) when the root can't be stored.
	/// - [`Cancelled`](Error::Cancelled) when the deadline passed before the root was fetched.
	pub async fn crawl(self, name: &str, version: &str) -> crate::Result<CrawlReport> {
		let requested = PackageId::new(name, version);
		if requested.name.is_empty() || requested.version.is_empty() {
			return Err(Error::InvalidArgument(format!("can't crawl \"{}\", name and version are required", requested)));
		}
		log::info!("Crawling {} for framework {}", requested, self.framework_filter);

		self.visited.check_and_mark(&requested).await;
		let (descriptor, root_vertex) = self.resolve(requested).await?;

		let skipped = self.skipped.into_inner();
		let packages_stored = self.visited.stored().await;
		log::info!("Crawled {}: {} packages, {} skipped branches", descriptor.id(), packages_stored, skipped.len());

		Ok(CrawlReport {
			root: descriptor.id().clone(),
			root_vertex,
			license_reference: descriptor.license_reference,
			packages_stored,
			skipped,
		})
	}

	fn check_deadline(&self) -> crate::Result<()> {
		match self.deadline {
			Some(deadline) if Instant::now() >= deadline => Err(Error::Cancelled),
			_ => Ok(()),
		}
	}

	/// Fetches a descriptor, asking again while the registry is unavailable.
	async fn fetch(&self, id: &PackageId) -> crate::Result<PackageDescriptor> {
		let mut backoff = self.retry_backoff;
		let mut attempt = 0;
		loop {
			self.check_deadline()?;
			log::info!("Fetching {}", id);

			let fetched = match self.deadline {
				Some(deadline) => tokio::time::timeout_at(deadline, self.registry.fetch(&id.name, &id.version)).await
					.map_err(|_| Error::Cancelled)?,
				None => self.registry.fetch(&id.name, &id.version).await,
			};

			match fetched {
				Err(RegistryError::Unavailable(reason)) if attempt < self.fetch_retries => {
					attempt += 1;
					let wake = Instant::now() + backoff;
					if self.deadline.is_some_and(|deadline| deadline <= wake) {
						log::warn!("Registry unavailable for {} ({}), deadline passes before the next retry", id, reason);
						return Err(Error::Cancelled);
					}
					log::warn!("Registry unavailable for {} ({}), retry {}/{} in {:?}", id, reason, attempt, self.fetch_retries, backoff);
					tokio::time::sleep_until(wake).await;
					backoff *= 2;
				},
				fetched => return Ok(fetched?),
			}
		}
	}

	/// Fetches and stores an already marked package, then its dependencies.
	async fn resolve(&self, requested: PackageId) -> crate::Result<(PackageDescriptor, VertexId)> {
		let descriptor = self.fetch(&requested).await?;

		if descriptor.id() != &requested {
			/* The registry may normalise the id, e.g. its casing. Both spellings count as seen. */
			if let Visit::Stored(vertex) = self.visited.check_and_mark(descriptor.id()).await {
				log::debug!("{} was already stored as {}", requested, descriptor.id());
				self.visited.record_vertex(&requested, &vertex).await;
				return Ok((descriptor, vertex));
			}
		}

		let vertex = self.upsert.ensure_vertex(&package_key(descriptor.id()), package_properties(&descriptor)).await?;
		self.visited.record_vertex(&requested, &vertex).await;
		self.visited.record_vertex(descriptor.id(), &vertex).await;

		crate::license::attach_license_from_descriptor(self.upsert, &vertex, &descriptor).await?;

		for dependency in descriptor.dependencies_for(&self.framework_filter) {
			if let Err(reason) = self.link_dependency(&vertex, dependency).await {
				log::warn!("Skipping dependency {} {} of {}: {}", dependency.name, dependency.version_constraint, descriptor.id(), reason);
				self.skipped.lock().await.push(SkippedBranch {
					parent: descriptor.id().clone(),
					dependency: dependency.clone(),
					reason,
				});
			}
		}

		Ok((descriptor, vertex))
	}

	async fn link_dependency(&self, parent: &VertexId, dependency: &RawDependency) -> crate::Result<()> {
		let version = dependency.version_token()
			.ok_or_else(|| Error::InvalidArgument(format!("dependency {} has no usable version in \"{}\"", dependency.name, dependency.version_constraint)))?;

		let child = self.visit(PackageId::new(dependency.name.as_str(), version)).await?;
		self.upsert.ensure_edge(DEPENDS_ON_EDGE, parent, &child, framework_properties(&dependency.framework)).await?;
		Ok(())
	}

	fn visit(&self, id: PackageId) -> VisitFuture<'_> {
		Box::pin(async move {
			match self.visited.check_and_mark(&id).await {
				Visit::Stored(vertex) => {
					log::debug!("{} already visited", id);
					Ok(vertex)
				},
				Visit::Failed(kind, reason) => Err(Error::FailedEarlier { package: id, kind, reason }),
				/* Vertices are recorded before dependencies are walked, so only a registry alias gets here. */
				Visit::Pending => Err(Error::InvalidState(format!("{} was reached again before it was stored", id))),
				Visit::Unvisited => match self.resolve(id.clone()).await {
					Ok((_, vertex)) => Ok(vertex),
					Err(e) => {
						self.visited.record_failure(&id, &e).await;
						Err(e)
					},
				},
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;
	use std::sync::Arc;

	use async_trait::async_trait;

	use super::*;
	use crate::graph_store::MemoryGraphStore;

	#[derive(Default)]
	struct MapRegistry {
		packages: HashMap<PackageId, PackageDescriptor>,
	}

	impl MapRegistry {
		fn with(mut self, name: &str, version: &str, dependencies: &[(&str, &str, &str)]) -> Self {
			let dependencies = dependencies.iter().map(|(n, v, f)| RawDependency::new(*n, *v, *f)).collect();
			let descriptor = PackageDescriptor::new(name, version, format!("https://licenses.example/{}", name), "", dependencies).unwrap();
			self.packages.insert(descriptor.id().clone(), descriptor);
			self
		}
	}

	#[async_trait]
	impl RegistryClient for MapRegistry {
		async fn fetch(&self, name: &str, version: &str) -> Result<PackageDescriptor, RegistryError> {
			let id = PackageId::new(name, version);
			self.packages.get(&id).cloned().ok_or(RegistryError::NotFound(id))
		}
	}

	#[tokio::test]
	async fn crawl_follows_matching_framework_only() {
		let registry = MapRegistry::default()
			.with("A", "1.0", &[("B", "[1.0, )", "NET5.0"), ("C", "1.0", "net45"), ("", "", "net5.0")])
			.with("B", "1.0", &[])
			.with("C", "1.0", &[]);
		let store = Arc::new(MemoryGraphStore::new());
		let upsert = GraphUpsert::new(store.clone());

		let report = CrawlerBuilder::new(&registry, &upsert)
			.framework_filter("net5.0")
			.build()
			.crawl("A", "1.0").await.unwrap();

		assert_eq!(report.root, PackageId::new("A", "1.0"));
		assert_eq!(report.packages_stored, 2);
		assert!(report.skipped.is_empty());
		assert_eq!(report.license_reference, "https://licenses.example/A");
		assert!(store.find_vertices(&package_key(&PackageId::new("C", "1.0"))).await.is_empty());

		let edges = store.edges_labelled(DEPENDS_ON_EDGE).await;
		assert_eq!(edges.len(), 1);
		assert_eq!(edges[0].0, report.root_vertex);
		assert_eq!(edges[0].2.properties.get("framework").map(String::as_str), Some("NET5.0"));
	}

	#[tokio::test]
	async fn missing_dependency_is_skipped() {
		let registry = MapRegistry::default()
			.with("A", "1.0", &[("Gone", "2.0", "net5.0"), ("B", "1.0", "net5.0"), ("Bad", "[,]", "net5.0")])
			.with("B", "1.0", &[]);
		let upsert = GraphUpsert::new(Arc::new(MemoryGraphStore::new()));

		let report = CrawlerBuilder::new(&registry, &upsert)
			.framework_filter("net5.0")
			.build()
			.crawl("A", "1.0").await.unwrap();

		assert_eq!(report.packages_stored, 2);
		assert_eq!(report.skipped.len(), 2);
		assert_eq!(report.skipped[0].dependency.name, "Gone");
		assert_eq!(report.skipped[0].reason.kind(), crate::ErrorKind::NotFound);
		assert_eq!(report.skipped[1].dependency.name, "Bad");
		assert_eq!(report.skipped[1].reason.kind(), crate::ErrorKind::InvalidArgument);
	}

	#[tokio::test]
	async fn missing_root_fails() {
		let registry = MapRegistry::default();
		let upsert = GraphUpsert::new(Arc::new(MemoryGraphStore::new()));

		let res = CrawlerBuilder::new(&registry, &upsert).build().crawl("Nope", "1.0").await;
		assert!(matches!(res, Err(Error::Registry(RegistryError::NotFound(_)))));
	}

	#[tokio::test]
	async fn elapsed_deadline_cancels_root() {
		let registry = MapRegistry::default().with("A", "1.0", &[]);
		let upsert = GraphUpsert::new(Arc::new(MemoryGraphStore::new()));

		let res = CrawlerBuilder::new(&registry, &upsert)
			.deadline(Some(Instant::now()))
			.build()
			.crawl("A", "1.0").await;
		assert!(matches!(res, Err(Error::Cancelled)));
	}
}
