//! Fake collaborators and graph inspection helpers for the integration tests.
//!
//! [`FakeRegistry`] serves descriptors from memory and can be told to fail or stall per package.
//! [`RacingStore`] lets a rival writer win the race between lookup and create.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use depgraph_rs::graph_store::*;
use depgraph_rs::package::{PackageDescriptor, PackageId, RawDependency};
use depgraph_rs::registry::{RegistryClient, RegistryError};
use depgraph_rs::schema;

/// Builds a descriptor.
/// # Parameters
/// - `dependencies` - `(name, version range, framework)` triples.
pub fn package(name: &str, version: &str, license: &str, dependencies: &[(&str, &str, &str)]) -> depgraph_rs::Result<PackageDescriptor> {
	let dependencies = dependencies.iter()
		.map(|(name, range, framework)| RawDependency::new(*name, *range, *framework))
		.collect();
	PackageDescriptor::new(name, version, license, format!("https://packages.example/{}/{}", name, version), dependencies)
}

#[derive(Debug, Default)]
struct Scripted {
	/// Fetches left that answer `Unavailable`.
	unavailable: usize,
	delay: Duration,
}

/// Registry answering from a fixed set of descriptors.
///
/// Unknown packages are `NotFound`. Failures and delays can be scripted per package.
#[derive(Debug, Default)]
pub struct FakeRegistry {
	packages: HashMap<PackageId, PackageDescriptor>,
	/// Requested id to the id the registry answers with.
	aliases: HashMap<PackageId, PackageId>,
	scripted: Mutex<HashMap<PackageId, Scripted>>,
	fetches: Mutex<HashMap<PackageId, usize>>,
}

impl FakeRegistry {
	pub fn with_package(mut self, descriptor: PackageDescriptor) -> Self {
		self.packages.insert(descriptor.id().clone(), descriptor);
		self
	}

	/// Requests for `requested` are answered with the descriptor stored as `canonical`.
	pub fn with_alias(mut self, requested: PackageId, canonical: PackageId) -> Self {
		self.aliases.insert(requested, canonical);
		self
	}

	/// The next `failures` fetches of the package answer `Unavailable`.
	pub fn with_unavailable(mut self, name: &str, version: &str, failures: usize) -> Self {
		self.scripted.get_mut().entry(PackageId::new(name, version)).or_default().unavailable = failures;
		self
	}

	/// Every fetch of the package takes `delay`.
	pub fn with_delay(mut self, name: &str, version: &str, delay: Duration) -> Self {
		self.scripted.get_mut().entry(PackageId::new(name, version)).or_default().delay = delay;
		self
	}

	/// Number of fetches of the package, failed ones included.
	pub async fn fetch_count(&self, name: &str, version: &str) -> usize {
		self.fetches.lock().await.get(&PackageId::new(name, version)).copied().unwrap_or(0)
	}

	pub async fn total_fetches(&self) -> usize {
		self.fetches.lock().await.values().sum()
	}
}

#[async_trait]
impl RegistryClient for FakeRegistry {
	async fn fetch(&self, name: &str, version: &str) -> Result<PackageDescriptor, RegistryError> {
		let id = PackageId::new(name, version);
		*self.fetches.lock().await.entry(id.clone()).or_default() += 1;

		let delay = {
			let mut scripted = self.scripted.lock().await;
			match scripted.get_mut(&id) {
				Some(s) if s.unavailable > 0 => {
					s.unavailable -= 1;
					return Err(RegistryError::Unavailable(format!("{} is scripted to fail", id)));
				},
				Some(s) => s.delay,
				None => Duration::ZERO,
			}
		};
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}

		let canonical = self.aliases.get(&id).unwrap_or(&id);
		self.packages.get(canonical).cloned().ok_or(RegistryError::NotFound(id))
	}
}

/// Store wrapper where another writer slips in between a lookup and the following create.
///
/// The first lookup of a raced key creates the vertex behind the caller's back and still answers `None`.
pub struct RacingStore<S> {
	inner: Arc<S>,
	races: Mutex<HashSet<VertexKey>>,
}

impl<S: GraphStore> RacingStore<S> {
	pub fn new(inner: Arc<S>) -> Self {
		Self {
			inner,
			races: Default::default(),
		}
	}

	pub fn with_race(mut self, key: VertexKey) -> Self {
		self.races.get_mut().insert(key);
		self
	}

	pub fn inner(&self) -> &Arc<S> {
		&self.inner
	}
}

#[async_trait]
impl<S: GraphStore> GraphStore for RacingStore<S> {
	async fn find_vertex(&self, key: &VertexKey) -> Result<Option<VertexId>, StoreError> {
		if self.races.lock().await.remove(key) {
			let rival = self.inner.create_vertex(key, &Properties::from([(key.property.clone(), key.value.clone())])).await?;
			log::debug!("Rival writer created {} as {}", key, rival);
			return Ok(None);
		}
		self.inner.find_vertex(key).await
	}

	async fn create_vertex(&self, key: &VertexKey, properties: &Properties) -> Result<VertexId, StoreError> {
		self.inner.create_vertex(key, properties).await
	}

	async fn find_edge(&self, label: &str, from: &VertexId, to: &VertexId, properties: &Properties) -> Result<Option<EdgeId>, StoreError> {
		self.inner.find_edge(label, from, to, properties).await
	}

	async fn create_edge(&self, label: &str, from: &VertexId, to: &VertexId, properties: &Properties) -> Result<EdgeId, StoreError> {
		self.inner.create_edge(label, from, to, properties).await
	}
}

/// Vertices stored for the package.
pub async fn package_vertices(store: &MemoryGraphStore, name: &str, version: &str) -> Vec<VertexId> {
	store.find_vertices(&schema::package_key(&PackageId::new(name, version))).await
}

/// Number of `dependsOn` edges between two packages.
pub async fn depends_on_count(store: &MemoryGraphStore, from: (&str, &str), to: (&str, &str)) -> usize {
	let from = package_vertices(store, from.0, from.1).await;
	let to = package_vertices(store, to.0, to.1).await;
	store.edges_labelled(schema::DEPENDS_ON_EDGE).await
		.iter()
		.filter(|(a, b, _)| from.contains(a) && to.contains(b))
		.count()
}

/// `(from, to)` of every edge labelled `label`, sorted.
pub async fn edge_pairs(store: &MemoryGraphStore, label: &str) -> Vec<(VertexId, VertexId)> {
	let mut pairs = store.edges_labelled(label).await
		.into_iter()
		.map(|(from, to, _)| (from, to))
		.collect::<Vec<_>>();
	pairs.sort();
	pairs
}
