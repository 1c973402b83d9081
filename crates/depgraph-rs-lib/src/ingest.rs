//! Entry point tying a request to a crawl and the caller's license.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::crawler::{CrawlerBuilder, SkippedBranch};
use crate::graph_store::{GraphStore, VertexId};
use crate::package::PackageId;
use crate::registry::{NuGetRegistry, RegistryClient};
use crate::upsert::GraphUpsert;
use crate::Error;

/// The four inputs of an ingest, trimmed and known to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
	pub name: String,
	pub version: String,
	pub framework_filter: String,
	pub license: String,
}

impl IngestRequest {
	/// # Errors
	/// - [`Validation`](Error::Validation) naming every input that is missing or blank.
	pub fn new(name: &str, version: &str, framework_filter: &str, license: &str) -> crate::Result<Self> {
		Self::from_fields(Some(name), Some(version), Some(framework_filter), Some(license))
	}

	/// Merges query parameters (`name`, `version`, `framework`, `license`) with an optional JSON body
	/// (`name`, `version`, `frameworkFilter`, `license`). A non-blank query parameter wins over the body.
	///
	/// # Errors
	/// - [`Validation`](Error::Validation) naming every input neither source supplies.
	pub fn from_sources(query: &HashMap<String, String>, body: Option<&serde_json::Value>) -> crate::Result<Self> {
		fn pick<'s>(query: &'s HashMap<String, String>, body: Option<&'s serde_json::Value>, query_key: &str, body_key: &str) -> Option<&'s str> {
			query.get(query_key)
				.map(String::as_str)
				.filter(|v| !v.trim().is_empty())
				.or_else(|| body.and_then(|b| b.get(body_key)).and_then(serde_json::Value::as_str))
		}

		Self::from_fields(
			pick(query, body, "name", "name"),
			pick(query, body, "version", "version"),
			pick(query, body, "framework", "frameworkFilter"),
			pick(query, body, "license", "license"),
		)
	}

	fn from_fields(name: Option<&str>, version: Option<&str>, framework_filter: Option<&str>, license: Option<&str>) -> crate::Result<Self> {
		let fields = [("name", name), ("version", version), ("frameworkFilter", framework_filter), ("license", license)]
			.map(|(field, value)| (field, value.map(str::trim).unwrap_or_default()));

		let missing = fields.iter()
			.filter(|(_, value)| value.is_empty())
			.map(|(field, _)| *field)
			.collect::<Vec<_>>();
		if !missing.is_empty() {
			return Err(Error::Validation(format!("missing required input: {}", missing.join(", "))));
		}

		let [name, version, framework_filter, license] = fields.map(|(_, value)| value.to_string());
		Ok(Self { name, version, framework_filter, license })
	}
}

/// Outcome of a successful ingest.
#[derive(Debug)]
pub struct IngestReport {
	pub root: PackageId,
	pub root_vertex: VertexId,
	pub packages_stored: usize,
	/// Dependency branches that could not be stored. The rest of the graph is complete.
	pub skipped: Vec<SkippedBranch>,
}

impl IngestReport {
	pub fn is_partial(&self) -> bool {
		!self.skipped.is_empty()
	}
}

impl std::fmt::Display for IngestReport {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if !self.is_partial() {
			return write!(f, "Complete");
		}
		write!(f, "Complete with {} skipped dependencies", self.skipped.len())?;
		for branch in &self.skipped {
			write!(f, "\n  {}", branch)?;
		}
		Ok(())
	}
}

/// Runs ingests against one registry and one store.
///
/// Shareable between tasks, concurrent ingests serialise their writes per key.
pub struct Ingestor {
	registry: Arc<dyn RegistryClient>,
	upsert: GraphUpsert,
	fetch_retries: u32,
	retry_backoff: Duration,
	crawl_timeout: Option<Duration>,
}

impl Ingestor {
	pub fn new(registry: Arc<dyn RegistryClient>, store: Arc<dyn GraphStore>, config: &crate::Config) -> Self {
		Self {
			registry,
			upsert: GraphUpsert::new(store),
			fetch_retries: config.fetch_retries(),
			retry_backoff: config.retry_backoff(),
			crawl_timeout: config.crawl_timeout(),
		}
	}

	/// Ingestor reading from the NuGet feed at [`Config::registry_url()`](crate::Config::registry_url).
	/// # Errors
	/// - [`Validation`](Error::Validation) when the registry url is unusable.
	pub fn from_config(config: &crate::Config, store: Arc<dyn GraphStore>) -> crate::Result<Self> {
		let registry = NuGetRegistry::new(config)?;
		Ok(Self::new(Arc::new(registry), store, config))
	}

	pub fn upsert(&self) -> &GraphUpsert {
		&self.upsert
	}

	/// Stores `name` at `version`, its dependencies for `framework_filter` and links it to `license`.
	///
	/// # Errors
	/// - [`Validation`](Error::Validation) when any input is blank, nothing is fetched or stored.
	/// - Any error of the root package, see [`DependencyCrawler::crawl()`](crate::crawler::DependencyCrawler::crawl).
	/// - [`InvalidState`](Error::InvalidState) when the root has no descriptor license to link `license` through.
	pub async fn ingest(&self, name: &str, version: &str, framework_filter: &str, license: &str) -> crate::Result<IngestReport> {
		self.ingest_request(&IngestRequest::new(name, version, framework_filter, license)?).await
	}

	pub async fn ingest_request(&self, request: &IngestRequest) -> crate::Result<IngestReport> {
		let deadline = self.crawl_timeout.map(|t| Instant::now() + t);
		self.ingest_until(request, deadline).await
	}

	/// Like [`ingest_request()`](Ingestor::ingest_request) but no fetch starts after `deadline`.
	pub async fn ingest_until(&self, request: &IngestRequest, deadline: Option<Instant>) -> crate::Result<IngestReport> {
		log::info!("Ingesting {}:{} for {} as {}", request.name, request.version, request.framework_filter, request.license);

		let crawl = CrawlerBuilder::new(self.registry.as_ref(), &self.upsert)
			.framework_filter(request.framework_filter.as_str())
			.deadline(deadline)
			.fetch_retries(self.fetch_retries)
			.retry_backoff(self.retry_backoff)
			.build()
			.crawl(&request.name, &request.version).await?;

		crate::license::assign_caller_license(&self.upsert, &crawl.root_vertex, &crawl.license_reference, &request.license).await?;

		Ok(IngestReport {
			root: crawl.root,
			root_vertex: crawl.root_vertex,
			packages_stored: crawl.packages_stored,
			skipped: crawl.skipped,
		})
	}
}
