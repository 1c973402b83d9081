use std::time::Duration;

use tokio::time::Instant;

use super::DependencyCrawler;
use crate::registry::RegistryClient;
use crate::upsert::GraphUpsert;

pub struct CrawlerBuilder<'a> {
	registry: &'a dyn RegistryClient,
	upsert: &'a GraphUpsert,
	framework_filter: String,
	deadline: Option<Instant>,
	fetch_retries: u32,
	retry_backoff: Duration,
}

impl<'a> CrawlerBuilder<'a> {
	pub fn new(registry: &'a dyn RegistryClient, upsert: &'a GraphUpsert) -> Self {
		Self {
			registry,
			upsert,
			framework_filter: Default::default(),
			deadline: None,
			fetch_retries: 0,
			retry_backoff: Duration::ZERO,
		}
	}

	/// Takes retry settings from `config`.
	pub fn config(self, config: &crate::Config) -> Self {
		self.fetch_retries(config.fetch_retries())
			.retry_backoff(config.retry_backoff())
	}

	/// Only dependencies declared for this framework are followed.
	pub fn framework_filter(mut self, framework: impl Into<String>) -> Self {
		self.framework_filter = framework.into();
		self
	}

	/// No registry fetch is started once `deadline` has passed.
	pub fn deadline(mut self, deadline: Option<Instant>) -> Self {
		self.deadline = deadline;
		self
	}

	pub fn fetch_retries(mut self, retries: u32) -> Self {
		self.fetch_retries = retries;
		self
	}

	pub fn retry_backoff(mut self, backoff: Duration) -> Self {
		self.retry_backoff = backoff;
		self
	}

	pub fn build(self) -> DependencyCrawler<'a> {
		DependencyCrawler {
			registry: self.registry,
			upsert: self.upsert,
			framework_filter: self.framework_filter,
			deadline: self.deadline,
			fetch_retries: self.fetch_retries,
			retry_backoff: self.retry_backoff,
			visited: Default::default(),
			skipped: Default::default(),
		}
	}
}
