use std::time::Duration;

/// Connection details of a remote Gremlin store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GremlinConfig {
	pub endpoint: String,
	pub key: Option<String>,
	pub database_id: Option<String>,
	pub container_id: Option<String>,
}

impl GremlinConfig {
	/// Basic auth user name, `/dbs/<database>/colls/<container>` when both are known.
	pub fn username(&self) -> String {
		match (&self.database_id, &self.container_id) {
			(Some(db), Some(container)) => format!("/dbs/{}/colls/{}", db, container),
			_ => String::new(),
		}
	}
}

#[derive(Debug, Clone)]
pub struct Config {
	registry_url: String,
	https_only: bool,
	request_timeout: Duration,
	fetch_retries: u32,
	retry_backoff: Duration,
	crawl_timeout: Option<Duration>,
	data_dir: std::path::PathBuf,
	gremlin: Option<GremlinConfig>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			registry_url: "https://www.nuget.org/api/v2".to_string(),
			https_only: true,
			request_timeout: Duration::from_secs(30),
			fetch_retries: 2,
			retry_backoff: Duration::from_millis(250),
			crawl_timeout: None,
			data_dir: {
				#[cfg(target_os = "windows")]
				let path = std::env::var("APPDATA").map(std::path::PathBuf::from).unwrap_or_default();

				#[cfg(not(target_os = "windows"))]
				let path = if let Ok(e) = std::env::var("XDG_DATA_HOME") {
					std::path::PathBuf::from(e)
				} else if let Ok(home) = std::env::var("HOME") {
					std::path::PathBuf::from(home).join(".local/share")
				} else {
					std::path::PathBuf::default()
				};

				path.join("depgraph-rs")
			},
			gremlin: None,
		}
	}
}

impl Config {
	/// Default configuration overlaid with `DEPGRAPH_*` environment variables.
	/// # Errors
	/// - [`Validation`](crate::Error::Validation) when a numeric or boolean variable can't be parsed.
	pub fn from_env() -> crate::Result<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Like [`from_env()`](Config::from_env) but reading variables through `lookup`.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> crate::Result<Self> {
		fn parse<T: std::str::FromStr>(name: &str, value: String) -> crate::Result<T> {
			value.trim().parse::<T>().map_err(|_| crate::Error::Validation(format!("{} has an invalid value \"{}\"", name, value)))
		}

		let mut config = Self::default();

		if let Some(v) = lookup("DEPGRAPH_REGISTRY_URL") {
			config.registry_url = v;
		}
		if let Some(v) = lookup("DEPGRAPH_HTTPS_ONLY") {
			config.https_only = parse("DEPGRAPH_HTTPS_ONLY", v)?;
		}
		if let Some(v) = lookup("DEPGRAPH_REQUEST_TIMEOUT_SECS") {
			config.request_timeout = Duration::from_secs(parse("DEPGRAPH_REQUEST_TIMEOUT_SECS", v)?);
		}
		if let Some(v) = lookup("DEPGRAPH_FETCH_RETRIES") {
			config.fetch_retries = parse("DEPGRAPH_FETCH_RETRIES", v)?;
		}
		if let Some(v) = lookup("DEPGRAPH_CRAWL_TIMEOUT_SECS") {
			config.crawl_timeout = Some(Duration::from_secs(parse("DEPGRAPH_CRAWL_TIMEOUT_SECS", v)?));
		}
		if let Some(v) = lookup("DEPGRAPH_DATA_DIR") {
			config.data_dir = std::path::PathBuf::from(v);
		}
		if let Some(endpoint) = lookup("DEPGRAPH_GREMLIN_ENDPOINT").filter(|e| !e.is_empty()) {
			config.gremlin = Some(GremlinConfig {
				endpoint,
				key: lookup("DEPGRAPH_GREMLIN_KEY"),
				database_id: lookup("DEPGRAPH_DATABASE_ID"),
				container_id: lookup("DEPGRAPH_CONTAINER_ID"),
			});
		}

		Ok(config)
	}

	pub fn registry_url(&self) -> &str {
		&self.registry_url
	}
	pub fn set_registry_url(&mut self, registry_url: impl Into<String>) {
		self.registry_url = registry_url.into();
	}

	pub fn https_only(&self) -> bool {
		self.https_only
	}
	pub fn set_https_only(&mut self, https_only: bool) {
		self.https_only = https_only;
	}

	pub fn request_timeout(&self) -> Duration {
		self.request_timeout
	}
	pub fn set_request_timeout(&mut self, request_timeout: Duration) {
		self.request_timeout = request_timeout;
	}

	/// How many times an unavailable registry is asked again before a package is given up on.
	pub fn fetch_retries(&self) -> u32 {
		self.fetch_retries
	}
	pub fn set_fetch_retries(&mut self, fetch_retries: u32) {
		self.fetch_retries = fetch_retries;
	}

	/// Delay before the first retry, doubled for each one after.
	pub fn retry_backoff(&self) -> Duration {
		self.retry_backoff
	}
	pub fn set_retry_backoff(&mut self, retry_backoff: Duration) {
		self.retry_backoff = retry_backoff;
	}

	/// Time allowed for a whole ingest before no more packages are fetched.
	pub fn crawl_timeout(&self) -> Option<Duration> {
		self.crawl_timeout
	}
	pub fn set_crawl_timeout(&mut self, crawl_timeout: Option<Duration>) {
		self.crawl_timeout = crawl_timeout;
	}

	pub fn data_dir(&self) -> &std::path::PathBuf {
		&self.data_dir
	}
	/// returns if the directory is valid or not.
	pub fn set_data_dir(&mut self, data_dir: std::path::PathBuf) -> bool {
		if data_dir.is_dir() {
			self.data_dir = data_dir;
			true
		} else {
			false
		}
	}

	/// Where the file backed store is kept.
	pub fn graph_path(&self) -> std::path::PathBuf {
		self.data_dir.join("graph.bin")
	}

	pub fn gremlin(&self) -> Option<&GremlinConfig> {
		self.gremlin.as_ref()
	}
	pub fn set_gremlin(&mut self, gremlin: Option<GremlinConfig>) {
		self.gremlin = gremlin;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
		move |name| vars.get(name).cloned()
	}

	#[test]
	fn empty_environment_gives_defaults() {
		let config = Config::from_lookup(lookup_from(&[])).unwrap();
		assert_eq!(config.registry_url(), "https://www.nuget.org/api/v2");
		assert!(config.https_only());
		assert_eq!(config.fetch_retries(), 2);
		assert!(config.crawl_timeout().is_none());
		assert!(config.gremlin().is_none());
	}

	#[test]
	fn environment_overrides_defaults() {
		let config = Config::from_lookup(lookup_from(&[
			("DEPGRAPH_REGISTRY_URL", "http://localhost:8080/api/v2"),
			("DEPGRAPH_HTTPS_ONLY", "false"),
			("DEPGRAPH_FETCH_RETRIES", "0"),
			("DEPGRAPH_CRAWL_TIMEOUT_SECS", "90"),
			("DEPGRAPH_DATA_DIR", "/var/lib/depgraph"),
			("DEPGRAPH_GREMLIN_ENDPOINT", "https://graph.example.org:443/gremlin"),
			("DEPGRAPH_GREMLIN_KEY", "secret"),
			("DEPGRAPH_DATABASE_ID", "packages"),
			("DEPGRAPH_CONTAINER_ID", "nuget"),
		])).unwrap();

		assert_eq!(config.registry_url(), "http://localhost:8080/api/v2");
		assert!(!config.https_only());
		assert_eq!(config.fetch_retries(), 0);
		assert_eq!(config.crawl_timeout(), Some(Duration::from_secs(90)));
		assert_eq!(config.graph_path(), std::path::PathBuf::from("/var/lib/depgraph/graph.bin"));

		let gremlin = config.gremlin().expect("gremlin endpoint was set");
		assert_eq!(gremlin.key.as_deref(), Some("secret"));
		assert_eq!(gremlin.username(), "/dbs/packages/colls/nuget");
	}

	#[test]
	fn malformed_numbers_are_rejected() {
		let res = Config::from_lookup(lookup_from(&[("DEPGRAPH_FETCH_RETRIES", "lots")]));
		assert!(matches!(res, Err(crate::Error::Validation(_))));
	}
}
