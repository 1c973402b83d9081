use std::collections::HashMap;
use std::sync::Arc;

use depgraph_rs::graph_store::{GraphStore, GremlinStore, MemoryGraphStore};

#[tokio::main]
async fn main() -> std::process::ExitCode {
	let mut opts;

	/* Parse console input */
	let parsed_options = {
		let args: Vec<String> = std::env::args().collect();

		opts = getopts::Options::new();
		opts.optflag( "h", "help",       "Show help");
		opts.optflag( "v", "verbose",    "Increased verbosity");
		opts.optopt(  "",  "name",       "Package name", "NAME");
		opts.optopt(  "",  "version",    "Package version", "VERSION");
		opts.optopt(  "",  "framework",  "Only follow dependencies declared for this framework", "FRAMEWORK");
		opts.optopt(  "",  "license",    "License to assign to the package", "LICENSE");
		opts.optopt(  "",  "body",       "JSON file supplying any of name, version, frameworkFilter and license", "FILE");
		opts.optflag( "",  "dry-run",    "Crawl into an in-memory graph that is thrown away");
		opts.parsing_style(getopts::ParsingStyle::FloatingFrees);

		let parsed_options = match opts.parse(&args[1..]) {
			Ok(m)  => { m }
			Err(e) => { eprintln!("Unable to parse options: {}", e); return std::process::ExitCode::FAILURE }
		};

		if parsed_options.opt_present("h") || parsed_options.free.first().map(String::as_str) != Some("ingest") {
			eprintln!("{}", opts.usage("Usage: depgraph-rs-terminal ingest [options]"));
			return if parsed_options.opt_present("h") { std::process::ExitCode::SUCCESS } else { std::process::ExitCode::FAILURE };
		}

		parsed_options
	};

	let default_filter = if parsed_options.opt_present("v") { "debug" } else { "info" };
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

	match ingest(&parsed_options).await {
		Ok(()) => std::process::ExitCode::SUCCESS,
		Err(e) => {
			log::error!("Ingest failed: {}", e);
			std::process::ExitCode::FAILURE
		},
	}
}

/// Where the graph is kept for this run.
enum Store {
	Gremlin(Arc<GremlinStore>),
	File(Arc<MemoryGraphStore>, std::path::PathBuf),
	Discarded(Arc<MemoryGraphStore>),
}

impl Store {
	async fn open(config: &depgraph_rs::Config, dry_run: bool) -> Result<Self, Error> {
		if dry_run {
			log::info!("Dry run, nothing will be stored.");
			return Ok(Store::Discarded(Arc::new(MemoryGraphStore::new())));
		}

		if let Some(gremlin) = config.gremlin() {
			log::info!("Using graph store at {}", gremlin.endpoint);
			return Ok(Store::Gremlin(Arc::new(GremlinStore::new(gremlin, config.request_timeout(), config.https_only())?)));
		}

		let path = config.graph_path();
		let store = match MemoryGraphStore::load_from_disk(&path).await {
			Ok(store) => store,
			Err(depgraph_rs::Error::IO(e)) if e.kind() == std::io::ErrorKind::NotFound => {
				log::info!("No graph at {}, starting a new one.", path.display());
				MemoryGraphStore::new()
			},
			Err(e) => return Err(e.into()),
		};
		Ok(Store::File(Arc::new(store), path))
	}

	fn graph_store(&self) -> Arc<dyn GraphStore> {
		match self {
			Store::Gremlin(s) => s.clone() as Arc<dyn GraphStore>,
			Store::File(s, _) | Store::Discarded(s) => s.clone(),
		}
	}

	async fn close(self) -> Result<(), Error> {
		if let Store::File(store, path) = self {
			log::debug!("Saving graph to {}", path.display());
			store.save_to_disk(&path).await?;
		}
		Ok(())
	}
}

async fn ingest(options: &getopts::Matches) -> Result<(), Error> {
	let config = depgraph_rs::Config::from_env()?;

	let query = ["name", "version", "framework", "license"]
		.into_iter()
		.filter_map(|key| options.opt_str(key).map(|value| (key.to_string(), value)))
		.collect::<HashMap<_, _>>();

	let body = match options.opt_str("body") {
		Some(path) => {
			let text = std::fs::read_to_string(&path)?;
			Some(serde_json::from_str::<serde_json::Value>(&text)?)
		},
		None => None,
	};

	let request = depgraph_rs::IngestRequest::from_sources(&query, body.as_ref())?;

	let store = Store::open(&config, options.opt_present("dry-run")).await?;
	let ingestor = depgraph_rs::Ingestor::from_config(&config, store.graph_store())?;

	let res = ingestor.ingest_request(&request).await;
	/* Whatever was written before a failure is kept. */
	store.close().await?;
	let report = res?;

	println!("{}", report);
	if report.is_partial() {
		log::warn!("{} was stored without {} of its dependency branches", report.root, report.skipped.len());
	}
	Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("depgraph-rs error: {0}")]
	DepGraph(#[from] depgraph_rs::Error),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("invalid request body: {0}")]
	Body(#[from] serde_json::Error),
}
