pub mod error;
pub use error::Result;
pub use error::Error;
pub use error::ErrorKind;

pub mod config;
pub use config::Config;

pub mod package;
pub use package::PackageDescriptor;
pub use package::PackageId;

pub mod registry;
pub mod graph_store;
pub mod upsert;
pub mod schema;
pub mod crawler;
pub mod license;

pub mod ingest;
pub use ingest::Ingestor;
pub use ingest::IngestRequest;
pub use ingest::IngestReport;
