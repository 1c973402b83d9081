//! Property graph stores.
//!
//! A [`GraphStore`] only offers separate lookup and create primitives, there is no upsert.
//! Making those idempotent is the job of [`GraphUpsert`](crate::upsert::GraphUpsert).
//!
//! Every argument is structured, labels, keys and values are never spliced into query text.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use thiserror::Error;

mod memory;
pub use memory::MemoryGraphStore;
pub use memory::VertexData;
pub use memory::EdgeData;
pub use memory::GraphSnapshot;

mod gremlin;
pub use gremlin::GremlinStore;

/// Vertex and edge properties.
pub type Properties = BTreeMap<String, String>;

/// Store assigned vertex identifier. Opaque to everything but the store that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexId(pub String);

impl std::fmt::Display for VertexId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Store assigned edge identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub String);

impl std::fmt::Display for EdgeId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Locates a vertex by `label` and the value of one of its properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexKey {
	pub label: String,
	pub property: String,
	pub value: String,
}

impl VertexKey {
	pub fn new(label: impl Into<String>, property: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			label: label.into(),
			property: property.into(),
			value: value.into(),
		}
	}
}

impl std::fmt::Display for VertexKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}[{}={}]", self.label, self.property, self.value)
	}
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
	/// A vertex with the same key was created first.
	#[error("vertex already exists")]
	AlreadyExists,
	/// The id was not issued by this store or refers to a removed element.
	#[error("unknown vertex {0}")]
	UnknownVertex(VertexId),
	#[error("store unavailable: {0}")]
	Unavailable(String),
	/// The store answered but refused the request.
	#[error("store rejected request ({status}): {message}")]
	Rejected {
		status: u16,
		message: String,
	},
}

impl From<reqwest::Error> for StoreError {
	fn from(e: reqwest::Error) -> Self {
		StoreError::Unavailable(e.to_string())
	}
}

/// Key based vertex and edge primitives over a property graph.
#[async_trait]
pub trait GraphStore: Send + Sync {
	/// Finds a vertex labelled `key.label` whose `key.property` equals `key.value`.
	async fn find_vertex(&self, key: &VertexKey) -> Result<Option<VertexId>, StoreError>;

	/// Creates a vertex labelled `key.label` with `properties`.
	///
	/// Stores that enforce key uniqueness report a clash as [`StoreError::AlreadyExists`].
	async fn create_vertex(&self, key: &VertexKey, properties: &Properties) -> Result<VertexId, StoreError>;

	/// Finds an edge labelled `label` from `from` to `to` that carries every entry of `properties`.
	async fn find_edge(&self, label: &str, from: &VertexId, to: &VertexId, properties: &Properties) -> Result<Option<EdgeId>, StoreError>;

	async fn create_edge(&self, label: &str, from: &VertexId, to: &VertexId, properties: &Properties) -> Result<EdgeId, StoreError>;
}
