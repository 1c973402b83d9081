//! In-process property graph, optionally persisted to disk.

use async_trait::async_trait;
use petgraph::prelude::*;
use serde::{Serialize, Deserialize};
use tokio::sync::RwLock;

use super::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexData {
	pub label: String,
	pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeData {
	pub label: String,
	pub properties: Properties,
}

/// A [`GraphStore`] kept in memory.
///
/// Vertex keys are unique per label and property, a second create with the same key fails with [`StoreError::AlreadyExists`]
/// the same way a remote store with a unique id constraint would. Edges carry no such constraint.
///
/// The graph can be written to and read back from a file with [`save_to_disk()`](MemoryGraphStore::save_to_disk)
/// and [`load_from_disk()`](MemoryGraphStore::load_from_disk).
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
	graph: RwLock<StableDiGraph<VertexData, EdgeData>>,
}

/// A copy of the whole graph in index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSnapshot {
	pub vertices: Vec<(VertexId, VertexData)>,
	pub edges: Vec<(VertexId, VertexId, EdgeData)>,
}

fn vertex_id(i: NodeIndex) -> VertexId {
	VertexId(i.index().to_string())
}

fn matches_key(data: &VertexData, key: &VertexKey) -> bool {
	data.label == key.label && data.properties.get(&key.property) == Some(&key.value)
}

fn node_index(graph: &StableDiGraph<VertexData, EdgeData>, id: &VertexId) -> Result<NodeIndex, StoreError> {
	let i = id.0.parse::<usize>()
		.map(NodeIndex::new)
		.map_err(|_| StoreError::UnknownVertex(id.clone()))?;
	if graph.contains_node(i) {
		Ok(i)
	} else {
		Err(StoreError::UnknownVertex(id.clone()))
	}
}

fn edge_list(graph: &StableDiGraph<VertexData, EdgeData>) -> Vec<(VertexId, VertexId, EdgeData)> {
	graph.edge_indices()
		.filter_map(|e| {
			let (a, b) = graph.edge_endpoints(e)?;
			Some((vertex_id(a), vertex_id(b), graph[e].clone()))
		})
		.collect()
}

impl MemoryGraphStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Reads a graph previously written by [`save_to_disk()`](MemoryGraphStore::save_to_disk).
	/// # Errors
	/// - [`IO`](crate::Error::IO) when the file can't be read, including when it doesn't exist.
	/// - [`Bincode`](crate::Error::Bincode) when the file isn't a saved graph.
	pub async fn load_from_disk(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
		let data = tokio::fs::read(path.as_ref()).await?;
		let graph: StableDiGraph<VertexData, EdgeData> = bincode::deserialize(&data)?;
		log::debug!("Loaded graph with {} vertices from {}", graph.node_count(), path.as_ref().display());
		Ok(Self { graph: RwLock::new(graph) })
	}

	pub async fn save_to_disk(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
		let path = path.as_ref();
		let data = {
			let graph = self.graph.read().await;
			bincode::serialize(&*graph)?
		};
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent).await?;
		}
		tokio::fs::write(path, data).await?;
		log::debug!("Saved graph to {}", path.display());
		Ok(())
	}

	pub async fn vertex_count(&self) -> usize {
		self.graph.read().await.node_count()
	}

	pub async fn edge_count(&self) -> usize {
		self.graph.read().await.edge_count()
	}

	pub async fn vertex(&self, id: &VertexId) -> Option<VertexData> {
		let graph = self.graph.read().await;
		let i = node_index(&graph, id).ok()?;
		graph.node_weight(i).cloned()
	}

	/// Every vertex matching `key`. More than one entry means the key was duplicated.
	pub async fn find_vertices(&self, key: &VertexKey) -> Vec<VertexId> {
		let graph = self.graph.read().await;
		graph.node_indices()
			.filter(|i| matches_key(&graph[*i], key))
			.map(vertex_id)
			.collect()
	}

	/// Every edge labelled `label` as `(source, target, data)`.
	pub async fn edges_labelled(&self, label: &str) -> Vec<(VertexId, VertexId, EdgeData)> {
		let graph = self.graph.read().await;
		edge_list(&graph)
			.into_iter()
			.filter(|(_, _, data)| data.label == label)
			.collect()
	}

	pub async fn snapshot(&self) -> GraphSnapshot {
		let graph = self.graph.read().await;
		GraphSnapshot {
			vertices: graph.node_indices().map(|i| (vertex_id(i), graph[i].clone())).collect(),
			edges: edge_list(&graph),
		}
	}
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
	async fn find_vertex(&self, key: &VertexKey) -> Result<Option<VertexId>, StoreError> {
		log::trace!("Find vertex {}", key);
		let graph = self.graph.read().await;
		Ok(graph.node_indices()
			.find(|i| matches_key(&graph[*i], key))
			.map(vertex_id))
	}

	async fn create_vertex(&self, key: &VertexKey, properties: &Properties) -> Result<VertexId, StoreError> {
		let mut graph = self.graph.write().await;
		if graph.node_indices().any(|i| matches_key(&graph[i], key)) {
			return Err(StoreError::AlreadyExists);
		}

		let mut properties = properties.clone();
		properties.insert(key.property.clone(), key.value.clone());
		let i = graph.add_node(VertexData { label: key.label.clone(), properties });
		log::trace!("Added vertex {} at {}", key, i.index());
		Ok(vertex_id(i))
	}

	async fn find_edge(&self, label: &str, from: &VertexId, to: &VertexId, properties: &Properties) -> Result<Option<EdgeId>, StoreError> {
		let graph = self.graph.read().await;
		let a = node_index(&graph, from)?;
		let b = node_index(&graph, to)?;

		Ok(graph.edges_directed(a, Outgoing)
			.find(|e| {
				e.target() == b
				&& e.weight().label == label
				&& properties.iter().all(|(k, v)| e.weight().properties.get(k) == Some(v))
			})
			.map(|e| EdgeId(e.id().index().to_string())))
	}

	async fn create_edge(&self, label: &str, from: &VertexId, to: &VertexId, properties: &Properties) -> Result<EdgeId, StoreError> {
		let mut graph = self.graph.write().await;
		let a = node_index(&graph, from)?;
		let b = node_index(&graph, to)?;

		let e = graph.add_edge(a, b, EdgeData { label: label.to_string(), properties: properties.clone() });
		Ok(EdgeId(e.index().to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn package_key(id: &str) -> VertexKey {
		VertexKey::new("package", "id", id)
	}

	#[tokio::test]
	async fn created_vertex_is_found_by_key() {
		let store = MemoryGraphStore::new();
		let id = store.create_vertex(&package_key("Foo:1.0"), &Properties::new()).await.unwrap();

		assert_eq!(store.find_vertex(&package_key("Foo:1.0")).await.unwrap(), Some(id.clone()));
		assert_eq!(store.find_vertex(&package_key("Foo:2.0")).await.unwrap(), None);
		assert_eq!(store.find_vertex(&VertexKey::new("license", "id", "Foo:1.0")).await.unwrap(), None);

		let data = store.vertex(&id).await.unwrap();
		assert_eq!(data.properties.get("id").map(String::as_str), Some("Foo:1.0"));
	}

	#[tokio::test]
	async fn duplicate_key_is_rejected() {
		let store = MemoryGraphStore::new();
		store.create_vertex(&package_key("Foo:1.0"), &Properties::new()).await.unwrap();

		let again = store.create_vertex(&package_key("Foo:1.0"), &Properties::new()).await;
		assert!(matches!(again, Err(StoreError::AlreadyExists)));
		assert_eq!(store.vertex_count().await, 1);
	}

	#[tokio::test]
	async fn edges_match_on_label_and_properties() {
		let store = MemoryGraphStore::new();
		let a = store.create_vertex(&package_key("A:1.0"), &Properties::new()).await.unwrap();
		let b = store.create_vertex(&package_key("B:1.0"), &Properties::new()).await.unwrap();

		let net5 = Properties::from([("framework".to_string(), "net5.0".to_string())]);
		let net45 = Properties::from([("framework".to_string(), "net45".to_string())]);
		store.create_edge("dependsOn", &a, &b, &net5).await.unwrap();

		assert!(store.find_edge("dependsOn", &a, &b, &net5).await.unwrap().is_some());
		assert!(store.find_edge("dependsOn", &a, &b, &Properties::new()).await.unwrap().is_some());
		assert!(store.find_edge("dependsOn", &a, &b, &net45).await.unwrap().is_none());
		assert!(store.find_edge("dependsOn", &b, &a, &net5).await.unwrap().is_none());
		assert!(store.find_edge("license", &a, &b, &Properties::new()).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn unknown_vertex_ids_are_rejected() {
		let store = MemoryGraphStore::new();
		let a = store.create_vertex(&package_key("A:1.0"), &Properties::new()).await.unwrap();

		let missing = VertexId("42".to_string());
		let garbage = VertexId("not-an-index".to_string());
		assert!(matches!(store.create_edge("dependsOn", &a, &missing, &Properties::new()).await, Err(StoreError::UnknownVertex(_))));
		assert!(matches!(store.find_edge("dependsOn", &garbage, &a, &Properties::new()).await, Err(StoreError::UnknownVertex(_))));
	}

	#[tokio::test]
	async fn graph_survives_save_and_load() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested").join("graph.bin");

		let store = MemoryGraphStore::new();
		let a = store.create_vertex(&package_key("A:1.0"), &Properties::new()).await.unwrap();
		let l = store.create_vertex(&VertexKey::new("license", "name", "https://licenses.nuget.org/MIT"), &Properties::new()).await.unwrap();
		store.create_edge("license", &a, &l, &Properties::new()).await.unwrap();
		store.save_to_disk(&path).await.unwrap();

		let loaded = MemoryGraphStore::load_from_disk(&path).await.unwrap();
		assert_eq!(loaded.snapshot().await, store.snapshot().await);
		assert!(matches!(
			loaded.create_vertex(&package_key("A:1.0"), &Properties::new()).await,
			Err(StoreError::AlreadyExists)
		));
	}

	#[tokio::test]
	async fn loading_missing_file_is_io_error() {
		let dir = tempfile::tempdir().unwrap();
		let res = MemoryGraphStore::load_from_disk(dir.path().join("absent.bin")).await;
		assert!(matches!(res, Err(crate::Error::IO(e)) if e.kind() == std::io::ErrorKind::NotFound));
	}
}
