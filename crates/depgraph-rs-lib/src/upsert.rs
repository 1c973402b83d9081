//! Idempotent "ensure it exists" operations over a [`GraphStore`].
//!
//! The store only offers a lookup and a create, with nothing tying the two together.
//! Two things keep the pair idempotent:
//! - Work on the same key is serialised in-process through a fixed set of striped locks.
//! - A create the store rejects as a duplicate (another process got there first) is answered by reading back the winner.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::graph_store::*;
use crate::Error;

const LOCK_STRIPES: usize = 64;

pub struct GraphUpsert {
	store: Arc<dyn GraphStore>,
	stripes: Vec<Mutex<()>>,
}

impl std::fmt::Debug for GraphUpsert {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GraphUpsert").field("stripes", &self.stripes.len()).finish()
	}
}

fn validate_key(key: &VertexKey) -> crate::Result<()> {
	if key.label.is_empty() || key.property.is_empty() || key.value.is_empty() {
		return Err(Error::InvalidArgument(format!("vertex key {} has an empty part", key)));
	}
	Ok(())
}

impl GraphUpsert {
	pub fn new(store: Arc<dyn GraphStore>) -> Self {
		Self {
			store,
			stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
		}
	}

	pub fn store(&self) -> &Arc<dyn GraphStore> {
		&self.store
	}

	fn stripe(&self, key: &impl Hash) -> &Mutex<()> {
		let mut hasher = DefaultHasher::new();
		key.hash(&mut hasher);
		&self.stripes[(hasher.finish() % self.stripes.len() as u64) as usize]
	}

	/// # Errors
	/// - [`InvalidArgument`](Error::InvalidArgument) when any part of `key` is empty.
	pub async fn find_vertex(&self, key: &VertexKey) -> crate::Result<Option<VertexId>> {
		validate_key(key)?;
		Ok(self.store.find_vertex(key).await?)
	}

	/// Returns the vertex for `key`, creating it with `properties` if it doesn't exist yet.
	///
	/// The key property is always written whether or not `properties` holds it.
	/// Properties of an existing vertex are left untouched.
	/// # Errors
	/// - [`InvalidArgument`](Error::InvalidArgument) when any part of `key` is empty, the store is not contacted.
	/// - [`Store`](Error::Store) when the store fails.
	pub async fn ensure_vertex(&self, key: &VertexKey, mut properties: Properties) -> crate::Result<VertexId> {
		validate_key(key)?;
		let _guard = self.stripe(key).lock().await;

		if let Some(id) = self.store.find_vertex(key).await? {
			log::debug!("Vertex {} already exists as {}", key, id);
			return Ok(id);
		}

		properties.insert(key.property.clone(), key.value.clone());
		match self.store.create_vertex(key, &properties).await {
			Ok(id) => {
				log::info!("Created vertex {} as {}", key, id);
				Ok(id)
			},
			Err(StoreError::AlreadyExists) => {
				log::debug!("Vertex {} was created elsewhere after the lookup, reading it back", key);
				self.store.find_vertex(key).await?
					.ok_or_else(|| Error::InvalidState(format!("store reported {} as existing but it can't be found", key)))
			},
			Err(e) => Err(e.into()),
		}
	}

	/// Returns the `label` edge from `from` to `to` carrying `properties`, creating it if there is none.
	/// # Errors
	/// - [`InvalidArgument`](Error::InvalidArgument) when `label` or either id is empty, the store is not contacted.
	/// - [`Store`](Error::Store) when the store fails.
	pub async fn ensure_edge(&self, label: &str, from: &VertexId, to: &VertexId, properties: Properties) -> crate::Result<EdgeId> {
		if label.is_empty() || from.0.is_empty() || to.0.is_empty() {
			return Err(Error::InvalidArgument(format!("edge \"{}\" {} -> {} has an empty part", label, from, to)));
		}
		let _guard = self.stripe(&(label, from, to)).lock().await;

		if let Some(id) = self.store.find_edge(label, from, to, &properties).await? {
			log::debug!("Edge {} {} -> {} already exists", label, from, to);
			return Ok(id);
		}

		let id = self.store.create_edge(label, from, to, &properties).await?;
		log::info!("Created edge {} {} -> {}", label, from, to);
		Ok(id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn upsert() -> (Arc<MemoryGraphStore>, GraphUpsert) {
		let store = Arc::new(MemoryGraphStore::new());
		let upsert = GraphUpsert::new(store.clone());
		(store, upsert)
	}

	#[tokio::test]
	async fn ensure_vertex_creates_once() {
		let (store, upsert) = upsert();
		let key = VertexKey::new("package", "id", "Foo:1.0");

		let first = upsert.ensure_vertex(&key, Properties::from([("name".to_string(), "Foo".to_string())])).await.unwrap();
		let second = upsert.ensure_vertex(&key, Properties::from([("name".to_string(), "Changed".to_string())])).await.unwrap();

		assert_eq!(first, second);
		assert_eq!(store.vertex_count().await, 1);
		let data = store.vertex(&first).await.unwrap();
		assert_eq!(data.properties.get("name").map(String::as_str), Some("Foo"));
		assert_eq!(data.properties.get("id").map(String::as_str), Some("Foo:1.0"));
	}

	#[tokio::test]
	async fn empty_key_fails_before_store() {
		let (store, upsert) = upsert();

		for key in [
			VertexKey::new("license", "name", ""),
			VertexKey::new("", "name", "MIT"),
			VertexKey::new("license", "", "MIT"),
		] {
			let res = upsert.ensure_vertex(&key, Properties::new()).await;
			assert!(matches!(res, Err(Error::InvalidArgument(_))));
		}
		assert_eq!(store.vertex_count().await, 0);
	}

	#[tokio::test]
	async fn ensure_edge_is_keyed_by_properties() {
		let (store, upsert) = upsert();
		let a = upsert.ensure_vertex(&VertexKey::new("package", "id", "A:1.0"), Properties::new()).await.unwrap();
		let b = upsert.ensure_vertex(&VertexKey::new("package", "id", "B:1.0"), Properties::new()).await.unwrap();
		let net5 = Properties::from([("framework".to_string(), "net5.0".to_string())]);
		let net45 = Properties::from([("framework".to_string(), "net45".to_string())]);

		let first = upsert.ensure_edge("dependsOn", &a, &b, net5.clone()).await.unwrap();
		let second = upsert.ensure_edge("dependsOn", &a, &b, net5).await.unwrap();
		assert_eq!(first, second);
		assert_eq!(store.edge_count().await, 1);

		upsert.ensure_edge("dependsOn", &a, &b, net45).await.unwrap();
		assert_eq!(store.edge_count().await, 2);
	}

	#[tokio::test]
	async fn empty_edge_label_is_invalid() {
		let (_, upsert) = upsert();
		let a = upsert.ensure_vertex(&VertexKey::new("package", "id", "A:1.0"), Properties::new()).await.unwrap();
		assert!(matches!(upsert.ensure_edge("", &a, &a, Properties::new()).await, Err(Error::InvalidArgument(_))));
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_vertex_and_edge() {
		let (store, upsert) = upsert();
		let upsert = Arc::new(upsert);
		let target = upsert.ensure_vertex(&VertexKey::new("license", "name", "MIT"), Properties::new()).await.unwrap();

		let mut tasks = tokio::task::JoinSet::new();
		for _ in 0..16 {
			let upsert = upsert.clone();
			let target = target.clone();
			tasks.spawn(async move {
				let v = upsert.ensure_vertex(&VertexKey::new("package", "id", "Shared:1.0"), Properties::new()).await?;
				upsert.ensure_edge("license", &v, &target, Properties::new()).await?;
				crate::Result::Ok(v)
			});
		}

		let mut ids = Vec::new();
		while let Some(res) = tasks.join_next().await {
			ids.push(res.unwrap().unwrap());
		}
		ids.dedup();
		assert_eq!(ids.len(), 1);
		assert_eq!(store.vertex_count().await, 2);
		assert_eq!(store.edge_count().await, 1);
	}
}
