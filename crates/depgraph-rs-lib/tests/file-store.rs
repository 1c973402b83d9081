use std::sync::Arc;

use depgraph_rs::graph_store::MemoryGraphStore;
use depgraph_rs::{Config, Ingestor};
use depgraph_rs_test_utils::*;

#[tokio::test]
async fn saved_graph_is_extended_not_duplicated() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("nested").join("graph.bin");
	let registry = Arc::new(FakeRegistry::default()
		.with_package(package("A", "1.0", "https://licenses.nuget.org/MIT", &[("B", "1.0", "net5.0")]).unwrap())
		.with_package(package("B", "1.0", "https://licenses.nuget.org/MIT", &[]).unwrap())
		.with_package(package("C", "1.0", "https://licenses.nuget.org/Apache-2.0", &[("B", "1.0", "net5.0")]).unwrap()));

	{
		let store = Arc::new(MemoryGraphStore::new());
		Ingestor::new(registry.clone(), store.clone(), &Config::default())
			.ingest("A", "1.0", "net5.0", "MIT").await.unwrap();
		store.save_to_disk(&path).await.unwrap();
	}

	let store = Arc::new(MemoryGraphStore::load_from_disk(&path).await.unwrap());
	let before = store.vertex_count().await;
	Ingestor::new(registry.clone(), store.clone(), &Config::default())
		.ingest("C", "1.0", "net5.0", "Apache-2.0").await.unwrap();

	/* C, its license and the new caller license */
	assert_eq!(store.vertex_count().await, before + 3);
	assert_eq!(package_vertices(&store, "B", "1.0").await.len(), 1);
	assert_eq!(depends_on_count(&store, ("C", "1.0"), ("B", "1.0")).await, 1);
}
