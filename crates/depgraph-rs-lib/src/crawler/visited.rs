use std::collections::{HashMap, HashSet};

use tokio::sync::Mutex;

use crate::graph_store::VertexId;
use crate::package::PackageId;
use crate::{Error, ErrorKind};

/// Outcome of [`VisitedSet::check_and_mark()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visit {
	/// First time this crawl sees the package, it is now marked.
	Unvisited,
	/// Seen, still being fetched.
	Pending,
	Stored(VertexId),
	/// Seen and given up on, with the kind and message of the error it failed with.
	Failed(ErrorKind, String),
}

/// Packages seen by a single crawl.
#[derive(Debug, Default)]
pub struct VisitedSet {
	seen: Mutex<HashMap<PackageId, Visit>>,
}

impl VisitedSet {
	/// Marks `id` as visited and reports what was known of it before, in one step.
	pub async fn check_and_mark(&self, id: &PackageId) -> Visit {
		let mut seen = self.seen.lock().await;
		match seen.get(id) {
			Some(visit) => visit.clone(),
			None => {
				seen.insert(id.clone(), Visit::Pending);
				Visit::Unvisited
			},
		}
	}

	/// Records the stored vertex for `id`, marking it visited if it wasn't.
	pub async fn record_vertex(&self, id: &PackageId, vertex: &VertexId) {
		self.seen.lock().await.insert(id.clone(), Visit::Stored(vertex.clone()));
	}

	/// Records why `id` failed. A package whose vertex was already stored keeps it.
	pub async fn record_failure(&self, id: &PackageId, error: &Error) {
		let mut seen = self.seen.lock().await;
		let visit = seen.entry(id.clone()).or_insert(Visit::Pending);
		if *visit == Visit::Pending {
			*visit = Visit::Failed(error.kind(), error.to_string());
		}
	}

	/// Number of distinct package vertices stored.
	pub async fn stored(&self) -> usize {
		self.seen.lock().await.values()
			.filter_map(|visit| match visit {
				Visit::Stored(vertex) => Some(vertex),
				_ => None,
			})
			.collect::<HashSet<_>>()
			.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn second_check_reports_visited() {
		let visited = VisitedSet::default();
		let id = PackageId::new("A", "1.0");

		assert_eq!(visited.check_and_mark(&id).await, Visit::Unvisited);
		assert_eq!(visited.check_and_mark(&id).await, Visit::Pending);

		let vertex = VertexId("7".to_string());
		visited.record_vertex(&id, &vertex).await;
		assert_eq!(visited.check_and_mark(&id).await, Visit::Stored(vertex));
		assert_eq!(visited.stored().await, 1);
	}

	#[tokio::test]
	async fn failure_keeps_its_kind() {
		let visited = VisitedSet::default();
		let id = PackageId::new("Gone", "1.0");
		visited.check_and_mark(&id).await;

		let error = Error::from(crate::registry::RegistryError::NotFound(id.clone()));
		visited.record_failure(&id, &error).await;

		match visited.check_and_mark(&id).await {
			Visit::Failed(kind, reason) => {
				assert_eq!(kind, ErrorKind::NotFound);
				assert!(reason.contains("Gone:1.0"));
			},
			other => panic!("expected a failed visit, got {:?}", other),
		}
		assert_eq!(visited.stored().await, 0);
	}

	#[tokio::test]
	async fn failure_after_store_keeps_vertex() {
		let visited = VisitedSet::default();
		let id = PackageId::new("A", "1.0");
		let vertex = VertexId("3".to_string());
		visited.record_vertex(&id, &vertex).await;

		visited.record_failure(&id, &Error::Cancelled).await;
		assert_eq!(visited.check_and_mark(&id).await, Visit::Stored(vertex));
	}
}
