//! Remote graph store spoken to through a Gremlin server's HTTP endpoint.
//!
//! Scripts are fixed text, every label, key and value is sent as a binding.
//! Property steps are numbered `p0k`/`p0v`, `p1k`/`p1v`... so only names we generate ever reach the script.

use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use serde_json::Value;

use super::*;

/// A [`GraphStore`] backed by a Gremlin server.
///
/// Vertex ids are the server's native ids, carried as JSON text inside [`VertexId`].
#[derive(Debug, Clone)]
pub struct GremlinStore {
	client: reqwest::Client,
	endpoint: reqwest::Url,
	credentials: Option<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Script {
	gremlin: String,
	bindings: serde_json::Map<String, Value>,
}

impl Script {
	fn new(gremlin: &str) -> Self {
		Self {
			gremlin: gremlin.to_string(),
			bindings: Default::default(),
		}
	}

	fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
		self.bindings.insert(name.to_string(), value.into());
		self
	}

	/// Appends one `step(pNk, pNv)` per property.
	fn properties(mut self, step: &str, properties: &Properties) -> Self {
		for (i, (k, v)) in properties.iter().enumerate() {
			let (key_name, value_name) = (format!("p{}k", i), format!("p{}v", i));
			self.gremlin.push_str(&format!(".{}({}, {})", step, key_name, value_name));
			self = self.bind(&key_name, k.as_str()).bind(&value_name, v.as_str());
		}
		self
	}

	fn then(mut self, steps: &str) -> Self {
		self.gremlin.push_str(steps);
		self
	}
}

fn find_vertex_script(key: &VertexKey) -> Script {
	Script::new("g.V().hasLabel(vertexLabel).has(keyName, keyValue).id().limit(1)")
		.bind("vertexLabel", key.label.as_str())
		.bind("keyName", key.property.as_str())
		.bind("keyValue", key.value.as_str())
}

fn create_vertex_script(key: &VertexKey, properties: &Properties) -> Script {
	let mut properties = properties.clone();
	properties.insert(key.property.clone(), key.value.clone());
	Script::new("g.addV(vertexLabel)")
		.bind("vertexLabel", key.label.as_str())
		.properties("property", &properties)
		.then(".id()")
}

fn find_edge_script(label: &str, from: Value, to: Value, properties: &Properties) -> Script {
	Script::new("g.V(fromId).outE(edgeLabel).where(__.inV().hasId(toId))")
		.bind("fromId", from)
		.bind("toId", to)
		.bind("edgeLabel", label)
		.properties("has", properties)
		.then(".id().limit(1)")
}

fn create_edge_script(label: &str, from: Value, to: Value, properties: &Properties) -> Script {
	Script::new("g.V(fromId).addE(edgeLabel).to(__.V(toId))")
		.bind("fromId", from)
		.bind("toId", to)
		.bind("edgeLabel", label)
		.properties("property", properties)
		.then(".id()")
}

#[derive(Debug, Deserialize)]
struct Response {
	result: ResponseResult,
	status: ResponseStatus,
}

#[derive(Debug, Deserialize)]
struct ResponseResult {
	#[serde(default)]
	data: Value,
}

#[derive(Debug, Deserialize)]
struct ResponseStatus {
	code: u16,
	#[serde(default)]
	message: String,
}

/// Removes GraphSON type wrappers (`{"@type": .., "@value": ..}`) so typed and untyped responses read the same.
fn strip_graphson(value: Value) -> Value {
	match value {
		Value::Object(mut map) if map.len() == 2 && map.contains_key("@type") && map.contains_key("@value") => {
			strip_graphson(map.remove("@value").unwrap_or(Value::Null))
		},
		Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, strip_graphson(v))).collect()),
		Value::Array(items) => Value::Array(items.into_iter().map(strip_graphson).collect()),
		other => other,
	}
}

fn into_rows(data: Value) -> Vec<Value> {
	match strip_graphson(data) {
		Value::Array(rows) => rows,
		Value::Null => Vec::new(),
		other => vec![other],
	}
}

fn is_conflict(message: &str) -> bool {
	let message = message.to_lowercase();
	message.contains("already exists") || message.contains("conflict")
}

fn native_id(id: &VertexId) -> Result<Value, StoreError> {
	serde_json::from_str(&id.0).map_err(|_| StoreError::UnknownVertex(id.clone()))
}

impl GremlinStore {
	/// # Errors
	/// - [`Validation`](crate::Error::Validation) when the endpoint isn't a url.
	/// - [`Store`](crate::Error::Store) when the http client can't be built.
	pub fn new(config: &crate::config::GremlinConfig, request_timeout: std::time::Duration, https_only: bool) -> crate::Result<Self> {
		let endpoint = reqwest::Url::parse(&config.endpoint)
			.map_err(|e| crate::Error::Validation(format!("invalid gremlin endpoint \"{}\": {}", config.endpoint, e)))?;

		let client = reqwest::Client::builder()
			.https_only(https_only)
			.timeout(request_timeout)
			.build()
			.map_err(StoreError::from)?;

		Ok(Self {
			client,
			endpoint,
			credentials: config.key.clone().map(|key| (config.username(), key)),
		})
	}

	async fn submit(&self, script: Script) -> Result<Vec<Value>, StoreError> {
		log::trace!("Submitting gremlin script: {}", script.gremlin);

		let mut request = self.client
			.post(self.endpoint.clone())
			.json(&script);
		if let Some((user, key)) = &self.credentials {
			request = request.basic_auth(user, Some(key));
		}

		let response = request.send().await?;
		let status = response.status();
		let body = response.text().await?;

		if status == reqwest::StatusCode::CONFLICT || (!status.is_success() && is_conflict(&body)) {
			return Err(StoreError::AlreadyExists);
		}
		if !status.is_success() {
			return Err(StoreError::Rejected { status: status.as_u16(), message: body });
		}

		let response: Response = serde_json::from_str(&body)
			.map_err(|e| StoreError::Unavailable(format!("unreadable gremlin response: {}", e)))?;

		match response.status.code {
			200..=206 => Ok(into_rows(response.result.data)),
			409 => Err(StoreError::AlreadyExists),
			_ if is_conflict(&response.status.message) => Err(StoreError::AlreadyExists),
			code => Err(StoreError::Rejected { status: code, message: response.status.message }),
		}
	}

	async fn submit_for_id(&self, script: Script) -> Result<Option<String>, StoreError> {
		Ok(self.submit(script).await?
			.into_iter()
			.next()
			.map(|id| id.to_string()))
	}
}

#[async_trait]
impl GraphStore for GremlinStore {
	async fn find_vertex(&self, key: &VertexKey) -> Result<Option<VertexId>, StoreError> {
		Ok(self.submit_for_id(find_vertex_script(key)).await?.map(VertexId))
	}

	async fn create_vertex(&self, key: &VertexKey, properties: &Properties) -> Result<VertexId, StoreError> {
		self.submit_for_id(create_vertex_script(key, properties)).await?
			.map(VertexId)
			.ok_or_else(|| StoreError::Unavailable(format!("creating {} returned no id", key)))
	}

	async fn find_edge(&self, label: &str, from: &VertexId, to: &VertexId, properties: &Properties) -> Result<Option<EdgeId>, StoreError> {
		let script = find_edge_script(label, native_id(from)?, native_id(to)?, properties);
		Ok(self.submit_for_id(script).await?.map(EdgeId))
	}

	async fn create_edge(&self, label: &str, from: &VertexId, to: &VertexId, properties: &Properties) -> Result<EdgeId, StoreError> {
		let script = create_edge_script(label, native_id(from)?, native_id(to)?, properties);
		self.submit_for_id(script).await?
			.map(EdgeId)
			.ok_or_else(|| StoreError::Unavailable(format!("creating {} edge {} -> {} returned no id", label, from, to)))
	}
}
