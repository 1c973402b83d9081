//! Package descriptors as returned by a registry.

mod dependency;
pub use dependency::RawDependency;
pub use dependency::parse_dependency_list;
pub use dependency::normalize_version;

/// The identity of a package within the graph.
///
/// Rendered as `name:version`, which is also the key of the package vertex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId {
	pub name: String,
	pub version: String,
}

impl PackageId {
	pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			version: version.into(),
		}
	}
}

impl std::fmt::Display for PackageId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.name, self.version)
	}
}

/// Metadata of a single package version.
///
/// Built fresh for every registry fetch and never cached, the graph store is the only durable copy.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
	id: PackageId,
	/// Opaque license identifier, usually a URL. Empty when the registry has none.
	pub license_reference: String,
	/// Informational only.
	pub download_location: String,
	/// Declared dependencies in registry order.
	pub dependencies: Vec<RawDependency>,
}

impl PackageDescriptor {
	/// # Errors
	/// - [`InvalidArgument`](crate::Error::InvalidArgument) when `name` or `version` is empty.
	pub fn new(name: impl Into<String>, version: impl Into<String>, license_reference: impl Into<String>, download_location: impl Into<String>, dependencies: Vec<RawDependency>) -> crate::Result<Self> {
		let id = PackageId::new(name, version);
		if id.name.is_empty() || id.version.is_empty() {
			return Err(crate::Error::InvalidArgument(format!("package descriptor requires a name and version, got \"{}\"", id)));
		}
		Ok(Self {
			id,
			license_reference: license_reference.into(),
			download_location: download_location.into(),
			dependencies,
		})
	}

	pub fn id(&self) -> &PackageId {
		&self.id
	}

	pub fn name(&self) -> &str {
		&self.id.name
	}

	pub fn version(&self) -> &str {
		&self.id.version
	}

	/// Dependencies declared for `framework` (compared case-insensitively) that have a name.
	pub fn dependencies_for<'a>(&'a self, framework: &'a str) -> impl Iterator<Item = &'a RawDependency> + 'a {
		self.dependencies.iter().filter(move |d| d.targets(framework) && !d.name.is_empty())
	}
}
