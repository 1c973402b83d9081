use std::sync::OnceLock;

/// A dependency as declared by a package, before its version range is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDependency {
	pub name: String,
	/// Version range expression, e.g. `[1.0, 2.0)`.
	pub version_constraint: String,
	/// Target framework moniker this dependency applies to. May be empty.
	pub framework: String,
}

impl RawDependency {
	pub fn new(name: impl Into<String>, version_constraint: impl Into<String>, framework: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			version_constraint: version_constraint.into(),
			framework: framework.into(),
		}
	}

	pub fn targets(&self, framework: &str) -> bool {
		self.framework.eq_ignore_ascii_case(framework)
	}

	/// The version to crawl for this dependency. See [`normalize_version`].
	pub fn version_token(&self) -> Option<&str> {
		normalize_version(&self.version_constraint)
	}
}

/// Decodes a registry dependency list.
///
/// Entries are separated by `|`, each entry is `name:versionRange:framework`.
/// Missing trailing fields are treated as empty and blank entries are dropped.
pub fn parse_dependency_list(list: &str) -> Vec<RawDependency> {
	list.split('|')
		.filter(|entry| !entry.trim().is_empty())
		.map(|entry| {
			let mut parts = entry.splitn(3, ':').map(str::trim);
			RawDependency::new(
				parts.next().unwrap_or_default(),
				parts.next().unwrap_or_default(),
				parts.next().unwrap_or_default(),
			)
		})
		.collect()
}

/// Extracts the version literal to fetch from a version range expression.
///
/// The leading literal wins, so a lower bound is preferred over an upper one:
/// - `1.0` -> `1.0`
/// - `[1.0, 2.0)` -> `1.0`
/// - `(, 2.0]` -> `2.0`
///
/// Returns `None` when the expression holds no version at all.
pub fn normalize_version(constraint: &str) -> Option<&str> {
	static VERSION_LITERAL: OnceLock<regex::Regex> = OnceLock::new();
	let re = VERSION_LITERAL.get_or_init(|| {
		regex::Regex::new(r"[^\[\]\(\),\s]+").expect("version literal pattern should compile.")
	});
	re.find(constraint).map(|m| m.as_str())
}
