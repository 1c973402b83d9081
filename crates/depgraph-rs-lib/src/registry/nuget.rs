//! NuGet v2 (OData) feed client.

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};

use super::{RegistryClient, RegistryError};
use crate::package::*;

/// Reads package descriptors from a NuGet v2 feed such as `https://www.nuget.org/api/v2`.
#[derive(Debug, Clone)]
pub struct NuGetRegistry {
	client: reqwest::Client,
	base_url: reqwest::Url,
}

impl NuGetRegistry {
	/// Creates a client for the feed configured in `config`.
	/// # Errors
	/// - [`Validation`](crate::Error::Validation) when the registry url can't be parsed.
	/// - [`Registry`](crate::Error::Registry) when the http client can't be built.
	pub fn new(config: &crate::Config) -> crate::Result<Self> {
		let base_url = reqwest::Url::parse(config.registry_url())
			.map_err(|e| crate::Error::Validation(format!("invalid registry url \"{}\": {}", config.registry_url(), e)))?;

		let client = reqwest::Client::builder()
			.https_only(config.https_only())
			.timeout(config.request_timeout())
			.build()
			.map_err(RegistryError::from)?;

		Ok(Self { client, base_url })
	}

	/// The OData address of a single package version, `<base>/Packages(Id='name',Version='version')`.
	pub fn package_url(&self, name: &str, version: &str) -> Result<reqwest::Url, RegistryError> {
		/* OData string literals escape a quote by doubling it */
		let segment = format!("Packages(Id='{}',Version='{}')", name.replace('\'', "''"), version.replace('\'', "''"));
		let mut url = self.base_url.clone();
		url.path_segments_mut()
			.map_err(|_| RegistryError::Unavailable(format!("registry url {} can't hold a path", self.base_url)))?
			.pop_if_empty()
			.push(&segment);
		Ok(url)
	}
}

#[async_trait]
impl RegistryClient for NuGetRegistry {
	async fn fetch(&self, name: &str, version: &str) -> Result<PackageDescriptor, RegistryError> {
		let requested = PackageId::new(name, version);
		let url = self.package_url(name, version)?;

		log::info!("Get package {} from {}", requested, url);
		let response = self.client
			.get(url)
			.send()
			.await?;

		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Err(RegistryError::NotFound(requested));
		}

		let body = response
			.error_for_status()?
			.text()
			.await?;

		parse_package_entry(&body, &requested)
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
	Id,
	Version,
	LicenseUrl,
	Dependencies,
}

/// Reads a package descriptor out of an OData `<entry>` document.
///
/// `requested` is only used to report a document without a package as [`RegistryError::NotFound`].
pub fn parse_package_entry(xml: &str, requested: &PackageId) -> Result<PackageDescriptor, RegistryError> {
	fn content_src(e: &BytesStart) -> Result<Option<String>, RegistryError> {
		match e.try_get_attribute("src").map_err(quick_xml::Error::from)? {
			Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
			None => Ok(None),
		}
	}

	let mut reader = quick_xml::Reader::from_str(xml);
	reader.trim_text(true);

	let mut in_properties = false;
	let mut current: Option<Field> = None;

	let mut id = String::new();
	let mut version = String::new();
	let mut license_url = String::new();
	let mut dependencies = String::new();
	let mut download = String::new();

	loop {
		match reader.read_event()? {
			Event::Start(e) => {
				match e.local_name().as_ref() {
					b"properties" => in_properties = true,
					b"content" if !in_properties => download = content_src(&e)?.unwrap_or_default(),
					b"Id" if in_properties => current = Some(Field::Id),
					b"Version" if in_properties => current = Some(Field::Version),
					b"LicenseUrl" if in_properties => current = Some(Field::LicenseUrl),
					b"Dependencies" if in_properties => current = Some(Field::Dependencies),
					_ => current = None,
				}
			},
			Event::Empty(e) => {
				/* `<d:LicenseUrl m:null="true" />` and friends carry nothing */
				if e.local_name().as_ref() == b"content" && !in_properties {
					download = content_src(&e)?.unwrap_or_default();
				}
			},
			Event::Text(t) => {
				if let Some(field) = current {
					let text = t.unescape()?;
					match field {
						Field::Id => id.push_str(&text),
						Field::Version => version.push_str(&text),
						Field::LicenseUrl => license_url.push_str(&text),
						Field::Dependencies => dependencies.push_str(&text),
					}
				}
			},
			Event::End(e) => {
				if e.local_name().as_ref() == b"properties" {
					in_properties = false;
				}
				current = None;
			},
			Event::Eof => break,
			_ => {},
		}
	}

	if id.is_empty() {
		return Err(RegistryError::NotFound(requested.clone()));
	}

	PackageDescriptor::new(id, version, license_url, download, parse_dependency_list(&dependencies))
		.map_err(|e| RegistryError::Unavailable(format!("incomplete descriptor for {}: {}", requested, e)))
}

#[cfg(test)]
mod tests {
	use super::*;

	const ENTRY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<entry xml:base="https://www.nuget.org/api/v2" xmlns="http://www.w3.org/2005/Atom" xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices" xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
	<id>https://www.nuget.org/api/v2/Packages(Id='Serilog.Sinks.Console',Version='4.0.1')</id>
	<title type="text">Serilog.Sinks.Console</title>
	<content type="application/zip" src="https://www.nuget.org/api/v2/package/Serilog.Sinks.Console/4.0.1" />
	<m:properties>
		<d:Id>Serilog.Sinks.Console</d:Id>
		<d:Version>4.0.1</d:Version>
		<d:Dependencies>Serilog:[2.10.0, ):net45|Serilog:[2.10.0, ):netstandard1.3|System.Console:[4.3.0, ):netstandard1.3</d:Dependencies>
		<d:LicenseUrl>https://licenses.nuget.org/Apache-2.0</d:LicenseUrl>
		<d:IsPrerelease m:type="Edm.Boolean">false</d:IsPrerelease>
	</m:properties>
</entry>"#;

	#[test]
	fn reads_descriptor_fields() {
		let requested = PackageId::new("Serilog.Sinks.Console", "4.0.1");
		let descriptor = parse_package_entry(ENTRY, &requested).expect("entry should parse");

		assert_eq!(descriptor.id(), &requested);
		assert_eq!(descriptor.license_reference, "https://licenses.nuget.org/Apache-2.0");
		assert_eq!(descriptor.download_location, "https://www.nuget.org/api/v2/package/Serilog.Sinks.Console/4.0.1");
		assert_eq!(descriptor.dependencies.len(), 3);
		assert_eq!(descriptor.dependencies[2], RawDependency::new("System.Console", "[4.3.0, )", "netstandard1.3"));
	}

	#[test]
	fn null_fields_are_empty() {
		let xml = r#"<entry><content type="application/zip" src="https://example.org/foo.nupkg"/><m:properties><d:Id>Foo</d:Id><d:Version>1.0</d:Version><d:LicenseUrl m:null="true"/><d:Dependencies></d:Dependencies></m:properties></entry>"#;
		let descriptor = parse_package_entry(xml, &PackageId::new("Foo", "1.0")).expect("entry should parse");

		assert!(descriptor.license_reference.is_empty());
		assert!(descriptor.dependencies.is_empty());
		assert_eq!(descriptor.download_location, "https://example.org/foo.nupkg");
	}

	#[test]
	fn document_without_package_is_not_found() {
		let xml = r#"<?xml version="1.0" encoding="utf-8"?><feed xmlns="http://www.w3.org/2005/Atom"><title type="text">Packages</title></feed>"#;
		let requested = PackageId::new("Missing", "1.0");
		assert!(matches!(parse_package_entry(xml, &requested), Err(RegistryError::NotFound(id)) if id == requested));
	}

	#[test]
	fn malformed_document_is_unavailable() {
		let xml = "<entry><m:properties><d:Id>Foo</d:Version>";
		assert!(matches!(parse_package_entry(xml, &PackageId::new("Foo", "1.0")), Err(RegistryError::Unavailable(_))));
	}

	#[test]
	fn package_url_quotes_odata_literals() {
		let registry = NuGetRegistry::new(&crate::Config::default()).expect("default config should build a client");
		let url = registry.package_url("O'Brien.Tools", "1.0").unwrap();
		assert!(url.as_str().starts_with("https://www.nuget.org/api/v2/Packages(Id="));
		assert!(url.as_str().contains("O''Brien.Tools"));

		let url = registry.package_url("Evil/../Path", "1.0").unwrap();
		assert!(!url.path().contains("/../"));
	}
}
