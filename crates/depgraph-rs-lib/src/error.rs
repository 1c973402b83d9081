//! Library error type.

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

use crate::graph_store::StoreError;
use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum Error {
	/// Request input is missing or malformed.
	#[error("validation error: {0}")]
	Validation(String),
	/// An argument to a graph operation is unusable, raised before the store is touched.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
	#[error("registry error: {0}")]
	Registry(#[from] RegistryError),
	#[error("graph store error: {0}")]
	Store(#[from] StoreError),
	/// An operation was attempted out of order, e.g. assigning a caller license before the crawl stored the package license.
	#[error("invalid state: {0}")]
	InvalidState(String),
	#[error("ingest deadline elapsed")]
	Cancelled,
	/// A package reached again after it failed earlier in the same crawl.
	#[error("{package} failed earlier: {reason}")]
	FailedEarlier {
		package: crate::package::PackageId,
		kind: ErrorKind,
		reason: String,
	},
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
	#[error("bincode error: {0}")]
	Bincode(#[from] bincode::Error),
}

/// Coarse classification of [`Error`] used to decide how far an error propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	Validation,
	InvalidArgument,
	NotFound,
	Unavailable,
	InvalidState,
	Cancelled,
}

impl std::fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ErrorKind::Validation => write!(f, "validation"),
			ErrorKind::InvalidArgument => write!(f, "invalid argument"),
			ErrorKind::NotFound => write!(f, "not found"),
			ErrorKind::Unavailable => write!(f, "unavailable"),
			ErrorKind::InvalidState => write!(f, "invalid state"),
			ErrorKind::Cancelled => write!(f, "cancelled"),
		}
	}
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::Validation(_) => ErrorKind::Validation,
			Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
			Error::Registry(RegistryError::NotFound(_)) => ErrorKind::NotFound,
			Error::Registry(RegistryError::Unavailable(_)) => ErrorKind::Unavailable,
			Error::Store(StoreError::AlreadyExists) => ErrorKind::InvalidState,
			Error::Store(_) => ErrorKind::Unavailable,
			Error::InvalidState(_) => ErrorKind::InvalidState,
			Error::Cancelled => ErrorKind::Cancelled,
			Error::FailedEarlier { kind, .. } => *kind,
			Error::IO(_) | Error::SerdeJSON(_) | Error::Bincode(_) => ErrorKind::Unavailable,
		}
	}
}
