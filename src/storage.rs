pub mod document;
pub mod project;
pub mod scan;
pub mod transaction;

pub use document::{Document, LoadError};
pub use project::{Project, ProjectError};
pub use scan::{Scan, ScanError, TestGlobs};
