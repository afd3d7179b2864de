//! Declarative entity metadata.
//!
//! A [`SchemaDescriptor`] lists the fields of one entity type in order; a
//! [`SchemaRegistry`] holds every descriptor a store knows about and builds
//! empty records for them.

pub mod descriptor;
pub mod document;
pub mod field;
pub mod registry;

pub use descriptor::{FieldEntry, SchemaBuilder, SchemaDescriptor};
pub use document::{SCHEMA_DOCUMENT_VERSION, SchemaDocument};
pub use field::{EditMode, FieldDescriptor, FieldKind};
pub use registry::{RecordConstructor, SchemaRegistry};
