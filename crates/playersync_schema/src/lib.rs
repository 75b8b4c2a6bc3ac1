//! # PlayerSync Schema
//!
//! Schema versioning and migration for data shared between PlayerSync servers.
//!
//! Records persisted by one server may be read by another running a newer (or
//! older) plugin build. This crate provides the two pieces needed to bridge
//! that gap:
//!
//! - [`SchemaVersion`] - a `major.minor.patch[-prerelease]` identity with a
//!   total order and reader-relative compatibility rules
//! - [`SchemaMigration`] - a registry of forward transform steps that finds
//!   and applies a migration path between any two registered versions
//!
//! The migration engine works on logical values (typically a
//! `serde_json::Value` document) and never touches bytes; decoding and
//! encoding belong to the codec layer.
//!
//! ## Quick Start
//!
//! ```rust
//! use playersync_schema::{SchemaMigration, SchemaVersion};
//!
//! let migrations = SchemaMigration::<Vec<String>>::new();
//! let v1 = SchemaVersion::parse("1.0")?;
//! let v2 = SchemaVersion::parse("2.0")?;
//!
//! migrations.register(v1.clone(), v2.clone(), |mut tags| {
//!     tags.push("migrated".to_string());
//!     Ok(tags)
//! })?;
//!
//! let tags = migrations.migrate(Vec::new(), &v1, &v2)?;
//! assert_eq!(tags, vec!["migrated".to_string()]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod migration;
pub mod version;

pub use error::{MigrationError, Result};
pub use migration::{MigrationStep, SchemaMigration, Transform};
pub use version::{SchemaVersion, VersionParseError};
