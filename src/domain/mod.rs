//! Domain layer: the configuration document and the entities it holds
//!
//! This layer is independent of external concerns (no I/O, no store, no config loading).

pub mod arena;
pub mod canonical;
pub mod ensurance;
pub mod entities;
pub mod error;
pub mod navigator;
pub mod reorder;
pub mod xml;

pub use arena::{Document, Element, Fragment};
pub use canonical::{canonical_form, has_changes, reordered_canonical_form};
pub use ensurance::Ensurance;
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use navigator::PossiblyMissing;
pub use reorder::reorder_document;
