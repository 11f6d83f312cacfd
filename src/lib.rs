//! Idempotent editor for a CI server's pipeline configuration document.
//!
//! Open a [`ConfigSession`](application::ConfigSession), describe the desired
//! configuration through `ensure_*` operations on the entity views, then
//! `save`: the document is written back only if it changed in substance.
//!
//! ```no_run
//! use ciconf::config::Settings;
//! use ciconf::application::SaveOptions;
//! use ciconf::infrastructure::di::ServiceContainer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let container = ServiceContainer::new(Settings::load(None)?)?;
//! let mut session = container.open_session()?;
//! session
//!     .root()
//!     .ensure_pipeline_group("deploy")?
//!     .ensure_pipeline("release")?
//!     .ensure_stage("build")?
//!     .ensure_job("compile")?
//!     .set_timeout("20")?;
//! session.save(SaveOptions::default())?;
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod util;
