//! Domain models for studio-sync.
//!
//! # Core Concepts
//!
//! ## Durable Entities
//!
//! - [`LocalProject`]: Client-local snapshot of one editing project, optionally
//!   linked to a remote project. Never deleted.
//! - [`Event`]: Append-only audit entry on a project (sync attempts, exits, links).
//! - [`Revision`]: Append-only, self-contained restore point on a project.
//!
//! ## Live Entities
//!
//! - [`SessionState`]: The editor's working state. Persisting it always copies
//!   into a [`ProjectSnapshot`].

mod artifact;
mod event;
mod project;
mod revision;
mod session;

pub use artifact::*;
pub use event::*;
pub use project::*;
pub use revision::*;
pub use session::*;
