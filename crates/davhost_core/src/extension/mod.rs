//! App-declared DAV extensions.
//!
//! Apps declare plugins and collections in their manifest; this module turns
//! those declarations into mounted server extensions.
//!
//! - `manifest`: manifest tree and identifier extraction.
//! - `descriptor`: validated `(kind, identifier, app)` triples.
//! - `factory`: container lookup with a type-catalog fallback.
//! - `registry`: the installed-app walk that mounts everything.

pub mod descriptor;
pub mod factory;
pub mod manifest;
pub mod registry;
