//! Random-Access Audio Sources
//!
//! A sized random-access source exposes a fixed length and positioned reads
//! that never depend on a shared cursor. Two leaf kinds exist:
//! - [`FilePart`]: one file on disk
//! - [`MemoryPart`]: an in-memory buffer
//!
//! [`CompositeSource`] presents an ordered list of sources as one logical
//! stream, so a player can seek inside a mix without the server ever writing
//! a merged file.

mod composite;
mod error;
mod part;

pub use composite::CompositeSource;
pub use error::{ReadError, SourceError};
pub use part::{open_parts, FilePart, MemoryPart, RandomAccessSource};
