pub mod chunk;
pub mod citation;
pub mod labels;
pub mod repair;
pub mod snippet;

pub use chunk::{BBox, Chunk, Source, TableRow};
pub use citation::{Citation, NOT_FOUND_ANSWER, SNIPPET_MAX_CHARS, is_not_found};
