pub mod db;
pub mod search;
pub mod toc;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
