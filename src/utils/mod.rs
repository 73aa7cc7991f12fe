pub mod truncation;

pub use truncation::{truncate_dump, truncate_rows};
