pub mod engine;
pub mod markup;

pub use engine::{Detection, MatchEngine, PhraseQuery};
pub use markup::{filter_locations, find_markup_locations};
