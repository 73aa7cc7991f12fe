pub mod computer;
pub mod filters;
pub mod options;

pub use computer::{expand, normalize, RouteComputer, FUZZABLE_MARKER, FUZZ_MARKER};
pub use filters::{exclude_paths, limit_paths_to_prefix, PathsByFile};
pub use options::{ActionParam, ControllerSpecs, RouteOption, RouteOptions};
