pub mod content_id;
pub mod scenario;
pub mod iteration;
pub mod vulnerability;
pub mod app_info;

pub use content_id::{content_id, canonical_json, ContentId};
pub use scenario::AttackScenario;
pub use iteration::IterationResult;
pub use vulnerability::Vulnerability;
pub use app_info::AppInfo;
