pub mod attack_queue;
pub mod monitoring;
pub mod planner;
pub mod progress;
pub mod registry;

pub use attack_queue::{AttackQueue, AttackSummary};
pub use monitoring::{ContinuousSummary, Monitoring, PeriodicSummary};
pub use planner::{build_scenarios, compute_paths, plan, PlanSummary};
pub use progress::AttackProgress;
pub use registry::{find_vulnerability_location, FullVulnerability, ReportEntry, VulnerabilitiesRegistry};
