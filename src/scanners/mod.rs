pub mod dns;
pub mod files;
pub mod kinds;
pub mod monitors;
pub mod process;

pub use dns::DnsListener;
pub use files::FileDeltaReader;
pub use kinds::{ContextScanner, FileScanner, Observable, PhraseScanner, Scanner};
pub use monitors::Monitors;
pub use process::capture_process_list;
