pub mod extractor;
pub mod harvester;
pub mod orchestrator;

pub use harvester::HarvestSettings;
pub use orchestrator::{CrawlOrchestrator, CrawlReport, CrawlSettings, FailedMatch};
