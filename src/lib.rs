pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod reference;
pub mod types;
pub mod vocabulary;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use output::{CargoItemRow, RunSummary, ShipmentRow};
pub use pipeline::{Pipeline, PipelineOutput};
pub use reference::ReferenceData;
