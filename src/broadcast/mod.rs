pub mod backup;
pub mod delivery_log;
pub mod engine;
pub mod gateway;
pub mod summary;
pub mod suppression;

pub use engine::{EngineSettings, ProgressSink, RunPaths, RunReport, run_broadcast};
pub use gateway::{Draft, Gateway, SendError, TelegramGateway};
pub use summary::{DeliveryStatus, Summary};
pub use suppression::{SuppressReason, SuppressionRecord, SuppressionStore};
