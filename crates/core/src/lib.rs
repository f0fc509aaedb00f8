pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod report;
pub mod session;
pub mod summary;
pub mod tags;

pub use config::{CliConfig, Config};
pub use error::{CoreError, Result};
pub use metrics::MetricsCollector;
pub use model::*;
pub use report::{ChannelValue, RenderMode, SensorChannel, SensorReport};
pub use session::{InMemorySession, InventoryFixture, Session};
pub use summary::{Summarizer, Summary};
pub use tags::{ResolverOptions, TagIndex, TagResolver};
