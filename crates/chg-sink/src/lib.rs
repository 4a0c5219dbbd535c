//! # chg-sink
//!
//! Moves change records from the code that produces them to a
//! [`chg_store::ChangeStore`] without making the producer wait.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chg_sink::{ChangeSink, SinkSettings};
//! use chg_store::DefaultConnector;
//!
//! # async fn run() -> Result<(), chg_sink::SinkError> {
//! let sink = ChangeSink::spawn(SinkSettings::default(), Arc::new(DefaultConnector::new()))?;
//! sink.init("file:changes.db").await?;
//! // hooks call sink.emit(record) ...
//! sink.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod logging;
pub mod settings;
pub mod sink;
pub mod state;
pub mod stats;

pub use error::SinkError;
pub use logging::init_tracing;
pub use settings::SinkSettings;
pub use sink::ChangeSink;
pub use state::SinkState;
pub use stats::SinkStats;
