//! clusterstat-core: pure sampling and delta logic.
//! Raw status model, capability flags, field descriptors, stat lines,
//! the delta consumer, and the formatter contract. No IO, no async.

pub mod consumer;
pub mod error;
pub mod fields;
pub mod flags;
pub mod format;
pub mod line;
pub mod source;
pub mod status;

pub use consumer::StatConsumer;
pub use error::{NodeError, SchemaError, SourceError};
pub use fields::{FieldDescriptor, FIELD_DESCRIPTORS, descriptor};
pub use flags::Flags;
pub use format::{GridFormatter, JsonFormatter, LineFormatter, OutputMode, new_formatter};
pub use line::{ReaderConfig, StatLine};
pub use source::{StatusSession, StatusSource};
pub use status::ServerStatus;
