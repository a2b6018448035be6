pub mod logger;

pub use logger::{EventLog, LogEvent, LogSink, MemorySink};
