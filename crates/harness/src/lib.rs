pub mod fixtures;

pub use fixtures::{RecordBuilder, TestEngine, day, init_tracing};
