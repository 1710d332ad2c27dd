pub mod common;

pub use common::{init_tracing, CorpusArgs, CorpusOpts, ExportOutputArgs, ExportOutputOpts};
