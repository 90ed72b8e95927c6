pub mod trait_def;
pub mod writer;

pub use trait_def::LineSink;
pub use writer::WriterSink;
