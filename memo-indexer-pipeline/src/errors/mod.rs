mod aggregator;
mod consumer;
mod loader;
mod orchestrator;
mod processor;

pub use aggregator::AggregatorError;
pub use consumer::ConsumerError;
pub use loader::LoaderError;
pub use orchestrator::ScannerError;
pub use processor::DecodeError;
