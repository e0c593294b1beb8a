//! Domain ports: traits implemented by external collaborators and adapters.

mod analyzer;
mod executor;
mod trail_repository;

pub use analyzer::Analyzer;
pub use executor::ExecutorSink;
pub use trail_repository::TrailRepository;
