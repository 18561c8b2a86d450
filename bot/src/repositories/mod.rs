pub mod execution_repository;
pub mod graph_repository;

pub use execution_repository::ExecutionRepository;
pub use graph_repository::GraphRepository;
