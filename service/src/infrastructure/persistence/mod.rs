pub mod memory;
pub mod repository;

pub use memory::MemoryContentRepository;
pub use repository::PostgresContentRepository;
