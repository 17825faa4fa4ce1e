pub mod documents;
pub mod pool;

pub use documents::PgDocumentStore;
pub use pool::{create_pool, ensure_schema};
