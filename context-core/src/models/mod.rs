pub mod chunk;
pub mod query;
pub mod vector;

pub use chunk::Chunk;
pub use query::QueryRecord;
pub use vector::VectorMatch;
