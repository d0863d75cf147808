mod http_store;
mod meeting_store;
mod memory_store;

pub use http_store::*;
pub use meeting_store::*;
pub use memory_store::*;
