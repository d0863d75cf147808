pub mod config;
pub mod coordinator;
pub mod error;
pub mod fanout;
pub mod gateway;
pub mod http;
pub mod identity;
pub mod registry;
pub mod reminder;
pub mod room;
pub mod signaling;

pub use config::*;
pub use coordinator::*;
pub use error::*;
pub use fanout::*;
pub use gateway::*;
pub use http::*;
pub use identity::*;
pub use registry::*;
pub use reminder::*;
pub use room::*;
pub use signaling::*;
