pub use huddle_core::model::{ConnectionId, RoomId, UserId};

pub mod model {
    pub use huddle_core::model::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use huddle_server::*;
}
