mod host_authority;
mod presence;
mod room;
mod room_command;
mod room_handle;
mod room_manager;

pub use host_authority::*;
pub use presence::*;
pub use room::*;
pub use room_command::*;
pub use room_handle::*;
pub use room_manager::*;
