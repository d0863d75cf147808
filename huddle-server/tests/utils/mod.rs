pub mod harness;
pub mod rtc_peer;
pub mod ws_client;

pub use gated_store::*;
pub use harness::*;
pub use rtc_peer::*;
pub use ws_client::*;
