mod jwt;
mod verifier;

pub use jwt::*;
pub use verifier::*;
