// web-server/src/lib.rs
pub mod api;
pub mod error;
pub mod middleware;
pub mod state;
pub mod verify;

pub use self::state::AuthState;
