pub mod admin;
pub mod auth;
pub mod error;
pub mod members;
pub mod messages;
pub mod middleware;
pub mod state;

pub use state::{AppState, AppStateInner};
