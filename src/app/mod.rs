//! Session state shared with UI code, on the rendering and the interactive
//! side.

pub mod composable;
pub mod plugins;
pub mod state;

pub use composable::{AuthCallOptions, ExecutionContext, FetchOptions, OnSuccess, UserSession};
pub use plugins::{
    ClientInit, HydrationPayload, init_client_session, init_server_session, on_mounted,
};
pub use state::{SessionSnapshot, SessionState};
