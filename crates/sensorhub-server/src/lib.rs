pub mod broadcast;
pub mod error;
pub mod handlers;
pub mod live;
pub mod server;

pub use broadcast::{BroadcastRegistry, ConnectionHandle, ConnectionId};
pub use error::ApiError;
pub use handlers::HandlerState;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
