//! HTTP API layer

pub mod assistant;
pub mod health;
pub mod middleware;
pub mod router;
pub mod state;
pub mod types;

pub use router::{create_router_with_state, with_cors};
pub use state::AppState;
