//! Client data layer: typed state, reducers, session persistence and the
//! HTTP calls that drive them.

mod api;
mod session;
mod state;
mod store;

pub use api::*;
pub use session::*;
pub use state::*;
pub use store::*;
