pub mod api;
pub mod batch;

pub use api::{router, serve, AppState};
pub use batch::{BatchCoordinator, BatchError};
