//! REST API used by the tablets and by the teacher's controller.
//!
//! The handlers are thin: they check the request shape, call one service,
//! and turn the result into a status code.  Business rules live in the
//! application layer.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
