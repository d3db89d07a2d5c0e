pub mod bootstrap;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;
#[cfg(test)]
mod test_support;

pub use error::{ApiError, Result};
pub use state::AppState;
