//! threadmind: retrieval-augmented answering over forum threads, plus the
//! background job pipeline that keeps embeddings, summaries and welcome mail
//! off the request path.

mod app_state;
pub mod db;
pub mod error;
pub mod services;
pub mod traits;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use app_state::AppState;
pub use error::{AppError, AppResult};
