mod ai;
mod ai_config;
mod ai_pipeline;
pub mod rag;
mod scheduler;

pub use ai::*;
pub use ai_config::*;
pub use ai_pipeline::*;
pub use scheduler::*;
