//! HTTP route handlers.

pub mod generations;
pub mod health;

pub use generations::{
    cancel_generation, create_generation, download_generation, get_generation,
};
pub use health::health_handler;
