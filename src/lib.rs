pub mod configuration;
pub mod domain;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod services;
