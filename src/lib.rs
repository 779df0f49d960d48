//! T.I.D.A.L — daily tech-newsletter digest.

pub mod articles;
pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod scheduler;
pub mod sources;
