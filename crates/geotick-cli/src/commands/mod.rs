pub mod clamp;
pub mod config;
pub mod simulate;
