//! Domain layer - Pure business logic with no external dependencies.

pub mod foundation;
pub mod subscription;
