//! CLI command implementations.

pub(crate) mod decrypt;
pub(crate) mod render;

pub(crate) use decrypt::DecryptArgs;
pub(crate) use render::RenderArgs;
