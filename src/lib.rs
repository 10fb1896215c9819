//! Tartan
//!
//! A small scene-graph facade over a 3D rendering engine: build a tree of
//! nodes, attach geometry and materials, place a perspective camera and
//! render it through a [`Renderer`](gfx::rendering::Renderer).
//!
//! All handles are reference counted and `!Send`; a scene is built, mutated
//! and rendered on one thread.

pub mod config;
pub mod error;
pub mod gfx;
pub mod math;
pub mod prelude;

pub use config::RendererConfig;
pub use error::{Result, TartanError};
