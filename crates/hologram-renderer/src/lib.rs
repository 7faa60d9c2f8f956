//! Renders a scene into a light-field quilt and maps the quilt onto a
//! lenticular display.

pub mod app;
pub mod camera;
pub mod config;
pub mod registry;
pub mod renderer;
pub mod scene;
