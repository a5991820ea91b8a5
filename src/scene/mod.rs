//! Scene management

mod camera;
mod light;
mod state;

pub use camera::*;
pub use light::*;
pub use state::*;
