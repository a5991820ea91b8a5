//! Descriptor-driven frame pipeline
//!
//! A demo is a list of [`PassDescriptor`]s. At startup they are compiled
//! against the loaded assets and offscreen targets into a [`FramePipeline`];
//! every frame the compiled passes run in declared order:
//! 1. Bind the pass target through a [`TargetScope`]
//! 2. Clear it if requested
//! 3. Set frame parameters and texture inputs on the pass effect
//! 4. Draw every item once per effect pass
//! 5. Restore the previous target when the scope ends

mod descriptor;
mod frame;
mod scope;
mod target;

pub use descriptor::*;
pub use frame::*;
pub use scope::TargetScope;
pub use target::*;
