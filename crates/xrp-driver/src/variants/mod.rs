//! SoC variant implementations
//!
//! One module per SoC. Each provides a zero-sized [`HardwareOps`]
//! implementation selected through [`crate::Variant::ops`].
//!
//! [`HardwareOps`]: crate::HardwareOps

pub mod hailo15l;

pub use hailo15l::Hailo15lOps;
