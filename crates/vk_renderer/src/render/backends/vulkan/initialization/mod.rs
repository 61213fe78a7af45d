// Vulkan initialization components

pub mod context;
pub mod device_selection;
pub mod surface;
pub mod window;

pub use context::*;
pub use device_selection::*;
pub use surface::*;
pub use window::*;
