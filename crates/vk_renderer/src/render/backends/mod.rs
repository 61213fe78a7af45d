//! Backend implementations for the render module
//!
//! Vulkan is the only backend; the frame loop itself is backend-agnostic.

/// Vulkan rendering backend implementation
pub mod vulkan;
