//! scanlens-hw — Capture collaborator types.
//!
//! Frames arrive from the platform camera as opaque buffers with size,
//! rotation and pixel-format metadata, and must be released back to the
//! capture pipeline exactly once. `Frame` ties that release to `Drop`.

pub mod camera;
pub mod frame;

pub use camera::CameraFacing;
pub use frame::{Frame, FrameError, InputImage, PixelFormat};
