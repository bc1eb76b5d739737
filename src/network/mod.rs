pub mod packet;
pub mod capture;

pub use capture::{Frame, FrameSource, PnetCapture, ReplaySource};
