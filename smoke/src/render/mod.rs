pub mod noise;
pub mod plane;
pub mod readback;
pub mod smoke;

pub use readback::FrameReader;
