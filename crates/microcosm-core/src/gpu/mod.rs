pub mod buffers;
pub mod device;
pub mod layouts;
pub mod pipelines;
pub mod readback;

pub use buffers::*;
pub use device::*;
pub use layouts::*;
pub use pipelines::*;
pub use readback::*;
