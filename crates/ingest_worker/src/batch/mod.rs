mod batch_buffer;
mod flush_executor;

pub use batch_buffer::*;
pub use flush_executor::*;
