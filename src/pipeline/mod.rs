//! Pipeline module - record source, request construction, response
//! accumulation and the batch driver.

mod accumulator;
mod batch;
mod prompt;
mod source;

pub use accumulator::*;
pub use batch::*;
pub use prompt::*;
pub use source::*;
