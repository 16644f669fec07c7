//! Handler arguments
//!
//! Tagged argument values and the shapes handlers declare for them.

mod arg;
mod shape;

pub use arg::{encode_args, placeholder, placeholder_index, Arg};
pub use shape::{decode_args, ArgShape};
