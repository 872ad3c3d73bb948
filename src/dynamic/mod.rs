//! Structurally typed values decoded from script output.
//!
//! Script output has no declared schema, so its type is taken from the
//! document itself. The `???` sentinel marks values that are not known yet.

pub mod decode;
pub mod encode;
pub mod path;
pub mod value;

pub use decode::decode;
pub use encode::{encode, encode_to_string};
pub use path::ValuePath;
pub use value::{DynamicType, DynamicValue, ObjectValue, TupleValue, UNKNOWN_SENTINEL};
