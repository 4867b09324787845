//! Small helpers shared by providers and publishers.

mod text;

pub use text::{char_prefix, escape_html};
