//! SQL text handling: literal scanning, placeholder translation and escaping.

mod escape;
mod literal;
mod placeholders;

pub use escape::{escape_string, EscapeStrategy};
pub use literal::toggles_literal;
pub use placeholders::{prepare_parameters, replace_placeholders, translate, POSITIONAL_MARKER};
