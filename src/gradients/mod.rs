//! Diffusion gradient tables
//!
//! - `Gradients`: paired b-values and unit directions, one per DWI channel
//! - Selection specs: comma lists with inclusive ranges (`"0,3,5-9"`) used
//!   by `Gradients::subset`

pub mod table;
pub mod selection;

pub use table::{Gradients, SHELL_ROUNDING};
pub use selection::{parse_indices, parse_values};
