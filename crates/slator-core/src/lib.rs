mod blocks;
mod code_block;
mod core;
mod image;
mod input;
mod links;
mod lists;
pub mod markdown;
mod marks;
mod normalize;
mod ops;
mod plugin;
pub mod range;
pub mod transforms;

pub use crate::blocks::{focus_block, is_block_active, toggle_block};
pub use crate::code_block::toggle_code_block;
pub use crate::core::*;
pub use crate::image::*;
pub use crate::input::*;
pub use crate::links::{active_link, is_url, link_attrs, link_node, unwrap_link, wrap_link};
pub use crate::lists::set_checked;
pub use crate::marks::{active_marks, is_mark_active, set_background, set_color, toggle_mark};
pub use crate::ops::*;
pub use crate::plugin::*;
