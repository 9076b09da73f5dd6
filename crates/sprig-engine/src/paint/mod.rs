//! Tint colors for batched quads (linear, premultiplied alpha).

mod color;

pub use color::Color;
