//! Layer access: provider capability, block traversal and block output

mod blocks;
mod memory;
mod provider;
mod writer;

pub use blocks::{
    iter_blocks, read_window, Block, BlockGrid, BlockStream, BlockWindow, NoProgress, Progress,
};
pub use memory::MemoryLayer;
pub use provider::{snap_extent_to_grid, LayerInfo, MaskLayer, RasterProvider};
pub use writer::{BlockWriter, RasterWriter};
