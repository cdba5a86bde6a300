mod blob;
mod interface;

pub use blob::*;
pub use interface::*;
