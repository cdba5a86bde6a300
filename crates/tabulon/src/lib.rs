#![doc = include_str!("../README.md")]

mod batch;
mod config;
mod error;
mod events;
mod generator;
mod read_store;
mod snapshots;
mod store;
mod sync;

pub use crate::batch::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::events::*;
pub use crate::generator::*;
pub use crate::read_store::*;
pub use crate::snapshots::*;
pub use crate::store::*;
pub use crate::sync::*;
