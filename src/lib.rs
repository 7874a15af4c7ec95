#![no_std]

mod font;
mod timer;

pub mod builder;
pub mod context;
pub mod error;
pub mod frame;
pub mod mango;
pub mod opcode;
pub mod quirks;

pub use builder::Builder;
pub use context::Context;
pub use error::Error;
pub use frame::{Frame, FrameView};
pub use mango::{Mango8, Progress};
pub use opcode::OpCode;
pub use quirks::Quirks;

#[cfg(feature = "embedded-graphics")]
pub use embedded_graphics;
