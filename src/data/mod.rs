//! Configuration tree shared by the AI input format and its serialization

pub mod node;
mod toml_io;

pub use node::{AttributeValue, ConfigNode};
