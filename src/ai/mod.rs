//! Per-side AI lifecycle management
//!
//! - [`registry`]: session-scoped table of built-in aspects
//! - [`component`]: path-addressable component tree
//! - [`context`]: the four context layers a behavior root is built on
//! - [`composite`]: the behavior root
//! - [`holder`]: per-side owner of the above
//! - [`directive`] and [`interpreter`]: `[modify_ai]` handling
//! - [`manager`]: all holders of a session plus the debug console

pub mod component;
pub mod composite;
pub mod configuration;
pub mod context;
pub mod directive;
pub mod holder;
pub mod interpreter;
pub mod manager;
pub mod registry;

pub use composite::CompositeAi;
pub use directive::{Directive, ModifyAction};
pub use holder::{Holder, HolderState};
pub use interpreter::{BatchReport, ModificationInterpreter};
pub use manager::AiManager;
pub use registry::{AspectValue, ComponentRegistry};
