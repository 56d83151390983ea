//! Side AI - per-side AI lifecycle and live reconfiguration

pub mod ai;
pub mod core;
pub mod data;
