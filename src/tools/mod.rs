//! Tools module - schemas, registration, and dispatch

pub mod registry;

pub use registry::{ParamType, Tool, ToolBuilder, ToolParameters, ToolProperty, ToolRegistry};
