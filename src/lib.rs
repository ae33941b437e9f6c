//! # bokeh-viewer
//!
//! Environment-lit glTF viewer with a depth-of-field post-process.
//!
//! ## Modules
//!
//! - [`error`] - Error type shared by the loaders and configuration
//! - [`viewer`] - Scene, cameras, post-processor, frame driver and the eframe app
//!
//! ## Example
//!
//! ```ignore
//! bokeh_viewer::viewer::run(Some("public".into()), "info")?;
//! ```

pub mod error;
pub mod viewer;

pub use error::{Error, Result};
