//! Presentation layer: embed rendering and the console host.

/// Console command parsing.
pub mod commands;
/// Stdin-driven host document.
pub mod console;
/// Embed node construction and text rendering.
pub mod renderer;

pub use commands::{CommandError, ConsoleCommand};
pub use console::{ConsoleHost, Reply, banner_hook, mount_feed};
pub use renderer::{TextRenderer, render_text};
