// Library surface for headless/integration tests and reuse.
// The TUI host and its screens stay in the binary (main.rs, ui.rs).
pub mod announce;
pub mod app_dirs;
pub mod assist;
pub mod config;
pub mod history;
pub mod metrics;
pub mod policy;
pub mod result;
pub mod runtime;
pub mod session;
pub mod source;
pub mod timer;
pub mod util;
pub mod word;
