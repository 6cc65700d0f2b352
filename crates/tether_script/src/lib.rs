//! Tether Scripting System
//!
//! JavaScript execution via QuickJS, wired to the interop dispatch layer.
//!
//! ## Architecture
//!
//! - **Runtime:** [`ScriptRuntime`] owns the engine and drains pending jobs each tick.
//! - **FFI:** `__invoke` and friends route script calls through [`tether_interop::InteropRuntime`].
//! - **Callbacks:** scripts hand functions to the host as integer ids.

pub mod callbacks;
pub mod config;
pub mod error;
pub mod ffi;
pub mod runtime;

pub use config::ScriptConfig;
pub use error::ScriptError;
pub use runtime::ScriptRuntime;

pub use rquickjs;
