//! Tether Interop
//!
//! Zero-allocation dispatch layer between an embedded script runtime and the host.
//!
//! ## Architecture
//!
//! - **Value:** [`InteropValue`] is the tagged slot for one argument or return value.
//! - **Handles:** [`HandleTable`] gives scripts revocable integer references to host objects.
//! - **Marshaling:** [`StructRegistry`] packs value types into vector slots, with a JSON fallback.
//! - **Registry:** bindings keyed by (owner, member hash, call kind, static flag).
//! - **Dispatch:** [`InteropRuntime::dispatch`] hashes raw name bytes, looks up, invokes.
//! - **Binding ids:** [`InteropRuntime::dispatch_by_id`] calls a binding resolved ahead of time.
//!
//! Everything here is single-threaded. The runtime is owned by the embedder and
//! driven from the same thread that ticks the script engine.
//!
//! ```ignore
//! let mut rt = InteropRuntime::new();
//! rt.register_static_getter::<FrameClock, _, _>("deltaTime", || 0.016f32);
//!
//! let mut result = InteropValue::Null;
//! assert!(rt.dispatch_static("FrameClock", "deltaTime", CallKind::GetProp, &[], &mut result));
//! ```

pub mod binding_table;
pub mod bindings;
pub mod config;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod handle;
pub mod hash;
pub mod hot;
pub mod key;
pub mod marshal;
pub mod registry;
pub mod runtime;
pub mod value;

pub use binding_table::BindingTable;
pub use bindings::{HostFunction, HostMethod, TypeBindings};
pub use config::InteropConfig;
pub use convert::{FromInterop, IntoInterop};
pub use dispatch::{DispatchRequest, InitState};
pub use error::InteropError;
pub use handle::{shared, Handle, HandleTable, Shared};
pub use hash::{hash_name, hash_name_bytes};
pub use hot::HostEnvironment;
pub use key::{script_type_name, CallKind, FastPathKey, OwnerIdentity};
pub use marshal::{Blittable, FieldKind, FieldMeta, Marshaler, StructRegistry, StructStrategy};
pub use runtime::InteropRuntime;
pub use value::{InteropKind, InteropValue};

pub use glam;
