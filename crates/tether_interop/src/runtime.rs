//! Interop runtime
//!
//! Owns the binding registry, the struct codecs and the handle table. One
//! runtime per script context; it is driven from the thread that ticks the
//! script engine.

use crate::binding_table::BindingTable;
use crate::config::InteropConfig;
use crate::convert::{FromInterop, IntoInterop};
use crate::dispatch::InitState;
use crate::error::InteropError;
use crate::handle::{Handle, HandleTable, Shared};
use crate::hot::{self, HostEnvironment};
use crate::marshal::{Marshaler, StructRegistry};
use crate::registry::FastPathRegistry;
use crate::value::InteropValue;
use std::fmt;
use std::time::Instant;
use tracing::info;

type Initializer = Box<dyn FnOnce(&mut InteropRuntime)>;

pub struct InteropRuntime {
    pub(crate) config: InteropConfig,
    pub(crate) registry: FastPathRegistry,
    pub(crate) structs: StructRegistry,
    pub(crate) handles: HandleTable,
    pub(crate) binding_ids: BindingTable,
    pub(crate) state: InitState,
    initializer: Option<Initializer>,
}

impl InteropRuntime {
    pub fn new() -> Self {
        Self::with_config(InteropConfig::default())
    }

    pub fn with_config(config: InteropConfig) -> Self {
        Self {
            config,
            registry: FastPathRegistry::new(),
            structs: StructRegistry::new(),
            handles: HandleTable::new(),
            binding_ids: BindingTable::new(),
            state: InitState::Uninitialized,
            initializer: None,
        }
    }

    /// Runtime whose first dispatch installs the built-in host bindings over
    /// `env`, unless `config.install_hot_bindings` is off.
    pub fn with_host(config: InteropConfig, env: HostEnvironment) -> Self {
        let install = config.install_hot_bindings;
        let mut rt = Self::with_config(config);
        if install {
            rt.set_initializer(move |rt| hot::install(rt, &env));
        }
        rt
    }

    /// Registration to run once, on the first dispatch.
    pub fn set_initializer(&mut self, init: impl FnOnce(&mut InteropRuntime) + 'static) {
        self.initializer = Some(Box::new(init));
    }

    /// Run the initializer if it has not run yet. Bindings and codecs the
    /// host registered before this point are kept over the built-in ones.
    pub fn ensure_ready(&mut self) {
        if self.state != InitState::Uninitialized {
            return;
        }
        self.state = InitState::Initializing;

        if let Some(init) = self.initializer.take() {
            let start = Instant::now();
            self.registry.set_keep_existing(true);
            self.structs.set_keep_existing(true);
            init(self);
            self.registry.set_keep_existing(false);
            self.structs.set_keep_existing(false);
            info!(
                "Interop bindings ready: {} handlers, {} struct types ({:?})",
                self.registry.len(),
                self.structs.len(),
                start.elapsed()
            );
        }

        self.state = InitState::Ready;
    }

    #[inline]
    pub fn state(&self) -> InitState {
        self.state
    }

    #[inline]
    pub fn config(&self) -> &InteropConfig {
        &self.config
    }

    #[inline]
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    #[inline]
    pub fn handles_mut(&mut self) -> &mut HandleTable {
        &mut self.handles
    }

    #[inline]
    pub fn structs(&self) -> &StructRegistry {
        &self.structs
    }

    pub fn marshaler(&mut self) -> Marshaler<'_> {
        Marshaler::new(&self.structs, &mut self.handles)
    }

    pub fn encode<V: IntoInterop>(&mut self, value: V) -> InteropValue<'static> {
        self.marshaler().encode(value)
    }

    pub fn decode<V: FromInterop>(&mut self, slot: &InteropValue<'_>) -> V {
        self.marshaler().decode(slot)
    }

    /// Hand a host object to script space.
    pub fn register_object<T: 'static>(&mut self, object: Shared<T>) -> Result<Handle, InteropError> {
        self.handles.register(object)
    }

    pub fn release_handle(&mut self, handle: Handle) -> bool {
        self.handles.release(handle)
    }

    /// Number of registered bindings.
    pub fn count(&self) -> usize {
        self.registry.len()
    }

    pub fn struct_count(&self) -> usize {
        self.structs.len()
    }

    pub fn has_handler<T: 'static>(&self) -> bool {
        self.structs.has_handler::<T>()
    }

    /// Drop all bindings, binding ids and struct codecs. Live handles are kept.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.binding_ids.clear();
        self.structs.clear();
    }
}

impl Default for InteropRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InteropRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteropRuntime")
            .field("state", &self.state)
            .field("registry", &self.registry)
            .field("structs", &self.structs)
            .field("handles", &self.handles.len())
            .field("binding_ids", &self.binding_ids.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::shared;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Marker;

    #[test]
    fn test_initializer_runs_once() {
        let runs = Rc::new(Cell::new(0));
        let mut rt = InteropRuntime::new();
        let seen = runs.clone();
        rt.set_initializer(move |rt| {
            seen.set(seen.get() + 1);
            rt.register_static_getter::<Marker, _, _>("one", || 1i32);
        });

        assert_eq!(rt.state(), InitState::Uninitialized);
        rt.ensure_ready();
        rt.ensure_ready();
        assert_eq!(runs.get(), 1);
        assert_eq!(rt.state(), InitState::Ready);
        assert_eq!(rt.count(), 1);
    }

    #[test]
    fn test_hot_bindings_can_be_disabled() {
        let config = InteropConfig {
            install_hot_bindings: false,
            ..InteropConfig::default()
        };
        let mut rt = InteropRuntime::with_host(config, HostEnvironment::default());
        rt.ensure_ready();
        assert_eq!(rt.count(), 0);

        let mut rt = InteropRuntime::with_host(InteropConfig::default(), HostEnvironment::default());
        rt.ensure_ready();
        assert!(rt.count() > 0);
    }

    #[test]
    fn test_host_bindings_survive_lazy_install() {
        use crate::key::CallKind;

        let mut rt = InteropRuntime::with_host(InteropConfig::default(), HostEnvironment::default());
        rt.register_static_getter_by_type_name("Mathf", "PI", || 3i32);

        let mut result = InteropValue::Null;
        assert!(rt.dispatch_static("Mathf", "PI", CallKind::GetProp, &[], &mut result));
        assert_eq!(result, InteropValue::Int32(3));

        // built-ins the host did not touch still install
        assert!(rt.dispatch_static("Mathf", "abs", CallKind::Method, &[InteropValue::Int32(-2)], &mut result));
        assert_eq!(result.to_f64_lossy(), Some(2.0));

        // after install, registration overwrites as usual
        rt.register_static_getter_by_type_name("Mathf", "PI", || 4i32);
        assert!(rt.dispatch_static("Mathf", "PI", CallKind::GetProp, &[], &mut result));
        assert_eq!(result, InteropValue::Int32(4));
    }

    #[test]
    fn test_clear_keeps_handles() {
        let mut rt = InteropRuntime::new();
        rt.register_static_getter::<Marker, _, _>("one", || 1i32);
        let handle = rt.register_object(shared(Marker)).unwrap();
        rt.clear();
        assert_eq!(rt.count(), 0);
        assert!(rt.handles().contains(handle));
        assert!(rt.release_handle(handle));
    }
}
