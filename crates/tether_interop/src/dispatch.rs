//! Dispatch entry point
//!
//! Per call: reset the result slot, hash the member bytes, resolve the owner,
//! look up the binding and invoke. Nothing on this path allocates unless the
//! handler itself does.

use crate::error::InteropError;
use crate::handle::Handle;
use crate::hash::{hash_name_bytes, member_hash};
use crate::key::{script_type_name, CallKind, FastPathKey, OwnerIdentity};
use crate::marshal::Marshaler;
use crate::registry::{FastPathRegistry, Handler};
use crate::runtime::InteropRuntime;
use crate::value::InteropValue;
use std::any::{Any, TypeId};
use std::rc::Rc;
use tracing::trace;

/// Lifecycle of the lazily installed bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Initializing,
    Ready,
}

/// One call from script into the host.
#[derive(Clone, Copy)]
pub struct DispatchRequest<'a> {
    /// Script-facing type name, as raw bytes. NUL-terminated buffers are fine.
    pub type_name: Option<&'a [u8]>,
    /// Host type, when the caller already knows it.
    pub owner_type: Option<TypeId>,
    pub member: &'a [u8],
    pub kind: CallKind,
    pub is_static: bool,
    /// Instance target, stored as `RefCell<T>`.
    pub target: Option<&'a dyn Any>,
    pub args: &'a [InteropValue<'a>],
}

impl<'a> DispatchRequest<'a> {
    /// Static call addressed by type name.
    pub fn by_name(type_name: &'a str, member: &'a str, kind: CallKind) -> Self {
        Self {
            type_name: Some(type_name.as_bytes()),
            owner_type: None,
            member: member.as_bytes(),
            kind,
            is_static: true,
            target: None,
            args: &[],
        }
    }

    /// Instance call on a known host type.
    pub fn on_target(target: &'a dyn Any, owner: TypeId, member: &'a str, kind: CallKind) -> Self {
        Self {
            type_name: None,
            owner_type: Some(owner),
            member: member.as_bytes(),
            kind,
            is_static: false,
            target: Some(target),
            args: &[],
        }
    }

    pub fn with_args(mut self, args: &'a [InteropValue<'a>]) -> Self {
        self.args = args;
        self
    }
}

impl std::fmt::Debug for DispatchRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchRequest")
            .field("type_name", &self.type_name.map(String::from_utf8_lossy))
            .field("member", &String::from_utf8_lossy(self.member))
            .field("kind", &self.kind)
            .field("is_static", &self.is_static)
            .field("has_target", &self.target.is_some())
            .field("args", &self.args.len())
            .finish()
    }
}

fn lookup<'r>(
    registry: &'r FastPathRegistry,
    request: &DispatchRequest<'_>,
    member: u32,
) -> Option<(FastPathKey, &'r Handler)> {
    let find = move |owner: OwnerIdentity| {
        let key = FastPathKey::new(owner, member, request.kind, request.is_static);
        registry.get(&key).map(|handler| (key, handler))
    };

    if let Some(ty) = request.owner_type {
        return find(OwnerIdentity::RealType(ty));
    }

    let name = hash_name_bytes(request.type_name?);
    if request.is_static && registry.is_named_static(name) {
        if let Some(hit) = find(OwnerIdentity::NamedStatic(name)) {
            return Some(hit);
        }
    }
    registry
        .type_for(name)
        .and_then(|ty| find(OwnerIdentity::RealType(ty)))
}

fn invoke(
    handler: &Handler,
    target: Option<&dyn Any>,
    args: &[InteropValue<'_>],
    marshaler: &mut Marshaler<'_>,
    result: &mut InteropValue<'static>,
) -> bool {
    match handler(target, args, marshaler) {
        Some(value) => {
            *result = value;
            true
        }
        None => false,
    }
}

impl InteropRuntime {
    /// Route one call. Returns `false` on a registry miss or when the handler
    /// declines; `result` is `Null` in that case.
    pub fn dispatch(&mut self, request: &DispatchRequest<'_>, result: &mut InteropValue<'static>) -> bool {
        *result = InteropValue::Null;
        self.ensure_ready();

        let member = member_hash(request.member);
        let Some((_, handler)) = lookup(&self.registry, request, member) else {
            trace!("Dispatch miss: {:?}", request);
            return false;
        };

        let mut marshaler = Marshaler::new(&self.structs, &mut self.handles);
        let handled = invoke(handler, request.target, request.args, &mut marshaler, result);
        if !handled {
            trace!("Handler declined: {:?}", request);
        }
        handled
    }

    /// Static call by script-facing type name.
    pub fn dispatch_static(
        &mut self,
        type_name: &str,
        member: &str,
        kind: CallKind,
        args: &[InteropValue<'_>],
        result: &mut InteropValue<'static>,
    ) -> bool {
        let request = DispatchRequest::by_name(type_name, member, kind).with_args(args);
        self.dispatch(&request, result)
    }

    /// Instance call on the object behind `handle`. Stale handles miss.
    pub fn dispatch_on_handle(
        &mut self,
        handle: Handle,
        member: &str,
        kind: CallKind,
        args: &[InteropValue<'_>],
        result: &mut InteropValue<'static>,
    ) -> bool {
        let Some(entry) = self.handles.entry(handle) else {
            *result = InteropValue::Null;
            return false;
        };
        let owner = entry.owner();
        let object: Rc<dyn Any> = Rc::clone(entry.object());

        let request = DispatchRequest::on_target(&*object, owner, member, kind).with_args(args);
        self.dispatch(&request, result)
    }

    /// Call shape used by script bridges. Static calls go by type name. An
    /// instance call uses `target` when it resolves; without one it stays an
    /// instance lookup, so it can only miss or decline.
    #[allow(clippy::too_many_arguments)]
    pub fn dispatch_call(
        &mut self,
        type_name: &str,
        member: &str,
        kind: CallKind,
        is_static: bool,
        target: Option<Handle>,
        args: &[InteropValue<'_>],
        result: &mut InteropValue<'static>,
    ) -> bool {
        if is_static {
            return self.dispatch_static(type_name, member, kind, args, result);
        }
        match target {
            Some(handle) => self.dispatch_on_handle(handle, member, kind, args, result),
            None => {
                let request = DispatchRequest {
                    is_static: false,
                    ..DispatchRequest::by_name(type_name, member, kind)
                }
                .with_args(args);
                self.dispatch(&request, result)
            }
        }
    }

    /// Whether a binding exists, without running the initializer.
    pub fn has_binding(&self, type_name: &str, member: &str, kind: CallKind, is_static: bool) -> bool {
        let request = DispatchRequest {
            is_static,
            ..DispatchRequest::by_name(type_name, member, kind)
        };
        lookup(&self.registry, &request, member_hash(member.as_bytes())).is_some()
    }

    /// Resolve a binding by name once and return its id for
    /// [`dispatch_by_id`](Self::dispatch_by_id).
    pub fn resolve_binding_id(
        &mut self,
        type_name: &str,
        member: &str,
        kind: CallKind,
        is_static: bool,
    ) -> Result<i32, InteropError> {
        self.ensure_ready();
        let request = DispatchRequest {
            is_static,
            ..DispatchRequest::by_name(type_name, member, kind)
        };
        let key = lookup(&self.registry, &request, member_hash(member.as_bytes())).map(|(key, _)| key);
        match key {
            Some(key) => self.binding_ids.assign(key),
            None => Err(InteropError::UnknownBinding(format!("{type_name}.{member} ({kind})"))),
        }
    }

    /// Binding id for a member of host type `T`.
    pub fn binding_id_of<T: 'static>(
        &mut self,
        member: &str,
        kind: CallKind,
        is_static: bool,
    ) -> Result<i32, InteropError> {
        self.ensure_ready();
        let key = FastPathKey::new(
            OwnerIdentity::RealType(TypeId::of::<T>()),
            member_hash(member.as_bytes()),
            kind,
            is_static,
        );
        if !self.registry.contains(&key) {
            return Err(InteropError::UnknownBinding(format!(
                "{}.{member} ({kind})",
                script_type_name::<T>()
            )));
        }
        self.binding_ids.assign(key)
    }

    /// Call a binding by id. Instance bindings take the target handle as the
    /// first argument. Unknown ids and stale targets miss.
    pub fn dispatch_by_id(
        &mut self,
        id: i32,
        args: &[InteropValue<'_>],
        result: &mut InteropValue<'static>,
    ) -> bool {
        *result = InteropValue::Null;
        self.ensure_ready();

        let Some(key) = self.binding_ids.key(id) else {
            trace!("Unknown binding id {}", id);
            return false;
        };

        let (target, args) = if key.is_static {
            (None, args)
        } else {
            let object = args
                .first()
                .and_then(InteropValue::as_handle)
                .and_then(|handle| self.handles.entry(handle))
                .map(|entry| Rc::clone(entry.object()));
            match object {
                Some(object) => (Some(object), &args[1..]),
                None => {
                    trace!("Binding id {} called without a live target", id);
                    return false;
                }
            }
        };

        let Some(handler) = self.registry.get(&key) else {
            trace!("Binding id {} is no longer bound", id);
            return false;
        };
        let mut marshaler = Marshaler::new(&self.structs, &mut self.handles);
        invoke(handler, target.as_deref(), args, &mut marshaler, result)
    }
}
