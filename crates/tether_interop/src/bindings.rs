//! Host bindings
//!
//! Every registration wraps a typed host closure in one boxed [`Handler`]
//! that decodes arguments from the slot slice, calls the closure and encodes
//! the result. Instance bindings downcast the dispatch target to `RefCell<T>`
//! and decline when it is missing, mistyped or already borrowed.
//!
//! Closure argument types are not inferred from these traits, so annotate
//! them: `|t: &mut Transform, by: Vec3| t.translate(by)`.

use crate::convert::{FromInterop, IntoInterop};
use crate::error::InteropError;
use crate::hash::{hash_name, member_hash};
use crate::key::{script_type_name, CallKind, FastPathKey, OwnerIdentity};
use crate::marshal::{Blittable, JsonValue, Marshaler};
use crate::registry::Handler;
use crate::runtime::InteropRuntime;
use crate::value::{InteropValue, NULL_SLOT};
use serde_json::Map;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::marker::PhantomData;

#[inline]
fn arg<'s, 'a>(args: &'s [InteropValue<'a>], index: usize) -> &'s InteropValue<'a> {
    args.get(index).unwrap_or(&NULL_SLOT)
}

/// A free function callable from script with up to six arguments.
pub trait HostFunction<Args>: 'static {
    fn invoke(&self, args: &[InteropValue<'_>], marshaler: &mut Marshaler<'_>) -> InteropValue<'static>;
}

/// A method on `T` callable from script with up to one argument.
pub trait HostMethod<T, Args>: 'static {
    fn invoke(
        &self,
        target: &mut T,
        args: &[InteropValue<'_>],
        marshaler: &mut Marshaler<'_>,
    ) -> InteropValue<'static>;
}

macro_rules! impl_host_function {
    ($($ty:ident $var:ident $idx:tt),*) => {
        impl<F, R, $($ty,)*> HostFunction<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R + 'static,
            R: IntoInterop,
            $($ty: FromInterop,)*
        {
            #[allow(unused_variables)]
            fn invoke(
                &self,
                args: &[InteropValue<'_>],
                marshaler: &mut Marshaler<'_>,
            ) -> InteropValue<'static> {
                $(let $var = $ty::from_interop(arg(args, $idx), marshaler);)*
                (self)($($var),*).into_interop(marshaler)
            }
        }
    };
}

impl_host_function!();
impl_host_function!(A0 a0 0);
impl_host_function!(A0 a0 0, A1 a1 1);
impl_host_function!(A0 a0 0, A1 a1 1, A2 a2 2);
impl_host_function!(A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3);
impl_host_function!(A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4);
impl_host_function!(A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4, A5 a5 5);

impl<T, F, R> HostMethod<T, ()> for F
where
    F: Fn(&mut T) -> R + 'static,
    R: IntoInterop,
{
    fn invoke(
        &self,
        target: &mut T,
        _args: &[InteropValue<'_>],
        marshaler: &mut Marshaler<'_>,
    ) -> InteropValue<'static> {
        (self)(target).into_interop(marshaler)
    }
}

impl<T, F, R, A0> HostMethod<T, (A0,)> for F
where
    F: Fn(&mut T, A0) -> R + 'static,
    R: IntoInterop,
    A0: FromInterop,
{
    fn invoke(
        &self,
        target: &mut T,
        args: &[InteropValue<'_>],
        marshaler: &mut Marshaler<'_>,
    ) -> InteropValue<'static> {
        let a0 = A0::from_interop(arg(args, 0), marshaler);
        (self)(target, a0).into_interop(marshaler)
    }
}

fn getter_handler<T, V, G>(get: G) -> Handler
where
    T: 'static,
    V: IntoInterop + 'static,
    G: Fn(&T) -> V + 'static,
{
    Box::new(
        move |target: Option<&dyn Any>, _args: &[InteropValue<'_>], marshaler: &mut Marshaler<'_>| {
            let cell = target?.downcast_ref::<RefCell<T>>()?;
            let value = get(&*cell.try_borrow().ok()?);
            Some(value.into_interop(marshaler))
        },
    )
}

fn setter_handler<T, V, S>(set: S) -> Handler
where
    T: 'static,
    V: FromInterop + 'static,
    S: Fn(&mut T, V) + 'static,
{
    Box::new(
        move |target: Option<&dyn Any>, args: &[InteropValue<'_>], marshaler: &mut Marshaler<'_>| {
            let cell = target?.downcast_ref::<RefCell<T>>()?;
            let value = V::from_interop(arg(args, 0), marshaler);
            set(&mut *cell.try_borrow_mut().ok()?, value);
            Some(InteropValue::Null)
        },
    )
}

fn method_handler<T, Args, F>(f: F) -> Handler
where
    T: 'static,
    Args: 'static,
    F: HostMethod<T, Args>,
{
    Box::new(
        move |target: Option<&dyn Any>, args: &[InteropValue<'_>], marshaler: &mut Marshaler<'_>| {
            let cell = target?.downcast_ref::<RefCell<T>>()?;
            let mut guard = cell.try_borrow_mut().ok()?;
            Some(f.invoke(&mut guard, args, marshaler))
        },
    )
}

fn function_handler<Args, F>(f: F) -> Handler
where
    Args: 'static,
    F: HostFunction<Args>,
{
    Box::new(
        move |_target: Option<&dyn Any>, args: &[InteropValue<'_>], marshaler: &mut Marshaler<'_>| {
            Some(f.invoke(args, marshaler))
        },
    )
}

fn static_setter_handler<V, S>(set: S) -> Handler
where
    V: FromInterop + 'static,
    S: Fn(V) + 'static,
{
    Box::new(
        move |_target: Option<&dyn Any>, args: &[InteropValue<'_>], marshaler: &mut Marshaler<'_>| {
            set(V::from_interop(arg(args, 0), marshaler));
            Some(InteropValue::Null)
        },
    )
}

impl InteropRuntime {
    fn bind_real<T: 'static>(&mut self, name: &str, kind: CallKind, is_static: bool, handler: Handler) {
        let ty = TypeId::of::<T>();
        self.registry
            .alias_type(hash_name(script_type_name::<T>()), ty);
        let key = FastPathKey::new(
            OwnerIdentity::RealType(ty),
            member_hash(name.as_bytes()),
            kind,
            is_static,
        );
        self.registry.insert(key, name, handler);
    }

    fn bind_named(&mut self, type_name: &str, name: &str, kind: CallKind, handler: Handler) {
        let owner = hash_name(type_name);
        self.registry.mark_named_static(owner);
        let key = FastPathKey::new(
            OwnerIdentity::NamedStatic(owner),
            member_hash(name.as_bytes()),
            kind,
            true,
        );
        self.registry.insert(key, name, handler);
    }

    /// Start a chained registration block for `T`.
    pub fn bind<T: 'static>(&mut self) -> TypeBindings<'_, T> {
        TypeBindings {
            rt: self,
            _marker: PhantomData,
        }
    }

    /// Script-facing alias for a host type, used by name-addressed dispatch.
    pub fn register_type_name<T: 'static>(&mut self, name: &str) {
        self.registry.alias_type(hash_name(name), TypeId::of::<T>());
    }

    pub fn register_property<T, V, G, S>(&mut self, name: &str, get: G, set: S)
    where
        T: 'static,
        V: FromInterop + IntoInterop + 'static,
        G: Fn(&T) -> V + 'static,
        S: Fn(&mut T, V) + 'static,
    {
        self.bind_real::<T>(name, CallKind::GetProp, false, getter_handler(get));
        self.bind_real::<T>(name, CallKind::SetProp, false, setter_handler(set));
    }

    pub fn register_getter<T, V, G>(&mut self, name: &str, get: G)
    where
        T: 'static,
        V: IntoInterop + 'static,
        G: Fn(&T) -> V + 'static,
    {
        self.bind_real::<T>(name, CallKind::GetProp, false, getter_handler(get));
    }

    pub fn register_method<T, Args, F>(&mut self, name: &str, f: F)
    where
        T: 'static,
        Args: 'static,
        F: HostMethod<T, Args>,
    {
        self.bind_real::<T>(name, CallKind::Method, false, method_handler(f));
    }

    pub fn register_static_property<T, V, G, S>(&mut self, name: &str, get: G, set: S)
    where
        T: 'static,
        V: FromInterop + IntoInterop + 'static,
        G: Fn() -> V + 'static,
        S: Fn(V) + 'static,
    {
        self.bind_real::<T>(name, CallKind::GetProp, true, function_handler::<(), _>(get));
        self.bind_real::<T>(name, CallKind::SetProp, true, static_setter_handler(set));
    }

    pub fn register_static_getter<T, V, G>(&mut self, name: &str, get: G)
    where
        T: 'static,
        V: IntoInterop + 'static,
        G: Fn() -> V + 'static,
    {
        self.bind_real::<T>(name, CallKind::GetProp, true, function_handler::<(), _>(get));
    }

    pub fn register_static_method<T, Args, F>(&mut self, name: &str, f: F)
    where
        T: 'static,
        Args: 'static,
        F: HostFunction<Args>,
    {
        self.bind_real::<T>(name, CallKind::Method, true, function_handler(f));
    }

    /// Static method on a script-only namespace such as `Mathf`.
    pub fn register_static_method_by_type_name<Args, F>(&mut self, type_name: &str, name: &str, f: F)
    where
        Args: 'static,
        F: HostFunction<Args>,
    {
        self.bind_named(type_name, name, CallKind::Method, function_handler(f));
    }

    /// Like [`register_static_method_by_type_name`](Self::register_static_method_by_type_name),
    /// returning a binding id for [`dispatch_by_id`](Self::dispatch_by_id).
    pub fn register_static_method_with_id<Args, F>(
        &mut self,
        type_name: &str,
        name: &str,
        f: F,
    ) -> Result<i32, InteropError>
    where
        Args: 'static,
        F: HostFunction<Args>,
    {
        self.register_static_method_by_type_name(type_name, name, f);
        let key = FastPathKey::new(
            OwnerIdentity::NamedStatic(hash_name(type_name)),
            member_hash(name.as_bytes()),
            CallKind::Method,
            true,
        );
        self.binding_ids.assign(key)
    }

    pub fn register_static_property_by_type_name<V, G, S>(
        &mut self,
        type_name: &str,
        name: &str,
        get: G,
        set: S,
    ) where
        V: FromInterop + IntoInterop + 'static,
        G: Fn() -> V + 'static,
        S: Fn(V) + 'static,
    {
        self.bind_named(type_name, name, CallKind::GetProp, function_handler::<(), _>(get));
        self.bind_named(type_name, name, CallKind::SetProp, static_setter_handler(set));
    }

    pub fn register_static_getter_by_type_name<V, G>(&mut self, type_name: &str, name: &str, get: G)
    where
        V: IntoInterop + 'static,
        G: Fn() -> V + 'static,
    {
        self.bind_named(type_name, name, CallKind::GetProp, function_handler::<(), _>(get));
    }

    /// Custom packer/unpacker for a value type.
    pub fn register_struct<T: 'static>(
        &mut self,
        pack: impl Fn(&T) -> InteropValue<'static> + 'static,
        unpack: impl Fn(&InteropValue<'_>) -> Option<T> + 'static,
    ) {
        self.structs.register(pack, unpack);
    }

    /// Packer synthesized from [`Blittable`] field metadata.
    pub fn register_blittable_struct<T: Blittable>(&mut self) -> bool {
        let warn = self.config.warn_on_lossy_structs;
        self.structs.register_blittable::<T>(warn)
    }

    pub fn register_dictionary_converter<T: 'static>(
        &mut self,
        convert: impl Fn(&Map<String, JsonValue>) -> T + 'static,
    ) {
        self.structs.register_dictionary_converter(convert);
    }
}

/// Chained registration for one host type.
///
/// ```ignore
/// rt.bind::<Transform>()
///     .property("position", |t: &Transform| t.position, |t: &mut Transform, p: Vec3| t.position = p)
///     .method("translate", |t: &mut Transform, by: Vec3| t.translate(by));
/// ```
pub struct TypeBindings<'rt, T> {
    rt: &'rt mut InteropRuntime,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> TypeBindings<'_, T> {
    pub fn property<V, G, S>(&mut self, name: &str, get: G, set: S) -> &mut Self
    where
        V: FromInterop + IntoInterop + 'static,
        G: Fn(&T) -> V + 'static,
        S: Fn(&mut T, V) + 'static,
    {
        self.rt.register_property::<T, V, G, S>(name, get, set);
        self
    }

    pub fn getter<V, G>(&mut self, name: &str, get: G) -> &mut Self
    where
        V: IntoInterop + 'static,
        G: Fn(&T) -> V + 'static,
    {
        self.rt.register_getter::<T, V, G>(name, get);
        self
    }

    pub fn method<Args, F>(&mut self, name: &str, f: F) -> &mut Self
    where
        Args: 'static,
        F: HostMethod<T, Args>,
    {
        self.rt.register_method::<T, Args, F>(name, f);
        self
    }

    pub fn static_property<V, G, S>(&mut self, name: &str, get: G, set: S) -> &mut Self
    where
        V: FromInterop + IntoInterop + 'static,
        G: Fn() -> V + 'static,
        S: Fn(V) + 'static,
    {
        self.rt.register_static_property::<T, V, G, S>(name, get, set);
        self
    }

    pub fn static_getter<V, G>(&mut self, name: &str, get: G) -> &mut Self
    where
        V: IntoInterop + 'static,
        G: Fn() -> V + 'static,
    {
        self.rt.register_static_getter::<T, V, G>(name, get);
        self
    }

    pub fn static_method<Args, F>(&mut self, name: &str, f: F) -> &mut Self
    where
        Args: 'static,
        F: HostFunction<Args>,
    {
        self.rt.register_static_method::<T, Args, F>(name, f);
        self
    }

    pub fn alias(&mut self, name: &str) -> &mut Self {
        self.rt.register_type_name::<T>(name);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{HandleTable, Shared};
    use crate::marshal::StructRegistry;
    use crate::shared;

    struct Counter {
        count: i32,
    }

    fn call(handler: &Handler, target: Option<&dyn Any>, args: &[InteropValue<'_>]) -> Option<InteropValue<'static>> {
        let structs = StructRegistry::new();
        let mut handles = HandleTable::new();
        let mut marshaler = Marshaler::new(&structs, &mut handles);
        handler(target, args, &mut marshaler)
    }

    #[test]
    fn test_function_arities() {
        let zero = function_handler(|| 7i32);
        let three = function_handler(|a: i32, b: i32, c: i32| a * 100 + b * 10 + c);
        let six = function_handler(|a: f32, b: f32, c: f32, d: f32, e: f32, f: f32| a + b + c + d + e + f);

        assert_eq!(call(&zero, None, &[]), Some(InteropValue::Int32(7)));
        assert_eq!(
            call(&three, None, &[InteropValue::Int32(1), InteropValue::Int32(2), InteropValue::Int32(3)]),
            Some(InteropValue::Int32(123))
        );
        let ones = vec![InteropValue::Float32(1.0); 6];
        assert_eq!(call(&six, None, &ones), Some(InteropValue::Float32(6.0)));
    }

    #[test]
    fn test_missing_args_decode_as_default() {
        let add = function_handler(|a: i32, b: i32| a + b);
        assert_eq!(call(&add, None, &[InteropValue::Int32(4)]), Some(InteropValue::Int32(4)));
    }

    #[test]
    fn test_method_handler_mutates_target() {
        let counter: Shared<Counter> = shared(Counter { count: 1 });
        let bump = method_handler(|c: &mut Counter, by: i32| {
            c.count += by;
            c.count
        });

        let target: &dyn Any = &*counter;
        let result = call(&bump, Some(target), &[InteropValue::Int32(4)]);
        assert_eq!(result, Some(InteropValue::Int32(5)));
        assert_eq!(counter.borrow().count, 5);
    }

    #[test]
    fn test_instance_handler_declines() {
        let counter = shared(Counter { count: 0 });
        let get = getter_handler(|c: &Counter| c.count);

        assert_eq!(call(&get, None, &[]), None);

        let wrong = shared(String::from("not a counter"));
        assert_eq!(call(&get, Some(&*wrong as &dyn Any), &[]), None);

        let set = setter_handler(|c: &mut Counter, v: i32| c.count = v);
        let _held = counter.borrow();
        assert_eq!(
            call(&set, Some(&*counter as &dyn Any), &[InteropValue::Int32(3)]),
            None
        );
    }
}
