//! Typed conversion to and from interop slots
//!
//! Decoding never fails: a slot of the wrong shape yields the type's default.

use crate::handle::{Handle, Shared};
use crate::key::script_type_name;
use crate::marshal::json::{parse_object, read_f32};
use crate::marshal::Marshaler;
use crate::value::InteropValue;
use glam::{Quat, Vec2, Vec3, Vec4};
use std::borrow::Cow;
use tracing::warn;

/// Build a host value from a slot.
pub trait FromInterop: Sized {
    fn from_interop(value: &InteropValue<'_>, marshaler: &mut Marshaler<'_>) -> Self;
}

/// Turn a host value into a result slot.
pub trait IntoInterop {
    fn into_interop(self, marshaler: &mut Marshaler<'_>) -> InteropValue<'static>;
}

impl FromInterop for bool {
    fn from_interop(value: &InteropValue<'_>, _: &mut Marshaler<'_>) -> Self {
        match value {
            InteropValue::Bool(b) => *b,
            InteropValue::String(s) => s.eq_ignore_ascii_case("true"),
            other => other.to_f64_lossy().is_some_and(|v| v != 0.0),
        }
    }
}

impl IntoInterop for bool {
    fn into_interop(self, _: &mut Marshaler<'_>) -> InteropValue<'static> {
        InteropValue::Bool(self)
    }
}

macro_rules! int_conversions {
    ($($ty:ty => $variant:ident as $wide:ty),* $(,)?) => {
        $(
            impl FromInterop for $ty {
                fn from_interop(value: &InteropValue<'_>, _: &mut Marshaler<'_>) -> Self {
                    value
                        .to_i64_lossy()
                        .map(|v| v.clamp(<$ty>::MIN as i64, <$ty>::MAX as i64) as $ty)
                        .unwrap_or_default()
                }
            }

            impl IntoInterop for $ty {
                fn into_interop(self, _: &mut Marshaler<'_>) -> InteropValue<'static> {
                    InteropValue::$variant(self as $wide)
                }
            }
        )*
    };
}

int_conversions! {
    i32 => Int32 as i32,
    u32 => Int64 as i64,
}

impl FromInterop for i64 {
    fn from_interop(value: &InteropValue<'_>, _: &mut Marshaler<'_>) -> Self {
        value.to_i64_lossy().unwrap_or_default()
    }
}

impl IntoInterop for i64 {
    fn into_interop(self, _: &mut Marshaler<'_>) -> InteropValue<'static> {
        InteropValue::Int64(self)
    }
}

impl FromInterop for u64 {
    fn from_interop(value: &InteropValue<'_>, _: &mut Marshaler<'_>) -> Self {
        value.to_i64_lossy().map(|v| v.max(0) as u64).unwrap_or_default()
    }
}

impl IntoInterop for u64 {
    fn into_interop(self, _: &mut Marshaler<'_>) -> InteropValue<'static> {
        InteropValue::Int64(self.min(i64::MAX as u64) as i64)
    }
}

impl FromInterop for f32 {
    fn from_interop(value: &InteropValue<'_>, _: &mut Marshaler<'_>) -> Self {
        value.to_f64_lossy().unwrap_or_default() as f32
    }
}

impl IntoInterop for f32 {
    fn into_interop(self, _: &mut Marshaler<'_>) -> InteropValue<'static> {
        InteropValue::Float32(self)
    }
}

impl FromInterop for f64 {
    fn from_interop(value: &InteropValue<'_>, _: &mut Marshaler<'_>) -> Self {
        value.to_f64_lossy().unwrap_or_default()
    }
}

impl IntoInterop for f64 {
    fn into_interop(self, _: &mut Marshaler<'_>) -> InteropValue<'static> {
        InteropValue::Double(self)
    }
}

impl FromInterop for String {
    fn from_interop(value: &InteropValue<'_>, _: &mut Marshaler<'_>) -> Self {
        match value {
            InteropValue::Null => String::new(),
            InteropValue::String(s) | InteropValue::JsonObject(s) => s.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoInterop for String {
    fn into_interop(self, _: &mut Marshaler<'_>) -> InteropValue<'static> {
        InteropValue::String(Cow::Owned(self))
    }
}

impl IntoInterop for &'static str {
    fn into_interop(self, _: &mut Marshaler<'_>) -> InteropValue<'static> {
        InteropValue::String(Cow::Borrowed(self))
    }
}

impl FromInterop for Option<String> {
    fn from_interop(value: &InteropValue<'_>, marshaler: &mut Marshaler<'_>) -> Self {
        if value.is_null() {
            None
        } else {
            Some(String::from_interop(value, marshaler))
        }
    }
}

impl IntoInterop for Option<String> {
    fn into_interop(self, marshaler: &mut Marshaler<'_>) -> InteropValue<'static> {
        self.map_or(InteropValue::Null, |s| s.into_interop(marshaler))
    }
}

impl IntoInterop for () {
    fn into_interop(self, _: &mut Marshaler<'_>) -> InteropValue<'static> {
        InteropValue::Null
    }
}

impl FromInterop for InteropValue<'static> {
    fn from_interop(value: &InteropValue<'_>, _: &mut Marshaler<'_>) -> Self {
        value.clone().into_owned()
    }
}

impl IntoInterop for InteropValue<'static> {
    fn into_interop(self, _: &mut Marshaler<'_>) -> InteropValue<'static> {
        self
    }
}

fn vec3_from_map(value: &InteropValue<'_>, fallback: Vec3) -> Vec3 {
    match parse_object(value) {
        Some(map) => Vec3::new(
            read_f32(&map, "x").unwrap_or_default(),
            read_f32(&map, "y").unwrap_or_default(),
            read_f32(&map, "z").unwrap_or_default(),
        ),
        None => fallback,
    }
}

impl FromInterop for Vec2 {
    fn from_interop(value: &InteropValue<'_>, _: &mut Marshaler<'_>) -> Self {
        match value {
            InteropValue::Vector3(v) => v.truncate(),
            InteropValue::Vector4(v) => Vec2::new(v.x, v.y),
            other => vec3_from_map(other, Vec3::ZERO).truncate(),
        }
    }
}

impl IntoInterop for Vec2 {
    fn into_interop(self, _: &mut Marshaler<'_>) -> InteropValue<'static> {
        InteropValue::Vector3(self.extend(0.0))
    }
}

impl FromInterop for Vec3 {
    fn from_interop(value: &InteropValue<'_>, _: &mut Marshaler<'_>) -> Self {
        match value {
            InteropValue::Vector3(v) => *v,
            InteropValue::Vector4(v) => v.truncate(),
            other => vec3_from_map(other, Vec3::ZERO),
        }
    }
}

impl IntoInterop for Vec3 {
    fn into_interop(self, _: &mut Marshaler<'_>) -> InteropValue<'static> {
        InteropValue::Vector3(self)
    }
}

impl FromInterop for Vec4 {
    fn from_interop(value: &InteropValue<'_>, _: &mut Marshaler<'_>) -> Self {
        match value {
            InteropValue::Vector4(v) => *v,
            InteropValue::Vector3(v) => v.extend(0.0),
            other => match parse_object(other) {
                Some(map) => Vec4::new(
                    read_f32(&map, "x").unwrap_or_default(),
                    read_f32(&map, "y").unwrap_or_default(),
                    read_f32(&map, "z").unwrap_or_default(),
                    read_f32(&map, "w").unwrap_or_default(),
                ),
                None => Vec4::ZERO,
            },
        }
    }
}

impl IntoInterop for Vec4 {
    fn into_interop(self, _: &mut Marshaler<'_>) -> InteropValue<'static> {
        InteropValue::Vector4(self)
    }
}

impl FromInterop for Quat {
    fn from_interop(value: &InteropValue<'_>, _: &mut Marshaler<'_>) -> Self {
        match value {
            InteropValue::Vector4(v) => Quat::from_vec4(*v),
            other => match parse_object(other) {
                Some(map) => Quat::from_xyzw(
                    read_f32(&map, "x").unwrap_or(0.0),
                    read_f32(&map, "y").unwrap_or(0.0),
                    read_f32(&map, "z").unwrap_or(0.0),
                    read_f32(&map, "w").unwrap_or(1.0),
                ),
                None => Quat::IDENTITY,
            },
        }
    }
}

impl IntoInterop for Quat {
    fn into_interop(self, _: &mut Marshaler<'_>) -> InteropValue<'static> {
        InteropValue::Vector4(Vec4::from(self))
    }
}

impl IntoInterop for Handle {
    fn into_interop(self, _: &mut Marshaler<'_>) -> InteropValue<'static> {
        InteropValue::handle(self)
    }
}

impl FromInterop for Option<Handle> {
    fn from_interop(value: &InteropValue<'_>, _: &mut Marshaler<'_>) -> Self {
        value.as_handle()
    }
}

/// Host objects cross as fresh handles.
impl<T: 'static> IntoInterop for Shared<T> {
    fn into_interop(self, marshaler: &mut Marshaler<'_>) -> InteropValue<'static> {
        let type_hint = script_type_name::<T>();
        match marshaler.handles_mut().register(self) {
            Ok(handle) => InteropValue::ObjectHandle {
                handle,
                type_hint: Some(type_hint),
            },
            Err(err) => {
                warn!("Cannot hand {} to script: {}", type_hint, err);
                InteropValue::Null
            }
        }
    }
}

/// Stale, released or mistyped handles decode to `None`.
impl<T: 'static> FromInterop for Option<Shared<T>> {
    fn from_interop(value: &InteropValue<'_>, marshaler: &mut Marshaler<'_>) -> Self {
        let handle = value.as_handle()?;
        marshaler.handles().resolve_as::<T>(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{shared, HandleTable};
    use crate::marshal::StructRegistry;

    fn with_marshaler<R>(f: impl FnOnce(&mut Marshaler<'_>) -> R) -> R {
        let structs = StructRegistry::new();
        let mut handles = HandleTable::new();
        let mut marshaler = Marshaler::new(&structs, &mut handles);
        f(&mut marshaler)
    }

    #[test]
    fn test_primitive_round_trip() {
        with_marshaler(|m| {
            let slot = m.encode(true);
            assert!(m.decode::<bool>(&slot));
            let slot = m.encode(-17i32);
            assert_eq!(m.decode::<i32>(&slot), -17);
            let slot = m.encode(1i64 << 40);
            assert_eq!(m.decode::<i64>(&slot), 1i64 << 40);
            let slot = m.encode(0.25f32);
            assert_eq!(m.decode::<f32>(&slot), 0.25);
            let slot = m.encode(1.0e300f64);
            assert_eq!(m.decode::<f64>(&slot), 1.0e300);
            let slot = m.encode(String::from("hello"));
            assert_eq!(m.decode::<String>(&slot), "hello");
        });
    }

    #[test]
    fn test_permissive_numeric_decoding() {
        with_marshaler(|m| {
            assert_eq!(m.decode::<f32>(&InteropValue::Int32(3)), 3.0);
            assert_eq!(m.decode::<i32>(&InteropValue::Double(2.9)), 2);
            assert_eq!(m.decode::<i32>(&InteropValue::Double(1e20)), i32::MAX);
            assert_eq!(m.decode::<i32>(&InteropValue::Bool(true)), 1);
            assert_eq!(m.decode::<f64>(&InteropValue::str("1.5")), 1.5);
            assert_eq!(m.decode::<u32>(&InteropValue::Int32(-4)), 0);
            assert_eq!(m.decode::<f32>(&InteropValue::Vector3(Vec3::ONE)), 0.0);
        });
    }

    #[test]
    fn test_vectors() {
        with_marshaler(|m| {
            assert_eq!(
                m.encode(Vec2::new(1.0, 2.0)),
                InteropValue::Vector3(Vec3::new(1.0, 2.0, 0.0))
            );
            let v = m.decode::<Vec3>(&InteropValue::str(r#"{"x":1,"y":2,"z":3}"#));
            assert_eq!(v, Vec3::new(1.0, 2.0, 3.0));
            assert_eq!(m.decode::<Vec3>(&InteropValue::Null), Vec3::ZERO);
            assert_eq!(m.decode::<Quat>(&InteropValue::Null), Quat::IDENTITY);

            let q = Quat::from_rotation_y(0.5);
            let slot = m.encode(q);
            assert!((m.decode::<Quat>(&slot).dot(q) - 1.0).abs() < 1e-6);
        });
    }

    #[test]
    fn test_optional_string() {
        with_marshaler(|m| {
            assert_eq!(m.decode::<Option<String>>(&InteropValue::Null), None);
            assert_eq!(
                m.decode::<Option<String>>(&InteropValue::str("a")),
                Some("a".to_string())
            );
            assert!(m.encode(None::<String>).is_null());
            assert!(m.encode(()).is_null());
        });
    }

    #[test]
    fn test_shared_objects_cross_as_handles() {
        struct Door {
            open: bool,
        }

        with_marshaler(|m| {
            let door = shared(Door { open: false });
            let slot = m.encode(door.clone());
            let InteropValue::ObjectHandle { handle, type_hint } = slot else {
                panic!("expected a handle, got {slot:?}");
            };
            assert_eq!(type_hint, Some("Door"));

            let back = m.decode::<Option<Shared<Door>>>(&slot).unwrap();
            back.borrow_mut().open = true;
            assert!(door.borrow().open);

            m.handles_mut().release(handle);
            assert!(m.decode::<Option<Shared<Door>>>(&slot).is_none());
            assert!(m.decode::<Option<Shared<String>>>(&InteropValue::Int32(99)).is_none());
        });
    }
}
