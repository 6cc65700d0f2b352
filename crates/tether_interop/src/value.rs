//! Interop value - one argument or return slot
//!
//! A fixed-size tagged union shared by both sides of the boundary. Primitive
//! payloads live inline; strings borrow the caller's buffer for the duration
//! of the call (`Cow::Borrowed`) and only results own their text.

use crate::handle::Handle;
use glam::{Vec3, Vec4};
use std::borrow::Cow;
use std::fmt;

/// Tagged slot for one value crossing the script/host boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteropValue<'a> {
    #[default]
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Double(f64),
    /// UTF-8 text, valid until the call completes unless owned.
    String(Cow<'a, str>),
    /// Three packed floats (vectors, blittable structs with up to 3 fields).
    Vector3(Vec3),
    /// Four packed floats (quaternions, colors, 4-field blittable structs).
    Vector4(Vec4),
    /// Host object reference. `type_hint` names the host type for diagnostics.
    ObjectHandle {
        handle: Handle,
        type_hint: Option<&'static str>,
    },
    /// Object notation text, produced by the generic struct fallback.
    JsonObject(Cow<'a, str>),
}

/// Shared `Null` returned for missing argument slots.
pub(crate) static NULL_SLOT: InteropValue<'static> = InteropValue::Null;

/// Bare discriminant of an [`InteropValue`], with the wire tags used by the
/// native glue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum InteropKind {
    Null = 0,
    Bool = 1,
    Int32 = 2,
    Double = 3,
    String = 4,
    ObjectHandle = 5,
    Int64 = 6,
    Float32 = 7,
    JsonObject = 9,
    Vector3 = 10,
    Vector4 = 11,
}

impl InteropKind {
    #[inline]
    pub fn tag(self) -> i32 {
        self as i32
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        Some(match tag {
            0 => Self::Null,
            1 => Self::Bool,
            2 => Self::Int32,
            3 => Self::Double,
            4 => Self::String,
            5 => Self::ObjectHandle,
            6 => Self::Int64,
            7 => Self::Float32,
            9 => Self::JsonObject,
            10 => Self::Vector3,
            11 => Self::Vector4,
            _ => return None,
        })
    }
}

impl fmt::Display for InteropKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Double => "double",
            Self::String => "string",
            Self::Vector3 => "vector3",
            Self::Vector4 => "vector4",
            Self::ObjectHandle => "object",
            Self::JsonObject => "json",
        };
        f.write_str(name)
    }
}

impl<'a> InteropValue<'a> {
    #[inline]
    pub fn kind(&self) -> InteropKind {
        match self {
            Self::Null => InteropKind::Null,
            Self::Bool(_) => InteropKind::Bool,
            Self::Int32(_) => InteropKind::Int32,
            Self::Int64(_) => InteropKind::Int64,
            Self::Float32(_) => InteropKind::Float32,
            Self::Double(_) => InteropKind::Double,
            Self::String(_) => InteropKind::String,
            Self::Vector3(_) => InteropKind::Vector3,
            Self::Vector4(_) => InteropKind::Vector4,
            Self::ObjectHandle { .. } => InteropKind::ObjectHandle,
            Self::JsonObject(_) => InteropKind::JsonObject,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrowed string slot; no copy.
    #[inline]
    pub fn str(text: &'a str) -> Self {
        Self::String(Cow::Borrowed(text))
    }

    /// Owned string slot, for results that outlive the call.
    #[inline]
    pub fn owned_str(text: impl Into<String>) -> InteropValue<'static> {
        InteropValue::String(Cow::Owned(text.into()))
    }

    #[inline]
    pub fn handle(handle: Handle) -> Self {
        Self::ObjectHandle {
            handle,
            type_hint: None,
        }
    }

    /// Text payload of `String` and `JsonObject` slots.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::JsonObject(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            Self::ObjectHandle { handle, .. } => Some(*handle),
            Self::Int32(raw) => Handle::new(*raw),
            _ => None,
        }
    }

    /// Numeric view of scalar slots: bools become 0/1, numeric text is parsed.
    pub fn to_f64_lossy(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int32(v) => Some(*v as f64),
            Self::Int64(v) => Some(*v as f64),
            Self::Float32(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Integer view of scalar slots. Floats truncate toward zero, saturating.
    pub fn to_i64_lossy(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(*b as i64),
            Self::Int32(v) => Some(*v as i64),
            Self::Int64(v) => Some(*v),
            Self::Float32(v) => Some(*v as i64),
            Self::Double(v) => Some(*v as i64),
            Self::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            _ => None,
        }
    }

    /// Detach from the borrowed buffer, copying text if needed.
    pub fn into_owned(self) -> InteropValue<'static> {
        match self {
            Self::Null => InteropValue::Null,
            Self::Bool(v) => InteropValue::Bool(v),
            Self::Int32(v) => InteropValue::Int32(v),
            Self::Int64(v) => InteropValue::Int64(v),
            Self::Float32(v) => InteropValue::Float32(v),
            Self::Double(v) => InteropValue::Double(v),
            Self::String(s) => InteropValue::String(Cow::Owned(s.into_owned())),
            Self::Vector3(v) => InteropValue::Vector3(v),
            Self::Vector4(v) => InteropValue::Vector4(v),
            Self::ObjectHandle { handle, type_hint } => {
                InteropValue::ObjectHandle { handle, type_hint }
            }
            Self::JsonObject(s) => InteropValue::JsonObject(Cow::Owned(s.into_owned())),
        }
    }

    /// Borrowing copy of this slot. Text is not copied.
    pub fn reborrow(&self) -> InteropValue<'_> {
        match self {
            Self::String(s) => InteropValue::String(Cow::Borrowed(s)),
            Self::JsonObject(s) => InteropValue::JsonObject(Cow::Borrowed(s)),
            Self::Null => InteropValue::Null,
            Self::Bool(v) => InteropValue::Bool(*v),
            Self::Int32(v) => InteropValue::Int32(*v),
            Self::Int64(v) => InteropValue::Int64(*v),
            Self::Float32(v) => InteropValue::Float32(*v),
            Self::Double(v) => InteropValue::Double(*v),
            Self::Vector3(v) => InteropValue::Vector3(*v),
            Self::Vector4(v) => InteropValue::Vector4(*v),
            Self::ObjectHandle { handle, type_hint } => InteropValue::ObjectHandle {
                handle: *handle,
                type_hint: *type_hint,
            },
        }
    }
}

impl fmt::Display for InteropValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Vector3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Self::Vector4(v) => write!(f, "({}, {}, {}, {})", v.x, v.y, v.z, v.w),
            Self::ObjectHandle {
                handle,
                type_hint: Some(hint),
            } => write!(f, "<{hint} #{handle}>"),
            Self::ObjectHandle { handle, .. } => write!(f, "<object #{handle}>"),
            Self::JsonObject(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_round_trip() {
        for tag in -1..16 {
            if let Some(kind) = InteropKind::from_tag(tag) {
                assert_eq!(kind.tag(), tag);
            }
        }
        assert_eq!(InteropKind::from_tag(8), None);
        assert_eq!(InteropValue::Vector3(Vec3::ONE).kind(), InteropKind::Vector3);
    }

    #[test]
    fn test_default_is_null() {
        assert!(InteropValue::default().is_null());
        assert_eq!(InteropValue::default().kind(), InteropKind::Null);
    }

    #[test]
    fn test_slot_stays_small() {
        assert!(std::mem::size_of::<InteropValue<'static>>() <= 48);
    }

    #[test]
    fn test_lossy_views() {
        assert_eq!(InteropValue::Bool(true).to_f64_lossy(), Some(1.0));
        assert_eq!(InteropValue::str(" 42 ").to_i64_lossy(), Some(42));
        assert_eq!(InteropValue::str("2.9").to_i64_lossy(), Some(2));
        assert_eq!(InteropValue::Double(-3.7).to_i64_lossy(), Some(-3));
        assert_eq!(InteropValue::Vector3(Vec3::ONE).to_f64_lossy(), None);
    }

    #[test]
    fn test_into_owned_detaches_text() {
        let text = String::from("hello");
        let owned = InteropValue::str(&text).into_owned();
        drop(text);
        assert_eq!(owned.as_str(), Some("hello"));
    }

    #[test]
    fn test_as_handle_accepts_positive_ints() {
        assert_eq!(InteropValue::Int32(3).as_handle(), Handle::new(3));
        assert_eq!(InteropValue::Int32(0).as_handle(), None);
        assert_eq!(InteropValue::Int32(-1).as_handle(), None);
    }
}
