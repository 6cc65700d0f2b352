//! Compile-time field metadata for packed value types
//!
//! [`blittable!`](crate::blittable) lists a struct's numeric fields once; the
//! registry turns that list into a packer, an unpacker and a dictionary
//! converter when the type is registered.

use serde_json::Value;

/// Numeric field kinds that fit in a float lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Int32,
    Float32,
    Float64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMeta {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// A field type that converts to and from one `f32` lane.
pub trait BlitField: Copy {
    const KIND: FieldKind;

    fn to_lane(self) -> f32;
    fn from_lane(lane: f32) -> Self;
    fn from_json(value: &Value) -> Option<Self>;
}

impl BlitField for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn to_lane(self) -> f32 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    fn from_lane(lane: f32) -> Self {
        lane != 0.0
    }

    fn from_json(value: &Value) -> Option<Self> {
        value.as_bool().or_else(|| value.as_f64().map(|v| v != 0.0))
    }
}

impl BlitField for i32 {
    const KIND: FieldKind = FieldKind::Int32;

    fn to_lane(self) -> f32 {
        self as f32
    }

    fn from_lane(lane: f32) -> Self {
        lane as i32
    }

    fn from_json(value: &Value) -> Option<Self> {
        value
            .as_i64()
            .map(|v| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
            .or_else(|| value.as_f64().map(|v| v as i32))
    }
}

impl BlitField for f32 {
    const KIND: FieldKind = FieldKind::Float32;

    fn to_lane(self) -> f32 {
        self
    }

    fn from_lane(lane: f32) -> Self {
        lane
    }

    fn from_json(value: &Value) -> Option<Self> {
        value.as_f64().map(|v| v as f32)
    }
}

impl BlitField for f64 {
    const KIND: FieldKind = FieldKind::Float64;

    fn to_lane(self) -> f32 {
        self as f32
    }

    fn from_lane(lane: f32) -> Self {
        lane as f64
    }

    fn from_json(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

/// A plain value type whose numeric fields pack into vector lanes.
///
/// Implement with [`blittable!`](crate::blittable) rather than by hand.
pub trait Blittable: Default + 'static {
    /// Fields in declaration order.
    const FIELDS: &'static [FieldMeta];

    /// Lane value of field `index`; `0.0` past the last field.
    fn read_lane(&self, index: usize) -> f32;

    /// Store `lane` into field `index`; ignored past the last field.
    fn write_lane(&mut self, index: usize, lane: f32);

    /// Store a JSON value into field `index`. Returns `false` if it does not fit.
    fn write_json(&mut self, index: usize, value: &Value) -> bool;
}

/// `snake_case` to `camelCase`, as scripts spell field names.
pub(crate) fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Implement [`Blittable`] for a struct by listing its numeric fields.
///
/// ```ignore
/// #[derive(Default)]
/// struct Tint { r: f32, g: f32, b: f32, a: f32 }
/// blittable!(Tint { r: f32, g: f32, b: f32, a: f32 });
/// ```
#[macro_export]
macro_rules! blittable {
    ($ty:ty { $($field:ident : $fty:ty),* $(,)? }) => {
        impl $crate::marshal::Blittable for $ty {
            const FIELDS: &'static [$crate::marshal::FieldMeta] = &[
                $($crate::marshal::FieldMeta {
                    name: stringify!($field),
                    kind: <$fty as $crate::marshal::BlitField>::KIND,
                }),*
            ];

            #[allow(unused_variables, unused_mut, unused_assignments)]
            fn read_lane(&self, index: usize) -> f32 {
                let mut i = 0usize;
                $(
                    if i == index {
                        return <$fty as $crate::marshal::BlitField>::to_lane(self.$field);
                    }
                    i += 1;
                )*
                0.0
            }

            #[allow(unused_variables, unused_mut, unused_assignments)]
            fn write_lane(&mut self, index: usize, lane: f32) {
                let mut i = 0usize;
                $(
                    if i == index {
                        self.$field = <$fty as $crate::marshal::BlitField>::from_lane(lane);
                        return;
                    }
                    i += 1;
                )*
            }

            #[allow(unused_variables, unused_mut, unused_assignments)]
            fn write_json(&mut self, index: usize, value: &$crate::marshal::JsonValue) -> bool {
                let mut i = 0usize;
                $(
                    if i == index {
                        return match <$fty as $crate::marshal::BlitField>::from_json(value) {
                            Some(v) => {
                                self.$field = v;
                                true
                            }
                            None => false,
                        };
                    }
                    i += 1;
                )*
                false
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Stats {
        health: i32,
        speed: f32,
        alive: bool,
    }

    crate::blittable!(Stats {
        health: i32,
        speed: f32,
        alive: bool,
    });

    #[test]
    fn test_fields_in_declaration_order() {
        let names: Vec<_> = Stats::FIELDS.iter().map(|f| f.name).collect();
        assert_eq!(names, ["health", "speed", "alive"]);
        assert_eq!(Stats::FIELDS[2].kind, FieldKind::Bool);
    }

    #[test]
    fn test_lanes() {
        let mut stats = Stats::default();
        stats.write_lane(0, 42.9);
        stats.write_lane(1, 1.5);
        stats.write_lane(2, 1.0);
        stats.write_lane(9, 5.0);
        assert_eq!(
            stats,
            Stats {
                health: 42,
                speed: 1.5,
                alive: true
            }
        );
        assert_eq!(stats.read_lane(0), 42.0);
        assert_eq!(stats.read_lane(3), 0.0);
    }

    #[test]
    fn test_write_json_checks_shape() {
        let mut stats = Stats::default();
        assert!(stats.write_json(0, &Value::from(7)));
        assert!(!stats.write_json(1, &Value::from("fast")));
        assert!(stats.write_json(2, &Value::from(true)));
        assert_eq!(stats.health, 7);
        assert!(stats.alive);
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("local_scale"), "localScale");
        assert_eq!(camel_case("x"), "x");
        assert_eq!(camel_case("_private_field"), "privateField");
    }
}
