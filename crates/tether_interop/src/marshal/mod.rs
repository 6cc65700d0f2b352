//! Struct marshaling
//!
//! Value types cross the boundary by one of three strategies, tried in order:
//! a custom packer/unpacker pair, a packer synthesized from [`Blittable`]
//! metadata, or the serde JSON fallback.

mod blittable;
pub mod json;

pub use blittable::{BlitField, Blittable, FieldKind, FieldMeta};
pub use serde_json::Value as JsonValue;

use crate::handle::HandleTable;
use crate::value::InteropValue;
use crate::{FromInterop, IntoInterop};
use blittable::camel_case;
use glam::{Vec3, Vec4};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Map;
use std::any::{Any, TypeId};
use tracing::{debug, warn};

type Packer<T> = Box<dyn Fn(&T) -> InteropValue<'static>>;
type Unpacker<T> = Box<dyn Fn(&InteropValue<'_>) -> Option<T>>;
type DictionaryConverter<T> = Box<dyn Fn(&Map<String, JsonValue>) -> T>;

/// How a registered type is packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructStrategy {
    Custom,
    Blittable,
}

struct StructCodec<T> {
    pack: Option<Packer<T>>,
    unpack: Option<Unpacker<T>>,
    from_map: Option<DictionaryConverter<T>>,
    strategy: StructStrategy,
}

impl<T> StructCodec<T> {
    fn empty(strategy: StructStrategy) -> Self {
        Self {
            pack: None,
            unpack: None,
            from_map: None,
            strategy,
        }
    }
}

/// Per-type packers keyed by `TypeId`.
///
/// A type with only a dictionary converter has a codec entry but no handler:
/// [`len`](Self::len) and [`has_handler`](Self::has_handler) both ignore it.
#[derive(Default)]
pub struct StructRegistry {
    codecs: FxHashMap<TypeId, Box<dyn Any>>,
    handled: FxHashSet<TypeId>,
    keep_existing: bool,
}

impl StructRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn codec<T: 'static>(&self) -> Option<&StructCodec<T>> {
        self.codecs.get(&TypeId::of::<T>())?.downcast_ref()
    }

    fn take_codec<T: 'static>(&mut self, strategy: StructStrategy) -> StructCodec<T> {
        self.codecs
            .remove(&TypeId::of::<T>())
            .and_then(|codec| codec.downcast::<StructCodec<T>>().ok())
            .map(|codec| *codec)
            .unwrap_or_else(|| StructCodec::empty(strategy))
    }

    fn put_codec<T: 'static>(&mut self, codec: StructCodec<T>) {
        let ty = TypeId::of::<T>();
        if codec.pack.is_some() || codec.unpack.is_some() {
            self.handled.insert(ty);
        }
        self.codecs.insert(ty, Box::new(codec));
    }

    /// While set, registrations leave types that already have a handler
    /// (or converter) alone.
    pub fn set_keep_existing(&mut self, keep: bool) {
        self.keep_existing = keep;
    }

    fn keeps<T: 'static>(&self) -> bool {
        if self.keep_existing && self.has_handler::<T>() {
            debug!("Keeping host codec for {}", std::any::type_name::<T>());
            return true;
        }
        false
    }

    /// Register a custom packer/unpacker pair. Replaces any earlier one.
    pub fn register<T: 'static>(
        &mut self,
        pack: impl Fn(&T) -> InteropValue<'static> + 'static,
        unpack: impl Fn(&InteropValue<'_>) -> Option<T> + 'static,
    ) {
        if self.keeps::<T>() {
            return;
        }
        if self.has_handler::<T>() {
            debug!("Replaced struct codec for {}", std::any::type_name::<T>());
        }
        let mut codec = self.take_codec::<T>(StructStrategy::Custom);
        codec.pack = Some(Box::new(pack));
        codec.unpack = Some(Box::new(unpack));
        codec.strategy = StructStrategy::Custom;
        self.put_codec(codec);
    }

    /// Add or replace the converter used for object-notation input.
    pub fn register_dictionary_converter<T: 'static>(
        &mut self,
        convert: impl Fn(&Map<String, JsonValue>) -> T + 'static,
    ) {
        let mut codec = self.take_codec::<T>(StructStrategy::Custom);
        if !(self.keep_existing && codec.from_map.is_some()) {
            codec.from_map = Some(Box::new(convert));
        }
        self.put_codec(codec);
    }

    /// Synthesize a packer, unpacker and dictionary converter from field
    /// metadata. Returns `false` when nothing could be registered.
    pub fn register_blittable<T: Blittable>(&mut self, warn_on_lossy: bool) -> bool {
        let fields = T::FIELDS;
        let type_name = std::any::type_name::<T>();

        if self.keeps::<T>() {
            return false;
        }

        if fields.is_empty() {
            warn!("{} has no blittable fields; using JSON fallback", type_name);
            return false;
        }
        if fields.len() > 4 && warn_on_lossy {
            warn!(
                "{} has {} fields; only the first 4 are packed",
                type_name,
                fields.len()
            );
        }

        let lanes = fields.len().min(4);
        let keys: Vec<(String, &'static str)> =
            fields.iter().map(|f| (camel_case(f.name), f.name)).collect();

        let mut codec = self.take_codec::<T>(StructStrategy::Blittable);
        codec.strategy = StructStrategy::Blittable;
        codec.pack = Some(Box::new(move |value: &T| {
            if lanes <= 3 {
                InteropValue::Vector3(Vec3::new(
                    value.read_lane(0),
                    value.read_lane(1),
                    value.read_lane(2),
                ))
            } else {
                InteropValue::Vector4(Vec4::new(
                    value.read_lane(0),
                    value.read_lane(1),
                    value.read_lane(2),
                    value.read_lane(3),
                ))
            }
        }));
        codec.unpack = Some(Box::new(move |slot: &InteropValue<'_>| {
            let packed: [f32; 4] = match slot {
                InteropValue::Vector3(v) => [v.x, v.y, v.z, 0.0],
                InteropValue::Vector4(v) => v.to_array(),
                _ => return None,
            };
            let mut value = T::default();
            for (i, lane) in packed.iter().take(lanes).enumerate() {
                value.write_lane(i, *lane);
            }
            Some(value)
        }));
        codec.from_map = Some(Box::new(move |map: &Map<String, JsonValue>| {
            let mut value = T::default();
            for (i, (camel, raw)) in keys.iter().enumerate() {
                if let Some(field) = map.get(camel.as_str()).or_else(|| map.get(*raw)) {
                    value.write_json(i, field);
                }
            }
            value
        }));
        self.put_codec(codec);
        true
    }

    /// Pack with the registered codec, if any.
    pub fn encode<T: 'static>(&self, value: &T) -> Option<InteropValue<'static>> {
        let pack = self.codec::<T>()?.pack.as_ref()?;
        Some(pack(value))
    }

    /// Unpack with the registered codec, falling back to its dictionary
    /// converter when the slot carries object notation.
    pub fn decode<T: 'static>(&self, slot: &InteropValue<'_>) -> Option<T> {
        let codec = self.codec::<T>()?;
        if let Some(value) = codec.unpack.as_ref().and_then(|unpack| unpack(slot)) {
            return Some(value);
        }
        let convert = codec.from_map.as_ref()?;
        json::parse_object(slot).map(|map| convert(&map))
    }

    /// Registered codec or JSON text.
    pub fn encode_or_json<T: Serialize + 'static>(&self, value: &T) -> InteropValue<'static> {
        self.encode(value)
            .unwrap_or_else(|| json::to_json_slot(value))
    }

    /// Registered codec, then JSON text, then `T::default()`.
    pub fn decode_or_default<T: DeserializeOwned + Default + 'static>(
        &self,
        slot: &InteropValue<'_>,
    ) -> T {
        self.decode(slot)
            .or_else(|| json::from_json_slot(slot))
            .unwrap_or_default()
    }

    pub fn has_handler<T: 'static>(&self) -> bool {
        self.handled.contains(&TypeId::of::<T>())
    }

    pub fn strategy_of<T: 'static>(&self) -> Option<StructStrategy> {
        if !self.has_handler::<T>() {
            return None;
        }
        self.codec::<T>().map(|codec| codec.strategy)
    }

    /// Types with a packer or unpacker.
    pub fn len(&self) -> usize {
        self.handled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handled.is_empty()
    }

    pub fn clear(&mut self) {
        self.codecs.clear();
        self.handled.clear();
    }
}

impl std::fmt::Debug for StructRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructRegistry")
            .field("types", &self.codecs.len())
            .finish()
    }
}

/// Conversion context handed to every codec: struct packers plus the handle
/// table for host objects.
pub struct Marshaler<'rt> {
    structs: &'rt StructRegistry,
    handles: &'rt mut HandleTable,
}

impl<'rt> Marshaler<'rt> {
    pub fn new(structs: &'rt StructRegistry, handles: &'rt mut HandleTable) -> Self {
        Self { structs, handles }
    }

    #[inline]
    pub fn structs(&self) -> &StructRegistry {
        self.structs
    }

    #[inline]
    pub fn handles(&self) -> &HandleTable {
        self.handles
    }

    #[inline]
    pub fn handles_mut(&mut self) -> &mut HandleTable {
        self.handles
    }

    pub fn encode<V: IntoInterop>(&mut self, value: V) -> InteropValue<'static> {
        value.into_interop(self)
    }

    pub fn decode<V: FromInterop>(&mut self, slot: &InteropValue<'_>) -> V {
        V::from_interop(slot, self)
    }
}

/// Implement [`FromInterop`](crate::FromInterop) and
/// [`IntoInterop`](crate::IntoInterop) for a value type through the struct
/// registry, with JSON as the fallback.
///
/// The type must be `Serialize + DeserializeOwned + Default`.
#[macro_export]
macro_rules! interop_struct {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::IntoInterop for $ty {
                fn into_interop(
                    self,
                    marshaler: &mut $crate::Marshaler<'_>,
                ) -> $crate::InteropValue<'static> {
                    marshaler.structs().encode_or_json(&self)
                }
            }

            impl $crate::FromInterop for $ty {
                fn from_interop(
                    value: &$crate::InteropValue<'_>,
                    marshaler: &mut $crate::Marshaler<'_>,
                ) -> Self {
                    marshaler.structs().decode_or_default(value)
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct Tint {
        r: f32,
        g: f32,
        b: f32,
        a: f32,
    }

    crate::blittable!(Tint {
        r: f32,
        g: f32,
        b: f32,
        a: f32
    });

    #[derive(Debug, Default, PartialEq)]
    struct Cell {
        grid_x: i32,
        grid_y: i32,
    }

    crate::blittable!(Cell {
        grid_x: i32,
        grid_y: i32
    });

    #[derive(Debug, Default, PartialEq)]
    struct Wide {
        a: f32,
        b: f32,
        c: f32,
        d: f32,
        e: f32,
    }

    crate::blittable!(Wide {
        a: f32,
        b: f32,
        c: f32,
        d: f32,
        e: f32
    });

    #[derive(Debug, Default)]
    struct Empty;

    crate::blittable!(Empty {});

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Loadout {
        slots: Vec<String>,
    }

    #[test]
    fn test_blittable_four_fields_pack_to_vector4() {
        let mut reg = StructRegistry::new();
        assert!(reg.register_blittable::<Tint>(true));
        assert_eq!(reg.strategy_of::<Tint>(), Some(StructStrategy::Blittable));

        let tint = Tint {
            r: 0.1,
            g: 0.2,
            b: 0.3,
            a: 0.4,
        };
        let slot = reg.encode(&tint).unwrap();
        assert_eq!(slot, InteropValue::Vector4(Vec4::new(0.1, 0.2, 0.3, 0.4)));
        assert_eq!(reg.decode::<Tint>(&slot), Some(tint));
    }

    #[test]
    fn test_blittable_two_fields_pack_to_vector3() {
        let mut reg = StructRegistry::new();
        reg.register_blittable::<Cell>(true);
        let slot = reg.encode(&Cell { grid_x: 3, grid_y: -2 }).unwrap();
        assert_eq!(slot, InteropValue::Vector3(Vec3::new(3.0, -2.0, 0.0)));
    }

    #[test]
    fn test_dictionary_converter_uses_camel_case() {
        let mut reg = StructRegistry::new();
        reg.register_blittable::<Cell>(true);
        let cell = reg
            .decode::<Cell>(&InteropValue::str(r#"{"gridX": 4, "grid_y": 9}"#))
            .unwrap();
        assert_eq!(cell, Cell { grid_x: 4, grid_y: 9 });
    }

    #[test]
    fn test_wide_struct_drops_extra_fields() {
        let mut reg = StructRegistry::new();
        assert!(reg.register_blittable::<Wide>(false));
        let wide = Wide {
            a: 1.0,
            b: 2.0,
            c: 3.0,
            d: 4.0,
            e: 5.0,
        };
        let back: Wide = reg.decode(&reg.encode(&wide).unwrap()).unwrap();
        assert_eq!(back.d, 4.0);
        assert_eq!(back.e, 0.0);
    }

    #[test]
    fn test_zero_fields_register_nothing() {
        let mut reg = StructRegistry::new();
        assert!(!reg.register_blittable::<Empty>(true));
        assert!(!reg.has_handler::<Empty>());
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn test_custom_overwrites_blittable() {
        let mut reg = StructRegistry::new();
        reg.register_blittable::<Tint>(true);
        reg.register::<Tint>(
            |t| InteropValue::Double(t.r as f64),
            |slot| slot.to_f64_lossy().map(|r| Tint { r: r as f32, ..Tint::default() }),
        );
        assert_eq!(reg.strategy_of::<Tint>(), Some(StructStrategy::Custom));
        assert_eq!(reg.len(), 1);
        assert_eq!(
            reg.encode(&Tint { r: 0.5, ..Tint::default() }),
            Some(InteropValue::Double(0.5))
        );
    }

    #[test]
    fn test_converter_alone_is_not_a_handler() {
        let mut reg = StructRegistry::new();
        reg.register_dictionary_converter::<Cell>(|map| Cell {
            grid_x: map.get("gridX").and_then(JsonValue::as_i64).unwrap_or(0) as i32,
            grid_y: 0,
        });
        assert!(!reg.has_handler::<Cell>());
        assert_eq!(reg.strategy_of::<Cell>(), None);
        assert_eq!(reg.len(), 0);
        assert!(reg.encode(&Cell::default()).is_none());

        let cell = reg.decode::<Cell>(&InteropValue::str(r#"{"gridX": 6}"#));
        assert_eq!(cell, Some(Cell { grid_x: 6, grid_y: 0 }));

        reg.register_blittable::<Cell>(true);
        assert!(reg.has_handler::<Cell>());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_keep_existing_preserves_host_codec() {
        let mut reg = StructRegistry::new();
        reg.register::<Tint>(
            |t| InteropValue::Double(t.g as f64),
            |_| None,
        );

        reg.set_keep_existing(true);
        assert!(!reg.register_blittable::<Tint>(true));
        assert!(reg.register_blittable::<Cell>(true));
        reg.set_keep_existing(false);

        assert_eq!(reg.strategy_of::<Tint>(), Some(StructStrategy::Custom));
        assert_eq!(
            reg.encode(&Tint { g: 0.25, ..Tint::default() }),
            Some(InteropValue::Double(0.25))
        );
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_json_fallback_and_default() {
        let reg = StructRegistry::new();
        let loadout = Loadout {
            slots: vec!["sword".into()],
        };
        let slot = reg.encode_or_json(&loadout);
        assert!(matches!(slot, InteropValue::JsonObject(_)));
        assert_eq!(reg.decode_or_default::<Loadout>(&slot), loadout);
        assert_eq!(
            reg.decode_or_default::<Loadout>(&InteropValue::Int32(5)),
            Loadout::default()
        );
    }
}
