//! Fast-path keys

use crate::error::InteropError;
use crate::hash::MEMBER_HASH_MASK;
use rustc_hash::FxHasher;
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// What a dispatch does with the member. Raw tags follow the native ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CallKind {
    Method = 1,
    GetProp = 2,
    SetProp = 3,
}

impl CallKind {
    #[inline]
    pub fn raw(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for CallKind {
    type Error = InteropError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(Self::Method),
            2 => Ok(Self::GetProp),
            3 => Ok(Self::SetProp),
            other => Err(InteropError::InvalidCallKind(other)),
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Method => "method",
            Self::GetProp => "get",
            Self::SetProp => "set",
        })
    }
}

/// Who owns a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerIdentity {
    /// A host type known at compile time.
    RealType(TypeId),
    /// A script-only static namespace (`Mathf`, `Random`), keyed by name hash.
    NamedStatic(u32),
}

impl OwnerIdentity {
    /// 32-bit digest used in [`FastPathKey::to_bits`].
    pub fn identity_hash(&self) -> u32 {
        match self {
            Self::RealType(id) => {
                let mut hasher = FxHasher::default();
                id.hash(&mut hasher);
                let h = hasher.finish();
                (h ^ (h >> 32)) as u32
            }
            Self::NamedStatic(hash) => *hash,
        }
    }
}

/// Registry key: owner, truncated member hash, call kind and static flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FastPathKey {
    pub owner: OwnerIdentity,
    member: u32,
    pub kind: CallKind,
    pub is_static: bool,
}

impl FastPathKey {
    pub fn new(owner: OwnerIdentity, member_hash: u32, kind: CallKind, is_static: bool) -> Self {
        Self {
            owner,
            member: member_hash & MEMBER_HASH_MASK,
            kind,
            is_static,
        }
    }

    #[inline]
    pub fn member(&self) -> u32 {
        self.member
    }

    /// Packed form: owner hash in the high 32 bits, member hash in the next
    /// 24, call kind and static flag in the low byte.
    pub fn to_bits(&self) -> u64 {
        let low = ((self.kind as u64) << 1) | self.is_static as u64;
        ((self.owner.identity_hash() as u64) << 32) | ((self.member as u64) << 8) | low
    }
}

impl fmt::Display for FastPathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.to_bits())
    }
}

/// Script-facing name of `T`: the last path segment without generics.
pub fn script_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
