//! Name hashing shared by registration and dispatch
//!
//! 32-bit FNV-1a over the low 7 bits of each character. Hashing raw bytes and
//! hashing a `&str` agree for ASCII names, and byte hashing stops at the first
//! NUL so C-string buffers hash the same as their trimmed slice.

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Member hashes keep only their low 24 bits inside a [`FastPathKey`](crate::FastPathKey).
pub const MEMBER_HASH_MASK: u32 = 0x00FF_FFFF;

#[inline]
const fn step(hash: u32, unit: u32) -> u32 {
    (hash ^ (unit & 0x7F)).wrapping_mul(FNV_PRIME)
}

/// Hash a name given as text.
pub fn hash_name(name: &str) -> u32 {
    let mut hash = FNV_OFFSET;
    for c in name.chars() {
        if c == '\0' {
            break;
        }
        hash = step(hash, c as u32);
    }
    hash
}

/// Hash a name given as raw bytes, stopping at the first NUL.
pub const fn hash_name_bytes(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == 0 {
            break;
        }
        hash = step(hash, b as u32);
        i += 1;
    }
    hash
}

/// Hash as stored in a fast-path key.
#[inline]
pub fn member_hash(name: &[u8]) -> u32 {
    hash_name_bytes(name) & MEMBER_HASH_MASK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_and_str_agree() {
        for name in ["", "deltaTime", "position", "lookAt", "Vector3", "x"] {
            assert_eq!(hash_name(name), hash_name_bytes(name.as_bytes()), "{name}");
        }
    }

    #[test]
    fn test_nul_terminates() {
        assert_eq!(hash_name_bytes(b"time\0garbage"), hash_name("time"));
        assert_eq!(hash_name("time\0garbage"), hash_name("time"));
    }

    #[test]
    fn test_empty_is_offset_basis() {
        assert_eq!(hash_name(""), FNV_OFFSET);
    }

    #[test]
    fn test_distinct_names_differ() {
        assert_ne!(hash_name("time"), hash_name("timeScale"));
        assert_ne!(member_hash(b"width"), member_hash(b"height"));
    }

    #[test]
    fn test_const_evaluable() {
        const H: u32 = hash_name_bytes(b"frameCount");
        assert_eq!(H, hash_name("frameCount"));
    }
}
