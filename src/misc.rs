// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

/* misc utilities that do not really belong in any module */
use crate::pkcs11::*;

pub const CK_ULONG_SIZE: usize = std::mem::size_of::<CK_ULONG>();

#[macro_export]
macro_rules! void_ptr {
    ($ptr:expr) => {
        $ptr as *const _ as CK_VOID_PTR
    };
}
pub use void_ptr;

#[macro_export]
macro_rules! sizeof {
    ($type:ty) => {
        CK_ULONG::try_from(std::mem::size_of::<$type>())?
    };
}
pub use sizeof;

/// Converts a Cryptoki fixed size, blank padded, field into a String
pub fn padded_to_string(field: &[u8]) -> String {
    let end = field
        .iter()
        .rposition(|c| *c != b' ' && *c != 0)
        .map_or(0, |p| p + 1);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

pub fn version_pair(v: &CK_VERSION) -> (u8, u8) {
    (v.major, v.minor)
}

/// Converts a token counter into `None` when the token does not track it
pub fn ulong_or_unavailable(v: CK_ULONG) -> Option<CK_ULONG> {
    if v == CK_UNAVAILABLE_INFORMATION {
        None
    } else {
        Some(v)
    }
}
