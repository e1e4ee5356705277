// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! This module provides [CkAttrs], a managed array of `CK_ATTRIBUTE`s
//! used to build the templates handed to the key generation functions.
//!
//! All values are copied into storage owned by the array, so the raw
//! pointers stored in each `CK_ATTRIBUTE` stay valid for as long as the
//! array itself is alive.

use crate::error::{Error, Result};
use crate::misc::void_ptr;
use crate::pkcs11::*;

macro_rules! attr_names {
    ($typ:expr; $($name:ident),* $(,)?) => {
        match $typ {
            $($name => std::stringify!($name),)*
            _ => "CKA_VENDOR_DEFINED or unknown",
        }
    };
}

/// Returns the printable name of the attributes this client emits
pub fn attr_name(typ: CK_ATTRIBUTE_TYPE) -> &'static str {
    attr_names!(typ;
        CKA_CLASS,
        CKA_TOKEN,
        CKA_PRIVATE,
        CKA_LABEL,
        CKA_VALUE,
        CKA_KEY_TYPE,
        CKA_ID,
        CKA_SENSITIVE,
        CKA_ENCRYPT,
        CKA_DECRYPT,
        CKA_WRAP,
        CKA_UNWRAP,
        CKA_SIGN,
        CKA_VERIFY,
        CKA_DERIVE,
        CKA_MODULUS,
        CKA_MODULUS_BITS,
        CKA_PUBLIC_EXPONENT,
        CKA_VALUE_LEN,
        CKA_EXTRACTABLE,
        CKA_MODIFIABLE,
        CKA_EC_PARAMS,
        CKA_EC_POINT,
    )
}

/// Helper object to represent managed arrays of CK_ATTRIBUTEs
///
/// Attribute types are unique within one array, adding the same type
/// twice is rejected.
pub struct CkAttrs {
    /// Storage for the byte buffers backing each attribute value.
    v: Vec<Vec<u8>>,
    /// The actual `CK_ATTRIBUTE` array, `p[i]` points into `v[i]`.
    p: Vec<CK_ATTRIBUTE>,
}

impl CkAttrs {
    /// Creates a new empty managed array of CK_ATTRIBUTEs
    pub fn new() -> CkAttrs {
        Self::with_capacity(0)
    }

    /// Creates a new empty managed array of CK_ATTRIBUTEs
    /// with the specified capacity
    pub fn with_capacity(capacity: usize) -> CkAttrs {
        CkAttrs {
            v: Vec::with_capacity(capacity),
            p: Vec::with_capacity(capacity),
        }
    }

    fn position(&self, typ: CK_ATTRIBUTE_TYPE) -> Option<usize> {
        self.p.iter().position(|a| a.type_ == typ)
    }

    /// Add a new attribute to the array, the value is a vector of bytes
    ///
    /// The vector ownership is transferred to the array
    pub fn add_vec(
        &mut self,
        typ: CK_ATTRIBUTE_TYPE,
        val: Vec<u8>,
    ) -> Result<()> {
        if self.position(typ).is_some() {
            return Err(Error::precondition(format!(
                "duplicate attribute {} in template",
                attr_name(typ)
            )));
        }
        let len = CK_ULONG::try_from(val.len())?;
        self.v.push(val);
        /* the heap buffer does not move when the outer vector grows */
        let ptr = match self.v.last() {
            Some(r) => void_ptr!(r.as_ptr()),
            None => {
                return Err(Error::precondition("empty storage".to_string()))
            }
        };
        self.p.push(CK_ATTRIBUTE {
            type_: typ,
            pValue: ptr,
            ulValueLen: len,
        });
        Ok(())
    }

    /// Add a new attribute to the array, the value is defined as a slice
    ///
    /// This internally copies the slice to an allocated vector
    pub fn add_owned_slice(
        &mut self,
        typ: CK_ATTRIBUTE_TYPE,
        val: &[u8],
    ) -> Result<()> {
        self.add_vec(typ, val.to_vec())
    }

    /// Add a new attribute to the array, the value is a CK_ULONG
    pub fn add_owned_ulong(
        &mut self,
        typ: CK_ATTRIBUTE_TYPE,
        val: CK_ULONG,
    ) -> Result<()> {
        self.add_vec(typ, val.to_ne_bytes().to_vec())
    }

    /// Add a new attribute to the array, the value is stored as a CK_BBOOL
    pub fn add_owned_bool(
        &mut self,
        typ: CK_ATTRIBUTE_TYPE,
        val: bool,
    ) -> Result<()> {
        let b: CK_BBOOL = if val { CK_TRUE } else { CK_FALSE };
        self.add_vec(typ, vec![b])
    }

    /// Returns the number of attributes in the array
    pub fn len(&self) -> usize {
        self.p.len()
    }

    pub fn is_empty(&self) -> bool {
        self.p.is_empty()
    }

    /// Returns the attributes as a slice to pass to Cryptoki calls
    pub fn as_slice(&self) -> &[CK_ATTRIBUTE] {
        self.p.as_slice()
    }

    /// Returns the list of attribute types in insertion order
    pub fn types(&self) -> Vec<CK_ATTRIBUTE_TYPE> {
        self.p.iter().map(|a| a.type_).collect()
    }

    /// Finds the attribute of the specified type and returns its value
    pub fn find_value(&self, typ: CK_ATTRIBUTE_TYPE) -> Option<&[u8]> {
        self.position(typ).map(|i| self.v[i].as_slice())
    }

    pub fn find_bool(&self, typ: CK_ATTRIBUTE_TYPE) -> Option<bool> {
        match self.find_value(typ) {
            Some(v) if v.len() == 1 => Some(v[0] != CK_FALSE),
            _ => None,
        }
    }

    pub fn find_ulong(&self, typ: CK_ATTRIBUTE_TYPE) -> Option<CK_ULONG> {
        let v = self.find_value(typ)?;
        let bytes: [u8; std::mem::size_of::<CK_ULONG>()] = v.try_into().ok()?;
        Some(CK_ULONG::from_ne_bytes(bytes))
    }
}

impl Default for CkAttrs {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CkAttrs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.p
                    .iter()
                    .zip(self.v.iter())
                    .map(|(a, v)| (attr_name(a.type_), hex::encode(v))),
            )
            .finish()
    }
}
