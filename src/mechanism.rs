// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Mechanism descriptors
//!
//! A [Mechanism] names an algorithm together with its parameters. It is
//! turned into a [CkMechanism] right before a call, which owns the
//! parameter storage the raw `CK_MECHANISM` points to.

use crate::error::Result;
use crate::misc::{sizeof, void_ptr};
use crate::pkcs11::*;

/// Length of the AES block and of the CBC initialization vector
pub const AES_IV_LEN: usize = 16;

/// Hash and MGF1 pairing used by RSA-OAEP
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OaepHash {
    #[default]
    Sha1,
    Sha256,
}

impl OaepHash {
    pub fn hash_mechanism(&self) -> CK_MECHANISM_TYPE {
        match self {
            OaepHash::Sha1 => CKM_SHA_1,
            OaepHash::Sha256 => CKM_SHA256,
        }
    }

    pub fn mgf(&self) -> CK_RSA_PKCS_MGF_TYPE {
        match self {
            OaepHash::Sha1 => CKG_MGF1_SHA1,
            OaepHash::Sha256 => CKG_MGF1_SHA256,
        }
    }

    /// Digest size in bytes
    pub fn digest_len(&self) -> usize {
        match self {
            OaepHash::Sha1 => 20,
            OaepHash::Sha256 => 32,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OaepHash::Sha1 => "sha1",
            OaepHash::Sha256 => "sha256",
        }
    }
}

/// RSA-OAEP parameters, the same value must be used to decrypt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OaepParams {
    pub hash: OaepHash,
}

impl OaepParams {
    pub fn new(hash: OaepHash) -> OaepParams {
        OaepParams { hash: hash }
    }

    /// Largest message that fits in one block for the given modulus size
    pub fn max_message_len(&self, modulus_bytes: usize) -> usize {
        modulus_bytes.saturating_sub(2 * self.hash.digest_len() + 2)
    }

    fn to_ck(&self) -> CK_RSA_PKCS_OAEP_PARAMS {
        CK_RSA_PKCS_OAEP_PARAMS {
            hashAlg: self.hash.hash_mechanism(),
            mgf: self.hash.mgf(),
            source: CKZ_DATA_SPECIFIED,
            pSourceData: std::ptr::null_mut(),
            ulSourceDataLen: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mechanism {
    AesKeyGen,
    AesCbcPad([u8; AES_IV_LEN]),
    RsaPkcsKeyPairGen,
    RsaPkcsOaep(OaepParams),
    EcKeyPairGen,
    EcdsaKeyPairGen,
    /// Raw ECDSA, the data is signed as is
    Ecdsa,
}

impl Mechanism {
    pub fn mechanism_type(&self) -> CK_MECHANISM_TYPE {
        match self {
            Mechanism::AesKeyGen => CKM_AES_KEY_GEN,
            Mechanism::AesCbcPad(_) => CKM_AES_CBC_PAD,
            Mechanism::RsaPkcsKeyPairGen => CKM_RSA_PKCS_KEY_PAIR_GEN,
            Mechanism::RsaPkcsOaep(_) => CKM_RSA_PKCS_OAEP,
            Mechanism::EcKeyPairGen => CKM_EC_KEY_PAIR_GEN,
            Mechanism::EcdsaKeyPairGen => CKM_ECDSA_KEY_PAIR_GEN,
            Mechanism::Ecdsa => CKM_ECDSA,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mechanism::AesKeyGen => "CKM_AES_KEY_GEN",
            Mechanism::AesCbcPad(_) => "CKM_AES_CBC_PAD",
            Mechanism::RsaPkcsKeyPairGen => "CKM_RSA_PKCS_KEY_PAIR_GEN",
            Mechanism::RsaPkcsOaep(_) => "CKM_RSA_PKCS_OAEP",
            Mechanism::EcKeyPairGen => "CKM_EC_KEY_PAIR_GEN",
            Mechanism::EcdsaKeyPairGen => "CKM_ECDSA_KEY_PAIR_GEN",
            Mechanism::Ecdsa => "CKM_ECDSA",
        }
    }

    /// Builds the raw mechanism structure for a Cryptoki call
    pub fn to_ck(&self) -> Result<CkMechanism> {
        let params = match self {
            Mechanism::AesCbcPad(iv) => MechParams::Iv(Box::new(*iv)),
            Mechanism::RsaPkcsOaep(p) => MechParams::Oaep(Box::new(p.to_ck())),
            _ => MechParams::None,
        };
        let (ptr, len) = match &params {
            MechParams::None => (std::ptr::null_mut(), 0),
            MechParams::Iv(iv) => (
                void_ptr!(iv.as_ptr()),
                CK_ULONG::try_from(AES_IV_LEN)?,
            ),
            MechParams::Oaep(p) => (
                void_ptr!(&**p as *const CK_RSA_PKCS_OAEP_PARAMS),
                sizeof!(CK_RSA_PKCS_OAEP_PARAMS),
            ),
        };
        Ok(CkMechanism {
            mech: CK_MECHANISM {
                mechanism: self.mechanism_type(),
                pParameter: ptr,
                ulParameterLen: len,
            },
            _params: params,
        })
    }
}

enum MechParams {
    None,
    Iv(Box<[u8; AES_IV_LEN]>),
    Oaep(Box<CK_RSA_PKCS_OAEP_PARAMS>),
}

/// A `CK_MECHANISM` together with the storage its parameter points to
///
/// Parameters are boxed so the pointer survives moves of this struct.
pub struct CkMechanism {
    mech: CK_MECHANISM,
    _params: MechParams,
}

impl CkMechanism {
    pub fn as_ck(&self) -> &CK_MECHANISM {
        &self.mech
    }
}
