// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Key generation inside the token
//!
//! Every key is generated by the provider. Secret and private keys are
//! created private, sensitive, non extractable and non modifiable, and
//! only carry the capabilities they are generated for.

use std::fmt;
use std::str::FromStr;

use crate::attribute::CkAttrs;
use crate::error::{Error, Result};
use crate::mechanism::Mechanism;
use crate::pkcs11::*;
use crate::session::TokenSession;

use bitflags::bitflags;
use log::{debug, error};

bitflags! {
    /// The operations a key is allowed to perform
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KeyUsage: u32 {
        const Encrypt = 0x00000001;
        const Decrypt = 0x00000002;
        const Sign    = 0x00000004;
        const Verify  = 0x00000008;
        const Wrap    = 0x00000010;
        const Unwrap  = 0x00000020;
        const Derive  = 0x00000040;
    }
}

impl KeyUsage {
    /// Capabilities that apply to secret keys
    pub const SECRET: KeyUsage = KeyUsage::all();
    /// Capabilities that apply to public keys
    pub const PUBLIC: KeyUsage = KeyUsage::Encrypt
        .union(KeyUsage::Verify)
        .union(KeyUsage::Wrap)
        .union(KeyUsage::Derive);
    /// Capabilities that apply to private keys
    pub const PRIVATE: KeyUsage = KeyUsage::Decrypt
        .union(KeyUsage::Sign)
        .union(KeyUsage::Unwrap)
        .union(KeyUsage::Derive);

    const ATTRS: [(KeyUsage, CK_ATTRIBUTE_TYPE); 7] = [
        (KeyUsage::Encrypt, CKA_ENCRYPT),
        (KeyUsage::Decrypt, CKA_DECRYPT),
        (KeyUsage::Sign, CKA_SIGN),
        (KeyUsage::Verify, CKA_VERIFY),
        (KeyUsage::Wrap, CKA_WRAP),
        (KeyUsage::Unwrap, CKA_UNWRAP),
        (KeyUsage::Derive, CKA_DERIVE),
    ];

    /// Adds the capability attributes of `applicable` to a template
    ///
    /// Capabilities in this set are enabled, the other applicable ones are
    /// explicitly disabled.
    pub fn add_to(
        &self,
        applicable: KeyUsage,
        tmpl: &mut CkAttrs,
    ) -> Result<()> {
        for (flag, typ) in Self::ATTRS {
            if applicable.contains(flag) {
                tmpl.add_owned_bool(typ, self.contains(flag))?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesKeyLength {
    Aes128,
    Aes192,
    Aes256,
}

impl AesKeyLength {
    pub fn bytes(&self) -> usize {
        match self {
            AesKeyLength::Aes128 => 16,
            AesKeyLength::Aes192 => 24,
            AesKeyLength::Aes256 => 32,
        }
    }

    pub fn bits(&self) -> usize {
        self.bytes() * 8
    }

    pub fn default_label(&self) -> String {
        format!("AES {}-bit key", self.bits())
    }
}

impl TryFrom<usize> for AesKeyLength {
    type Error = Error;

    /// Converts a length in bytes
    fn try_from(len: usize) -> Result<AesKeyLength> {
        match len {
            16 => Ok(AesKeyLength::Aes128),
            24 => Ok(AesKeyLength::Aes192),
            32 => Ok(AesKeyLength::Aes256),
            _ => Err(Error::precondition(format!(
                "invalid AES key length {}, must be 16, 24 or 32 bytes",
                len
            ))),
        }
    }
}

/// The F4 public exponent, 65537
pub const RSA_F4: [u8; 3] = [0x01, 0x00, 0x01];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKeySpec {
    pub modulus_bits: CK_ULONG,
    /// Big endian public exponent
    pub public_exponent: Vec<u8>,
}

impl RsaKeySpec {
    pub fn new(modulus_bits: CK_ULONG) -> RsaKeySpec {
        RsaKeySpec {
            modulus_bits: modulus_bits,
            public_exponent: RSA_F4.to_vec(),
        }
    }

    pub fn with_exponent(mut self, exponent: Vec<u8>) -> RsaKeySpec {
        self.public_exponent = exponent;
        self
    }

    pub fn modulus_bytes(&self) -> usize {
        usize::try_from(self.modulus_bits).map_or(0, |b| (b + 7) / 8)
    }
}

impl Default for RsaKeySpec {
    fn default() -> Self {
        RsaKeySpec::new(2048)
    }
}

/// Named curves with their DER encoded object identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    Prime256v1,
    Secp384r1,
    Secp521r1,
    Sect571k1,
    C2tnb431r1,
    BrainpoolP512t1,
}

const PRIME256V1_OID: &[u8] =
    &[0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];
const SECP384R1_OID: &[u8] = &[0x06, 0x05, 0x2b, 0x81, 0x04, 0x00, 0x22];
const SECP521R1_OID: &[u8] = &[0x06, 0x05, 0x2b, 0x81, 0x04, 0x00, 0x23];
const SECT571K1_OID: &[u8] = &[0x06, 0x05, 0x2b, 0x81, 0x04, 0x00, 0x26];
const C2TNB431R1_OID: &[u8] =
    &[0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x00, 0x14];
const BRAINPOOLP512T1_OID: &[u8] =
    &[0x06, 0x09, 0x2b, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x0e];

impl EcCurve {
    pub const ALL: [EcCurve; 6] = [
        EcCurve::Prime256v1,
        EcCurve::Secp384r1,
        EcCurve::Secp521r1,
        EcCurve::Sect571k1,
        EcCurve::C2tnb431r1,
        EcCurve::BrainpoolP512t1,
    ];

    pub fn oid_der(&self) -> &'static [u8] {
        match self {
            EcCurve::Prime256v1 => PRIME256V1_OID,
            EcCurve::Secp384r1 => SECP384R1_OID,
            EcCurve::Secp521r1 => SECP521R1_OID,
            EcCurve::Sect571k1 => SECT571K1_OID,
            EcCurve::C2tnb431r1 => C2TNB431R1_OID,
            EcCurve::BrainpoolP512t1 => BRAINPOOLP512T1_OID,
        }
    }

    pub fn from_oid_der(der: &[u8]) -> Option<EcCurve> {
        Self::ALL.into_iter().find(|c| c.oid_der() == der)
    }

    pub fn name(&self) -> &'static str {
        match self {
            EcCurve::Prime256v1 => "prime256v1",
            EcCurve::Secp384r1 => "secp384r1",
            EcCurve::Secp521r1 => "secp521r1",
            EcCurve::Sect571k1 => "sect571k1",
            EcCurve::C2tnb431r1 => "c2tnb431r1",
            EcCurve::BrainpoolP512t1 => "brainpoolP512t1",
        }
    }

    /// Size of a raw `r || s` signature on this curve
    ///
    /// For display only, signing always asks the token for the length.
    pub fn signature_len(&self) -> usize {
        match self {
            EcCurve::Prime256v1 => 64,
            EcCurve::Secp384r1 => 96,
            EcCurve::Secp521r1 => 132,
            EcCurve::Sect571k1 => 144,
            EcCurve::C2tnb431r1 => 106,
            EcCurve::BrainpoolP512t1 => 128,
        }
    }
}

impl FromStr for EcCurve {
    type Err = Error;

    fn from_str(s: &str) -> Result<EcCurve> {
        match s.to_ascii_lowercase().as_str() {
            "prime256v1" | "secp256r1" | "p-256" => Ok(EcCurve::Prime256v1),
            "secp384r1" | "p-384" => Ok(EcCurve::Secp384r1),
            "secp521r1" | "p-521" => Ok(EcCurve::Secp521r1),
            "sect571k1" => Ok(EcCurve::Sect571k1),
            "c2tnb431r1" => Ok(EcCurve::C2tnb431r1),
            "brainpoolp512t1" => Ok(EcCurve::BrainpoolP512t1),
            _ => Err(Error::precondition(format!("unknown curve {}", s))),
        }
    }
}

impl fmt::Display for EcCurve {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOptions {
    pub label: String,
    /// Token object when true, session object otherwise
    pub token: bool,
    pub id: Option<Vec<u8>>,
}

impl KeyOptions {
    pub fn new(label: &str) -> KeyOptions {
        KeyOptions {
            label: label.to_string(),
            token: true,
            id: None,
        }
    }

    pub fn session_object(mut self) -> KeyOptions {
        self.token = false;
        self
    }

    pub fn with_id(mut self, id: &[u8]) -> KeyOptions {
        self.id = Some(id.to_vec());
        self
    }

    pub fn public_label(&self) -> String {
        format!("{} public key", self.label)
    }

    pub fn private_label(&self) -> String {
        format!("{} private key", self.label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPair {
    pub public: CK_OBJECT_HANDLE,
    pub private: CK_OBJECT_HANDLE,
}

fn add_common(
    tmpl: &mut CkAttrs,
    class: CK_OBJECT_CLASS,
    key_type: CK_KEY_TYPE,
    opts: &KeyOptions,
    label: &str,
) -> Result<()> {
    tmpl.add_owned_ulong(CKA_CLASS, class)?;
    tmpl.add_owned_ulong(CKA_KEY_TYPE, key_type)?;
    tmpl.add_owned_bool(CKA_TOKEN, opts.token)?;
    tmpl.add_owned_bool(CKA_MODIFIABLE, false)?;
    tmpl.add_owned_slice(CKA_LABEL, label.as_bytes())?;
    if let Some(id) = &opts.id {
        tmpl.add_owned_slice(CKA_ID, id)?;
    }
    Ok(())
}

fn add_protected(tmpl: &mut CkAttrs) -> Result<()> {
    tmpl.add_owned_bool(CKA_PRIVATE, true)?;
    tmpl.add_owned_bool(CKA_SENSITIVE, true)?;
    tmpl.add_owned_bool(CKA_EXTRACTABLE, false)?;
    Ok(())
}

pub fn aes_key_template(
    len: AesKeyLength,
    opts: &KeyOptions,
) -> Result<CkAttrs> {
    let mut tmpl = CkAttrs::with_capacity(16);
    add_common(&mut tmpl, CKO_SECRET_KEY, CKK_AES, opts, &opts.label)?;
    add_protected(&mut tmpl)?;
    (KeyUsage::Encrypt | KeyUsage::Decrypt)
        .add_to(KeyUsage::SECRET, &mut tmpl)?;
    tmpl.add_owned_ulong(CKA_VALUE_LEN, CK_ULONG::try_from(len.bytes())?)?;
    Ok(tmpl)
}

pub fn rsa_public_template(
    spec: &RsaKeySpec,
    opts: &KeyOptions,
) -> Result<CkAttrs> {
    if spec.public_exponent.is_empty() {
        return Err(Error::precondition(
            "empty RSA public exponent".to_string(),
        ));
    }
    let mut tmpl = CkAttrs::with_capacity(12);
    let label = opts.public_label();
    add_common(&mut tmpl, CKO_PUBLIC_KEY, CKK_RSA, opts, &label)?;
    tmpl.add_owned_bool(CKA_PRIVATE, false)?;
    (KeyUsage::Verify | KeyUsage::Encrypt)
        .add_to(KeyUsage::PUBLIC, &mut tmpl)?;
    tmpl.add_owned_ulong(CKA_MODULUS_BITS, spec.modulus_bits)?;
    tmpl.add_owned_slice(CKA_PUBLIC_EXPONENT, &spec.public_exponent)?;
    Ok(tmpl)
}

pub fn rsa_private_template(opts: &KeyOptions) -> Result<CkAttrs> {
    let mut tmpl = CkAttrs::with_capacity(12);
    let label = opts.private_label();
    add_common(&mut tmpl, CKO_PRIVATE_KEY, CKK_RSA, opts, &label)?;
    add_protected(&mut tmpl)?;
    (KeyUsage::Sign | KeyUsage::Decrypt)
        .add_to(KeyUsage::PRIVATE, &mut tmpl)?;
    Ok(tmpl)
}

/// Public half template, `params_type` selects the EC or ECDSA attribute
pub fn ec_public_template(
    params_type: CK_ATTRIBUTE_TYPE,
    ec_params: &[u8],
    opts: &KeyOptions,
) -> Result<CkAttrs> {
    if ec_params.is_empty() {
        return Err(Error::precondition("empty EC parameters".to_string()));
    }
    let mut tmpl = CkAttrs::with_capacity(12);
    let label = opts.public_label();
    add_common(&mut tmpl, CKO_PUBLIC_KEY, CKK_EC, opts, &label)?;
    tmpl.add_owned_bool(CKA_PRIVATE, false)?;
    (KeyUsage::Verify | KeyUsage::Encrypt)
        .add_to(KeyUsage::PUBLIC, &mut tmpl)?;
    tmpl.add_owned_slice(params_type, ec_params)?;
    Ok(tmpl)
}

pub fn ec_private_template(opts: &KeyOptions) -> Result<CkAttrs> {
    let mut tmpl = CkAttrs::with_capacity(12);
    let label = opts.private_label();
    add_common(&mut tmpl, CKO_PRIVATE_KEY, CKK_EC, opts, &label)?;
    add_protected(&mut tmpl)?;
    (KeyUsage::Sign | KeyUsage::Decrypt)
        .add_to(KeyUsage::PRIVATE, &mut tmpl)?;
    Ok(tmpl)
}

fn generate_pair(
    session: &TokenSession,
    mechanism: Mechanism,
    public: &CkAttrs,
    private: &CkAttrs,
) -> Result<KeyPair> {
    let handle = session.handle()?;
    let mech = mechanism.to_ck()?;
    match session.funcs().generate_key_pair(
        handle,
        mech.as_ck(),
        public.as_slice(),
        private.as_slice(),
    ) {
        Ok((pub_handle, priv_handle)) => {
            debug!(
                "{} generated public key {} and private key {}",
                mechanism.name(),
                pub_handle,
                priv_handle
            );
            Ok(KeyPair {
                public: pub_handle,
                private: priv_handle,
            })
        }
        Err(e) => {
            error!("{}", e);
            Err(e)
        }
    }
}

pub fn generate_aes_key(
    session: &TokenSession,
    len: AesKeyLength,
    opts: &KeyOptions,
) -> Result<CK_OBJECT_HANDLE> {
    let handle = session.handle()?;
    let tmpl = aes_key_template(len, opts)?;
    let mech = Mechanism::AesKeyGen.to_ck()?;
    match session
        .funcs()
        .generate_key(handle, mech.as_ck(), tmpl.as_slice())
    {
        Ok(key) => {
            debug!("Generated {} bit AES key {}", len.bits(), key);
            Ok(key)
        }
        Err(e) => {
            error!("{}", e);
            Err(e)
        }
    }
}

pub fn generate_rsa_key_pair(
    session: &TokenSession,
    spec: &RsaKeySpec,
    opts: &KeyOptions,
) -> Result<KeyPair> {
    let public = rsa_public_template(spec, opts)?;
    let private = rsa_private_template(opts)?;
    generate_pair(session, Mechanism::RsaPkcsKeyPairGen, &public, &private)
}

/// Generates an EC key pair, `ec_params` is the DER encoded curve
pub fn generate_ec_key_pair(
    session: &TokenSession,
    ec_params: &[u8],
    opts: &KeyOptions,
) -> Result<KeyPair> {
    let public = ec_public_template(CKA_EC_PARAMS, ec_params, opts)?;
    let private = ec_private_template(opts)?;
    generate_pair(session, Mechanism::EcKeyPairGen, &public, &private)
}

/// Same as [generate_ec_key_pair] with the legacy ECDSA identifiers
pub fn generate_ecdsa_key_pair(
    session: &TokenSession,
    ec_params: &[u8],
    opts: &KeyOptions,
) -> Result<KeyPair> {
    let public = ec_public_template(CKA_ECDSA_PARAMS, ec_params, opts)?;
    let private = ec_private_template(opts)?;
    generate_pair(session, Mechanism::EcdsaKeyPairGen, &public, &private)
}
