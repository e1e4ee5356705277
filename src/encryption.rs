// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! AES-CBC-PAD and RSA-OAEP encryption through the token

use crate::error::{Error, Result};
use crate::mechanism::{Mechanism, OaepParams, AES_IV_LEN};
use crate::operation::{OpKind, Operation};
use crate::pkcs11::*;
use crate::session::TokenSession;

/// AES-CBC output together with the IV needed to decrypt it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AesCiphertext {
    pub iv: [u8; AES_IV_LEN],
    pub data: Vec<u8>,
}

pub fn begin_encrypt<'s>(
    session: &'s TokenSession<'s>,
    key: CK_OBJECT_HANDLE,
    mechanism: &Mechanism,
) -> Result<Operation<'s>> {
    Operation::init(session, OpKind::Encrypt, mechanism, key)
}

pub fn begin_decrypt<'s>(
    session: &'s TokenSession<'s>,
    key: CK_OBJECT_HANDLE,
    mechanism: &Mechanism,
) -> Result<Operation<'s>> {
    Operation::init(session, OpKind::Decrypt, mechanism, key)
}

pub fn encrypt(
    session: &TokenSession,
    key: CK_OBJECT_HANDLE,
    mechanism: &Mechanism,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    begin_encrypt(session, key, mechanism)?.finish(plaintext)
}

pub fn decrypt(
    session: &TokenSession,
    key: CK_OBJECT_HANDLE,
    mechanism: &Mechanism,
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    begin_decrypt(session, key, mechanism)?.finish(ciphertext)
}

/// Draws a fresh IV from the token RNG
pub fn generate_iv(session: &TokenSession) -> Result<[u8; AES_IV_LEN]> {
    let rnd = session.generate_random(AES_IV_LEN)?;
    let mut iv = [0u8; AES_IV_LEN];
    if rnd.len() != AES_IV_LEN {
        return Err(Error::precondition(format!(
            "short random output: {} bytes",
            rnd.len()
        )));
    }
    iv.copy_from_slice(&rnd);
    Ok(iv)
}

/// Encrypts with CKM_AES_CBC_PAD under a new random IV
pub fn aes_cbc_encrypt(
    session: &TokenSession,
    key: CK_OBJECT_HANDLE,
    plaintext: &[u8],
) -> Result<AesCiphertext> {
    let iv = generate_iv(session)?;
    let data = encrypt(session, key, &Mechanism::AesCbcPad(iv), plaintext)?;
    Ok(AesCiphertext { iv: iv, data: data })
}

pub fn aes_cbc_decrypt(
    session: &TokenSession,
    key: CK_OBJECT_HANDLE,
    ciphertext: &AesCiphertext,
) -> Result<Vec<u8>> {
    decrypt(
        session,
        key,
        &Mechanism::AesCbcPad(ciphertext.iv),
        &ciphertext.data,
    )
}

pub fn rsa_oaep_encrypt(
    session: &TokenSession,
    public_key: CK_OBJECT_HANDLE,
    params: &OaepParams,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    encrypt(session, public_key, &Mechanism::RsaPkcsOaep(*params), plaintext)
}

pub fn rsa_oaep_decrypt(
    session: &TokenSession,
    private_key: CK_OBJECT_HANDLE,
    params: &OaepParams,
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    decrypt(
        session,
        private_key,
        &Mechanism::RsaPkcsOaep(*params),
        ciphertext,
    )
}
