// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! ECDSA signatures through the token

use crate::error::{ErrorKind, Result};
use crate::mechanism::Mechanism;
use crate::operation::{OpKind, Operation};
use crate::pkcs11::*;
use crate::session::TokenSession;

use log::{debug, error};

/// Outcome of a signature check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Valid,
    Invalid,
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        *self == Verification::Valid
    }
}

pub fn begin_sign<'s>(
    session: &'s TokenSession<'s>,
    key: CK_OBJECT_HANDLE,
    mechanism: &Mechanism,
) -> Result<Operation<'s>> {
    Operation::init(session, OpKind::Sign, mechanism, key)
}

pub fn sign(
    session: &TokenSession,
    key: CK_OBJECT_HANDLE,
    mechanism: &Mechanism,
    data: &[u8],
) -> Result<Vec<u8>> {
    begin_sign(session, key, mechanism)?.finish(data)
}

/// Checks `signature`, a mismatch is reported as [Verification::Invalid]
pub fn verify(
    session: &TokenSession,
    key: CK_OBJECT_HANDLE,
    mechanism: &Mechanism,
    data: &[u8],
    signature: &[u8],
) -> Result<Verification> {
    let handle = session.handle()?;
    let mech = mechanism.to_ck()?;
    let funcs = session.funcs();
    if let Err(e) = funcs.verify_init(handle, mech.as_ck(), key) {
        error!("{}", e);
        return Err(e);
    }
    match funcs.verify(handle, data, signature) {
        Ok(()) => Ok(Verification::Valid),
        Err(e) => {
            if e.kind() == ErrorKind::CkError
                && (e.rv() == CKR_SIGNATURE_INVALID
                    || e.rv() == CKR_SIGNATURE_LEN_RANGE)
            {
                debug!("Signature rejected: {}", e);
                Ok(Verification::Invalid)
            } else {
                error!("{}", e);
                Err(e)
            }
        }
    }
}

/// Signs `data` as is with CKM_ECDSA, no hashing is applied
pub fn ecdsa_sign(
    session: &TokenSession,
    private_key: CK_OBJECT_HANDLE,
    data: &[u8],
) -> Result<Vec<u8>> {
    sign(session, private_key, &Mechanism::Ecdsa, data)
}

pub fn ecdsa_verify(
    session: &TokenSession,
    public_key: CK_OBJECT_HANDLE,
    data: &[u8],
    signature: &[u8],
) -> Result<Verification> {
    verify(session, public_key, &Mechanism::Ecdsa, data, signature)
}
