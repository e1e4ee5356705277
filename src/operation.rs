// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Single part operations with output length negotiation
//!
//! Cryptoki reports output sizes through a first call made without an
//! output buffer. An [Operation] is created by the matching `*Init` call
//! and hides that exchange: [Operation::output_len] only asks for the
//! size, [Operation::finish] asks for the size, allocates and performs the
//! transform.

use crate::error::Result;
use crate::mechanism::{CkMechanism, Mechanism};
use crate::pkcs11::*;
use crate::session::TokenSession;

use log::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Encrypt,
    Decrypt,
    Sign,
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Encrypt => "encrypt",
            OpKind::Decrypt => "decrypt",
            OpKind::Sign => "sign",
        }
    }
}

/// An initialized operation waiting for its input
///
/// Cryptoki has no way to cancel an operation, dropping this without
/// calling [Operation::finish] leaves it active in the token session.
pub struct Operation<'s> {
    session: &'s TokenSession<'s>,
    handle: CK_SESSION_HANDLE,
    kind: OpKind,
    /* the provider may refer to the parameters until the operation ends */
    _mech: CkMechanism,
}

impl<'s> Operation<'s> {
    /// Calls the `*Init` function matching `kind`
    pub fn init(
        session: &'s TokenSession<'s>,
        kind: OpKind,
        mechanism: &Mechanism,
        key: CK_OBJECT_HANDLE,
    ) -> Result<Operation<'s>> {
        let handle = session.handle()?;
        let mech = mechanism.to_ck()?;
        let funcs = session.funcs();
        let ret = match kind {
            OpKind::Encrypt => funcs.encrypt_init(handle, mech.as_ck(), key),
            OpKind::Decrypt => funcs.decrypt_init(handle, mech.as_ck(), key),
            OpKind::Sign => funcs.sign_init(handle, mech.as_ck(), key),
        };
        if let Err(e) = ret {
            error!("{} with {}: {}", kind.name(), mechanism.name(), e);
            return Err(e);
        }
        Ok(Operation {
            session: session,
            handle: handle,
            kind: kind,
            _mech: mech,
        })
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    fn call(&self, input: &[u8], out: Option<&mut [u8]>) -> Result<usize> {
        let funcs = self.session.funcs();
        let ret = match self.kind {
            OpKind::Encrypt => funcs.encrypt(self.handle, input, out),
            OpKind::Decrypt => funcs.decrypt(self.handle, input, out),
            OpKind::Sign => funcs.sign(self.handle, input, out),
        };
        match ret {
            Ok(len) => Ok(usize::try_from(len)?),
            Err(e) => {
                error!("{}", e);
                Err(e)
            }
        }
    }

    /// Asks the provider how large the output for `input` will be
    ///
    /// This does not perform the transform and can be repeated.
    pub fn output_len(&self, input: &[u8]) -> Result<usize> {
        self.call(input, None)
    }

    /// Performs the transform and returns exactly the bytes written
    pub fn finish(self, input: &[u8]) -> Result<Vec<u8>> {
        let len = self.call(input, None)?;
        let mut out = vec![0u8; len];
        let written = self.call(input, Some(&mut out))?;
        out.truncate(written);
        Ok(out)
    }
}
