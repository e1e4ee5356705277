// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Checked dispatch through a provider's `CK_FUNCTION_LIST`
//!
//! Every method verifies that the table is present and that the entry it
//! needs is populated before jumping into the provider. Non OK statuses are
//! returned as [Error]s carrying the name of the Cryptoki function.

use libloading::{Library, Symbol};

use crate::error::{Error, Result};
use crate::pkcs11::*;

type GetFunctionListFn =
    unsafe extern "C" fn(*mut *mut CK_FUNCTION_LIST) -> CK_RV;

fn check(operation: &'static str, rv: CK_RV) -> Result<()> {
    if rv == CKR_OK {
        Ok(())
    } else {
        Err(Error::ck_rv(operation, rv))
    }
}

macro_rules! fn_entry {
    ($self:expr, $name:ident) => {{
        if $self.fntable.is_null() {
            return Err(Error::precondition(format!(
                "no function table loaded, can't call {}",
                std::stringify!($name)
            )));
        }
        match unsafe { (*$self.fntable).$name } {
            Some(func) => func,
            None => {
                return Err(Error::precondition(format!(
                    "Broken pkcs11 module, no {} function",
                    std::stringify!($name)
                )))
            }
        }
    }};
}

fn out_buffer(out: Option<&mut [u8]>) -> Result<(*mut u8, CK_ULONG)> {
    match out {
        Some(buf) => Ok((buf.as_mut_ptr(), CK_ULONG::try_from(buf.len())?)),
        None => Ok((std::ptr::null_mut(), 0)),
    }
}

/// A borrowed view of a provider's function table
pub struct FuncList {
    fntable: *const CK_FUNCTION_LIST,
}

impl FuncList {
    /// A table with no entries, every call fails before reaching a provider
    pub fn null() -> FuncList {
        FuncList {
            fntable: std::ptr::null(),
        }
    }

    /// Wraps a raw table pointer
    ///
    /// # Safety
    ///
    /// The table must stay valid and unmodified for the life of the
    /// returned object.
    pub unsafe fn from_ptr(fntable: *const CK_FUNCTION_LIST) -> FuncList {
        FuncList { fntable: fntable }
    }

    /// Resolves `name` in a loaded library and calls it to obtain the table
    ///
    /// # Safety
    ///
    /// The symbol must have the `C_GetFunctionList` signature, and the
    /// returned object must not outlive `library`.
    pub unsafe fn from_library(
        library: &Library,
        name: &str,
    ) -> Result<FuncList> {
        let list_fn: Symbol<GetFunctionListFn> =
            library.get(name.as_bytes()).map_err(|e| {
                Error::load(format!("entry point {} not found: {}", name, e))
            })?;
        let mut fn_list: *mut CK_FUNCTION_LIST = std::ptr::null_mut();
        check("C_GetFunctionList", list_fn(&mut fn_list))?;
        if fn_list.is_null() {
            return Err(Error::load(
                "C_GetFunctionList returned a null function list".to_string(),
            ));
        }
        Ok(FuncList { fntable: fn_list })
    }

    pub fn is_null(&self) -> bool {
        self.fntable.is_null()
    }

    /// The interface version advertised by the table
    pub fn version(&self) -> Option<CK_VERSION> {
        if self.fntable.is_null() {
            None
        } else {
            Some(unsafe { (*self.fntable).version })
        }
    }

    /// Calls C_Initialize without arguments
    ///
    /// Returns false if the provider was already initialized by someone
    /// else in this process.
    pub fn initialize(&self) -> Result<bool> {
        let func = fn_entry!(self, C_Initialize);
        let rv = unsafe { func(std::ptr::null_mut()) };
        if rv == CKR_CRYPTOKI_ALREADY_INITIALIZED {
            return Ok(false);
        }
        check("C_Initialize", rv)?;
        Ok(true)
    }

    pub fn finalize(&self) -> Result<()> {
        let func = fn_entry!(self, C_Finalize);
        check("C_Finalize", unsafe { func(std::ptr::null_mut()) })
    }

    pub fn get_info(&self) -> Result<CK_INFO> {
        let func = fn_entry!(self, C_GetInfo);
        let mut info: CK_INFO = unsafe { std::mem::zeroed() };
        check("C_GetInfo", unsafe { func(&mut info) })?;
        Ok(info)
    }

    /// Calls C_GetSlotList, pass `None` to query the number of slots
    pub fn get_slot_list(
        &self,
        token_present: bool,
        slots: Option<&mut [CK_SLOT_ID]>,
    ) -> Result<CK_ULONG> {
        let func = fn_entry!(self, C_GetSlotList);
        let present = if token_present { CK_TRUE } else { CK_FALSE };
        let (ptr, mut count) = match slots {
            Some(s) => (s.as_mut_ptr(), CK_ULONG::try_from(s.len())?),
            None => (std::ptr::null_mut(), 0),
        };
        check("C_GetSlotList", unsafe { func(present, ptr, &mut count) })?;
        Ok(count)
    }

    pub fn get_slot_info(&self, slot: CK_SLOT_ID) -> Result<CK_SLOT_INFO> {
        let func = fn_entry!(self, C_GetSlotInfo);
        let mut info: CK_SLOT_INFO = unsafe { std::mem::zeroed() };
        check("C_GetSlotInfo", unsafe { func(slot, &mut info) })?;
        Ok(info)
    }

    pub fn get_token_info(&self, slot: CK_SLOT_ID) -> Result<CK_TOKEN_INFO> {
        let func = fn_entry!(self, C_GetTokenInfo);
        let mut info: CK_TOKEN_INFO = unsafe { std::mem::zeroed() };
        check("C_GetTokenInfo", unsafe { func(slot, &mut info) })?;
        Ok(info)
    }

    pub fn open_session(
        &self,
        slot: CK_SLOT_ID,
        flags: CK_FLAGS,
    ) -> Result<CK_SESSION_HANDLE> {
        let func = fn_entry!(self, C_OpenSession);
        let mut handle: CK_SESSION_HANDLE = CK_INVALID_HANDLE;
        check("C_OpenSession", unsafe {
            func(slot, flags, std::ptr::null_mut(), None, &mut handle)
        })?;
        Ok(handle)
    }

    pub fn close_session(&self, session: CK_SESSION_HANDLE) -> Result<()> {
        let func = fn_entry!(self, C_CloseSession);
        check("C_CloseSession", unsafe { func(session) })
    }

    pub fn login(
        &self,
        session: CK_SESSION_HANDLE,
        user_type: CK_USER_TYPE,
        pin: &[u8],
    ) -> Result<()> {
        let func = fn_entry!(self, C_Login);
        let pin_len = CK_ULONG::try_from(pin.len())?;
        check("C_Login", unsafe {
            func(session, user_type, pin.as_ptr() as *mut CK_UTF8CHAR, pin_len)
        })
    }

    pub fn logout(&self, session: CK_SESSION_HANDLE) -> Result<()> {
        let func = fn_entry!(self, C_Logout);
        check("C_Logout", unsafe { func(session) })
    }

    pub fn generate_key(
        &self,
        session: CK_SESSION_HANDLE,
        mechanism: &CK_MECHANISM,
        template: &[CK_ATTRIBUTE],
    ) -> Result<CK_OBJECT_HANDLE> {
        let func = fn_entry!(self, C_GenerateKey);
        let count = CK_ULONG::try_from(template.len())?;
        let mut handle: CK_OBJECT_HANDLE = CK_INVALID_HANDLE;
        check("C_GenerateKey", unsafe {
            func(
                session,
                mechanism as *const CK_MECHANISM as *mut CK_MECHANISM,
                template.as_ptr() as *mut CK_ATTRIBUTE,
                count,
                &mut handle,
            )
        })?;
        Ok(handle)
    }

    pub fn generate_key_pair(
        &self,
        session: CK_SESSION_HANDLE,
        mechanism: &CK_MECHANISM,
        public_template: &[CK_ATTRIBUTE],
        private_template: &[CK_ATTRIBUTE],
    ) -> Result<(CK_OBJECT_HANDLE, CK_OBJECT_HANDLE)> {
        let func = fn_entry!(self, C_GenerateKeyPair);
        let pub_count = CK_ULONG::try_from(public_template.len())?;
        let priv_count = CK_ULONG::try_from(private_template.len())?;
        let mut pub_handle: CK_OBJECT_HANDLE = CK_INVALID_HANDLE;
        let mut priv_handle: CK_OBJECT_HANDLE = CK_INVALID_HANDLE;
        check("C_GenerateKeyPair", unsafe {
            func(
                session,
                mechanism as *const CK_MECHANISM as *mut CK_MECHANISM,
                public_template.as_ptr() as *mut CK_ATTRIBUTE,
                pub_count,
                private_template.as_ptr() as *mut CK_ATTRIBUTE,
                priv_count,
                &mut pub_handle,
                &mut priv_handle,
            )
        })?;
        Ok((pub_handle, priv_handle))
    }

    pub fn encrypt_init(
        &self,
        session: CK_SESSION_HANDLE,
        mechanism: &CK_MECHANISM,
        key: CK_OBJECT_HANDLE,
    ) -> Result<()> {
        let func = fn_entry!(self, C_EncryptInit);
        check("C_EncryptInit", unsafe {
            func(
                session,
                mechanism as *const CK_MECHANISM as *mut CK_MECHANISM,
                key,
            )
        })
    }

    /// Calls C_Encrypt, pass `None` as output to query the output length
    ///
    /// Returns the length written, or required when no buffer is passed.
    pub fn encrypt(
        &self,
        session: CK_SESSION_HANDLE,
        data: &[u8],
        out: Option<&mut [u8]>,
    ) -> Result<CK_ULONG> {
        let func = fn_entry!(self, C_Encrypt);
        let data_len = CK_ULONG::try_from(data.len())?;
        let (out_ptr, mut out_len) = out_buffer(out)?;
        check("C_Encrypt", unsafe {
            func(
                session,
                data.as_ptr() as *mut u8,
                data_len,
                out_ptr,
                &mut out_len,
            )
        })?;
        Ok(out_len)
    }

    pub fn decrypt_init(
        &self,
        session: CK_SESSION_HANDLE,
        mechanism: &CK_MECHANISM,
        key: CK_OBJECT_HANDLE,
    ) -> Result<()> {
        let func = fn_entry!(self, C_DecryptInit);
        check("C_DecryptInit", unsafe {
            func(
                session,
                mechanism as *const CK_MECHANISM as *mut CK_MECHANISM,
                key,
            )
        })
    }

    /// Calls C_Decrypt, same conventions as [FuncList::encrypt]
    pub fn decrypt(
        &self,
        session: CK_SESSION_HANDLE,
        data: &[u8],
        out: Option<&mut [u8]>,
    ) -> Result<CK_ULONG> {
        let func = fn_entry!(self, C_Decrypt);
        let data_len = CK_ULONG::try_from(data.len())?;
        let (out_ptr, mut out_len) = out_buffer(out)?;
        check("C_Decrypt", unsafe {
            func(
                session,
                data.as_ptr() as *mut u8,
                data_len,
                out_ptr,
                &mut out_len,
            )
        })?;
        Ok(out_len)
    }

    pub fn sign_init(
        &self,
        session: CK_SESSION_HANDLE,
        mechanism: &CK_MECHANISM,
        key: CK_OBJECT_HANDLE,
    ) -> Result<()> {
        let func = fn_entry!(self, C_SignInit);
        check("C_SignInit", unsafe {
            func(
                session,
                mechanism as *const CK_MECHANISM as *mut CK_MECHANISM,
                key,
            )
        })
    }

    /// Calls C_Sign, same conventions as [FuncList::encrypt]
    pub fn sign(
        &self,
        session: CK_SESSION_HANDLE,
        data: &[u8],
        out: Option<&mut [u8]>,
    ) -> Result<CK_ULONG> {
        let func = fn_entry!(self, C_Sign);
        let data_len = CK_ULONG::try_from(data.len())?;
        let (out_ptr, mut out_len) = out_buffer(out)?;
        check("C_Sign", unsafe {
            func(
                session,
                data.as_ptr() as *mut u8,
                data_len,
                out_ptr,
                &mut out_len,
            )
        })?;
        Ok(out_len)
    }

    pub fn verify_init(
        &self,
        session: CK_SESSION_HANDLE,
        mechanism: &CK_MECHANISM,
        key: CK_OBJECT_HANDLE,
    ) -> Result<()> {
        let func = fn_entry!(self, C_VerifyInit);
        check("C_VerifyInit", unsafe {
            func(
                session,
                mechanism as *const CK_MECHANISM as *mut CK_MECHANISM,
                key,
            )
        })
    }

    pub fn verify(
        &self,
        session: CK_SESSION_HANDLE,
        data: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        let func = fn_entry!(self, C_Verify);
        let data_len = CK_ULONG::try_from(data.len())?;
        let sig_len = CK_ULONG::try_from(signature.len())?;
        check("C_Verify", unsafe {
            func(
                session,
                data.as_ptr() as *mut u8,
                data_len,
                signature.as_ptr() as *mut u8,
                sig_len,
            )
        })
    }

    pub fn generate_random(
        &self,
        session: CK_SESSION_HANDLE,
        buf: &mut [u8],
    ) -> Result<()> {
        let func = fn_entry!(self, C_GenerateRandom);
        let len = CK_ULONG::try_from(buf.len())?;
        check("C_GenerateRandom", unsafe {
            func(session, buf.as_mut_ptr(), len)
        })
    }
}

impl std::fmt::Debug for FuncList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuncList")
            .field("fntable", &self.fntable)
            .finish()
    }
}
