// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Session lifecycle against a single token
//!
//! A [TokenSession] walks the provider through
//! `C_Initialize -> C_OpenSession -> C_Login` and back through
//! `C_Logout -> C_CloseSession -> C_Finalize`. Teardown always runs in
//! reverse order of acquisition, either explicitly with
//! [TokenSession::disconnect] or when the value is dropped.

use crate::error::{Error, Result};
use crate::interface::FuncList;
use crate::pkcs11::*;
use crate::provider::Provider;

use log::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Initialized,
    SessionOpen,
    Authenticated,
    LoggedOut,
    SessionClosed,
    Finalized,
}

#[derive(Debug)]
pub struct TokenSession<'a> {
    provider: &'a Provider,
    state: SessionState,
    slot: Option<CK_SLOT_ID>,
    handle: CK_SESSION_HANDLE,
    /* false when the provider was already initialized by someone else */
    owns_init: bool,
}

fn keep_first(first: &mut Option<Error>, e: Error) {
    if first.is_none() {
        *first = Some(e);
    }
}

impl<'a> TokenSession<'a> {
    pub fn new(provider: &'a Provider) -> TokenSession<'a> {
        TokenSession {
            provider: provider,
            state: SessionState::Unconnected,
            slot: None,
            handle: CK_INVALID_HANDLE,
            owns_init: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn slot(&self) -> Option<CK_SLOT_ID> {
        self.slot
    }

    pub fn provider(&self) -> &'a Provider {
        self.provider
    }

    pub fn funcs(&self) -> &'a FuncList {
        self.provider.funcs()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    /// Returns the session handle if it is currently usable
    pub fn handle(&self) -> Result<CK_SESSION_HANDLE> {
        match self.state {
            SessionState::SessionOpen | SessionState::Authenticated => {
                Ok(self.handle)
            }
            s => Err(Error::precondition(format!(
                "session handle not valid in state {:?}",
                s
            ))),
        }
    }

    /// Fails unless the provider has been initialized and not finalized
    pub fn require_initialized(&self) -> Result<()> {
        match self.state {
            SessionState::Unconnected | SessionState::Finalized => {
                Err(Error::precondition(format!(
                    "provider not initialized in state {:?}",
                    self.state
                )))
            }
            _ => Ok(()),
        }
    }

    fn require(&self, allowed: &[SessionState], what: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::precondition(format!(
                "can't {} in state {:?}",
                what, self.state
            )))
        }
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.require(
            &[SessionState::Unconnected, SessionState::Finalized],
            "initialize",
        )?;
        match self.funcs().initialize() {
            Ok(owned) => {
                if !owned {
                    debug!("Provider already initialized, not finalizing it");
                }
                self.owns_init = owned;
                self.state = SessionState::Initialized;
                Ok(())
            }
            Err(e) => {
                error!("{}", e);
                Err(e)
            }
        }
    }

    /// Opens a serial read/write session on `slot`
    pub fn open(&mut self, slot: CK_SLOT_ID) -> Result<()> {
        self.require(
            &[SessionState::Initialized, SessionState::SessionClosed],
            "open a session",
        )?;
        let flags = CKF_SERIAL_SESSION | CKF_RW_SESSION;
        match self.funcs().open_session(slot, flags) {
            Ok(handle) => {
                debug!("Opened session {} on slot {}", handle, slot);
                self.handle = handle;
                self.slot = Some(slot);
                self.state = SessionState::SessionOpen;
                Ok(())
            }
            Err(e) => {
                error!("{}", e);
                Err(e)
            }
        }
    }

    /// Authenticates as the normal user
    pub fn login(&mut self, pin: &str) -> Result<()> {
        self.require(&[SessionState::SessionOpen], "login")?;
        match self.funcs().login(self.handle, CKU_USER, pin.as_bytes()) {
            Ok(()) => {
                debug!("Logged in on session {}", self.handle);
                self.state = SessionState::Authenticated;
                Ok(())
            }
            Err(e) => {
                error!("{}", e);
                Err(e)
            }
        }
    }

    /// initialize, open and login in sequence
    ///
    /// The first failure is returned as is, whatever was acquired before
    /// it is left in place and released by [TokenSession::disconnect] or
    /// on drop.
    pub fn connect(&mut self, slot: CK_SLOT_ID, pin: &str) -> Result<()> {
        self.initialize()?;
        self.open(slot)?;
        self.login(pin)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.require(&[SessionState::Authenticated], "logout")?;
        self.funcs().logout(self.handle)?;
        debug!("Logged out of session {}", self.handle);
        self.state = SessionState::LoggedOut;
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.require(
            &[
                SessionState::SessionOpen,
                SessionState::Authenticated,
                SessionState::LoggedOut,
            ],
            "close the session",
        )?;
        let handle = self.handle;
        self.funcs().close_session(handle)?;
        debug!("Closed session {}", handle);
        self.handle = CK_INVALID_HANDLE;
        self.state = SessionState::SessionClosed;
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<()> {
        self.require(
            &[SessionState::Initialized, SessionState::SessionClosed],
            "finalize",
        )?;
        self.do_finalize()
    }

    fn do_finalize(&mut self) -> Result<()> {
        if self.owns_init {
            self.funcs().finalize()?;
            debug!("Finalized provider");
        }
        self.owns_init = false;
        self.handle = CK_INVALID_HANDLE;
        self.state = SessionState::Finalized;
        Ok(())
    }

    /// Releases everything acquired so far, in reverse order
    ///
    /// Every step is attempted even when an earlier one fails, the first
    /// failure is returned. The session can't be used afterwards.
    pub fn disconnect(&mut self) -> Result<()> {
        let mut first: Option<Error> = None;
        if self.state == SessionState::Authenticated {
            if let Err(e) = self.logout() {
                error!("{}", e);
                keep_first(&mut first, e);
            }
        }
        if matches!(
            self.state,
            SessionState::SessionOpen
                | SessionState::Authenticated
                | SessionState::LoggedOut
        ) {
            if let Err(e) = self.close() {
                error!("{}", e);
                keep_first(&mut first, e);
            }
        }
        if !matches!(
            self.state,
            SessionState::Unconnected | SessionState::Finalized
        ) {
            if let Err(e) = self.do_finalize() {
                error!("{}", e);
                keep_first(&mut first, e);
            }
        }
        /* nothing is retried, the handle is considered gone */
        self.handle = CK_INVALID_HANDLE;
        if self.state != SessionState::Unconnected {
            self.state = SessionState::Finalized;
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Fills a buffer of `len` bytes from the token RNG
    pub fn generate_random(&self, len: usize) -> Result<Vec<u8>> {
        let handle = self.handle()?;
        let mut buf = vec![0u8; len];
        if let Err(e) = self.funcs().generate_random(handle, &mut buf) {
            error!("{}", e);
            return Err(e);
        }
        Ok(buf)
    }
}

impl Drop for TokenSession<'_> {
    fn drop(&mut self) {
        if matches!(
            self.state,
            SessionState::Unconnected | SessionState::Finalized
        ) {
            return;
        }
        if let Err(e) = self.disconnect() {
            warn!("Teardown of session on drop failed: {}", e);
        }
    }
}
