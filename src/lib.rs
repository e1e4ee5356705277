// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! This is p11client
//!
//! A small client for PKCS#11 (Cryptoki) tokens. It loads a provider
//! module, drives one authenticated session against a slot and asks the
//! token to generate keys, encrypt, decrypt, sign and verify. No
//! cryptography is performed in this crate, all of it happens in the
//! token.
//!
//! ```no_run
//! use p11client::encryption::{aes_cbc_decrypt, aes_cbc_encrypt};
//! use p11client::keys::{generate_aes_key, AesKeyLength, KeyOptions};
//! use p11client::{Provider, TokenSession};
//!
//! # fn main() -> p11client::Result<()> {
//! let provider = Provider::load("/usr/lib64/softhsm/libsofthsm.so")?;
//! let mut session = TokenSession::new(&provider);
//! session.connect(0, "1234")?;
//! let len = AesKeyLength::Aes128;
//! let opts = KeyOptions::new(&len.default_label());
//! let key = generate_aes_key(&session, len, &opts)?;
//! let ct = aes_cbc_encrypt(&session, key, b"some data")?;
//! assert_eq!(aes_cbc_decrypt(&session, key, &ct)?, b"some data");
//! session.disconnect()
//! # }
//! ```

/// Raw Cryptoki types, constants and function table definitions
pub mod pkcs11 {
    pub use cryptoki_sys::*;
}

pub mod attribute;
pub mod config;
pub mod encryption;
pub mod error;
pub mod interface;
pub mod keys;
pub mod log;
pub mod mechanism;
pub mod misc;
pub mod operation;
pub mod provider;
pub mod session;
pub mod signature;
pub mod slot;

pub use error::{Error, ErrorKind, Result};
pub use provider::{Provider, ProviderInfo};
pub use session::{SessionState, TokenSession};

#[cfg(test)]
mod tests;
