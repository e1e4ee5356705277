// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Loading of a Cryptoki provider module
//!
//! A [Provider] owns the library handle and the function table obtained
//! from it. Sessions borrow the provider, so the library can only be
//! unloaded once every session built on top of it is gone.

use std::fmt;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::interface::FuncList;
use crate::misc::{padded_to_string, version_pair};
use crate::pkcs11::*;

use libloading::Library;
use log::{debug, error, info, warn};

#[cfg(unix)]
fn open_library(
    path: &str,
) -> std::result::Result<Library, libloading::Error> {
    use libloading::os::unix;
    let flags = unix::RTLD_LOCAL | unix::RTLD_NOW;
    let lib = unsafe { unix::Library::open(Some(path), flags)? };
    Ok(lib.into())
}

#[cfg(windows)]
fn open_library(
    path: &str,
) -> std::result::Result<Library, libloading::Error> {
    use libloading::os::windows;
    let lib = unsafe { windows::Library::new(path)? };
    Ok(lib.into())
}

/// Library level information as reported by C_GetInfo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub cryptoki_version: (u8, u8),
    pub manufacturer: String,
    pub flags: CK_FLAGS,
    pub description: String,
    pub library_version: (u8, u8),
}

impl From<&CK_INFO> for ProviderInfo {
    fn from(info: &CK_INFO) -> ProviderInfo {
        ProviderInfo {
            cryptoki_version: version_pair(&info.cryptokiVersion),
            manufacturer: padded_to_string(&info.manufacturerID),
            flags: info.flags,
            description: padded_to_string(&info.libraryDescription),
            library_version: version_pair(&info.libraryVersion),
        }
    }
}

impl fmt::Display for ProviderInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "Cryptoki version:    {}.{}",
            self.cryptoki_version.0, self.cryptoki_version.1
        )?;
        writeln!(f, "Manufacturer:        {}", self.manufacturer)?;
        writeln!(f, "Library description: {}", self.description)?;
        write!(
            f,
            "Library version:     {}.{}",
            self.library_version.0, self.library_version.1
        )
    }
}

pub struct Provider {
    funcs: FuncList,
    path: Option<String>,
    /* dropped last, the function table points into the library */
    library: Option<Library>,
}

impl Provider {
    /// Loads the module at `path` and fetches its function table
    pub fn load(path: &str) -> Result<Provider> {
        if path.is_empty() {
            return Err(Error::config(
                "provider module path not configured".to_string(),
            ));
        }
        if path.contains('\0') {
            return Err(Error::config(format!(
                "invalid module path {:?}: contains a nul byte",
                path
            )));
        }
        let library = match open_library(path) {
            Ok(l) => l,
            Err(e) => {
                let msg = format!("failed to load {}: {}", path, e);
                error!("{}", msg);
                return Err(Error::load(msg));
            }
        };
        let funcs = match unsafe {
            FuncList::from_library(&library, "C_GetFunctionList")
        } {
            Ok(f) => f,
            Err(e) => {
                error!("Failed to get function list from {}: {}", path, e);
                return Err(e);
            }
        };
        info!("Loaded Cryptoki provider {}", path);
        Ok(Provider {
            funcs: funcs,
            path: Some(path.to_string()),
            library: Some(library),
        })
    }

    /// Resolves the module path from the configuration and loads it
    pub fn from_config(config: &Config) -> Result<Provider> {
        let path = config.module_path()?;
        Self::load(&path)
    }

    /// Wraps a function table that is already present in this process
    ///
    /// Nothing is unloaded when the provider is dropped.
    ///
    /// # Safety
    ///
    /// `fntable` must point to a valid `CK_FUNCTION_LIST` that outlives
    /// the returned provider.
    pub unsafe fn from_function_list(
        fntable: *const CK_FUNCTION_LIST,
    ) -> Result<Provider> {
        if fntable.is_null() {
            return Err(Error::precondition(
                "null function table".to_string(),
            ));
        }
        Ok(Provider {
            funcs: FuncList::from_ptr(fntable),
            path: None,
            library: None,
        })
    }

    pub fn funcs(&self) -> &FuncList {
        &self.funcs
    }

    /// The path the module was loaded from, if any
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Returns the library information, the provider must be initialized
    pub fn info(&self) -> Result<ProviderInfo> {
        let info = self.funcs.get_info()?;
        Ok(ProviderInfo::from(&info))
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        let library = match self.library.take() {
            Some(l) => l,
            None => return,
        };
        self.funcs = FuncList::null();
        let path = self.path.as_deref().unwrap_or("<unknown>");
        match library.close() {
            Ok(()) => debug!("Unloaded {}", path),
            Err(e) => warn!("Failed to unload {}: {}", path, e),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("path", &self.path)
            .field("funcs", &self.funcs)
            .finish()
    }
}
