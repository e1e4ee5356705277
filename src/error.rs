// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Error type shared by every operation of the client

use std::error;
use std::fmt;

use crate::pkcs11::*;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    origin: Option<Box<dyn error::Error>>,
    errmsg: Option<String>,
    ckrv: CK_RV,
    operation: Option<&'static str>,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum ErrorKind {
    /* Missing or invalid configuration, see errmsg */
    Config,
    /* The provider module could not be loaded or linked, see errmsg */
    Load,
    /* A Cryptoki call returned a non OK status, see operation and ckrv */
    CkError,
    /* Rejected before reaching the provider, see errmsg */
    Precondition,
    /* Other error, see origin */
    Nested,
}

macro_rules! rv_names {
    ($rv:expr; $($name:ident),* $(,)?) => {
        match $rv {
            $($name => std::stringify!($name),)*
            _ => "CKR_VENDOR_DEFINED or unknown",
        }
    };
}

/// Returns the symbolic name of the most common Cryptoki return values
pub fn rv_name(rv: CK_RV) -> &'static str {
    rv_names!(rv;
        CKR_OK,
        CKR_CANCEL,
        CKR_HOST_MEMORY,
        CKR_SLOT_ID_INVALID,
        CKR_GENERAL_ERROR,
        CKR_FUNCTION_FAILED,
        CKR_ARGUMENTS_BAD,
        CKR_ATTRIBUTE_READ_ONLY,
        CKR_ATTRIBUTE_SENSITIVE,
        CKR_ATTRIBUTE_TYPE_INVALID,
        CKR_ATTRIBUTE_VALUE_INVALID,
        CKR_DATA_INVALID,
        CKR_DATA_LEN_RANGE,
        CKR_DEVICE_ERROR,
        CKR_DEVICE_MEMORY,
        CKR_DEVICE_REMOVED,
        CKR_ENCRYPTED_DATA_INVALID,
        CKR_ENCRYPTED_DATA_LEN_RANGE,
        CKR_FUNCTION_NOT_SUPPORTED,
        CKR_KEY_HANDLE_INVALID,
        CKR_KEY_SIZE_RANGE,
        CKR_KEY_TYPE_INCONSISTENT,
        CKR_KEY_FUNCTION_NOT_PERMITTED,
        CKR_MECHANISM_INVALID,
        CKR_MECHANISM_PARAM_INVALID,
        CKR_OBJECT_HANDLE_INVALID,
        CKR_OPERATION_ACTIVE,
        CKR_OPERATION_NOT_INITIALIZED,
        CKR_PIN_INCORRECT,
        CKR_PIN_INVALID,
        CKR_PIN_LEN_RANGE,
        CKR_PIN_EXPIRED,
        CKR_PIN_LOCKED,
        CKR_SESSION_CLOSED,
        CKR_SESSION_COUNT,
        CKR_SESSION_HANDLE_INVALID,
        CKR_SESSION_PARALLEL_NOT_SUPPORTED,
        CKR_SESSION_READ_ONLY,
        CKR_SIGNATURE_INVALID,
        CKR_SIGNATURE_LEN_RANGE,
        CKR_TEMPLATE_INCOMPLETE,
        CKR_TEMPLATE_INCONSISTENT,
        CKR_TOKEN_NOT_PRESENT,
        CKR_TOKEN_NOT_RECOGNIZED,
        CKR_TOKEN_WRITE_PROTECTED,
        CKR_USER_ALREADY_LOGGED_IN,
        CKR_USER_NOT_LOGGED_IN,
        CKR_USER_PIN_NOT_INITIALIZED,
        CKR_USER_TYPE_INVALID,
        CKR_DOMAIN_PARAMS_INVALID,
        CKR_BUFFER_TOO_SMALL,
        CKR_CRYPTOKI_NOT_INITIALIZED,
        CKR_CRYPTOKI_ALREADY_INITIALIZED,
    )
}

impl Error {
    /// A non OK status returned by the named Cryptoki function
    pub fn ck_rv(operation: &'static str, ckrv: CK_RV) -> Error {
        Error {
            kind: ErrorKind::CkError,
            origin: None,
            errmsg: None,
            ckrv: ckrv,
            operation: Some(operation),
        }
    }

    pub fn config(errmsg: String) -> Error {
        Error {
            kind: ErrorKind::Config,
            origin: None,
            errmsg: Some(errmsg),
            ckrv: CKR_GENERAL_ERROR,
            operation: None,
        }
    }

    pub fn config_from_error<E>(error: E) -> Error
    where
        E: Into<Box<dyn error::Error>>,
    {
        Error {
            kind: ErrorKind::Config,
            origin: Some(error.into()),
            errmsg: None,
            ckrv: CKR_GENERAL_ERROR,
            operation: None,
        }
    }

    pub fn load(errmsg: String) -> Error {
        Error {
            kind: ErrorKind::Load,
            origin: None,
            errmsg: Some(errmsg),
            ckrv: CKR_GENERAL_ERROR,
            operation: None,
        }
    }

    pub fn precondition(errmsg: String) -> Error {
        Error {
            kind: ErrorKind::Precondition,
            origin: None,
            errmsg: Some(errmsg),
            ckrv: CKR_GENERAL_ERROR,
            operation: None,
        }
    }

    pub fn other_error<E>(error: E) -> Error
    where
        E: Into<Box<dyn error::Error>>,
    {
        Error {
            kind: ErrorKind::Nested,
            origin: Some(error.into()),
            errmsg: None,
            ckrv: CKR_GENERAL_ERROR,
            operation: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The raw status; only meaningful for `ErrorKind::CkError`
    pub fn rv(&self) -> CK_RV {
        self.ckrv
    }

    /// The Cryptoki function that failed, if any
    pub fn operation(&self) -> Option<&'static str> {
        self.operation
    }

    pub fn is_precondition(&self) -> bool {
        self.kind == ErrorKind::Precondition
    }

    /// True when the named function failed with the given status
    pub fn is_rv(&self, operation: &str, ckrv: CK_RV) -> bool {
        self.kind == ErrorKind::CkError
            && self.operation == Some(operation)
            && self.ckrv == ckrv
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ErrorKind::CkError => write!(
                f,
                "{} failed with RV: {:#010x} ({})",
                self.operation.unwrap_or("Cryptoki call"),
                self.ckrv,
                rv_name(self.ckrv)
            ),
            ErrorKind::Config => match (&self.errmsg, &self.origin) {
                (Some(msg), _) => write!(f, "configuration error: {}", msg),
                (None, Some(e)) => write!(f, "configuration error: {}", e),
                (None, None) => write!(f, "configuration error"),
            },
            ErrorKind::Load => write!(
                f,
                "load failed: {}",
                self.errmsg.as_deref().unwrap_or("unknown reason")
            ),
            ErrorKind::Precondition => write!(
                f,
                "precondition violated: {}",
                self.errmsg.as_deref().unwrap_or("invalid call")
            ),
            ErrorKind::Nested => match &self.origin {
                Some(e) => write!(f, "{}", e),
                None => write!(f, "unknown error"),
            },
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.origin.as_deref()
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Error {
        Error::other_error(error)
    }
}

impl From<std::num::TryFromIntError> for Error {
    fn from(error: std::num::TryFromIntError) -> Error {
        Error::other_error(error)
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Error {
        Error::config_from_error(error)
    }
}
