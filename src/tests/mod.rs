// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use super::*;

use crate::pkcs11::*;

use mock::{MOCK_SLOT, MOCK_USER_PIN};

macro_rules! ret_or_panic {
    ($ret:expr) => {
        match $ret {
            Ok(r) => r,
            Err(e) => panic!("{e}"),
        }
    };
}

/// A provider backed by the mock function table
///
/// The mock keeps global state, tests using it must be `#[serial]`.
struct TestToken {
    provider: Provider,
    /* declared last so the provider never outlives the table */
    _fntable: Box<CK_FUNCTION_LIST>,
}

impl TestToken {
    fn new() -> TestToken {
        mock::reset();
        let fntable = mock::function_list();
        let provider = ret_or_panic!(unsafe {
            Provider::from_function_list(&*fntable as *const CK_FUNCTION_LIST)
        });
        TestToken {
            provider: provider,
            _fntable: fntable,
        }
    }

    fn session(&self) -> TokenSession<'_> {
        TokenSession::new(&self.provider)
    }

    fn connected(&self) -> TokenSession<'_> {
        let mut session = self.session();
        ret_or_panic!(session.connect(MOCK_SLOT, MOCK_USER_PIN));
        session
    }
}

mod session;
