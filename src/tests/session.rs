// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use crate::tests::*;

use serial_test::serial;

#[test]
#[serial]
fn test_connect_disconnect() {
    let testtokn = TestToken::new();
    let mut session = testtokn.session();
    assert_eq!(session.state(), SessionState::Unconnected);

    ret_or_panic!(session.connect(MOCK_SLOT, MOCK_USER_PIN));
    assert_eq!(session.state(), SessionState::Authenticated);
    assert_eq!(session.slot(), Some(MOCK_SLOT));
    assert!(session.handle().is_ok());
    assert!(mock::is_logged_in());
    assert_eq!(
        mock::calls(),
        vec!["C_Initialize", "C_OpenSession", "C_Login"]
    );

    mock::clear_calls();
    ret_or_panic!(session.disconnect());
    assert_eq!(
        mock::calls(),
        vec!["C_Logout", "C_CloseSession", "C_Finalize"]
    );
    assert_eq!(session.state(), SessionState::Finalized);
    assert!(!mock::is_initialized());
    assert_eq!(mock::open_sessions(), 0);

    /* nothing left to release */
    mock::clear_calls();
    drop(session);
    assert!(mock::calls().is_empty());
}

#[test]
#[serial]
fn test_step_by_step() {
    let testtokn = TestToken::new();
    let mut session = testtokn.session();

    ret_or_panic!(session.initialize());
    assert_eq!(session.state(), SessionState::Initialized);
    ret_or_panic!(session.open(MOCK_SLOT));
    assert_eq!(session.state(), SessionState::SessionOpen);
    ret_or_panic!(session.login(MOCK_USER_PIN));
    assert!(session.is_authenticated());
    ret_or_panic!(session.logout());
    assert_eq!(session.state(), SessionState::LoggedOut);

    /* the handle is gone once logged out */
    let err = session.handle().unwrap_err();
    assert!(err.is_precondition());

    ret_or_panic!(session.close());
    assert_eq!(session.state(), SessionState::SessionClosed);
    ret_or_panic!(session.finalize());
    assert_eq!(session.state(), SessionState::Finalized);
    assert!(!mock::is_initialized());
}

#[test]
#[serial]
fn test_wrong_pin() {
    let testtokn = TestToken::new();
    let mut session = testtokn.session();

    let err = session.connect(MOCK_SLOT, "0000").unwrap_err();
    assert!(err.is_rv("C_Login", CKR_PIN_INCORRECT));
    assert_eq!(
        err.to_string(),
        "C_Login failed with RV: 0x000000a0 (CKR_PIN_INCORRECT)"
    );
    /* no rollback on failure */
    assert_eq!(session.state(), SessionState::SessionOpen);
    assert_eq!(mock::open_sessions(), 1);

    mock::clear_calls();
    drop(session);
    assert_eq!(mock::calls(), vec!["C_CloseSession", "C_Finalize"]);
    assert!(!mock::is_initialized());
}

#[test]
#[serial]
fn test_invalid_slot() {
    let testtokn = TestToken::new();
    let mut session = testtokn.session();

    let err = session.connect(99, MOCK_USER_PIN).unwrap_err();
    assert!(err.is_rv("C_OpenSession", CKR_SLOT_ID_INVALID));
    assert_eq!(session.state(), SessionState::Initialized);

    let err = session.connect(mock::MOCK_EMPTY_SLOT, MOCK_USER_PIN);
    /* connect can't restart from the middle */
    assert!(err.unwrap_err().is_precondition());

    mock::clear_calls();
    ret_or_panic!(session.disconnect());
    assert_eq!(mock::calls(), vec!["C_Finalize"]);
}

#[test]
#[serial]
fn test_initialize_failure() {
    let testtokn = TestToken::new();
    mock::inject_failure("C_Initialize", CKR_GENERAL_ERROR);
    let mut session = testtokn.session();

    let err = session.connect(MOCK_SLOT, MOCK_USER_PIN).unwrap_err();
    assert!(err.is_rv("C_Initialize", CKR_GENERAL_ERROR));
    assert_eq!(session.state(), SessionState::Unconnected);

    mock::clear_calls();
    drop(session);
    assert!(mock::calls().is_empty());
}

#[test]
#[serial]
fn test_already_initialized() {
    let testtokn = TestToken::new();
    /* someone else in the process initialized the provider */
    assert_eq!(ret_or_panic!(testtokn.provider.funcs().initialize()), true);

    let mut session = testtokn.session();
    ret_or_panic!(session.connect(MOCK_SLOT, MOCK_USER_PIN));

    mock::clear_calls();
    ret_or_panic!(session.disconnect());
    assert_eq!(mock::calls(), vec!["C_Logout", "C_CloseSession"]);
    assert!(mock::is_initialized());
}

#[test]
#[serial]
fn test_teardown_continues_after_failure() {
    let testtokn = TestToken::new();
    let mut session = testtokn.connected();
    mock::inject_failure("C_Logout", CKR_DEVICE_ERROR);

    mock::clear_calls();
    let err = session.disconnect().unwrap_err();
    assert!(err.is_rv("C_Logout", CKR_DEVICE_ERROR));
    assert_eq!(
        mock::calls(),
        vec!["C_Logout", "C_CloseSession", "C_Finalize"]
    );
    assert_eq!(session.state(), SessionState::Finalized);

    /* teardown is attempted only once */
    mock::clear_calls();
    drop(session);
    assert!(mock::calls().is_empty());
}

#[test]
#[serial]
fn test_drop_tears_down() {
    let testtokn = TestToken::new();
    {
        let session = testtokn.connected();
        assert!(session.is_authenticated());
        mock::clear_calls();
    }
    assert_eq!(
        mock::calls(),
        vec!["C_Logout", "C_CloseSession", "C_Finalize"]
    );
    assert!(!mock::is_initialized());
    assert!(!mock::is_logged_in());
}

#[test]
#[serial]
fn test_preconditions() {
    let testtokn = TestToken::new();
    let mut session = testtokn.session();

    assert!(session.login(MOCK_USER_PIN).unwrap_err().is_precondition());
    assert!(session.open(MOCK_SLOT).unwrap_err().is_precondition());
    assert!(session.logout().unwrap_err().is_precondition());
    assert!(session.close().unwrap_err().is_precondition());
    assert!(session.handle().unwrap_err().is_precondition());
    assert!(session.generate_random(16).unwrap_err().is_precondition());
    assert!(mock::calls().is_empty());

    ret_or_panic!(session.initialize());
    assert!(session.initialize().unwrap_err().is_precondition());
    ret_or_panic!(session.open(MOCK_SLOT));
    assert!(session.finalize().unwrap_err().is_precondition());
}

#[test]
#[serial]
fn test_reconnect() {
    let testtokn = TestToken::new();
    let mut session = testtokn.connected();
    ret_or_panic!(session.disconnect());

    ret_or_panic!(session.connect(mock::MOCK_SECOND_SLOT, MOCK_USER_PIN));
    assert_eq!(session.slot(), Some(mock::MOCK_SECOND_SLOT));
    assert!(session.is_authenticated());
}

#[test]
#[serial]
fn test_generate_random() {
    let testtokn = TestToken::new();
    let session = testtokn.connected();

    let a = ret_or_panic!(session.generate_random(16));
    let b = ret_or_panic!(session.generate_random(16));
    assert_eq!(a.len(), 16);
    assert_eq!(b.len(), 16);
    assert_ne!(a, b);

    let empty = ret_or_panic!(session.generate_random(0));
    assert!(empty.is_empty());
}
