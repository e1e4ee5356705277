// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! End to end runs against a real module
//!
//! Point SOFTHSM2_LIB at the module and set TEST_PKCS11_SLOT and
//! TEST_PKCS11_PIN for an initialized token, then run with
//! `--features integration_tests`.

#![cfg(feature = "integration_tests")]

use std::env;
use std::error::Error;

use p11client::config::Config;
use p11client::encryption::*;
use p11client::keys::*;
use p11client::mechanism::{OaepHash, OaepParams};
use p11client::pkcs11::CK_SLOT_ID;
use p11client::signature::{ecdsa_sign, ecdsa_verify, Verification};
use p11client::slot::enumerate;
use p11client::{Provider, TokenSession};

type TestResult = Result<(), Box<dyn Error>>;

fn slot_and_pin() -> Result<(CK_SLOT_ID, String), Box<dyn Error>> {
    let slot = env::var("TEST_PKCS11_SLOT")?.parse::<CK_SLOT_ID>()?;
    let pin = env::var("TEST_PKCS11_PIN")?;
    Ok((slot, pin))
}

fn provider() -> Result<Provider, Box<dyn Error>> {
    Ok(Provider::from_config(&Config::new())?)
}

#[test]
fn softhsm_enumerate() -> TestResult {
    let provider = provider()?;
    let (slot, _) = slot_and_pin()?;
    let mut session = TokenSession::new(&provider);
    session.initialize()?;

    let info = provider.info()?;
    assert_eq!(info.cryptoki_version.0, 2);

    let slots = enumerate(&session, true)?;
    assert!(slots.iter().any(|s| s.slot.slot_id == slot));
    assert!(slots.iter().all(|s| s.token.is_some()));
    session.disconnect()?;
    Ok(())
}

#[test]
fn softhsm_aes() -> TestResult {
    let provider = provider()?;
    let (slot, pin) = slot_and_pin()?;
    let mut session = TokenSession::new(&provider);
    session.connect(slot, &pin)?;

    let plaintext = b"This is to test our AES encryption scheme \
        implementation and we are adding some texts on line #2";
    for len in [
        AesKeyLength::Aes128,
        AesKeyLength::Aes192,
        AesKeyLength::Aes256,
    ] {
        let opts = KeyOptions::new(&len.default_label()).session_object();
        let key = generate_aes_key(&session, len, &opts)?;
        let ct = aes_cbc_encrypt(&session, key, plaintext)?;
        assert_eq!(ct.data.len() % 16, 0);
        assert_eq!(aes_cbc_decrypt(&session, key, &ct)?, plaintext);
    }

    session.disconnect()?;
    Ok(())
}

#[test]
fn softhsm_rsa_oaep() -> TestResult {
    let provider = provider()?;
    let (slot, pin) = slot_and_pin()?;
    let mut session = TokenSession::new(&provider);
    session.connect(slot, &pin)?;

    let plaintext = b"This is to test our RSA-OAEO encryption scheme \
        implementation.";
    let opts = KeyOptions::new("RSA 2048-bit key").session_object();
    let pair = generate_rsa_key_pair(&session, &RsaKeySpec::default(), &opts)?;
    for hash in [OaepHash::Sha1, OaepHash::Sha256] {
        let params = OaepParams::new(hash);
        let ct = rsa_oaep_encrypt(&session, pair.public, &params, plaintext)?;
        assert_eq!(ct.len(), 256);
        let pt = rsa_oaep_decrypt(&session, pair.private, &params, &ct)?;
        assert_eq!(pt, plaintext);
    }

    session.disconnect()?;
    Ok(())
}

#[test]
fn softhsm_ecdsa() -> TestResult {
    let provider = provider()?;
    let (slot, pin) = slot_and_pin()?;
    let mut session = TokenSession::new(&provider);
    session.connect(slot, &pin)?;

    let data = b"This data is for testing only";
    let curve = EcCurve::Secp521r1;
    let opts = KeyOptions::new("ECDSA secp521r1 key").session_object();
    let pair = generate_ecdsa_key_pair(&session, curve.oid_der(), &opts)?;

    let mut sig = ecdsa_sign(&session, pair.private, data)?;
    assert_eq!(sig.len(), curve.signature_len());
    assert_eq!(
        ecdsa_verify(&session, pair.public, data, &sig)?,
        Verification::Valid
    );

    sig[0] ^= 0xff;
    assert_eq!(
        ecdsa_verify(&session, pair.public, data, &sig)?,
        Verification::Invalid
    );

    session.disconnect()?;
    Ok(())
}
