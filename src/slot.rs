// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

//! Slot and token enumeration

use std::fmt;

use crate::error::Result;
use crate::misc::{padded_to_string, ulong_or_unavailable, version_pair};
use crate::pkcs11::*;
use crate::session::TokenSession;

use log::error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub slot_id: CK_SLOT_ID,
    pub description: String,
    pub manufacturer: String,
    pub flags: CK_FLAGS,
    pub hardware_version: (u8, u8),
    pub firmware_version: (u8, u8),
}

impl SlotInfo {
    fn from_ck(slot_id: CK_SLOT_ID, info: &CK_SLOT_INFO) -> SlotInfo {
        SlotInfo {
            slot_id: slot_id,
            description: padded_to_string(&info.slotDescription),
            manufacturer: padded_to_string(&info.manufacturerID),
            flags: info.flags,
            hardware_version: version_pair(&info.hardwareVersion),
            firmware_version: version_pair(&info.firmwareVersion),
        }
    }

    pub fn token_present(&self) -> bool {
        self.flags & CKF_TOKEN_PRESENT != 0
    }

    pub fn removable(&self) -> bool {
        self.flags & CKF_REMOVABLE_DEVICE != 0
    }

    pub fn hardware(&self) -> bool {
        self.flags & CKF_HW_SLOT != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub label: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub flags: CK_FLAGS,
    /* None when the token does not report the value */
    pub max_session_count: Option<CK_ULONG>,
    pub session_count: Option<CK_ULONG>,
    pub max_rw_session_count: Option<CK_ULONG>,
    pub rw_session_count: Option<CK_ULONG>,
    pub max_pin_len: CK_ULONG,
    pub min_pin_len: CK_ULONG,
    pub hardware_version: (u8, u8),
    pub firmware_version: (u8, u8),
}

impl From<&CK_TOKEN_INFO> for TokenInfo {
    fn from(info: &CK_TOKEN_INFO) -> TokenInfo {
        TokenInfo {
            label: padded_to_string(&info.label),
            manufacturer: padded_to_string(&info.manufacturerID),
            model: padded_to_string(&info.model),
            serial_number: padded_to_string(&info.serialNumber),
            flags: info.flags,
            max_session_count: ulong_or_unavailable(info.ulMaxSessionCount),
            session_count: ulong_or_unavailable(info.ulSessionCount),
            max_rw_session_count: ulong_or_unavailable(
                info.ulMaxRwSessionCount,
            ),
            rw_session_count: ulong_or_unavailable(info.ulRwSessionCount),
            max_pin_len: info.ulMaxPinLen,
            min_pin_len: info.ulMinPinLen,
            hardware_version: version_pair(&info.hardwareVersion),
            firmware_version: version_pair(&info.firmwareVersion),
        }
    }
}

impl TokenInfo {
    pub fn initialized(&self) -> bool {
        self.flags & CKF_TOKEN_INITIALIZED != 0
    }

    pub fn login_required(&self) -> bool {
        self.flags & CKF_LOGIN_REQUIRED != 0
    }

    pub fn user_pin_initialized(&self) -> bool {
        self.flags & CKF_USER_PIN_INITIALIZED != 0
    }

    pub fn has_rng(&self) -> bool {
        self.flags & CKF_RNG != 0
    }
}

/// A slot and, when one is present, the token in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDescription {
    pub slot: SlotInfo,
    pub token: Option<TokenInfo>,
}

fn count(v: Option<CK_ULONG>) -> String {
    match v {
        Some(n) => n.to_string(),
        None => String::from("unavailable"),
    }
}

impl fmt::Display for SlotDescription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = &self.slot;
        writeln!(f, "Slot {}", s.slot_id)?;
        writeln!(f, "  Description:      {}", s.description)?;
        writeln!(f, "  Manufacturer:     {}", s.manufacturer)?;
        writeln!(
            f,
            "  Hardware version: {}.{}",
            s.hardware_version.0, s.hardware_version.1
        )?;
        write!(
            f,
            "  Firmware version: {}.{}",
            s.firmware_version.0, s.firmware_version.1
        )?;
        match &self.token {
            None => write!(f, "\n  Token:            not present"),
            Some(t) => {
                writeln!(f)?;
                writeln!(f, "  Token label:      {}", t.label)?;
                writeln!(f, "  Token vendor:     {}", t.manufacturer)?;
                writeln!(f, "  Token model:      {}", t.model)?;
                writeln!(f, "  Serial number:    {}", t.serial_number)?;
                writeln!(
                    f,
                    "  Sessions:         {}/{}",
                    count(t.session_count),
                    count(t.max_session_count)
                )?;
                writeln!(
                    f,
                    "  RW sessions:      {}/{}",
                    count(t.rw_session_count),
                    count(t.max_rw_session_count)
                )?;
                write!(
                    f,
                    "  PIN length:       {}-{}",
                    t.min_pin_len, t.max_pin_len
                )
            }
        }
    }
}

/// Returns the slot identifiers, only those with a token if requested
pub fn slot_list(
    session: &TokenSession,
    token_present: bool,
) -> Result<Vec<CK_SLOT_ID>> {
    session.require_initialized()?;
    let funcs = session.funcs();
    let ret = funcs.get_slot_list(token_present, None).and_then(|count| {
        let mut slots = vec![0 as CK_SLOT_ID; usize::try_from(count)?];
        let filled = funcs.get_slot_list(token_present, Some(&mut slots))?;
        slots.truncate(usize::try_from(filled)?);
        Ok(slots)
    });
    if let Err(e) = &ret {
        error!("{}", e);
    }
    ret
}

pub fn slot_info(session: &TokenSession, slot: CK_SLOT_ID) -> Result<SlotInfo> {
    session.require_initialized()?;
    let info = session.funcs().get_slot_info(slot)?;
    Ok(SlotInfo::from_ck(slot, &info))
}

pub fn token_info(
    session: &TokenSession,
    slot: CK_SLOT_ID,
) -> Result<TokenInfo> {
    session.require_initialized()?;
    let info = session.funcs().get_token_info(slot)?;
    Ok(TokenInfo::from(&info))
}

/// Describes every listed slot and its token
pub fn enumerate(
    session: &TokenSession,
    token_present: bool,
) -> Result<Vec<SlotDescription>> {
    let mut out = Vec::new();
    for slot in slot_list(session, token_present)? {
        let info = slot_info(session, slot)?;
        let token = if info.token_present() {
            Some(token_info(session, slot)?)
        } else {
            None
        };
        out.push(SlotDescription {
            slot: info,
            token: token,
        });
    }
    Ok(out)
}
