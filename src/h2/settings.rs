//! HTTP/2 settings management
//!
//! This module implements SETTINGS parameters as defined in RFC 7540
//! Section 6.5. Parameters this crate does not know are carried through
//! verbatim in [`Settings::unknown`].

use super::error::{Error, Result};
use super::{DEFAULT_HEADER_TABLE_SIZE, DEFAULT_INITIAL_WINDOW_SIZE, DEFAULT_MAX_FRAME_SIZE};
use bytes::{Buf, BufMut, BytesMut};
use std::fmt;

/// Size of one encoded parameter: 2-byte identifier, 4-byte value
pub const SETTING_SIZE: usize = 6;

/// Largest legal SETTINGS_MAX_FRAME_SIZE (2^24 - 1)
pub const MAX_MAX_FRAME_SIZE: u32 = 0x00FF_FFFF;

/// Largest legal SETTINGS_INITIAL_WINDOW_SIZE (2^31 - 1)
pub const MAX_INITIAL_WINDOW_SIZE: u32 = 0x7FFF_FFFF;

/// HTTP/2 settings parameters (RFC 7540 Section 6.5.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SettingsParameter {
    /// SETTINGS_HEADER_TABLE_SIZE (0x1)
    /// Maximum size of the header compression table used to decode blocks
    HeaderTableSize = 0x1,

    /// SETTINGS_ENABLE_PUSH (0x2)
    /// Used to disable server push
    EnablePush = 0x2,

    /// SETTINGS_MAX_CONCURRENT_STREAMS (0x3)
    MaxConcurrentStreams = 0x3,

    /// SETTINGS_INITIAL_WINDOW_SIZE (0x4)
    InitialWindowSize = 0x4,

    /// SETTINGS_MAX_FRAME_SIZE (0x5)
    /// Size of the largest frame payload the sender is willing to receive
    MaxFrameSize = 0x5,

    /// SETTINGS_MAX_HEADER_LIST_SIZE (0x6)
    /// Advises peer of the maximum size of header list
    MaxHeaderListSize = 0x6,

    /// SETTINGS_ENABLE_CONNECT_PROTOCOL (0x8) - RFC 8441
    EnableConnectProtocol = 0x8,

    /// SETTINGS_NO_RFC7540_PRIORITIES (0x9) - RFC 9218
    NoRfc7540Priorities = 0x9,
}

impl SettingsParameter {
    /// Convert to u16
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Create from u16
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x1 => Some(SettingsParameter::HeaderTableSize),
            0x2 => Some(SettingsParameter::EnablePush),
            0x3 => Some(SettingsParameter::MaxConcurrentStreams),
            0x4 => Some(SettingsParameter::InitialWindowSize),
            0x5 => Some(SettingsParameter::MaxFrameSize),
            0x6 => Some(SettingsParameter::MaxHeaderListSize),
            0x8 => Some(SettingsParameter::EnableConnectProtocol),
            0x9 => Some(SettingsParameter::NoRfc7540Priorities),
            _ => None,
        }
    }

    /// Get parameter name
    pub fn name(&self) -> &'static str {
        match self {
            SettingsParameter::HeaderTableSize => "HEADER_TABLE_SIZE",
            SettingsParameter::EnablePush => "ENABLE_PUSH",
            SettingsParameter::MaxConcurrentStreams => "MAX_CONCURRENT_STREAMS",
            SettingsParameter::InitialWindowSize => "INITIAL_WINDOW_SIZE",
            SettingsParameter::MaxFrameSize => "MAX_FRAME_SIZE",
            SettingsParameter::MaxHeaderListSize => "MAX_HEADER_LIST_SIZE",
            SettingsParameter::EnableConnectProtocol => "ENABLE_CONNECT_PROTOCOL",
            SettingsParameter::NoRfc7540Priorities => "NO_RFC7540_PRIORITIES",
        }
    }
}

impl fmt::Display for SettingsParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.as_u16())
    }
}

/// HTTP/2 settings
///
/// `None` means the parameter was not sent and the previous value stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Header table size (default: 4096)
    pub header_table_size: Option<u32>,

    /// Enable server push (default: true)
    pub enable_push: Option<bool>,

    /// Maximum concurrent streams (default: unlimited)
    pub max_concurrent_streams: Option<u32>,

    /// Initial window size (default: 65535)
    pub initial_window_size: Option<u32>,

    /// Maximum frame size (default: 16384, range: 16384-16777215)
    pub max_frame_size: Option<u32>,

    /// Maximum header list size (default: unlimited)
    pub max_header_list_size: Option<u32>,

    /// Enable CONNECT protocol (default: false)
    pub enable_connect_protocol: Option<bool>,

    /// Disable RFC 7540 priorities (default: false)
    pub no_rfc7540_priorities: Option<bool>,

    /// Unrecognised parameters in arrival order, re-sent as received
    pub unknown: Vec<(u16, u32)>,
}

impl Settings {
    /// Create empty settings
    pub fn new() -> Self {
        Settings::default()
    }

    /// Create default settings
    pub fn default_settings() -> Self {
        Settings {
            header_table_size: Some(DEFAULT_HEADER_TABLE_SIZE),
            enable_push: Some(true),
            max_concurrent_streams: None,
            initial_window_size: Some(DEFAULT_INITIAL_WINDOW_SIZE),
            max_frame_size: Some(DEFAULT_MAX_FRAME_SIZE),
            max_header_list_size: None,
            enable_connect_protocol: Some(false),
            no_rfc7540_priorities: Some(false),
            unknown: Vec::new(),
        }
    }

    /// Get header table size (with default)
    pub fn get_header_table_size(&self) -> u32 {
        self.header_table_size.unwrap_or(DEFAULT_HEADER_TABLE_SIZE)
    }

    /// Get enable push (with default)
    pub fn get_enable_push(&self) -> bool {
        self.enable_push.unwrap_or(true)
    }

    /// Get max concurrent streams (None = unlimited)
    pub fn get_max_concurrent_streams(&self) -> Option<u32> {
        self.max_concurrent_streams
    }

    /// Get initial window size (with default)
    pub fn get_initial_window_size(&self) -> u32 {
        self.initial_window_size.unwrap_or(DEFAULT_INITIAL_WINDOW_SIZE)
    }

    /// Get max frame size (with default)
    pub fn get_max_frame_size(&self) -> u32 {
        self.max_frame_size.unwrap_or(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Get max header list size (None = unlimited)
    pub fn get_max_header_list_size(&self) -> Option<u32> {
        self.max_header_list_size
    }

    /// Number of parameters that will be encoded
    pub fn len(&self) -> usize {
        let known = [
            self.header_table_size.is_some(),
            self.enable_push.is_some(),
            self.max_concurrent_streams.is_some(),
            self.initial_window_size.is_some(),
            self.max_frame_size.is_some(),
            self.max_header_list_size.is_some(),
            self.enable_connect_protocol.is_some(),
            self.no_rfc7540_priorities.is_some(),
        ];
        known.iter().filter(|set| **set).count() + self.unknown.len()
    }

    /// Whether no parameter is set
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate settings values
    pub fn validate(&self) -> Result<()> {
        if let Some(initial_window_size) = self.initial_window_size {
            if initial_window_size > MAX_INITIAL_WINDOW_SIZE {
                return Err(Error::FlowControl(format!(
                    "Initial window size {} exceeds maximum (2^31-1)",
                    initial_window_size
                )));
            }
        }

        if let Some(max_frame_size) = self.max_frame_size {
            if !(DEFAULT_MAX_FRAME_SIZE..=MAX_MAX_FRAME_SIZE).contains(&max_frame_size) {
                return Err(Error::InvalidSettings(format!(
                    "Max frame size {} outside valid range (16384-16777215)",
                    max_frame_size
                )));
            }
        }

        Ok(())
    }

    /// Merge settings from another Settings object
    /// (values in `other` override values in `self`)
    pub fn merge(&mut self, other: &Settings) {
        if other.header_table_size.is_some() {
            self.header_table_size = other.header_table_size;
        }
        if other.enable_push.is_some() {
            self.enable_push = other.enable_push;
        }
        if other.max_concurrent_streams.is_some() {
            self.max_concurrent_streams = other.max_concurrent_streams;
        }
        if other.initial_window_size.is_some() {
            self.initial_window_size = other.initial_window_size;
        }
        if other.max_frame_size.is_some() {
            self.max_frame_size = other.max_frame_size;
        }
        if other.max_header_list_size.is_some() {
            self.max_header_list_size = other.max_header_list_size;
        }
        if other.enable_connect_protocol.is_some() {
            self.enable_connect_protocol = other.enable_connect_protocol;
        }
        if other.no_rfc7540_priorities.is_some() {
            self.no_rfc7540_priorities = other.no_rfc7540_priorities;
        }
        for &(id, value) in &other.unknown {
            self.set_unknown(id, value);
        }
    }

    fn set_unknown(&mut self, id: u16, value: u32) {
        match self.unknown.iter_mut().find(|(known, _)| *known == id) {
            Some(slot) => slot.1 = value,
            None => self.unknown.push((id, value)),
        }
    }

    /// Append the SETTINGS payload: known parameters by identifier, then
    /// unknown ones in arrival order.
    pub fn encode_payload(&self, dst: &mut BytesMut) {
        let known = [
            (SettingsParameter::HeaderTableSize, self.header_table_size),
            (SettingsParameter::EnablePush, self.enable_push.map(u32::from)),
            (SettingsParameter::MaxConcurrentStreams, self.max_concurrent_streams),
            (SettingsParameter::InitialWindowSize, self.initial_window_size),
            (SettingsParameter::MaxFrameSize, self.max_frame_size),
            (SettingsParameter::MaxHeaderListSize, self.max_header_list_size),
            (SettingsParameter::EnableConnectProtocol, self.enable_connect_protocol.map(u32::from)),
            (SettingsParameter::NoRfc7540Priorities, self.no_rfc7540_priorities.map(u32::from)),
        ];

        dst.reserve(self.len() * SETTING_SIZE);
        for (param, value) in known {
            if let Some(value) = value {
                dst.put_u16(param.as_u16());
                dst.put_u32(value);
            }
        }
        for &(id, value) in &self.unknown {
            dst.put_u16(id);
            dst.put_u32(value);
        }
    }

    /// Parse and validate a non-ACK SETTINGS payload.
    ///
    /// Parameters are applied in order, so a repeated identifier keeps its
    /// last value.
    pub fn decode_payload(mut payload: &[u8]) -> Result<Settings> {
        if payload.len() % SETTING_SIZE != 0 {
            return Err(Error::FrameSize(format!(
                "SETTINGS payload length {} is not a multiple of 6",
                payload.len()
            )));
        }

        let mut settings = Settings::new();
        while payload.has_remaining() {
            let id = payload.get_u16();
            let value = payload.get_u32();

            match SettingsParameter::from_u16(id) {
                Some(SettingsParameter::HeaderTableSize) => settings.header_table_size = Some(value),
                Some(SettingsParameter::EnablePush) => {
                    settings.enable_push = Some(decode_flag(SettingsParameter::EnablePush, value)?)
                }
                Some(SettingsParameter::MaxConcurrentStreams) => {
                    settings.max_concurrent_streams = Some(value)
                }
                Some(SettingsParameter::InitialWindowSize) => {
                    settings.initial_window_size = Some(value)
                }
                Some(SettingsParameter::MaxFrameSize) => settings.max_frame_size = Some(value),
                Some(SettingsParameter::MaxHeaderListSize) => {
                    settings.max_header_list_size = Some(value)
                }
                Some(param @ SettingsParameter::EnableConnectProtocol) => {
                    settings.enable_connect_protocol = Some(decode_flag(param, value)?)
                }
                Some(param @ SettingsParameter::NoRfc7540Priorities) => {
                    settings.no_rfc7540_priorities = Some(decode_flag(param, value)?)
                }
                None => settings.set_unknown(id, value),
            }
        }

        settings.validate()?;
        Ok(settings)
    }
}

fn decode_flag(param: SettingsParameter, value: u32) -> Result<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(Error::InvalidSettings(format!(
            "{} must be 0 or 1, got {}",
            param.name(),
            value
        ))),
    }
}

/// Builder for HTTP/2 settings
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// Create a new settings builder
    pub fn new() -> Self {
        SettingsBuilder {
            settings: Settings::new(),
        }
    }

    /// Set header table size
    pub fn header_table_size(mut self, size: u32) -> Self {
        self.settings.header_table_size = Some(size);
        self
    }

    /// Set enable push
    pub fn enable_push(mut self, enable: bool) -> Self {
        self.settings.enable_push = Some(enable);
        self
    }

    /// Set max concurrent streams
    pub fn max_concurrent_streams(mut self, max: u32) -> Self {
        self.settings.max_concurrent_streams = Some(max);
        self
    }

    /// Set initial window size
    pub fn initial_window_size(mut self, size: u32) -> Self {
        self.settings.initial_window_size = Some(size);
        self
    }

    /// Set max frame size
    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.settings.max_frame_size = Some(size);
        self
    }

    /// Set max header list size
    pub fn max_header_list_size(mut self, size: u32) -> Self {
        self.settings.max_header_list_size = Some(size);
        self
    }

    /// Set enable CONNECT protocol
    pub fn enable_connect_protocol(mut self, enable: bool) -> Self {
        self.settings.enable_connect_protocol = Some(enable);
        self
    }

    /// Set no RFC 7540 priorities
    pub fn no_rfc7540_priorities(mut self, disable: bool) -> Self {
        self.settings.no_rfc7540_priorities = Some(disable);
        self
    }

    /// Add a parameter this crate has no name for
    pub fn unknown(mut self, id: u16, value: u32) -> Self {
        self.settings.unknown.push((id, value));
        self
    }

    /// Build the settings
    pub fn build(self) -> Result<Settings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
