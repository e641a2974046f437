//! Auth channel wire messages
//!
//! Everything here is encoded with the protocol-buffers wire format
//! (proto2 semantics):
//!
//! ```text
//! Packet          { Proof proof = 1; Result result = 2; }   exactly one set
//! Proof           { bytes public_key = 1; bytes signature = 2; }
//! Result          { required bool accepted = 1; bool is_known_contact = 2; }
//!
//! OpenChannel     { required int32 channel_identifier = 1;
//!                   required string channel_type = 2;
//!                   bytes client_cookie = 7200; }               (extension)
//! ChannelResult   { required int32 channel_identifier = 1;
//!                   required bool opened = 2;
//!                   CommonError common_error = 3;
//!                   bytes server_cookie = 7200; }               (extension)
//! ```
//!
//! Unknown fields are skipped. Malformed input is a `ProtocolViolation`.

use std::fmt;

use crate::crypto::random::{random_array, RandomSource};
use crate::error::{AuthError, ChannelError, Result};

/// Channel type this crate implements
pub const CHANNEL_TYPE: &str = "im.ricochet.auth.hidden-service";

/// Extension field carrying the cookies on OpenChannel / ChannelResult
pub const COOKIE_EXTENSION_FIELD: u32 = 7200;

pub const COOKIE_LEN: usize = 16;

// ===== Wire primitives =====

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

fn violation(msg: impl Into<String>) -> AuthError {
    AuthError::ProtocolViolation(msg.into())
}

fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

fn put_tag(buf: &mut Vec<u8>, field: u32, wire_type: u8) {
    put_varint(buf, (u64::from(field) << 3) | u64::from(wire_type));
}

fn put_bytes(buf: &mut Vec<u8>, field: u32, data: &[u8]) {
    put_tag(buf, field, WIRE_LEN);
    put_varint(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

fn put_bool(buf: &mut Vec<u8>, field: u32, value: bool) {
    put_tag(buf, field, WIRE_VARINT);
    put_varint(buf, u64::from(value));
}

fn put_int32(buf: &mut Vec<u8>, field: u32, value: i32) {
    put_tag(buf, field, WIRE_VARINT);
    // Negative int32 values are sign-extended to 10 bytes
    put_varint(buf, i64::from(value) as u64);
}

enum FieldValue<'a> {
    Varint(u64),
    Bytes(&'a [u8]),
    Fixed,
}

impl<'a> FieldValue<'a> {
    fn as_bool(&self, name: &str) -> Result<bool> {
        match self {
            FieldValue::Varint(v) => Ok(*v != 0),
            _ => Err(violation(format!("field {} has the wrong wire type", name))),
        }
    }

    fn as_int32(&self, name: &str) -> Result<i32> {
        match self {
            FieldValue::Varint(v) => Ok(*v as i32),
            _ => Err(violation(format!("field {} has the wrong wire type", name))),
        }
    }

    fn as_bytes(&self, name: &str) -> Result<&'a [u8]> {
        match self {
            FieldValue::Bytes(b) => Ok(*b),
            _ => Err(violation(format!("field {} has the wrong wire type", name))),
        }
    }
}

struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = *self
                .data
                .get(self.pos)
                .ok_or_else(|| violation("truncated varint"))?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(violation("varint longer than 10 bytes"))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| violation("field runs past end of message"))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn next_field(&mut self) -> Result<Option<(u32, FieldValue<'a>)>> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }

        let tag = self.varint()?;
        let field = u32::try_from(tag >> 3).map_err(|_| violation("field number out of range"))?;
        if field == 0 {
            return Err(violation("field number 0"));
        }

        let value = match (tag & 0x7) as u8 {
            WIRE_VARINT => FieldValue::Varint(self.varint()?),
            WIRE_FIXED64 => {
                self.take(8)?;
                FieldValue::Fixed
            }
            WIRE_LEN => {
                let len = usize::try_from(self.varint()?)
                    .map_err(|_| violation("length out of range"))?;
                FieldValue::Bytes(self.take(len)?)
            }
            WIRE_FIXED32 => {
                self.take(4)?;
                FieldValue::Fixed
            }
            other => return Err(violation(format!("unsupported wire type {}", other))),
        };

        Ok(Some((field, value)))
    }
}

// ===== Cookie =====

/// 16 random bytes binding a proof to one handshake
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Cookie([u8; COOKIE_LEN]);

impl Cookie {
    /// Fresh cookie from a CSPRNG
    pub fn generate(rng: &mut dyn RandomSource) -> Result<Self> {
        Ok(Cookie(random_array(rng)?))
    }

    /// `None` unless `bytes` is exactly 16 bytes long
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Cookie)
    }

    pub fn as_bytes(&self) -> &[u8; COOKIE_LEN] {
        &self.0
    }
}

impl From<[u8; COOKIE_LEN]> for Cookie {
    fn from(bytes: [u8; COOKIE_LEN]) -> Self {
        Cookie(bytes)
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cookie({})", hex::encode(self.0))
    }
}

// ===== Auth channel packets =====

/// Possession proof sent by the outbound side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proof {
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Proof {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.public_key.len() + self.signature.len() + 6);
        put_bytes(&mut buf, 1, &self.public_key);
        put_bytes(&mut buf, 2, &self.signature);
        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        let mut proof = Proof::default();
        let mut reader = FieldReader::new(data);
        while let Some((field, value)) = reader.next_field()? {
            match field {
                1 => proof.public_key = value.as_bytes("Proof.public_key")?.to_vec(),
                2 => proof.signature = value.as_bytes("Proof.signature")?.to_vec(),
                _ => {}
            }
        }
        Ok(proof)
    }
}

/// Verdict sent back by the inbound side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthResult {
    pub accepted: bool,
    pub is_known_contact: bool,
}

impl AuthResult {
    pub fn rejected() -> Self {
        Self::default()
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4);
        put_bool(&mut buf, 1, self.accepted);
        if self.is_known_contact {
            put_bool(&mut buf, 2, true);
        }
        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        let mut accepted = None;
        let mut is_known_contact = false;
        let mut reader = FieldReader::new(data);
        while let Some((field, value)) = reader.next_field()? {
            match field {
                1 => accepted = Some(value.as_bool("Result.accepted")?),
                2 => is_known_contact = value.as_bool("Result.is_known_contact")?,
                _ => {}
            }
        }

        Ok(Self {
            accepted: accepted.ok_or_else(|| violation("Result is missing required field accepted"))?,
            is_known_contact,
        })
    }
}

/// Top-level auth channel message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Proof(Proof),
    Result(AuthResult),
}

impl Packet {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Packet::Proof(proof) => put_bytes(&mut buf, 1, &proof.encode()),
            Packet::Result(result) => put_bytes(&mut buf, 2, &result.encode()),
        }
        buf
    }

    /// Parse a packet; it must carry exactly one of `proof` / `result`
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut proof = None;
        let mut result = None;

        let mut reader = FieldReader::new(data);
        while let Some((field, value)) = reader.next_field()? {
            match field {
                1 => proof = Some(Proof::decode(value.as_bytes("Packet.proof")?)?),
                2 => result = Some(AuthResult::decode(value.as_bytes("Packet.result")?)?),
                _ => {}
            }
        }

        match (proof, result) {
            (Some(proof), None) => Ok(Packet::Proof(proof)),
            (None, Some(result)) => Ok(Packet::Result(result)),
            (None, None) => Err(violation("packet carries neither proof nor result")),
            (Some(_), Some(_)) => Err(violation("packet carries both proof and result")),
        }
    }
}

// ===== Control channel messages =====

/// Request to open an auth channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenChannelRequest {
    pub channel_identifier: i32,
    pub channel_type: String,
    /// Raw extension bytes; validated by the receiving channel
    pub client_cookie: Option<Vec<u8>>,
}

impl OpenChannelRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_int32(&mut buf, 1, self.channel_identifier);
        put_bytes(&mut buf, 2, self.channel_type.as_bytes());
        if let Some(cookie) = &self.client_cookie {
            put_bytes(&mut buf, COOKIE_EXTENSION_FIELD, cookie);
        }
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut channel_identifier = None;
        let mut channel_type = None;
        let mut client_cookie = None;

        let mut reader = FieldReader::new(data);
        while let Some((field, value)) = reader.next_field()? {
            match field {
                1 => channel_identifier = Some(value.as_int32("OpenChannel.channel_identifier")?),
                2 => {
                    let raw = value.as_bytes("OpenChannel.channel_type")?;
                    let text = std::str::from_utf8(raw)
                        .map_err(|_| violation("OpenChannel.channel_type is not UTF-8"))?;
                    channel_type = Some(text.to_string());
                }
                COOKIE_EXTENSION_FIELD => {
                    client_cookie = Some(value.as_bytes("OpenChannel.client_cookie")?.to_vec())
                }
                _ => {}
            }
        }

        Ok(Self {
            channel_identifier: channel_identifier
                .ok_or_else(|| violation("OpenChannel is missing channel_identifier"))?,
            channel_type: channel_type
                .ok_or_else(|| violation("OpenChannel is missing channel_type"))?,
            client_cookie,
        })
    }
}

/// Answer to an [`OpenChannelRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOpenResult {
    pub channel_identifier: i32,
    pub opened: bool,
    pub common_error: Option<ChannelError>,
    pub server_cookie: Option<Vec<u8>>,
}

impl ChannelOpenResult {
    pub fn opened(channel_identifier: i32, server_cookie: &Cookie) -> Self {
        Self {
            channel_identifier,
            opened: true,
            common_error: None,
            server_cookie: Some(server_cookie.as_bytes().to_vec()),
        }
    }

    pub fn refused(channel_identifier: i32, error: ChannelError) -> Self {
        Self {
            channel_identifier,
            opened: false,
            common_error: Some(error),
            server_cookie: None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_int32(&mut buf, 1, self.channel_identifier);
        put_bool(&mut buf, 2, self.opened);
        if let Some(error) = self.common_error {
            put_int32(&mut buf, 3, error as i32);
        }
        if let Some(cookie) = &self.server_cookie {
            put_bytes(&mut buf, COOKIE_EXTENSION_FIELD, cookie);
        }
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut channel_identifier = None;
        let mut opened = None;
        let mut common_error = None;
        let mut server_cookie = None;

        let mut reader = FieldReader::new(data);
        while let Some((field, value)) = reader.next_field()? {
            match field {
                1 => channel_identifier = Some(value.as_int32("ChannelResult.channel_identifier")?),
                2 => opened = Some(value.as_bool("ChannelResult.opened")?),
                3 => {
                    common_error = Some(match value.as_int32("ChannelResult.common_error")? {
                        1 => ChannelError::UnknownTypeError,
                        2 => ChannelError::UnauthorizedError,
                        3 => ChannelError::BadUsageError,
                        4 => ChannelError::FailedError,
                        _ => ChannelError::GenericError,
                    })
                }
                COOKIE_EXTENSION_FIELD => {
                    server_cookie = Some(value.as_bytes("ChannelResult.server_cookie")?.to_vec())
                }
                _ => {}
            }
        }

        Ok(Self {
            channel_identifier: channel_identifier
                .ok_or_else(|| violation("ChannelResult is missing channel_identifier"))?,
            opened: opened.ok_or_else(|| violation("ChannelResult is missing opened"))?,
            common_error,
            server_cookie,
        })
    }
}
