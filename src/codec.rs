//! Record codec
//!
//! Every supported [`RecordKind`] owns one JSON payload shape. The payload is
//! what ends up in the `content` column, with the kind's name stored next to
//! it in `record_type` so the reader knows which shape to expect.

use crate::error::{Result, StoreError};
use crate::types::{Record, RecordKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

trait Payload: Serialize + DeserializeOwned {
    fn from_value(value: &str) -> Result<Self>;
    fn into_value(self) -> String;
}

#[derive(Debug, Serialize, Deserialize)]
struct AddressPayload {
    ip: IpAddr,
}

impl Payload for AddressPayload {
    fn from_value(value: &str) -> Result<Self> {
        let ip: IpAddr = value
            .parse()
            .map_err(|_| StoreError::InvalidValue(format!("failed to parse IP: {}", value)))?;
        Ok(Self { ip: ip.to_canonical() })
    }

    fn into_value(self) -> String {
        self.ip.to_canonical().to_string()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TextPayload {
    text: String,
}

impl Payload for TextPayload {
    fn from_value(value: &str) -> Result<Self> {
        Ok(Self { text: value.to_string() })
    }

    fn into_value(self) -> String {
        self.text
    }
}

fn encode_as<P: Payload>(value: &str) -> Result<String> {
    Ok(serde_json::to_string(&P::from_value(value)?)?)
}

fn decode_as<P: Payload>(content: &str) -> Result<String> {
    Ok(serde_json::from_str::<P>(content)?.into_value())
}

impl RecordKind {
    /// Serialize a record value into its stored payload.
    pub fn encode(self, value: &str) -> Result<String> {
        match self {
            RecordKind::A => encode_as::<AddressPayload>(value),
            RecordKind::Txt => encode_as::<TextPayload>(value),
        }
    }

    /// Recover the value from a stored payload, in canonical text form.
    pub fn decode(self, content: &str) -> Result<String> {
        match self {
            RecordKind::A => decode_as::<AddressPayload>(content),
            RecordKind::Txt => decode_as::<TextPayload>(content),
        }
    }
}

pub fn encode(record: &Record) -> Result<String> {
    record.rtype.parse::<RecordKind>()?.encode(&record.value)
}

pub fn decode(content: &str, record_type: &str) -> Result<String> {
    record_type.parse::<RecordKind>()?.decode(content)
}
