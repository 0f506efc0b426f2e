//! Core Bluetooth data types
//!
//! Identity and snapshot types shared by the discovery cache, the
//! connection registry and the session API.

use std::fmt;

use crate::error::Error;

/// Stable id the HAL assigns to an open GATT connection.
pub type ConnectionId = i32;

/// Handle identifying this application's GATT client registration.
pub type ClientIf = i32;

/// 128-bit Bluetooth UUID, stored in textual byte order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uuid(pub [u8; 16]);

/// Bluetooth base UUID, 00000000-0000-1000-8000-00805f9b34fb.
const BASE_UUID: [u8; 16] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0x80, 0x5f, 0x9b, 0x34, 0xfb,
];

impl Uuid {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Expand a 16-bit assigned number onto the Bluetooth base UUID.
    pub const fn from_u16(short: u16) -> Self {
        let mut bytes = BASE_UUID;
        bytes[2] = (short >> 8) as u8;
        bytes[3] = (short & 0xff) as u8;
        Self(bytes)
    }

    /// Parse a UUID from hex notation, with or without dashes.
    pub fn parse_str(input: &str) -> Result<Self, Error> {
        let hex: String = input.chars().filter(|c| *c != '-').collect();
        if hex.len() != 32 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::Parse {
                what: "UUID",
                input: input.to_string(),
            });
        }

        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| Error::Parse {
                what: "UUID",
                input: input.to_string(),
            })?;
        }
        Ok(Self(bytes))
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12], b[13],
            b[14], b[15]
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// 6-byte Bluetooth device address.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    pub const fn from_bytes(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Parse an address in `AA:BB:CC:DD:EE:FF` form.
    pub fn parse_str(input: &str) -> Result<Self, Error> {
        let mut bytes = [0u8; 6];
        let mut count = 0;

        for part in input.split(':') {
            if count == 6 || part.len() != 2 {
                count = 0;
                break;
            }
            match u8::from_str_radix(part, 16) {
                Ok(value) => bytes[count] = value,
                Err(_) => {
                    count = 0;
                    break;
                }
            }
            count += 1;
        }

        if count != 6 {
            return Err(Error::Parse {
                what: "address",
                input: input.to_string(),
            });
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Identity of a GATT service as reported by the remote device.
///
/// The instance id disambiguates repeated UUIDs within one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceIdentity {
    pub uuid: Uuid,
    pub instance_id: u8,
    pub primary: bool,
}

/// Identity of a characteristic within a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicIdentity {
    pub uuid: Uuid,
    pub instance_id: u8,
}

/// GATT characteristic property bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicProperties(pub u8);

impl CharacteristicProperties {
    pub const BROADCAST: u8 = 0x01;
    pub const READ: u8 = 0x02;
    pub const WRITE_WITHOUT_RESPONSE: u8 = 0x04;
    pub const WRITE: u8 = 0x08;
    pub const NOTIFY: u8 = 0x10;
    pub const INDICATE: u8 = 0x20;
    pub const AUTHENTICATED_SIGNED_WRITES: u8 = 0x40;
    pub const EXTENDED_PROPERTIES: u8 = 0x80;

    pub const fn contains(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }
}

impl fmt::Display for CharacteristicProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(u8, &str); 8] = [
            (CharacteristicProperties::BROADCAST, "broadcast"),
            (CharacteristicProperties::READ, "read"),
            (
                CharacteristicProperties::WRITE_WITHOUT_RESPONSE,
                "write-without-response",
            ),
            (CharacteristicProperties::WRITE, "write"),
            (CharacteristicProperties::NOTIFY, "notify"),
            (CharacteristicProperties::INDICATE, "indicate"),
            (
                CharacteristicProperties::AUTHENTICATED_SIGNED_WRITES,
                "signed-write",
            ),
            (CharacteristicProperties::EXTENDED_PROPERTIES, "extended"),
        ];

        let mut first = true;
        for (bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}

/// Power state of the local adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Off,
    On,
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterState::Off => write!(f, "off"),
            AdapterState::On => write!(f, "on"),
        }
    }
}

/// State of the device discovery procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Stopped,
    Started,
}

/// Bonding state of a remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondState {
    None,
    Bonding,
    Bonded,
}

/// Secure Simple Pairing interaction requested by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SspVariant {
    PasskeyConfirmation,
    PasskeyEntry,
    Consent,
    PasskeyNotification,
}

/// Link security the stack should apply to a GATT write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthRequirement {
    /// No authentication required.
    #[default]
    None,
    /// Unauthenticated encryption.
    NoMitm,
    /// Authenticated encryption with MITM protection.
    Mitm,
    /// Signed data, no MITM protection.
    SignedNoMitm,
    /// Signed data with MITM protection.
    SignedMitm,
}

/// GATT write flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteType {
    /// Write without response; no completion event follows.
    Command,
    /// Write request; the remote device acknowledges it.
    Request,
}

/// Transport supported by a remote device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeviceType {
    Classic,
    #[default]
    Le,
    Dual,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Classic => write!(f, "BR/EDR only"),
            DeviceType::Le => write!(f, "LE only"),
            DeviceType::Dual => write!(f, "dual mode"),
        }
    }
}

/// Snapshot of a discovered device, folded from the property list the HAL
/// reports with a device-found event.
#[derive(Debug, Clone, Default)]
pub struct DeviceProperties {
    pub name: String,
    pub address: BdAddr,
    pub class_of_device: u32,
    pub device_type: DeviceType,
    pub alias: Option<String>,
    pub rssi: i8,
}

/// Value pushed by the remote device for a subscribed characteristic.
#[derive(Debug, Clone)]
pub struct NotificationData {
    pub address: BdAddr,
    pub service: ServiceIdentity,
    pub characteristic: CharacteristicIdentity,
    pub value: Vec<u8>,
    /// Notification when true, indication otherwise.
    pub is_notify: bool,
}

/// Payload of a read completion.
#[derive(Debug, Clone)]
pub struct ReadDetails {
    pub service: ServiceIdentity,
    pub characteristic: CharacteristicIdentity,
    pub descriptor: Option<Uuid>,
    pub value: Vec<u8>,
}

/// Target of a write completion.
#[derive(Debug, Clone)]
pub struct WriteDetails {
    pub service: ServiceIdentity,
    pub characteristic: CharacteristicIdentity,
    pub descriptor: Option<Uuid>,
}
