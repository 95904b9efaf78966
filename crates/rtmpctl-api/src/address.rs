// ── Device address ──
//
// Validated IPv4 address of the capture device plus the port its control
// service listens on. Construction goes through `parse`, so an invalid
// string can never end up in a request URL or in the config file.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AddressError;

/// Port the device's control service listens on.
pub const DEFAULT_PORT: u16 = 8080;

/// A validated device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAddress {
    ip: Ipv4Addr,
    port: u16,
}

impl DeviceAddress {
    /// Fallback used when no usable address is persisted.
    pub const LOOPBACK: Self = Self {
        ip: Ipv4Addr::LOCALHOST,
        port: DEFAULT_PORT,
    };

    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            port: DEFAULT_PORT,
        }
    }

    /// Parse user input of the form `a.b.c.d`.
    ///
    /// Exactly four dot-separated decimal octets, each 0..=255. Surrounding
    /// whitespace is ignored; signs, blanks inside the address, hostnames and
    /// a `:port` suffix are all rejected.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let malformed = |reason: String| AddressError::Malformed {
            input: input.to_owned(),
            reason,
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(malformed("address is empty".into()));
        }

        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() != 4 {
            return Err(malformed(format!(
                "expected 4 dot-separated octets, found {}",
                parts.len()
            )));
        }

        let mut octets = [0_u8; 4];
        for (slot, part) in octets.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed(format!("octet '{part}' is not a number")));
            }
            *slot = part
                .parse::<u8>()
                .map_err(|_| malformed(format!("octet '{part}' is outside 0-255")))?;
        }

        Ok(Self::new(Ipv4Addr::from(octets)))
    }

    /// Same host, different control port.
    pub fn with_port(self, port: u16) -> Self {
        Self { port, ..self }
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Root URL of the control service: `http://{ip}:{port}/`.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("http://{}:{}/", self.ip, self.port))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ip)
    }
}

impl FromStr for DeviceAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
