use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AddressField, ReconcileError, StateSide};

/// Hardware address in canonical form (`aa:bb:cc:dd:ee:ff`).
///
/// Ordering follows the octets, which matches ordering of the canonical text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl FromStr for MacAddress {
    type Err = ReconcileError;

    /// Accepts `:`-delimited, `-`-delimited or bare hex, in any case.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let octets = parse_octets(raw, AddressField::Mac)?;
        let count = octets.len();
        let octets: [u8; 6] = octets.try_into().map_err(|_| {
            ReconcileError::malformed(
                AddressField::Mac,
                raw,
                format!("expected 6 octets, found {count}"),
            )
        })?;
        Ok(Self(octets))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ReconcileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

impl Display for MacAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_octets(f, &self.0)
    }
}

/// Leading octets of a MAC address, e.g. a vendor OUI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacPrefix(Vec<u8>);

impl MacPrefix {
    pub fn matches(&self, mac: &MacAddress) -> bool {
        mac.0.starts_with(&self.0)
    }
}

impl FromStr for MacPrefix {
    type Err = ReconcileError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let octets = parse_octets(raw, AddressField::MacPrefix)?;
        if octets.len() > 6 {
            return Err(ReconcileError::malformed(
                AddressField::MacPrefix,
                raw,
                format!("expected at most 6 octets, found {}", octets.len()),
            ));
        }
        Ok(Self(octets))
    }
}

impl TryFrom<String> for MacPrefix {
    type Error = ReconcileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacPrefix> for String {
    fn from(prefix: MacPrefix) -> Self {
        prefix.to_string()
    }
}

impl Display for MacPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_octets(f, &self.0)
    }
}

fn write_octets(f: &mut Formatter<'_>, octets: &[u8]) -> fmt::Result {
    for (idx, octet) in octets.iter().enumerate() {
        if idx > 0 {
            write!(f, ":")?;
        }
        write!(f, "{octet:02x}")?;
    }
    Ok(())
}

fn parse_octets(raw: &str, field: AddressField) -> Result<Vec<u8>, ReconcileError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ReconcileError::malformed(field, raw, "empty value"));
    }
    if !trimmed.is_ascii() {
        return Err(ReconcileError::malformed(field, raw, "non-ASCII characters"));
    }

    let groups: Vec<&str> = match (trimmed.contains(':'), trimmed.contains('-')) {
        (true, true) => {
            return Err(ReconcileError::malformed(
                field,
                raw,
                "mixed ':' and '-' delimiters",
            ))
        }
        (true, false) => trimmed.split(':').collect(),
        (false, true) => trimmed.split('-').collect(),
        (false, false) => {
            if trimmed.len() % 2 != 0 {
                return Err(ReconcileError::malformed(
                    field,
                    raw,
                    "odd number of hex digits",
                ));
            }
            (0..trimmed.len())
                .step_by(2)
                .map(|idx| &trimmed[idx..idx + 2])
                .collect()
        }
    };

    groups
        .into_iter()
        .map(|group| {
            if group.len() != 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ReconcileError::malformed(
                    field,
                    raw,
                    format!("octet '{group}' is not two hex digits"),
                ));
            }
            u8::from_str_radix(group, 16).map_err(|err| {
                ReconcileError::malformed(field, raw, format!("octet '{group}': {err}"))
            })
        })
        .collect()
}

/// A reservation as authored in a file or returned by a controller, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReservation {
    pub mac_address: String,
    pub ip_address: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One static DHCP assignment in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reservation {
    pub mac_address: MacAddress,
    pub ip_address: IpAddr,
    pub hostname: String,
    pub description: Option<String>,
}

impl Reservation {
    /// Validate and canonicalize a raw record.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::MalformedAddress`] when the MAC is not six hex
    /// octets or the IP is not a valid IPv4/IPv6 literal.
    pub fn normalize(raw: &RawReservation) -> Result<Self, ReconcileError> {
        Self::parse(
            &raw.mac_address,
            &raw.ip_address,
            &raw.hostname,
            raw.description.as_deref(),
        )
    }

    /// Build a reservation from its textual fields.
    pub fn parse(
        mac: &str,
        ip: &str,
        hostname: &str,
        description: Option<&str>,
    ) -> Result<Self, ReconcileError> {
        let mac_address = mac.parse()?;
        let ip_address = ip.trim().parse::<IpAddr>().map_err(|err| {
            ReconcileError::malformed(AddressField::Ip, ip, err.to_string())
        })?;
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(ToString::to_string);

        Ok(Self {
            mac_address,
            ip_address,
            hostname: hostname.trim().to_string(),
            description,
        })
    }

    pub fn to_raw(&self) -> RawReservation {
        RawReservation {
            mac_address: self.mac_address.to_string(),
            ip_address: self.ip_address.to_string(),
            hostname: self.hostname.clone(),
            description: self.description.clone(),
        }
    }
}

/// Reservations of one environment keyed by MAC. MACs are unique by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationSet {
    entries: BTreeMap<MacAddress, Reservation>,
}

impl ReservationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize every record, rejecting the whole batch on the first bad one.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::MalformedAddress`] for a bad record and
    /// [`ReconcileError::DuplicateReservation`] when two records share a MAC.
    pub fn from_raw(side: StateSide, raw: &[RawReservation]) -> Result<Self, ReconcileError> {
        let reservations = raw
            .iter()
            .map(Reservation::normalize)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_reservations(side, reservations)
    }

    /// Collect already-normalized reservations.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::DuplicateReservation`] when two records share a MAC.
    pub fn from_reservations(
        side: StateSide,
        reservations: impl IntoIterator<Item = Reservation>,
    ) -> Result<Self, ReconcileError> {
        let mut entries = BTreeMap::new();
        for reservation in reservations {
            let mac = reservation.mac_address;
            if entries.insert(mac, reservation).is_some() {
                return Err(ReconcileError::DuplicateReservation { mac, side });
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, mac: &MacAddress) -> Option<&Reservation> {
        self.entries.get(mac)
    }

    pub fn contains(&self, mac: &MacAddress) -> bool {
        self.entries.contains_key(mac)
    }

    /// Reservations in MAC order.
    pub fn iter(&self) -> impl Iterator<Item = &Reservation> {
        self.entries.values()
    }

    pub fn macs(&self) -> impl Iterator<Item = &MacAddress> {
        self.entries.keys()
    }

    pub fn to_raw(&self) -> Vec<RawReservation> {
        self.iter().map(Reservation::to_raw).collect()
    }
}
