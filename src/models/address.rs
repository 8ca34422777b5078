//! Client address validation.
//!
//! Only literal IPv4/IPv6 addresses are accepted; nothing here touches DNS.

use std::fmt;
use std::net::IpAddr;

/// Returns true iff `candidate` is a well-formed IPv4 or IPv6 literal.
pub fn is_valid(candidate: &str) -> bool {
    candidate.parse::<IpAddr>().is_ok()
}

/// A syntactically valid client address, kept in its canonical textual form so
/// that equivalent spellings of the same address share one cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIp {
    addr: IpAddr,
    canonical: String,
}

impl ClientIp {
    pub fn parse(candidate: &str) -> Option<Self> {
        let addr = candidate.parse::<IpAddr>().ok()?;
        Some(Self {
            addr,
            canonical: addr.to_string(),
        })
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

impl fmt::Display for ClientIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}
