/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! "Inert" types following the newtype pattern. These are sent around and inspected, but have no
//! active behavior; the API for using them is defined in this module.
//!
//! All of them serialize with borsh because they cross the replication wire and must round-trip
//! exactly (ids, timestamps and pass ids are part of event identity).

use std::{
    fmt::{self, Debug, Display, Formatter},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use borsh::{BorshDeserialize, BorshSerialize};

/// A point in time, in milliseconds since the Unix Epoch.
///
/// Events carry two of these: `created_at` (wall clock at construction) and `logical_time_point`
/// (the time the event claims to take effect at). The two may differ, e.g. a start time announced
/// now but effective moments ago. `created_at` is *not* guaranteed to be strictly monotonic across
/// authors; consumers must not assume ordering from it alone.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct TimePoint(i64);

impl TimePoint {
    pub const fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the Unix Epoch")
            .as_millis() as i64;
        Self(millis)
    }

    pub const fn millis(&self) -> i64 {
        self.0
    }

    pub fn plus(&self, duration: Duration) -> TimePoint {
        TimePoint(self.0 + duration.as_millis() as i64)
    }

    pub fn minus(&self, duration: Duration) -> TimePoint {
        TimePoint(self.0 - duration.as_millis() as i64)
    }

    /// One millisecond earlier. Used to force an ordering between two events that would otherwise
    /// share a logical time point.
    pub fn just_before(&self) -> TimePoint {
        TimePoint(self.0 - 1)
    }
}

impl Display for TimePoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for TimePoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Process-wide-unique identifier of a log event.
///
/// Ids are immutable and unique within a log. They are generated randomly at construction unless
/// supplied explicitly during restore. The ordering has no meaning beyond being total; it serves
/// as the final tie breaker where events must be ordered the same way on every replica.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct EventId(u128);

impl EventId {
    pub const fn new(int: u128) -> Self {
        Self(int)
    }

    pub fn random() -> Self {
        Self(rand::random())
    }

    pub const fn int(&self) -> u128 {
        self.0
    }

    pub fn bytes(&self) -> [u8; 16] {
        self.0.to_le_bytes()
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", first_seven_base64_chars(&self.bytes()))
    }
}

impl Debug for EventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Identifier of a race (and therefore of its log): one log is kept per race.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct RaceId(u128);

impl RaceId {
    pub const fn new(int: u128) -> Self {
        Self(int)
    }

    pub fn random() -> Self {
        Self(rand::random())
    }

    pub const fn int(&self) -> u128 {
        self.0
    }

    pub fn bytes(&self) -> [u8; 16] {
        self.0.to_le_bytes()
    }
}

impl Display for RaceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", first_seven_base64_chars(&self.bytes()))
    }
}

impl Debug for RaceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Identifier of a registered replica. Replica equality is decided on this id alone.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct ReplicaId(u128);

impl ReplicaId {
    pub const fn new(int: u128) -> Self {
        Self(int)
    }

    pub fn random() -> Self {
        Self(rand::random())
    }

    pub const fn int(&self) -> u128 {
        self.0
    }

    pub fn bytes(&self) -> [u8; 16] {
        self.0.to_le_bytes()
    }
}

impl Display for ReplicaId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", first_seven_base64_chars(&self.bytes()))
    }
}

impl Debug for ReplicaId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Number of a start attempt. The pass is incremented each time a start attempt is abandoned or
/// recalled and the sequence restarts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct PassId(u32);

impl PassId {
    pub const FIRST: PassId = PassId(0);

    pub const fn new(int: u32) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u32 {
        self.0
    }

    pub const fn next(&self) -> PassId {
        PassId(self.0 + 1)
    }
}

impl Display for PassId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Seniority of an event author. **Lower numeric values are more senior**: a revoke takes effect
/// only if the revoking author's numeric priority is less than or equal to that of the author of
/// the event being revoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct AuthorPriority(i32);

impl AuthorPriority {
    pub const fn new(int: i32) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> i32 {
        self.0
    }

    /// Whether an author of this priority may revoke an event authored at `target` priority.
    pub fn can_revoke(&self, target: AuthorPriority) -> bool {
        self.0 <= target.0
    }
}

impl Display for AuthorPriority {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Network address of a replica, as understood by the user's [`Network`](crate::networking::Network)
/// implementation. The library does not interpret it.
#[derive(Clone, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct NetworkAddress(String);

impl NetworkAddress {
    pub fn new(address: String) -> Self {
        Self(address)
    }

    pub fn str(&self) -> &str {
        &self.0
    }
}

impl Display for NetworkAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for NetworkAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// A more readable representation of an id: the first seven characters of its base64 encoding.
pub fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}
