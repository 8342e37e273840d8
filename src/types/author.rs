/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Event authorship.
//!
//! Every log event names its author: a race committee member, or an automated system such as a
//! timed start sequence. Authors carry a [priority](crate::types::basic::AuthorPriority) which is
//! consulted for exactly one decision: whether a revoke issued by this author takes effect against
//! an event written by another author. Lower numeric priority is more senior.

use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter},
};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::basic::AuthorPriority;

/// Identity of the author of a log event.
///
/// Authors are compared by priority; two authors with distinct names but equal priority are
/// considered equal in seniority but not in identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct Author {
    name: String,
    priority: AuthorPriority,
}

impl Author {
    pub fn new(name: String, priority: AuthorPriority) -> Self {
        Self { name, priority }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> AuthorPriority {
        self.priority
    }

    /// Whether this author is senior enough to revoke an event written by `target`.
    pub fn can_revoke(&self, target: &Author) -> bool {
        self.priority.can_revoke(target.priority)
    }
}

impl PartialOrd for Author {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Author {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl Display for Author {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} (priority {})", self.name, self.priority)
    }
}
