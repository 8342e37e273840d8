/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The closed set of signal flags a race committee can display.
//!
//! Flags are an enumerated type rather than strings: the racing procedures interpret specific
//! flags (AP means postponement, X-Ray means individual recall, First Substitute means general
//! recall), so an open set would push validation to every consumer.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

/// A signal flag. `NoFlag` stands for "no flag displayed below the main flag" in compound
/// signals such as "AP over Hotel".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub enum Flag {
    /// Answering Pennant: start postponed.
    Ap,
    /// Race abandoned.
    November,
    /// General recall.
    FirstSubstitute,
    /// Individual recall.
    Xray,
    /// Start mode: rule 30 not in effect (default under RRS 26).
    Papa,
    /// Start mode: round-an-end rule.
    India,
    /// Start mode: 20% penalty rule.
    Zulu,
    /// Start mode: U-flag rule.
    Uniform,
    /// Start mode: disqualification without hearing.
    Black,
    /// Finishing vessel on station.
    Blue,
    /// No more racing today.
    Alpha,
    /// Further signals ashore.
    Hotel,
    /// The class flag of the starting class.
    Class,
    /// Extreme Sailing Series countdown: three minutes.
    EssThree,
    /// Extreme Sailing Series countdown: two minutes.
    EssTwo,
    /// Extreme Sailing Series countdown: one minute.
    EssOne,
    /// No flag.
    NoFlag,
}

impl Flag {
    /// Whether this flag is one of the start-mode flags a committee may choose for the
    /// preparatory signal.
    pub fn is_start_mode(&self) -> bool {
        matches!(
            self,
            Flag::Papa | Flag::India | Flag::Zulu | Flag::Uniform | Flag::Black
        )
    }
}

impl Display for Flag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Flag::Ap => "AP",
            Flag::November => "November",
            Flag::FirstSubstitute => "FirstSubstitute",
            Flag::Xray => "Xray",
            Flag::Papa => "Papa",
            Flag::India => "India",
            Flag::Zulu => "Zulu",
            Flag::Uniform => "Uniform",
            Flag::Black => "Black",
            Flag::Blue => "Blue",
            Flag::Alpha => "Alpha",
            Flag::Hotel => "Hotel",
            Flag::Class => "Class",
            Flag::EssThree => "EssThree",
            Flag::EssTwo => "EssTwo",
            Flag::EssOne => "EssOne",
            Flag::NoFlag => "NoFlag",
        };
        f.write_str(name)
    }
}
