// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fmt;
use std::str::FromStr;

use crate::catalog::MAX_VELOCITY;
use crate::range::PAD_COUNT;

/// Whether a pad was pressed or released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Stop,
    Start,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("expected 3 comma separated fields, got {0}")]
    FieldCount(usize),

    #[error("{field} '{value}' is not an integer")]
    NotInteger { field: &'static str, value: String },

    #[error("velocity {0} is outside 0-127")]
    Velocity(i64),

    #[error("action {0} is neither 0 (stop) nor 1 (start)")]
    Action(i64),
}

/// A single pad event as sent by the sensor board: `<pad>,<velocity>,<action>`.
///
/// The pad number is kept as sent (1-20 when valid) so out-of-range pads can be
/// reported by the router rather than lost in parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trigger {
    pad: i64,
    velocity: u8,
    action: Action,
}

impl Trigger {
    pub fn new(pad: i64, velocity: u8, action: Action) -> Trigger {
        Trigger {
            pad,
            velocity,
            action,
        }
    }

    /// The pad number as sent, 1-based.
    pub fn pad(&self) -> i64 {
        self.pad
    }

    /// The 0-based pad index, or None if the pad doesn't exist.
    pub fn pad_index(&self) -> Option<usize> {
        usize::try_from(self.pad)
            .ok()
            .filter(|pad| (1..=PAD_COUNT).contains(pad))
            .map(|pad| pad - 1)
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn action(&self) -> Action {
        self.action
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action {
            Action::Stop => 0,
            Action::Start => 1,
        };
        write!(f, "{},{},{}", self.pad, self.velocity, action)
    }
}

fn integer(field: &'static str, value: &str) -> Result<i64, TriggerError> {
    value
        .trim()
        .parse()
        .map_err(|_| TriggerError::NotInteger {
            field,
            value: value.trim().to_string(),
        })
}

impl FromStr for Trigger {
    type Err = TriggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(',').collect();
        let [pad, velocity, action] = fields.as_slice() else {
            return Err(TriggerError::FieldCount(fields.len()));
        };

        let pad = integer("pad", pad)?;
        let velocity = integer("velocity", velocity)?;
        let action = integer("action", action)?;

        let velocity = u8::try_from(velocity)
            .ok()
            .filter(|v| *v <= MAX_VELOCITY)
            .ok_or(TriggerError::Velocity(velocity))?;
        let action = match action {
            0 => Action::Stop,
            1 => Action::Start,
            other => return Err(TriggerError::Action(other)),
        };

        Ok(Trigger {
            pad,
            velocity,
            action,
        })
    }
}
