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

use crate::catalog::CatalogError;
use crate::notes::ParseNoteError;

/// Typed error for config load/parse failures so callers can distinguish
/// e.g. file-not-found from invalid values without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid duration '{value}' for {field}: {reason}")]
    Duration {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid note in borrow table: {0}")]
    Note(#[from] ParseNoteError),

    #[error("instrument '{instrument}': {source}")]
    Catalog {
        instrument: String,
        #[source]
        source: CatalogError,
    },

    #[error("uploaded file for pad '{0}', but pads are numbered 1-20")]
    Pad(String),

    #[error("the console and a trigger source of '-' both read stdin")]
    StdinConflict,
}
