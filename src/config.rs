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

//! Bank file parsing.

use std::fs;
use std::path::Path;

pub mod bank;
pub mod error;

pub use bank::{Bank, PadDefinition};
pub use error::ConfigError;

/// Parses a bank definition from a YAML file.
pub fn parse_bank(file: &Path) -> Result<Bank, ConfigError> {
    Bank::parse(&fs::read_to_string(file)?)
}
