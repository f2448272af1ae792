use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Where an inventory record lives, written by users as `campus;building;room`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationDescriptor {
    pub campus: String,
    pub building: String,
    pub room: String,
}

impl LocationDescriptor {
    pub fn new(
        campus: impl Into<String>,
        building: impl Into<String>,
        room: impl Into<String>,
    ) -> Self {
        Self { campus: campus.into(), building: building.into(), room: room.into() }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let parts: Vec<&str> = raw.split(';').map(str::trim).collect();
        match parts.as_slice() {
            [campus, building, room]
                if !campus.is_empty() && !building.is_empty() && !room.is_empty() =>
            {
                Ok(Self::new(*campus, *building, *room))
            }
            _ => Err(DomainError::InvalidLocation(raw.to_owned())),
        }
    }
}

impl fmt::Display for LocationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{};{}", self.campus, self.building, self.room)
    }
}
