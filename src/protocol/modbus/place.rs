use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of physical places on the rig.
pub const PLACE_COUNT: usize = 10;

/// Places 0..=4 answer on this unit address, places 5..=9 on the one below it.
const UPPER_BANK_UNIT: u8 = 17;
const PLACES_PER_BANK: u8 = 5;
const REGISTERS_PER_PLACE: u16 = 6;

/// One addressable position on the rig, always in `0..PLACE_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct Place(u8);

impl Place {
    pub fn new(index: usize) -> Option<Self> {
        if index < PLACE_COUNT {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// All places in rotation order.
    pub fn all() -> impl Iterator<Item = Place> + Clone {
        (0..PLACE_COUNT as u8).map(Place)
    }

    /// Modbus unit address of the board this place sits on.
    pub fn unit_address(self) -> u8 {
        if self.0 < PLACES_PER_BANK {
            UPPER_BANK_UNIT
        } else {
            UPPER_BANK_UNIT - 1
        }
    }

    /// Base register of this place within its board.
    pub fn register_base(self) -> u16 {
        REGISTERS_PER_PLACE * u16::from(self.0 % PLACES_PER_BANK)
    }

    pub fn status_register(self) -> u16 {
        self.register_base() + 2
    }

    pub fn value_register(self) -> u16 {
        self.register_base() + 4
    }
}

impl TryFrom<usize> for Place {
    type Error = String;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Place::new(index).ok_or_else(|| format!("place {index} is out of range 0..{PLACE_COUNT}"))
    }
}

impl From<Place> for usize {
    fn from(place: Place) -> usize {
        place.index()
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
