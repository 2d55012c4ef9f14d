use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A seat position inside an event's grid, 1-based in both axes.
///
/// Seats are positional, not stored entities: `(row, col)` is the whole
/// identity. On the wire a coordinate is the string `R<row>C<col>`,
/// e.g. `R3C12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeatCoord {
    pub row: u16,
    pub col: u16,
}

impl SeatCoord {
    pub fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }

    /// Bounds check against a grid shape. Zero is never in bounds.
    pub fn in_bounds(&self, rows: u16, cols: u16) -> bool {
        self.row >= 1 && self.row <= rows && self.col >= 1 && self.col <= cols
    }
}

impl fmt::Display for SeatCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}C{}", self.row, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed seat coordinate: {0:?}")]
pub struct ParseSeatError(pub String);

impl FromStr for SeatCoord {
    type Err = ParseSeatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSeatError(s.to_string());

        let rest = s.strip_prefix('R').ok_or_else(err)?;
        let (row_digits, col_digits) = rest.split_once('C').ok_or_else(err)?;
        if row_digits.is_empty()
            || col_digits.is_empty()
            || !row_digits.bytes().all(|b| b.is_ascii_digit())
            || !col_digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }

        let row: u16 = row_digits.parse().map_err(|_| err())?;
        let col: u16 = col_digits.parse().map_err(|_| err())?;
        if row == 0 || col == 0 {
            return Err(err());
        }
        Ok(SeatCoord { row, col })
    }
}

impl TryFrom<String> for SeatCoord {
    type Error = ParseSeatError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SeatCoord> for String {
    fn from(c: SeatCoord) -> String {
        c.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_basic_coordinates() {
        assert_eq!("R1C1".parse::<SeatCoord>().unwrap(), SeatCoord::new(1, 1));
        assert_eq!("R3C12".parse::<SeatCoord>().unwrap(), SeatCoord::new(3, 12));
        assert_eq!("R120C7".parse::<SeatCoord>().unwrap(), SeatCoord::new(120, 7));
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in [
            "", "R1", "C1", "R1C", "RC1", "r1c1", "R0C5", "R5C0", "R1C2x",
            "xR1C2", "R-1C2", "R1C+2", "R 1C2", "R1C999999",
        ] {
            assert!(bad.parse::<SeatCoord>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn bounds_are_one_based_inclusive() {
        let c = SeatCoord::new(8, 12);
        assert!(c.in_bounds(8, 12));
        assert!(!c.in_bounds(7, 12));
        assert!(!c.in_bounds(8, 11));
        assert!(!SeatCoord::new(0, 1).in_bounds(8, 12));
    }

    proptest! {
        #[test]
        fn display_parse_round_trip(row in 1u16..=u16::MAX, col in 1u16..=u16::MAX) {
            let c = SeatCoord::new(row, col);
            prop_assert_eq!(c.to_string().parse::<SeatCoord>().unwrap(), c);
        }

        #[test]
        fn parse_never_panics(s in "\\PC*") {
            let _ = s.parse::<SeatCoord>();
        }
    }
}
