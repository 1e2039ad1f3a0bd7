//! Identifier newtypes for every persisted row.
//!
//! Games are shown to players as a short base-36 code, so `GameId` carries
//! its own `Display`/`FromStr`. The remaining ids are plain integers with a
//! one-letter prefix in the text notation (`p3`, `c12`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Digits used for base-36 game codes.
const BASE36_DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Minimum width of a rendered game code.
pub const GAME_CODE_WIDTH: usize = 6;

/// Errors produced when parsing an identifier from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("empty identifier")]
    Empty,

    #[error("invalid base-36 digit '{0}'")]
    InvalidDigit(char),

    #[error("game code '{0}' overflows")]
    Overflow(String),

    #[error("expected prefix '{expected}' in '{found}'")]
    WrongPrefix { expected: char, found: String },

    #[error("invalid numeric id '{0}'")]
    InvalidNumber(String),
}

/// Primary key of a game, displayed as a base-36 code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameId(pub u64);

impl GameId {
    /// Renders the id as upper-case base-36, left-padded with zeros.
    pub fn base36(self) -> String {
        let mut digits = Vec::with_capacity(GAME_CODE_WIDTH);
        let mut num = self.0;
        while num > 0 {
            digits.push(BASE36_DIGITS[(num % 36) as usize]);
            num /= 36;
        }
        while digits.len() < GAME_CODE_WIDTH {
            digits.push(b'0');
        }
        digits.reverse();
        // Only ASCII digits were pushed.
        String::from_utf8(digits).unwrap_or_default()
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base36())
    }
}

impl FromStr for GameId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        let mut value: u64 = 0;
        for c in s.chars() {
            let digit = c.to_digit(36).ok_or(IdError::InvalidDigit(c))? as u64;
            value = value
                .checked_mul(36)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| IdError::Overflow(s.to_string()))?;
        }
        Ok(GameId(value))
    }
}

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            /// Prefix used in the text notation.
            pub const PREFIX: char = $prefix;
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", Self::PREFIX, self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                if s.is_empty() {
                    return Err(IdError::Empty);
                }
                let rest = s
                    .strip_prefix(Self::PREFIX)
                    .ok_or_else(|| IdError::WrongPrefix { expected: Self::PREFIX, found: s.to_string() })?;
                rest.parse::<u32>()
                    .map($name)
                    .map_err(|_| IdError::InvalidNumber(s.to_string()))
            }
        }
    };
}

prefixed_id!(
    /// Primary key of a player (a user's seat in one game).
    PlayerId,
    'p'
);
prefixed_id!(
    /// Primary key of a character.
    CharacterId,
    'c'
);
prefixed_id!(
    /// Account that owns players across games.
    UserId,
    'u'
);
prefixed_id!(
    /// Primary key of a turn row.
    TurnId,
    't'
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base36_pads_to_six() {
        assert_eq!(GameId(0).base36(), "000000");
        assert_eq!(GameId(1).base36(), "000001");
        assert_eq!(GameId(35).base36(), "00000Z");
    }

    #[test]
    fn base36_is_most_significant_first() {
        assert_eq!(GameId(36).base36(), "000010");
        assert_eq!(GameId(36 * 36 + 2).base36(), "000102");
    }

    #[test]
    fn base36_grows_past_width() {
        let big = GameId(36u64.pow(6));
        assert_eq!(big.base36(), "1000000");
    }

    #[test]
    fn game_id_parses_either_case() {
        assert_eq!("00000z".parse::<GameId>(), Ok(GameId(35)));
        assert_eq!("00000Z".parse::<GameId>(), Ok(GameId(35)));
        assert_eq!(GameId(123_456).to_string().parse::<GameId>(), Ok(GameId(123_456)));
    }

    #[test]
    fn game_id_rejects_bad_digit() {
        assert_eq!("00-1".parse::<GameId>(), Err(IdError::InvalidDigit('-')));
        assert_eq!("".parse::<GameId>(), Err(IdError::Empty));
    }

    #[test]
    fn prefixed_ids_display_and_parse() {
        assert_eq!(CharacterId(12).to_string(), "c12");
        assert_eq!("p3".parse::<PlayerId>(), Ok(PlayerId(3)));
        assert!(matches!("c3".parse::<PlayerId>(), Err(IdError::WrongPrefix { .. })));
        assert!(matches!("cx".parse::<CharacterId>(), Err(IdError::InvalidNumber(_))));
    }
}
