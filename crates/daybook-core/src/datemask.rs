use std::fmt;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::entity::ValidationError;

pub const DEADLINE_PLACEHOLDER: &str = "dd-mm-yyyy";

pub const DEADLINE_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitSet(u16);

impl DigitSet {
    pub const ANY: DigitSet = DigitSet(0b11_1111_1111);

    pub fn range(lo: u8, hi: u8) -> Self {
        let mut bits = 0u16;
        let mut digit = lo;
        while digit <= hi && digit <= 9 {
            bits |= 1 << digit;
            digit += 1;
        }
        Self(bits)
    }

    pub fn contains(&self, digit: u8) -> bool {
        digit <= 9 && self.0 & (1 << digit) != 0
    }

    pub fn digits(&self) -> impl Iterator<Item = u8> + '_ {
        (0..10u8).filter(|digit| self.contains(*digit))
    }
}

impl fmt::Display for DigitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits: Vec<u8> = self.digits().collect();
        let contiguous = digits
            .windows(2)
            .all(|pair| pair[1] == pair[0] + 1);
        match (digits.first(), digits.last()) {
            (Some(first), Some(last)) if contiguous && first != last => {
                write!(f, "[{first}-{last}]")
            }
            _ => {
                write!(f, "[")?;
                for digit in &digits {
                    write!(f, "{digit}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskSlot {
    Literal(char),
    Digits(DigitSet),
}

impl MaskSlot {
    pub fn accepts(&self, ch: char) -> bool {
        match self {
            MaskSlot::Literal(literal) => *literal == ch,
            MaskSlot::Digits(set) => ch
                .to_digit(10)
                .map(|digit| set.contains(digit as u8))
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for MaskSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskSlot::Literal(literal) => write!(f, "'{literal}'"),
            MaskSlot::Digits(set) => set.fmt(f),
        }
    }
}

pub fn derive_mask(value: &str) -> [MaskSlot; DEADLINE_LEN] {
    let chars: Vec<char> = value.chars().collect();
    let digit_at = |idx: usize| {
        chars
            .get(idx)
            .and_then(|ch| ch.to_digit(10))
            .map(|digit| digit as u8)
    };

    let day_units = match digit_at(0) {
        Some(3) => DigitSet::range(0, 1),
        _ => DigitSet::ANY,
    };
    let month_units = match digit_at(3) {
        Some(1) => DigitSet::range(0, 2),
        _ => DigitSet::ANY,
    };

    [
        MaskSlot::Digits(DigitSet::range(0, 3)),
        MaskSlot::Digits(day_units),
        MaskSlot::Literal('-'),
        MaskSlot::Digits(DigitSet::range(0, 1)),
        MaskSlot::Digits(month_units),
        MaskSlot::Literal('-'),
        MaskSlot::Digits(DigitSet::ANY),
        MaskSlot::Digits(DigitSet::ANY),
        MaskSlot::Digits(DigitSet::ANY),
        MaskSlot::Digits(DigitSet::ANY),
    ]
}

pub fn first_reject(value: &str) -> Option<(usize, MaskSlot)> {
    let mask = derive_mask(value);
    value
        .chars()
        .zip(mask.iter())
        .position(|(ch, slot)| !slot.accepts(ch))
        .map(|idx| (idx, mask[idx]))
}

pub fn matches_mask(value: &str) -> bool {
    value.chars().count() == DEADLINE_LEN && first_reject(value).is_none()
}

pub fn normalize(value: &str) -> &str {
    if value == DEADLINE_PLACEHOLDER { "" } else { value }
}

pub fn validate_deadline(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value == DEADLINE_PLACEHOLDER {
        return Ok(());
    }
    if matches_mask(value) {
        Ok(())
    } else {
        Err(ValidationError::BadDeadline)
    }
}

fn deadline_re() -> Option<&'static Regex> {
    static DEADLINE_RE: OnceLock<Option<Regex>> = OnceLock::new();
    DEADLINE_RE
        .get_or_init(|| Regex::new(r"^(?P<day>\d{2})-(?P<month>\d{2})-(?P<year>\d{4})$").ok())
        .as_ref()
}

pub fn parse_deadline(value: &str) -> Option<NaiveDate> {
    let caps = deadline_re()?.captures(value)?;
    let day: u32 = caps.name("day")?.as_str().parse().ok()?;
    let month: u32 = caps.name("month")?.as_str().parse().ok()?;
    let year: i32 = caps.name("year")?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
