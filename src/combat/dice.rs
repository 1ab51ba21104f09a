//! Dice and magnitude evaluation
//!
//! Parses and rolls magnitude notation like "2d6+1d4-1", "d8", "3".
//!
//! Two entry points:
//! - `roll` / `Magnitude::roll` never fail; unparseable terms count as 0
//! - `DiceExpr::from_str` is strict and is used to validate catalog data

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Upper bound on dice rolled by a single term.
const MAX_DICE_PER_TERM: u32 = 1000;

static DICE_TERM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([+-]?)(\d+)?d(\d+)$").unwrap());

/// Errors from strict dice parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("empty dice expression")]
    Empty,
    #[error("invalid dice term: {0}")]
    InvalidTerm(String),
    #[error("die sides must be at least 1 in term: {0}")]
    ZeroSides(String),
}

/// One signed term of a dice expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiceTerm {
    /// `count` dice with `sides` faces, added or subtracted
    Dice { count: u32, sides: u32, negative: bool },
    /// Flat modifier
    Flat(i32),
}

impl DiceTerm {
    fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        match *self {
            DiceTerm::Flat(n) => n,
            DiceTerm::Dice { count, sides, negative } => {
                if sides == 0 {
                    return 0;
                }
                let mut total: i32 = 0;
                for _ in 0..count.min(MAX_DICE_PER_TERM) {
                    total += rng.random_range(1..=sides) as i32;
                }
                if negative {
                    -total
                } else {
                    total
                }
            }
        }
    }

    fn bounds(&self) -> (i32, i32) {
        match *self {
            DiceTerm::Flat(n) => (n, n),
            DiceTerm::Dice { count, sides, negative } => {
                let count = count.min(MAX_DICE_PER_TERM) as i32;
                let (lo, hi) = if sides == 0 { (0, 0) } else { (count, count * sides as i32) };
                if negative {
                    (-hi, -lo)
                } else {
                    (lo, hi)
                }
            }
        }
    }
}

impl fmt::Display for DiceTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DiceTerm::Flat(n) if n < 0 => write!(f, "-{}", -(n as i64)),
            DiceTerm::Flat(n) => write!(f, "+{}", n),
            DiceTerm::Dice { count, sides, negative } => {
                write!(f, "{}{}d{}", if negative { "-" } else { "+" }, count, sides)
            }
        }
    }
}

/// A compound dice expression such as `2d6+1d4-1`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiceExpr {
    terms: Vec<DiceTerm>,
}

impl DiceExpr {
    /// Parse leniently: terms that do not parse contribute nothing.
    pub fn parse_lenient(notation: &str) -> Self {
        let terms = split_terms(notation)
            .iter()
            .filter_map(|part| parse_term(part).ok())
            .collect();
        Self { terms }
    }

    /// The parsed terms, in order
    pub fn terms(&self) -> &[DiceTerm] {
        &self.terms
    }

    /// Roll every term and sum
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        self.terms.iter().map(|t| t.roll(rng)).sum()
    }

    /// Smallest possible result
    pub fn min(&self) -> i32 {
        self.terms.iter().map(|t| t.bounds().0).sum()
    }

    /// Largest possible result
    pub fn max(&self) -> i32 {
        self.terms.iter().map(|t| t.bounds().1).sum()
    }
}

impl FromStr for DiceExpr {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_terms(s);
        if parts.is_empty() {
            return Err(DiceError::Empty);
        }
        let terms = parts
            .iter()
            .map(|part| parse_term(part))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { terms })
    }
}

impl fmt::Display for DiceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, term) in self.terms.iter().enumerate() {
            let s = term.to_string();
            // Leading '+' is implied on the first term
            if i == 0 {
                write!(f, "{}", s.strip_prefix('+').unwrap_or(&s))?;
            } else {
                write!(f, "{}", s)?;
            }
        }
        Ok(())
    }
}

/// Split notation into signed parts at every '+'/'-' after the first character.
fn split_terms(notation: &str) -> Vec<String> {
    let cleaned: String = notation
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect();

    let mut parts = Vec::new();
    let mut current = String::new();
    for c in cleaned.chars() {
        if (c == '+' || c == '-') && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn parse_term(part: &str) -> Result<DiceTerm, DiceError> {
    if let Some(caps) = DICE_TERM_REGEX.captures(part) {
        let negative = &caps[1] == "-";
        let count = match caps.get(2) {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| DiceError::InvalidTerm(part.to_string()))?,
            None => 1,
        };
        let sides: u32 = caps[3]
            .parse()
            .map_err(|_| DiceError::InvalidTerm(part.to_string()))?;
        if sides == 0 {
            return Err(DiceError::ZeroSides(part.to_string()));
        }
        return Ok(DiceTerm::Dice { count, sides, negative });
    }

    part.parse::<i32>()
        .map(DiceTerm::Flat)
        .map_err(|_| DiceError::InvalidTerm(part.to_string()))
}

/// Roll a magnitude string leniently. Never fails; garbage rolls 0.
pub fn roll<R: Rng + ?Sized>(notation: &str, rng: &mut R) -> i32 {
    DiceExpr::parse_lenient(notation).roll(rng)
}

/// A magnitude as found in catalog data: a flat number or dice notation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Magnitude {
    Flat(i32),
    Notation(String),
}

impl Default for Magnitude {
    fn default() -> Self {
        Magnitude::Flat(0)
    }
}

impl Magnitude {
    /// Append a level-rule delta such as "+1d4". "+0" and empty deltas are ignored.
    pub fn with_delta(&self, delta: Option<&str>) -> Magnitude {
        let delta = match delta.map(str::trim) {
            None | Some("") | Some("+0") | Some("0") => return self.clone(),
            Some(d) => d,
        };
        let base = self.to_string();
        if delta.starts_with('+') || delta.starts_with('-') {
            Magnitude::Notation(format!("{}{}", base, delta))
        } else {
            Magnitude::Notation(format!("{}+{}", base, delta))
        }
    }

    /// Roll this magnitude fresh
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        match self {
            Magnitude::Flat(n) => *n,
            Magnitude::Notation(s) => roll(s, rng),
        }
    }
}

impl fmt::Display for Magnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Magnitude::Flat(n) => write!(f, "{}", n),
            Magnitude::Notation(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Magnitude {
    fn from(s: &str) -> Self {
        Magnitude::Notation(s.to_string())
    }
}

/// Dice count/sides pair used for basic attacks in templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceSpec {
    pub dice: u32,
    pub sides: u32,
}

impl Default for DiceSpec {
    fn default() -> Self {
        Self { dice: 1, sides: 4 }
    }
}

impl DiceSpec {
    pub fn new(dice: u32, sides: u32) -> Self {
        Self { dice, sides }
    }

    /// Roll with `extra_dice` additional dice of the same size
    pub fn roll_with_extra<R: Rng + ?Sized>(&self, extra_dice: u32, rng: &mut R) -> i32 {
        DiceTerm::Dice {
            count: self.dice + extra_dice,
            sides: self.sides,
            negative: false,
        }
        .roll(rng)
    }

    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        self.roll_with_extra(0, rng)
    }

    pub fn min(&self) -> i32 {
        if self.sides == 0 { 0 } else { self.dice as i32 }
    }

    pub fn max(&self) -> i32 {
        (self.dice * self.sides) as i32
    }

    /// Expected average (rounded down)
    pub fn average(&self) -> i32 {
        let avg_per_die = (1.0 + self.sides as f64) / 2.0;
        (self.dice as f64 * avg_per_die) as i32
    }
}

impl fmt::Display for DiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.dice, self.sides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_flat_numbers() {
        let mut rng = rng();
        assert_eq!(roll("3", &mut rng), 3);
        assert_eq!(roll("-2", &mut rng), -2);
        assert_eq!(Magnitude::Flat(5).roll(&mut rng), 5);
    }

    #[test]
    fn test_compound_bounds() {
        let mut rng = rng();
        for _ in 0..200 {
            let r = roll("2d6+1d4-1", &mut rng);
            assert!((2..=15).contains(&r), "roll {} out of range", r);
        }
        let expr = DiceExpr::parse_lenient("2d6+1d4-1");
        assert_eq!(expr.min(), 2);
        assert_eq!(expr.max(), 15);
    }

    #[test]
    fn test_negative_dice_term() {
        let expr: DiceExpr = "10-1d4".parse().unwrap();
        assert_eq!(expr.min(), 6);
        assert_eq!(expr.max(), 9);
    }

    #[test]
    fn test_implicit_count_and_case() {
        let expr: DiceExpr = " D8 + 2 ".parse().unwrap();
        assert_eq!(expr.terms()[0], DiceTerm::Dice { count: 1, sides: 8, negative: false });
        assert_eq!(expr.max(), 10);
    }

    #[test]
    fn test_lenient_garbage_is_zero() {
        let mut rng = rng();
        assert_eq!(roll("weapon_damage", &mut rng), 0);
        assert_eq!(roll("", &mut rng), 0);
        assert_eq!(roll("abc+3", &mut rng), 3);
        assert_eq!(roll("1d0", &mut rng), 0);
    }

    #[test]
    fn test_strict_rejects_garbage() {
        assert_eq!("".parse::<DiceExpr>(), Err(DiceError::Empty));
        assert!(matches!("weapon_damage".parse::<DiceExpr>(), Err(DiceError::InvalidTerm(_))));
        assert!(matches!("2d0".parse::<DiceExpr>(), Err(DiceError::ZeroSides(_))));
        assert!("2d".parse::<DiceExpr>().is_err());
    }

    #[test]
    fn test_magnitude_delta() {
        let base = Magnitude::from("1d8");
        assert_eq!(base.with_delta(Some("+0")), base);
        assert_eq!(base.with_delta(None), base);
        assert_eq!(base.with_delta(Some("+1d4")).to_string(), "1d8+1d4");
        assert_eq!(Magnitude::Flat(2).with_delta(Some("1d4")).to_string(), "2+1d4");

        let expr = DiceExpr::parse_lenient(&base.with_delta(Some("+1d4")).to_string());
        assert_eq!(expr.min(), 2);
        assert_eq!(expr.max(), 12);
    }

    #[test]
    fn test_magnitude_deserialize_untagged() {
        let flat: Magnitude = serde_json::from_str("4").unwrap();
        assert_eq!(flat, Magnitude::Flat(4));
        let dice: Magnitude = serde_json::from_str("\"1d6\"").unwrap();
        assert_eq!(dice, Magnitude::Notation("1d6".into()));
    }

    #[test]
    fn test_display() {
        let expr: DiceExpr = "2d6+1d4-1".parse().unwrap();
        assert_eq!(expr.to_string(), "2d6+1d4-1");
        assert_eq!(DiceSpec::new(3, 8).to_string(), "3d8");
    }

    #[test]
    fn test_dice_spec_extra_dice() {
        let spec = DiceSpec::new(2, 6);
        let mut rng = rng();
        for _ in 0..100 {
            let r = spec.roll_with_extra(1, &mut rng);
            assert!((3..=18).contains(&r));
        }
        assert_eq!(spec.average(), 7);
    }
}
