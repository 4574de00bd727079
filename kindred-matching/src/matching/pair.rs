//! Canonical addressing for an unordered pair of profiles.
//!
//! "A likes B" and "B likes A" must always land on the same relationship row,
//! so every component goes through [`normalize`] before touching the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order-independent identifier of a profile pair: `{lo}:{hi}` where `lo < hi`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairKey(String);

impl PairKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which participant of a normalized pair is acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// Result of normalizing two profile ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPair {
    pub key: PairKey,
    pub profile_a: Uuid,
    pub profile_b: Uuid,
}

impl NormalizedPair {
    /// Side played by `profile_id`, or `None` if it is not a participant.
    pub fn side_of(&self, profile_id: Uuid) -> Option<Side> {
        if profile_id == self.profile_a {
            Some(Side::A)
        } else if profile_id == self.profile_b {
            Some(Side::B)
        } else {
            None
        }
    }
}

/// Reorder two ids so the smaller comes first.
///
/// `Uuid`'s `Ord` compares the 16 raw bytes, which agrees with the ordering
/// of the lowercase hyphenated text form, so the key sorts the same way in
/// Postgres and in memory.
pub fn normalize(x: Uuid, y: Uuid) -> NormalizedPair {
    let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
    NormalizedPair {
        key: PairKey(format!("{lo}:{hi}")),
        profile_a: lo,
        profile_b: hi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_symmetric() {
        for _ in 0..256 {
            let x = Uuid::new_v4();
            let y = Uuid::new_v4();
            assert_eq!(normalize(x, y), normalize(y, x));
        }
    }

    #[test]
    fn smaller_id_is_profile_a() {
        let lo = Uuid::from_u128(1);
        let hi = Uuid::from_u128(2);
        let pair = normalize(hi, lo);

        assert_eq!(pair.profile_a, lo);
        assert_eq!(pair.profile_b, hi);
        assert_eq!(
            pair.key.as_str(),
            "00000000-0000-0000-0000-000000000001:00000000-0000-0000-0000-000000000002"
        );
    }

    #[test]
    fn byte_order_matches_text_order() {
        for _ in 0..256 {
            let x = Uuid::new_v4();
            let y = Uuid::new_v4();
            assert_eq!(x.cmp(&y), x.to_string().cmp(&y.to_string()));
        }
    }

    #[test]
    fn sides() {
        let pair = normalize(Uuid::from_u128(9), Uuid::from_u128(3));
        assert_eq!(pair.side_of(Uuid::from_u128(3)), Some(Side::A));
        assert_eq!(pair.side_of(Uuid::from_u128(9)), Some(Side::B));
        assert_eq!(pair.side_of(Uuid::from_u128(4)), None);
        assert_eq!(Side::A.other(), Side::B);
    }
}
