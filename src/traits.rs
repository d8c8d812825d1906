//! Trait keys and fixed-length trait vectors.
//!
//! Every message and every node profile is described by the same ten traits,
//! always in the same canonical order. Subjectivity and polarity come first,
//! followed by the eight basic emotions (fear, anger, anticipation, trust,
//! surprise, sadness, disgust, joy).

use std::collections::HashMap;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of traits in every [`TraitVector`].
pub const TRAIT_COUNT: usize = 10;

/// A single trait dimension.
///
/// The discriminant is the trait's position in a [`TraitVector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TraitKey {
    /// Subjectivity.
    Sub,
    /// Polarity.
    Pol,
    /// Fear.
    Fea,
    /// Anger.
    Ang,
    /// Anticipation.
    Ant,
    /// Trust.
    Tru,
    /// Surprise.
    Sur,
    /// Sadness.
    Sad,
    /// Disgust.
    Dis,
    /// Joy.
    Joy,
}

impl TraitKey {
    /// All trait keys in canonical order.
    pub const ALL: [Self; TRAIT_COUNT] = [
        Self::Sub,
        Self::Pol,
        Self::Fea,
        Self::Ang,
        Self::Ant,
        Self::Tru,
        Self::Sur,
        Self::Sad,
        Self::Dis,
        Self::Joy,
    ];

    /// Position of this key in a trait vector.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short label used in key-prefixed profile maps (`out_Sub`, `in_Joy`, ...).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sub => "Sub",
            Self::Pol => "Pol",
            Self::Fea => "Fea",
            Self::Ang => "Ang",
            Self::Ant => "Ant",
            Self::Tru => "Tru",
            Self::Sur => "Sur",
            Self::Sad => "Sad",
            Self::Dis => "Dis",
            Self::Joy => "Joy",
        }
    }
}

impl FromStr for TraitKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.label() == s)
            .ok_or_else(|| format!("unknown trait key `{s}`"))
    }
}

/// Which half of a node's profile is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// The node's disposition to send (`out_` prefix).
    Out,
    /// The node's receptivity (`in_` prefix).
    In,
}

impl Direction {
    /// Prefix used for this direction in key-prefixed profile maps.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Out => "out",
            Self::In => "in",
        }
    }
}

/// Ten trait values in canonical [`TraitKey`] order.
///
/// Values produced by [`TraitVector::random`] lie in `[0, 1)`. Values set by
/// callers are stored as given; nothing clamps them afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TraitVector([f64; TRAIT_COUNT]);

impl TraitVector {
    /// A vector with every trait set to zero.
    #[must_use]
    pub const fn zeros() -> Self {
        Self([0.0; TRAIT_COUNT])
    }

    /// A vector with every trait set to `value`.
    #[must_use]
    pub const fn splat(value: f64) -> Self {
        Self([value; TRAIT_COUNT])
    }

    /// Wrap raw values given in canonical order.
    #[must_use]
    pub const fn new(values: [f64; TRAIT_COUNT]) -> Self {
        Self(values)
    }

    /// Draw every trait independently and uniformly from `[0, 1)`.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let mut values = [0.0; TRAIT_COUNT];
        for value in &mut values {
            *value = rng.random::<f64>().clamp(0.0, 1.0);
        }
        Self(values)
    }

    /// Build a vector from a name-keyed map; absent keys default to 0.
    ///
    /// With a prefix, keys are looked up as `<prefix>_<label>`.
    #[must_use]
    pub fn from_map(map: &HashMap<String, f64>, prefix: Option<&str>) -> Self {
        let mut values = [0.0; TRAIT_COUNT];
        for key in TraitKey::ALL {
            let name = match prefix {
                Some(prefix) => format!("{prefix}_{}", key.label()),
                None => key.label().to_string(),
            };
            values[key.index()] = map.get(&name).copied().unwrap_or(0.0);
        }
        Self(values)
    }

    /// Label every trait with its key.
    #[must_use]
    pub fn labelled(&self) -> Vec<(TraitKey, f64)> {
        TraitKey::ALL.iter().map(|&key| (key, self[key])).collect()
    }

    /// Raw values in canonical order.
    #[inline]
    #[must_use]
    pub const fn as_array(&self) -> &[f64; TRAIT_COUNT] {
        &self.0
    }

    /// Raw values as a slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Mutable access to the raw values.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.0
    }
}

impl From<[f64; TRAIT_COUNT]> for TraitVector {
    fn from(values: [f64; TRAIT_COUNT]) -> Self {
        Self(values)
    }
}

impl Index<TraitKey> for TraitVector {
    type Output = f64;

    #[inline]
    fn index(&self, key: TraitKey) -> &f64 {
        &self.0[key.index()]
    }
}

impl IndexMut<TraitKey> for TraitVector {
    #[inline]
    fn index_mut(&mut self, key: TraitKey) -> &mut f64 {
        &mut self.0[key.index()]
    }
}

/// Directional trait profile of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TraitProfile {
    /// Disposition to pass messages on.
    pub outgoing: TraitVector,
    /// Receptivity to incoming messages.
    pub incoming: TraitVector,
}

impl TraitProfile {
    /// Create a profile from its two halves.
    #[must_use]
    pub const fn new(outgoing: TraitVector, incoming: TraitVector) -> Self {
        Self { outgoing, incoming }
    }

    /// A profile whose outgoing and incoming halves are both `vector`.
    #[must_use]
    pub const fn symmetric(vector: TraitVector) -> Self {
        Self {
            outgoing: vector,
            incoming: vector,
        }
    }

    /// Parse the key-prefixed map form (`out_Sub`, `in_Joy`, ...).
    ///
    /// Unknown keys are ignored and absent keys default to 0.
    #[must_use]
    pub fn from_prefixed_map(map: &HashMap<String, f64>) -> Self {
        Self {
            outgoing: TraitVector::from_map(map, Some(Direction::Out.prefix())),
            incoming: TraitVector::from_map(map, Some(Direction::In.prefix())),
        }
    }

    /// The half of the profile consulted for `direction`.
    #[inline]
    #[must_use]
    pub const fn side(&self, direction: Direction) -> &TraitVector {
        match direction {
            Direction::Out => &self.outgoing,
            Direction::In => &self.incoming,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_trait_key_order() {
        for (i, key) in TraitKey::ALL.iter().enumerate() {
            assert_eq!(key.index(), i);
        }
        assert_eq!(TraitKey::ALL.len(), TRAIT_COUNT);
    }

    #[test]
    fn test_trait_key_parse() {
        assert_eq!("Joy".parse::<TraitKey>(), Ok(TraitKey::Joy));
        assert!("joy".parse::<TraitKey>().is_err());
    }

    #[test]
    fn test_random_vector_in_unit_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..100 {
            let v = TraitVector::random(&mut rng);
            for &x in v.as_slice() {
                assert!((0.0..=1.0).contains(&x), "Value out of range: {}", x);
            }
        }
    }

    #[test]
    fn test_prefixed_map_defaults_to_zero() {
        let mut map = HashMap::new();
        map.insert("out_Joy".to_string(), 0.9);
        map.insert("in_Fea".to_string(), 0.3);
        map.insert("Funny".to_string(), 0.5);

        let profile = TraitProfile::from_prefixed_map(&map);
        assert_eq!(profile.outgoing[TraitKey::Joy], 0.9);
        assert_eq!(profile.outgoing[TraitKey::Fea], 0.0);
        assert_eq!(profile.incoming[TraitKey::Fea], 0.3);
        assert_eq!(profile.incoming[TraitKey::Joy], 0.0);
    }

    #[test]
    fn test_out_of_range_values_are_kept() {
        let mut v = TraitVector::zeros();
        v[TraitKey::Ang] = 2.5;
        assert_eq!(v.as_slice()[3], 2.5);
    }
}
