//! Candidate message encoding for the genetic search.
//!
//! A [`TraitGenome`] is a fixed-length vector of trait values in canonical
//! [`TraitKey`](crate::traits::TraitKey) order. Genetic operators work on the
//! raw positions:
//!
//! - **Crossover** picks a split point `s` in `0..TRAIT_COUNT`; the first child
//!   takes positions `..s` from parent one and `s..` from parent two, the
//!   second child the mirror image.
//! - **Mutation** replaces each position, independently and with a given
//!   probability, by a fresh uniform value in `[0, 1)`.
//!
//! Both operators preserve the genome length, and every value produced by the
//! search stays in `[0, 1)`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use symbios_genetics::Genotype;

use crate::graph::{Message, MessageId};
use crate::traits::{TraitVector, TRAIT_COUNT};

/// Trait values of a candidate message.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TraitGenome(pub TraitVector);

impl TraitGenome {
    /// A genome with every value drawn uniformly from `[0, 1)`.
    #[must_use]
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self(TraitVector::random(rng))
    }

    /// Build a genome from raw values in canonical order.
    ///
    /// Returns `None` unless exactly [`TRAIT_COUNT`] values are given.
    #[must_use]
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let values: [f64; TRAIT_COUNT] = values.try_into().ok()?;
        Some(Self(TraitVector::new(values)))
    }

    /// Trait values of the genome.
    #[inline]
    #[must_use]
    pub const fn traits(&self) -> &TraitVector {
        &self.0
    }

    /// Single-point crossover at `split`.
    ///
    /// `split` is clamped to `0..=TRAIT_COUNT`. A split of zero swaps the
    /// parents wholesale.
    #[must_use]
    pub fn crossover_at(&self, other: &Self, split: usize) -> (Self, Self) {
        let split = split.min(TRAIT_COUNT);
        let mut first = *self;
        let mut second = *other;
        first.0.as_mut_slice()[split..].copy_from_slice(&other.0.as_slice()[split..]);
        second.0.as_mut_slice()[split..].copy_from_slice(&self.0.as_slice()[split..]);
        (first, second)
    }

    /// Single-point crossover at a random split in `0..TRAIT_COUNT`.
    ///
    /// If either parent is missing, two fresh random genomes are returned
    /// instead.
    #[must_use]
    pub fn crossover_pair<R: Rng>(
        first: Option<&Self>,
        second: Option<&Self>,
        rng: &mut R,
    ) -> (Self, Self) {
        match (first, second) {
            (Some(a), Some(b)) => a.crossover_at(b, rng.random_range(0..TRAIT_COUNT)),
            _ => {
                tracing::debug!("crossover with a missing parent, using random genomes");
                (Self::random(rng), Self::random(rng))
            }
        }
    }

    /// Replace each value with a fresh uniform one with probability
    /// `probability`.
    ///
    /// Returns the number of replaced values.
    pub fn mutate_genes<R: Rng>(&mut self, rng: &mut R, probability: f64) -> usize {
        let mut replaced = 0;
        for value in self.0.as_mut_slice() {
            if rng.random::<f64>() < probability {
                *value = rng.random::<f64>();
                replaced += 1;
            }
        }
        replaced
    }

    /// Wrap the genome as a message with the given id.
    #[must_use]
    pub fn to_message(&self, id: impl Into<MessageId>) -> Message {
        Message::new(id, self.0)
    }
}

impl From<TraitVector> for TraitGenome {
    fn from(traits: TraitVector) -> Self {
        Self(traits)
    }
}

impl Genotype for TraitGenome {
    fn mutate<R: Rng>(&mut self, rng: &mut R, rate: f32) {
        self.mutate_genes(rng, f64::from(rate));
    }

    fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self {
        self.crossover_at(other, rng.random_range(0..TRAIT_COUNT)).0
    }
}
