// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_shared::clock::ChainEpoch;
use fvm_shared::randomness::RANDOMNESS_LENGTH;
use serde_repr::*;

/// Personalization mixed into every randomness draw so that values drawn for
/// different purposes never coincide.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash, Serialize_repr, Deserialize_repr)]
#[repr(i64)]
pub enum DomainSeparationTag {
    TicketProduction = 1,
    ElectionProofProduction = 2,
    WinningPoStChallengeSeed = 3,
    WindowedPoStChallengeSeed = 4,
    SealRandomness = 5,
    InteractiveSealChallengeSeed = 6,
    WindowPoStDeadlineAssignment = 7,
    MarketDealCronSeed = 8,
    PoStChainCommit = 9,
}

/// Hashes `tag || base || round || entropy`, with tag and round as big-endian
/// 64-bit integers.
pub fn draw_randomness(
    hasher: impl FnOnce(&[u8]) -> [u8; 32],
    base: &[u8; RANDOMNESS_LENGTH],
    tag: DomainSeparationTag,
    round: ChainEpoch,
    entropy: &[u8],
) -> [u8; RANDOMNESS_LENGTH] {
    let input = [
        &(tag as i64).to_be_bytes()[..],
        &base[..],
        &round.to_be_bytes()[..],
        entropy,
    ]
    .concat();
    hasher(&input)
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::test_utils::blake2b_256;

    #[test]
    fn known_seal_randomness() {
        let base = hex!("18ea1bc64ae14b5862140d44614299337c6cc957f2e57cb76d0d202cf9de718b");
        let drawn = draw_randomness(
            blake2b_256,
            &base,
            DomainSeparationTag::SealRandomness,
            2_797_727,
            &hex!("440099cb34"),
        );
        assert_eq!(hex!("dcc0aa70b1ca67ea6297832a4d2f708ec77ec8fbd3b93aeaf0f9068c4a37b584"), drawn);
    }

    #[test]
    fn tag_and_round_change_the_output() {
        let base = [7u8; RANDOMNESS_LENGTH];
        let draw = |tag, round| draw_randomness(blake2b_256, &base, tag, round, b"miner");
        let seal = draw(DomainSeparationTag::SealRandomness, 10);
        assert_ne!(seal, draw(DomainSeparationTag::InteractiveSealChallengeSeed, 10));
        assert_ne!(seal, draw(DomainSeparationTag::SealRandomness, 11));
        assert_eq!(seal, draw(DomainSeparationTag::SealRandomness, 10));
    }
}
