// Copyright 2024 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bitboard::MAX_BITS;

/// Number of distinct players a grid or move can be associated with (black,
/// white -- there is no "empty" hash key, matching the original's table
/// shape).
const NUM_PLAYERS: usize = 2;

pub type HashKey = u64;

/// Seed used to initialize the Zobrist tables. Fixed (not time-based) so
/// that a worker and a manager -- and two separate runs of the same
/// process -- always agree on the hash of a given position, matching
/// `gs_hashkey.cpp`'s `mt19937_64` seeded with `0`.
const ZOBRIST_SEED: u64 = 0;

struct HashKeyTables {
    turn_hash_key: HashKey,
    player_hash_key: Vec<[HashKey; NUM_PLAYERS]>,
    move_hash_key: Vec<[HashKey; NUM_PLAYERS]>,
    sequence_hash_key: Vec<[HashKey; NUM_PLAYERS]>,
}

impl HashKeyTables {
    fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(ZOBRIST_SEED);

        let turn_hash_key = rng.gen();
        let player_hash_key = (0..MAX_BITS).map(|_| [rng.gen(), rng.gen()]).collect();
        let move_hash_key = (0..MAX_BITS).map(|_| [rng.gen(), rng.gen()]).collect();
        let sequence_hash_key = (0..MAX_BITS).map(|_| [rng.gen(), rng.gen()]).collect();

        Self {
            turn_hash_key,
            player_hash_key,
            move_hash_key,
            sequence_hash_key,
        }
    }
}

lazy_static! {
    static ref TABLES: HashKeyTables = HashKeyTables::new();
}

/// Hash key contribution of the side to move.
pub fn turn_hash_key() -> HashKey {
    TABLES.turn_hash_key
}

/// Hash key contribution of `player` occupying `position` -- XOR this in
/// and out of a running key as stones are placed and captured.
pub fn player_hash_key(position: usize, player: usize) -> HashKey {
    assert!(position < MAX_BITS, "position {} out of range", position);
    assert!(player < NUM_PLAYERS, "player {} out of range", player);

    TABLES.player_hash_key[position][player]
}

/// Hash key contribution of `player` playing at `position`, distinct from
/// `player_hash_key` because the move itself (as opposed to the resulting
/// occupancy) is what feeds the block-TT key sequence in §4.6.
pub fn move_hash_key(position: usize, player: usize) -> HashKey {
    assert!(position < MAX_BITS, "position {} out of range", position);
    assert!(player < NUM_PLAYERS, "player {} out of range", player);

    TABLES.move_hash_key[position][player]
}

/// Hash key contribution used when folding a move into a node's
/// `sequence_hash_key`, the running key of moves-from-root used by GHI
/// detection to recognize repeated positions.
pub fn sequence_hash_key(position: usize, player: usize) -> HashKey {
    assert!(position < MAX_BITS, "position {} out of range", position);
    assert!(player < NUM_PLAYERS, "player {} out of range", player);

    TABLES.sequence_hash_key[position][player]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        let a = player_hash_key(10, 0);
        let b = player_hash_key(10, 0);

        assert_eq!(a, b);
    }

    #[test]
    fn distinct_players_and_positions() {
        assert_ne!(player_hash_key(10, 0), player_hash_key(10, 1));
        assert_ne!(player_hash_key(10, 0), player_hash_key(11, 0));
        assert_ne!(player_hash_key(10, 0), move_hash_key(10, 0));
    }

    #[test]
    #[should_panic]
    fn out_of_range_position_panics() {
        player_hash_key(MAX_BITS, 0);
    }
}
