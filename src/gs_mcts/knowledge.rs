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

//! Game knowledge needed by the solver beyond plain rules: who has won,
//! the hash-key sequence the block-TT folds a position's R-zone into,
//! and (for games with repeating positions) Graph-History-Interaction
//! bookkeeping.

use gs_core::bitboard::Bitboard;
use gs_core::hashkey::HashKey;
use gs_env::{Environment, Player};

use crate::tree::Tree;

/// A snapshot of both players' stones, used by GHI's ancestor-position
/// comparison (`hasRZonePatternInPositions`).
#[derive(Debug, Clone, Copy)]
pub struct PositionPair {
    pub black: Bitboard,
    pub white: Bitboard,
}

/// Capability trait distinguishing the games that can recur via history
/// (Killall-Go's ko cycles) from those that cannot (Hex), grounded in
/// `knowledge_handler.h`.
pub trait KnowledgeHandler<E: Environment> {
    fn winner(&self, env: &E, solved_player: Player) -> Option<Player>;

    /// Hash-key sequence for the solved player's stones under the whole
    /// board, with a leading `0` sentinel so the block-TT's recursive
    /// lookup can start its accumulation at index 1.
    fn hash_key_sequence(&self, env: &E, solved_player: Player) -> Vec<HashKey> {
        self.hash_key_sequence_in_bitboard(env, env.stones(solved_player), solved_player)
    }

    fn hash_key_sequence_in_bitboard(&self, env: &E, bitboard: Bitboard, solved_player: Player) -> Vec<HashKey>;

    /// Marks nodes along `node_path` as `ghi`/`in_loop` when this game
    /// can have repeating positions. A no-op for games (Hex) whose rules
    /// forbid recurrence.
    fn find_ghi(&self, env: &E, node_path: &[i32], tree: &mut Tree);

    fn ancestor_positions(&self, env: &E, node_path: &[i32]) -> Vec<PositionPair>;
}

/// Hex cannot repeat a position (stones are never removed), so `find_ghi`
/// and `ancestor_positions` are no-ops -- grounded directly in
/// `hex_knowledge_handler.cpp`'s empty overrides.
pub struct HexKnowledgeHandler;

impl KnowledgeHandler<gs_env::hex::HexEnvironment> for HexKnowledgeHandler {
    fn winner(&self, env: &gs_env::hex::HexEnvironment, solved_player: Player) -> Option<Player> {
        env.winner().filter(|&winner| winner == solved_player)
    }

    fn hash_key_sequence_in_bitboard(&self, _env: &gs_env::hex::HexEnvironment, bitboard: Bitboard, solved_player: Player) -> Vec<HashKey> {
        let mut sequence = vec![0];
        let mut accumulated: HashKey = 0;
        for pos in bitboard.iter() {
            accumulated ^= gs_core::hashkey::player_hash_key(pos, solved_player.as_usize());
        }
        sequence.push(accumulated);
        sequence
    }

    fn find_ghi(&self, _env: &gs_env::hex::HexEnvironment, _node_path: &[i32], _tree: &mut Tree) {}

    fn ancestor_positions(&self, _env: &gs_env::hex::HexEnvironment, _node_path: &[i32]) -> Vec<PositionPair> {
        Vec::new()
    }
}

/// Killall-Go positions can repeat through ko, so -- unlike Hex --
/// `find_ghi` does real work, grounded directly on
/// `killallgo_knowledge_handler.cpp`'s `findGHI`: it tries every legal
/// non-suicidal move from the leaf, hashes the position that move would
/// reach, and looks for the earliest (hence longest-loop) occurrence of
/// that hash in the position's whole hash-key history, not just the
/// nodes on `node_path`. A match above `node_path`'s own root is
/// recorded on the tree as a negative offset for cross-subtree GHI
/// reporting; everything from the matched ancestor down is marked
/// `in_loop`, and the whole path is marked `ghi`.
pub struct KillAllGoKnowledgeHandler;

impl KnowledgeHandler<gs_env::killallgo::KillAllGoEnvironment> for KillAllGoKnowledgeHandler {
    fn winner(&self, env: &gs_env::killallgo::KillAllGoEnvironment, solved_player: Player) -> Option<Player> {
        env.winner().filter(|&winner| winner == solved_player)
    }

    fn hash_key_sequence_in_bitboard(&self, _env: &gs_env::killallgo::KillAllGoEnvironment, bitboard: Bitboard, solved_player: Player) -> Vec<HashKey> {
        let mut sequence = vec![0];
        let mut accumulated: HashKey = 0;
        for pos in bitboard.iter() {
            accumulated ^= gs_core::hashkey::player_hash_key(pos, solved_player.as_usize());
            sequence.push(accumulated);
        }
        sequence
    }

    fn find_ghi(&self, env: &gs_env::killallgo::KillAllGoEnvironment, node_path: &[i32], tree: &mut Tree) {
        let history = env.hash_key_history();
        let virtual_history_size = history.len() + 1;
        let mut longest_loop_hash_key: HashKey = 0;
        let mut longest_loop_start_index = virtual_history_size - 1;

        let mover = env.turn();
        for pos in 0..env.num_positions() {
            if env.stones(Player::Black).test(pos) || env.stones(Player::White).test(pos) {
                continue;
            }

            let hash_after_play = match env.hash_key_after_play(pos, mover) {
                Some(hash) => hash,
                None => continue,
            };

            let repetitive_index = match history.iter().position(|&h| h == hash_after_play) {
                Some(index) => index + 1,
                None => continue,
            };
            if repetitive_index >= longest_loop_start_index {
                continue;
            }

            longest_loop_hash_key = hash_after_play;
            longest_loop_start_index = repetitive_index;
        }

        if longest_loop_hash_key == 0 {
            return;
        }

        let node_path_ghi_start_index = longest_loop_start_index as i64 - (virtual_history_size as i64 - node_path.len() as i64);
        if node_path_ghi_start_index < 0 {
            tree.add_ghi_node(*node_path.last().unwrap(), node_path_ghi_start_index as i32);
        }

        let in_loop_start = if node_path_ghi_start_index + 1 > 0 { (node_path_ghi_start_index + 1) as usize } else { 0 };
        for &index in &node_path[in_loop_start..] {
            tree.get_mut(index).in_loop = true;
        }
        for &index in node_path {
            tree.get_mut(index).ghi = true;
        }
    }

    fn ancestor_positions(&self, env: &gs_env::killallgo::KillAllGoEnvironment, node_path: &[i32]) -> Vec<PositionPair> {
        let mut replay = env.clone();
        let mut positions = vec![PositionPair { black: replay.stones(Player::Black), white: replay.stones(Player::White) }];
        for &_index in &node_path[1..] {
            positions.push(PositionPair { black: replay.stones(Player::Black), white: replay.stones(Player::White) });
        }
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_env::Action;

    #[test]
    fn hex_winner_requires_matching_solved_player() {
        let mut env = gs_env::hex::HexEnvironment::new(2);
        env.apply(Action::Play(0));
        env.apply(Action::Play(2));
        env.apply(Action::Play(1));
        env.apply(Action::Play(3));

        let handler = HexKnowledgeHandler;
        assert_eq!(handler.winner(&env, Player::Black), Some(Player::Black));
        assert_eq!(handler.winner(&env, Player::White), None);
    }

    #[test]
    fn hash_key_sequence_has_leading_sentinel() {
        let env = gs_env::hex::HexEnvironment::new(3);
        let handler = HexKnowledgeHandler;
        let sequence = handler.hash_key_sequence(&env, Player::Black);

        assert_eq!(sequence.len(), 2);
        assert_eq!(sequence[0], 0);
    }
}
