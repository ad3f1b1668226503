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

//! A minimal Hex environment. Black connects top-to-bottom, White connects
//! left-to-right; there are no captures, no suicide, and no ko, which is
//! why `HexKnowledgeHandler::find_ghi` is a no-op in the original solver
//! (Hex positions cannot recur).

use gs_core::bitboard::Bitboard;
use gs_core::hashkey::{player_hash_key, turn_hash_key, HashKey};

use crate::action::Action;
use crate::environment::Environment;
use crate::player::Player;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexEnvironment {
    size: usize,
    black: Bitboard,
    white: Bitboard,
    turn: Player,
    hash_key: HashKey,
}

impl HexEnvironment {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            black: Bitboard::new(),
            white: Bitboard::new(),
            turn: Player::Black,
            hash_key: turn_hash_key(),
        }
    }

    fn neighbors(&self, pos: usize) -> Vec<usize> {
        let row = (pos / self.size) as isize;
        let col = (pos % self.size) as isize;
        let size = self.size as isize;

        // axial hex neighbor offsets for an offset-coordinate board.
        const DELTAS: [(isize, isize); 6] = [(-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0)];

        DELTAS
            .iter()
            .filter_map(|&(dr, dc)| {
                let r = row + dr;
                let c = col + dc;
                if r >= 0 && r < size && c >= 0 && c < size {
                    Some((r * size + c) as usize)
                } else {
                    None
                }
            })
            .collect()
    }

    fn is_occupied(&self, pos: usize) -> bool {
        self.black.test(pos) || self.white.test(pos)
    }

    fn connects(&self, player: Player) -> bool {
        let stones = match player {
            Player::Black => &self.black,
            Player::White => &self.white,
        };

        let mut visited = Bitboard::new();
        let mut stack = Vec::new();

        match player {
            // black connects the top row to the bottom row.
            Player::Black => {
                for col in 0..self.size {
                    if stones.test(col) {
                        stack.push(col);
                        visited.set(col);
                    }
                }
            }
            // white connects the left column to the right column.
            Player::White => {
                for row in 0..self.size {
                    let pos = row * self.size;
                    if stones.test(pos) {
                        stack.push(pos);
                        visited.set(pos);
                    }
                }
            }
        }

        while let Some(pos) = stack.pop() {
            let reached_far_edge = match player {
                Player::Black => pos / self.size == self.size - 1,
                Player::White => pos % self.size == self.size - 1,
            };
            if reached_far_edge {
                return true;
            }

            for next in self.neighbors(pos) {
                if stones.test(next) && !visited.test(next) {
                    visited.set(next);
                    stack.push(next);
                }
            }
        }

        false
    }
}

impl Environment for HexEnvironment {
    fn turn(&self) -> Player {
        self.turn
    }

    fn legal_actions(&self) -> Vec<Action> {
        if self.winner().is_some() {
            return vec![];
        }

        (0..self.size * self.size)
            .filter(|&pos| !self.is_occupied(pos))
            .map(Action::Play)
            .collect()
    }

    fn apply(&mut self, action: Action) {
        let pos = action.position().expect("hex has no pass move");
        assert!(!self.is_occupied(pos), "position {} already occupied", pos);

        match self.turn {
            Player::Black => self.black.set(pos),
            Player::White => self.white.set(pos),
        }

        self.hash_key ^= player_hash_key(pos, self.turn.as_usize());
        self.hash_key ^= turn_hash_key();
        self.turn = !self.turn;
    }

    fn winner(&self) -> Option<Player> {
        if self.connects(Player::Black) {
            Some(Player::Black)
        } else if self.connects(Player::White) {
            Some(Player::White)
        } else {
            None
        }
    }

    fn hash_key(&self) -> HashKey {
        self.hash_key
    }

    fn stones(&self, player: Player) -> Bitboard {
        match player {
            Player::Black => self.black,
            Player::White => self.white,
        }
    }

    fn num_positions(&self) -> usize {
        self.size * self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_connects_top_to_bottom_on_full_column() {
        let mut env = HexEnvironment::new(3);

        for row in 0..3 {
            env.black.set(row * 3);
        }

        assert_eq!(env.winner(), Some(Player::Black));
    }

    #[test]
    fn no_winner_on_empty_board() {
        let env = HexEnvironment::new(3);
        assert_eq!(env.winner(), None);
    }

    #[test]
    fn apply_alternates_turn_and_updates_hash() {
        let mut env = HexEnvironment::new(3);
        let before = env.hash_key();

        env.apply(Action::Play(4));

        assert_eq!(env.turn(), Player::White);
        assert_ne!(env.hash_key(), before);
    }

    #[test]
    #[should_panic]
    fn apply_rejects_occupied_position() {
        let mut env = HexEnvironment::new(3);
        env.apply(Action::Play(4));
        env.apply(Action::Play(4));
    }

    #[test]
    fn legal_actions_shrinks_as_board_fills() {
        let mut env = HexEnvironment::new(2);
        assert_eq!(env.legal_actions().len(), 4);

        env.apply(Action::Play(0));
        assert_eq!(env.legal_actions().len(), 3);
    }
}
