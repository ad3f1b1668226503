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

//! A 7x7 "killall" Go environment: Black must capture every White stone
//! before Black runs out of useful moves, White must keep at least one
//! permanently alive group. Standard suicide and positional-superko rules
//! apply; scoring beyond killall status is out of scope (`spec.md`'s
//! Non-goals exclude general Go scoring).

use gs_core::bitboard::Bitboard;
use gs_core::hashkey::{player_hash_key, turn_hash_key, HashKey};

use crate::action::Action;
use crate::environment::Environment;
use crate::player::Player;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillAllGoEnvironment {
    size: usize,
    black: Bitboard,
    white: Bitboard,
    turn: Player,
    hash_key: HashKey,
    /// Position forbidden this move by positional superko (the previous
    /// board state may not recur), or `None`.
    ko: Option<usize>,
    pass_count: u32,
    /// Hash key recorded after every move actually played, oldest first --
    /// the ancestor chain GHI detection scans for a recurring position.
    history: Vec<HashKey>,
}

impl KillAllGoEnvironment {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            black: Bitboard::new(),
            white: Bitboard::new(),
            turn: Player::Black,
            hash_key: turn_hash_key(),
            ko: None,
            pass_count: 0,
            history: Vec::new(),
        }
    }

    fn neighbors(&self, pos: usize) -> Vec<usize> {
        let row = (pos / self.size) as isize;
        let col = (pos % self.size) as isize;
        let size = self.size as isize;

        [(-1, 0), (1, 0), (0, -1), (0, 1)]
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

    fn stones_of(&self, player: Player) -> &Bitboard {
        match player {
            Player::Black => &self.black,
            Player::White => &self.white,
        }
    }

    fn is_occupied(&self, pos: usize) -> bool {
        self.black.test(pos) || self.white.test(pos)
    }

    /// Flood-fills the group containing `pos` and returns its stones plus
    /// whether it has any liberty at all.
    fn group_and_liberties(&self, pos: usize, owner: Player) -> (Bitboard, bool) {
        let stones = self.stones_of(owner);
        let mut group = Bitboard::new();
        let mut stack = vec![pos];
        let mut has_liberty = false;
        group.set(pos);

        while let Some(p) = stack.pop() {
            for next in self.neighbors(p) {
                if !self.is_occupied(next) {
                    has_liberty = true;
                } else if stones.test(next) && !group.test(next) {
                    group.set(next);
                    stack.push(next);
                }
            }
        }

        (group, has_liberty)
    }

    fn remove_stones(&mut self, group: Bitboard, owner: Player) {
        for pos in group.iter() {
            match owner {
                Player::Black => self.black.reset(pos),
                Player::White => self.white.reset(pos),
            }
            self.hash_key ^= player_hash_key(pos, owner.as_usize());
        }
    }

    /// Splits `owner`'s stones into maximally connected chains.
    fn chains_of(&self, owner: Player) -> Vec<Bitboard> {
        let mut remaining = *self.stones_of(owner);
        let mut chains = Vec::new();
        while let Some(pos) = remaining.find_first() {
            let (group, _) = self.group_and_liberties(pos, owner);
            remaining &= !group;
            chains.push(group);
        }
        chains
    }

    /// Every maximal connected empty region that does not touch a stone of
    /// `owner`'s opponent -- Benson's "enclosed by one colour" regions.
    fn enclosed_regions_of(&self, owner: Player) -> Vec<Bitboard> {
        let opponent = !owner;
        let mut unvisited = Bitboard::new();
        for pos in 0..self.size * self.size {
            if !self.is_occupied(pos) {
                unvisited.set(pos);
            }
        }

        let mut regions = Vec::new();
        while let Some(start) = unvisited.find_first() {
            let mut region = Bitboard::new();
            let mut stack = vec![start];
            region.set(start);
            unvisited.reset(start);

            while let Some(p) = stack.pop() {
                for next in self.neighbors(p) {
                    if !self.is_occupied(next) && !region.test(next) {
                        region.set(next);
                        unvisited.reset(next);
                        stack.push(next);
                    }
                }
            }

            let borders_opponent = region.iter().flat_map(|p| self.neighbors(p)).any(|n| self.stones_of(opponent).test(n));
            if !borders_opponent {
                regions.push(region);
            }
        }

        regions
    }

    /// A region is vital to `chain` when every one of its empty points is a
    /// liberty of `chain` (has at least one neighbour in it).
    fn region_is_vital(&self, region: Bitboard, chain: Bitboard) -> bool {
        region.iter().all(|p| self.neighbors(p).iter().any(|&n| chain.test(n)))
    }

    /// Benson's algorithm for unconditional life: repeatedly discards any
    /// chain with fewer than two still-qualifying vital regions, and any
    /// region that no longer borders only surviving chains, until a fixed
    /// point. The chains left standing cannot be captured regardless of
    /// how the opponent plays.
    fn benson_alive(&self, owner: Player) -> Bitboard {
        let mut chains = self.chains_of(owner);
        let mut regions = self.enclosed_regions_of(owner);

        loop {
            let chains_before = chains.len();
            let regions_before = regions.len();

            chains.retain(|&chain| regions.iter().filter(|&&region| self.region_is_vital(region, chain)).count() >= 2);

            let surviving_stones = chains.iter().fold(Bitboard::new(), |acc, &chain| acc | chain);
            regions.retain(|&region| {
                region
                    .iter()
                    .flat_map(|p| self.neighbors(p))
                    .filter(|&n| self.stones_of(owner).test(n))
                    .all(|n| surviving_stones.test(n))
            });

            if chains.len() == chains_before && regions.len() == regions_before {
                break;
            }
        }

        chains.iter().fold(Bitboard::new(), |acc, &chain| acc | chain)
    }
}

impl Environment for KillAllGoEnvironment {
    fn turn(&self) -> Player {
        self.turn
    }

    fn legal_actions(&self) -> Vec<Action> {
        if self.winner().is_some() {
            return vec![];
        }

        let mut actions: Vec<Action> = (0..self.size * self.size)
            .filter(|&pos| self.is_legal_play(pos))
            .map(Action::Play)
            .collect();
        actions.push(Action::Pass);
        actions
    }

    fn apply(&mut self, action: Action) {
        let player = self.turn;

        match action {
            Action::Pass => {
                self.pass_count += 1;
            }
            Action::Play(pos) => {
                assert!(self.is_legal_play(pos), "illegal play at {}", pos);
                self.pass_count = 0;

                match player {
                    Player::Black => self.black.set(pos),
                    Player::White => self.white.set(pos),
                }
                self.hash_key ^= player_hash_key(pos, player.as_usize());

                let opponent = !player;
                let mut captured = Bitboard::new();
                for next in self.neighbors(pos) {
                    if self.stones_of(opponent).test(next) {
                        let (group, has_liberty) = self.group_and_liberties(next, opponent);
                        if !has_liberty {
                            captured |= group;
                        }
                    }
                }

                let single_capture = if captured.count() == 1 { captured.find_first() } else { None };
                self.remove_stones(captured, opponent);

                self.ko = single_capture;
            }
        }

        self.hash_key ^= turn_hash_key();
        self.turn = !self.turn;
        self.history.push(self.hash_key);
    }

    fn winner(&self) -> Option<Player> {
        if self.white.none() && self.black.any() {
            Some(Player::Black)
        } else if self.benson_alive(Player::White).any() {
            Some(Player::White)
        } else {
            None
        }
    }

    fn hash_key(&self) -> HashKey {
        self.hash_key
    }

    fn stones(&self, player: Player) -> Bitboard {
        *self.stones_of(player)
    }

    fn num_positions(&self) -> usize {
        self.size * self.size
    }
}

impl KillAllGoEnvironment {
    /// Board width, needed by R-zone legalization to reason about groups
    /// without re-deriving the neighbor rule.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn ko(&self) -> Option<usize> {
        self.ko
    }

    /// Hash key recorded after every move actually played, oldest first.
    /// GHI detection scans this for a position that a candidate move would
    /// recur.
    pub fn hash_key_history(&self) -> &[HashKey] {
        &self.history
    }

    /// The hash key that would result from playing `pos` as `player`,
    /// without mutating `self`, or `None` if the play is suicidal (the
    /// played stone's own group ends up with no liberty after captures).
    /// Mirrors `apply`'s capture-then-suicide-check logic on a scratch
    /// clone, since GHI detection needs to look one ply into moves that
    /// were never actually played.
    pub fn hash_key_after_play(&self, pos: usize, player: Player) -> Option<HashKey> {
        let mut sim = self.clone();

        match player {
            Player::Black => sim.black.set(pos),
            Player::White => sim.white.set(pos),
        }
        sim.hash_key ^= player_hash_key(pos, player.as_usize());

        let opponent = !player;
        let mut captured = Bitboard::new();
        for next in sim.neighbors(pos) {
            if sim.stones_of(opponent).test(next) {
                let (group, has_liberty) = sim.group_and_liberties(next, opponent);
                if !has_liberty {
                    captured |= group;
                }
            }
        }
        sim.remove_stones(captured, opponent);

        if !sim.group_has_liberty(pos, player) {
            return None;
        }

        sim.hash_key ^= turn_hash_key();
        Some(sim.hash_key)
    }

    /// Exposes the orthogonal-neighbor rule so R-zone closure can walk
    /// group boundaries without duplicating the adjacency logic.
    pub fn neighbors_of(&self, pos: usize) -> Vec<usize> {
        self.neighbors(pos)
    }

    /// The full connected group containing `pos`, without its liberty
    /// flag -- used when legalizing a loser's R-zone so a partially
    /// included group is closed into a whole one.
    pub fn group_containing(&self, pos: usize, owner: Player) -> Bitboard {
        self.group_and_liberties(pos, owner).0
    }

    /// Whether the group containing `pos` has at least one liberty.
    pub fn group_has_liberty(&self, pos: usize, owner: Player) -> bool {
        self.group_and_liberties(pos, owner).1
    }

    /// The unconditionally-alive (Benson) region for `owner`: every stone
    /// belonging to a chain that survives Benson's two-vital-region
    /// closure. Used by `winner` and by the R-zone handler, since the
    /// R-zone of a Benson-alive win is exactly this region.
    pub fn benson_alive_region(&self, owner: Player) -> Bitboard {
        self.benson_alive(owner)
    }

    fn is_legal_play(&self, pos: usize) -> bool {
        if self.is_occupied(pos) || self.ko == Some(pos) {
            return false;
        }

        // simulate the play to check for suicide: legal unless it leaves
        // the played stone's own group with no liberties and captures
        // nothing from the opponent.
        let player = self.turn;
        let opponent = !player;

        let has_open_neighbor = self
            .neighbors(pos)
            .iter()
            .any(|&n| !self.is_occupied(n));
        if has_open_neighbor {
            return true;
        }

        let captures_something = self.neighbors(pos).iter().any(|&n| {
            self.stones_of(opponent).test(n) && !self.group_and_liberties(n, opponent).1
        });
        if captures_something {
            return true;
        }

        let joins_friendly_with_liberty = self.neighbors(pos).iter().any(|&n| {
            if !self.stones_of(player).test(n) {
                return false;
            }
            let (group, _) = self.group_and_liberties(n, player);
            group.iter().any(|g| {
                self.neighbors(g).iter().any(|&gn| gn != pos && !self.is_occupied(gn))
            })
        });

        joins_friendly_with_liberty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_a_lone_stone() {
        let mut env = KillAllGoEnvironment::new(5);

        // white stone at (2,2) surrounded on all four sides by black.
        env.white.set(12);
        env.turn = Player::Black;

        env.black.set(7); // up
        env.black.set(17); // down
        env.black.set(11); // left
        env.white.set(12);

        // play the last liberty.
        let pos = 13;
        assert!(env.is_legal_play(pos));
        env.apply(Action::Play(pos));

        assert!(env.white.none());
    }

    #[test]
    fn black_wins_when_white_has_no_stones() {
        let mut env = KillAllGoEnvironment::new(5);
        env.black.set(0);

        assert_eq!(env.winner(), Some(Player::Black));
    }

    #[test]
    fn a_lone_stone_after_double_pass_is_not_a_win() {
        // double-pass alone proves nothing without an unconditional-life
        // region backing it up.
        let mut env = KillAllGoEnvironment::new(5);
        env.white.set(0);

        env.apply(Action::Pass);
        env.apply(Action::Pass);

        assert_eq!(env.winner(), None);
    }

    #[test]
    fn two_eyes_make_a_group_benson_alive() {
        // a ring of white stones enclosing two single-point eyes at
        // opposite corners of the board: each eye is a liberty of the
        // ring and nothing else, so the ring survives Benson's closure.
        let mut env = KillAllGoEnvironment::new(5);
        for &pos in &[1, 5, 6, 7, 8, 9, 14, 19, 18, 23] {
            env.white.set(pos);
        }

        let alive = env.benson_alive_region(Player::White);
        for &pos in &[1, 5, 6, 7, 8, 9, 14, 19, 18, 23] {
            assert!(alive.test(pos));
        }
        assert!(!alive.test(0));
        assert!(!alive.test(24));
        assert_eq!(env.winner(), Some(Player::White));
    }

    #[test]
    fn a_single_eye_is_not_enough_for_life() {
        // one connected ring around one eye only: the opponent can still
        // fill the single remaining liberty and capture the whole group.
        let mut env = KillAllGoEnvironment::new(5);
        for &pos in &[6, 7, 8, 11, 13, 16, 17, 18] {
            env.white.set(pos);
        }

        assert!(env.benson_alive_region(Player::White).none());
        assert_eq!(env.winner(), None);
    }

    #[test]
    fn suicide_is_illegal() {
        let mut env = KillAllGoEnvironment::new(3);

        // fully surround position 4 (center) with white stones, black to
        // move into the center should be suicide.
        env.white.set(1);
        env.white.set(3);
        env.white.set(5);
        env.white.set(7);
        env.turn = Player::Black;

        assert!(!env.is_legal_play(4));
    }
}
