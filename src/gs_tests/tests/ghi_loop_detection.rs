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

//! `findGHI` scans the whole hash-key history for a position a candidate
//! move would recur, not just the nodes tracked by the current tree path
//! -- this plays a real game on a 5x5 board until White's lone opening
//! stone is surrounded and captured, then shows that retaking the
//! surrounded point reconstructs that exact opening position.

extern crate gs_env;
extern crate gs_mcts;

use gs_env::killallgo::KillAllGoEnvironment;
use gs_env::{Action, Environment, Player};
use gs_mcts::knowledge::{KillAllGoKnowledgeHandler, KnowledgeHandler};
use gs_mcts::tree::Tree;

/// White claims the corner at 0, Black fills every other point on the
/// board around it one at a time (White passing throughout), capturing
/// White's lone stone the moment both of its liberties close. The board
/// is left with Black occupying every point but the corner, so replaying
/// White into that corner recaptures the whole Black mass in one move
/// and reconstructs the exact position recorded right after move one.
fn surrounded_corner_recapture() -> KillAllGoEnvironment {
    let mut env = KillAllGoEnvironment::new(5);
    env.apply(Action::Play(0)); // white claims the corner

    for pos in 1..24 {
        env.apply(Action::Play(pos)); // black
        env.apply(Action::Pass); // white
    }
    env.apply(Action::Play(24)); // black's final fill, leaving it white's turn

    env
}

#[test]
fn find_ghi_marks_the_path_when_a_candidate_move_recurs_far_back_in_history() {
    let env = surrounded_corner_recapture();
    assert_eq!(env.turn(), Player::White);
    assert!(env.stones(Player::White).none());
    for pos in 1..25 {
        assert!(env.stones(Player::Black).test(pos));
    }

    // the candidate move findGHI will find is White retaking the corner,
    // which recaptures every Black stone at once and reproduces the hash
    // recorded right after White's very first move.
    let recapture_hash = env.hash_key_after_play(0, Player::White).expect("retaking the corner is not suicide");
    assert_eq!(env.hash_key_history()[0], recapture_hash);

    // the tree only tracks the last couple of plies leading to this leaf;
    // the matching position lies far above node_path's own root, so the
    // loop must be reported through `Tree::add_ghi_node`'s negative
    // offset rather than by marking an ancestor directly.
    let mut tree = Tree::new(Player::Black, 1.4);
    tree.expand(tree.root(), Player::Black, &[(Action::Pass, 1.0)]);
    let mid = tree.get(tree.root()).children[0];
    tree.expand(mid, Player::Black, &[(Action::Pass, 1.0)]);
    let leaf = tree.get(mid).children[0];
    let node_path = vec![tree.root(), mid, leaf];

    let handler = KillAllGoKnowledgeHandler;
    handler.find_ghi(&env, &node_path, &mut tree);

    for &node in &node_path {
        assert!(tree.get(node).ghi, "node {} should be marked ghi", node);
        assert!(tree.get(node).in_loop, "node {} should be marked in_loop", node);
    }

    let history_len = env.hash_key_history().len() as i64;
    let expected_offset = 1 - (history_len + 1 - node_path.len() as i64);
    assert!(expected_offset < 0, "the match must land above node_path's own root");
    assert_eq!(tree.ghi_node_offset(leaf), Some(expected_offset as i32));
}

#[test]
fn find_ghi_is_a_no_op_without_a_recurring_candidate() {
    let mut env = KillAllGoEnvironment::new(5);
    env.apply(Action::Play(12));
    env.apply(Action::Play(6));

    let mut tree = Tree::new(Player::Black, 1.4);
    tree.expand(tree.root(), Player::Black, &[(Action::Pass, 1.0)]);
    let leaf = tree.get(tree.root()).children[0];
    let node_path = vec![tree.root(), leaf];

    let handler = KillAllGoKnowledgeHandler;
    handler.find_ghi(&env, &node_path, &mut tree);

    for &node in &node_path {
        assert!(!tree.get(node).ghi);
        assert!(!tree.get(node).in_loop);
    }
    assert_eq!(tree.ghi_node_offset(leaf), None);
}
