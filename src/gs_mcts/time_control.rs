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

use std::time::{Duration, Instant};

use crate::tree::Tree;

pub enum TimeStrategyResult {
    NotExpired(usize),
    Expired,
}

/// Decides when a search should stop, independent of whether the root
/// has already been solved (that check is `Solver::is_search_done`'s
/// job). A manager or worker picks whichever strategy its mode needs.
pub trait TimeStrategy {
    fn try_extend(&self, tree: &Tree) -> TimeStrategyResult;
}

/// Stops once the root has accumulated `limit` simulations.
pub struct RolloutLimit {
    limit: usize,
}

impl RolloutLimit {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl TimeStrategy for RolloutLimit {
    fn try_extend(&self, tree: &Tree) -> TimeStrategyResult {
        let count = tree.get(tree.root()).visit_count as usize;
        if count >= self.limit {
            TimeStrategyResult::Expired
        } else {
            TimeStrategyResult::NotExpired(self.limit - count)
        }
    }
}

/// Stops once `budget` has elapsed since the strategy was created.
pub struct WallClock {
    start: Instant,
    budget: Duration,
}

impl WallClock {
    pub fn new(budget: Duration) -> Self {
        Self { start: Instant::now(), budget }
    }
}

impl TimeStrategy for WallClock {
    fn try_extend(&self, _tree: &Tree) -> TimeStrategyResult {
        let elapsed = self.start.elapsed();
        if elapsed >= self.budget {
            TimeStrategyResult::Expired
        } else {
            TimeStrategyResult::NotExpired((self.budget - elapsed).as_millis() as usize)
        }
    }
}

pub fn is_done(tree: &Tree, strategy: &dyn TimeStrategy) -> bool {
    if tree.get(tree.root()).visit_count == 0 {
        return false;
    }

    matches!(strategy.try_extend(tree), TimeStrategyResult::Expired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_env::Player;

    #[test]
    fn rollout_limit_expires_once_reached() {
        let mut tree = Tree::new(Player::Black, 1.4);
        tree.get_mut(tree.root()).visit_count = 5;

        let strategy = RolloutLimit::new(5);
        assert!(is_done(&tree, &strategy));
    }

    #[test]
    fn rollout_limit_not_expired_before_limit() {
        let mut tree = Tree::new(Player::Black, 1.4);
        tree.get_mut(tree.root()).visit_count = 1;

        let strategy = RolloutLimit::new(5);
        assert!(!is_done(&tree, &strategy));
    }

    #[test]
    fn zero_visits_never_done() {
        let tree = Tree::new(Player::Black, 1.4);
        let strategy = RolloutLimit::new(0);

        assert!(!is_done(&tree, &strategy));
    }
}
