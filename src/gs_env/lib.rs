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

extern crate gs_core;
#[macro_use] extern crate lazy_static;

pub mod action;
pub mod environment;
pub mod hex;
pub mod killallgo;
pub mod player;
pub mod sgf;

pub use self::action::Action;
pub use self::environment::Environment;
pub use self::player::Player;
