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

//! A chat-room style broker protocol client: a manager requests solver
//! jobs over a line-oriented TCP connection and a broker assigns them to
//! workers, relaying results back over the same connection. Distribution
//! itself (sockets, handshake, regex-matched inbound lines) lives here;
//! what a "job" contains is `solver_job`'s concern.

extern crate gs_core;
extern crate gs_env;
extern crate gs_mcts;
#[macro_use]
extern crate lazy_static;
extern crate log;
extern crate regex;

pub mod broker_adapter;
pub mod job_handler;
pub mod solver_job;

pub use self::broker_adapter::{BrokerAdapter, BrokerCallbacks, Job, JobId, JobState};
pub use self::job_handler::JobHandler;
pub use self::solver_job::SolverJob;
