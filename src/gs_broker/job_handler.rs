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

//! Bridges a manager's pending solver jobs to the broker connection:
//! tracks which `SolverJob` a broker `Job` id belongs to, and which
//! in-process owner (a node path waiting on a result) requested it.
//! Grounded in `job_handler.cpp`'s `JobHandler`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::broker_adapter::{BrokerAdapter, BrokerCallbacks, Job, JobId, JobState};
use crate::solver_job::SolverJob;

/// Identifies whoever is waiting on a job's result -- a node path index
/// in the manager's search tree in production, kept abstract here so
/// `JobHandler` does not need to depend on `gs_manager`.
pub type OwnerId = u64;

struct JobPackage {
    job: Arc<Mutex<Job>>,
    owner: OwnerId,
    solver_job: SolverJob,
}

#[derive(Default)]
struct JobTables {
    by_id: HashMap<JobId, JobPackage>,
    by_owner: HashMap<OwnerId, JobId>,
}

/// Routes completed jobs into a caller-supplied channel instead of the
/// C++ original's per-owner `JobResultDeque::pushJobResult`, since this
/// workspace has no shared base class to push onto -- the manager reads
/// completions back out with `take_completed`.
pub struct JobHandler {
    adapter: Arc<BrokerAdapter<Router>>,
    tables: Arc<Mutex<JobTables>>,
    completed: Arc<Mutex<Vec<(OwnerId, SolverJob)>>>,
    num_solvers: Arc<AtomicUsize>,
    num_loading: Arc<AtomicUsize>,
    commands: Arc<Mutex<VecDeque<String>>>,
}

/// The `BrokerCallbacks` implementation installed on the adapter; it
/// only needs `tables`/`completed`, not the whole `JobHandler`, to avoid
/// a reference cycle between the two.
pub struct Router {
    tables: Arc<Mutex<JobTables>>,
    completed: Arc<Mutex<Vec<(OwnerId, SolverJob)>>>,
    num_solvers: Arc<AtomicUsize>,
    num_loading: Arc<AtomicUsize>,
    commands: Arc<Mutex<VecDeque<String>>>,
}

impl BrokerCallbacks for Router {
    fn on_job_confirmed(&self, _job: &Job, accepted: bool) {
        if accepted {
            self.num_loading.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn on_state_changed(&self, _state: &str, loading: usize, capacity: usize, _details: &str) {
        self.num_loading.store(loading, Ordering::Release);
        self.num_solvers.store(capacity, Ordering::Release);
    }

    fn on_network_error(&self, _msg: &str) {
        self.num_solvers.store(0, Ordering::Release);
        self.num_loading.store(0, Ordering::Release);
    }

    /// Broadcast control commands (`load_model ...`, `quit`) arrive as a
    /// line from the broker that none of the job-protocol regexes match,
    /// landing here the same way `job_handler.cpp`'s `popCommand` queue
    /// is fed.
    fn handle_extended_message(&self, message: &str, _sender: &str) -> bool {
        if message.starts_with("load_model") || message.starts_with("quit") {
            self.commands.lock().expect("could not acquire lock").push_back(message.to_string());
            true
        } else {
            false
        }
    }

    fn on_job_completed(&self, job: &Job) -> bool {
        let id = match job.id() {
            Some(id) => id,
            None => return true,
        };

        match job.state() {
            JobState::Completed => {
                let mut tables = self.tables.lock().expect("could not acquire lock");
                let package = match tables.by_id.remove(&id) {
                    Some(package) => package,
                    None => return true,
                };
                tables.by_owner.remove(&package.owner);
                drop(tables);

                let mut solver_job = package.solver_job;
                if !solver_job.set_job_result(&job.output()) {
                    let mut tables = self.tables.lock().expect("could not acquire lock");
                    tables.by_owner.insert(package.owner, id);
                    tables.by_id.insert(id, JobPackage { job: package.job, owner: package.owner, solver_job });
                    return false;
                }

                self.completed.lock().expect("could not acquire lock").push((package.owner, solver_job));
                true
            }
            JobState::Terminated => {
                let mut tables = self.tables.lock().expect("could not acquire lock");
                if let Some(package) = tables.by_id.remove(&id) {
                    tables.by_owner.remove(&package.owner);
                }
                true
            }
            _ => true,
        }
    }
}

impl JobHandler {
    pub fn new(name: impl Into<String>, broker: impl Into<String>) -> Self {
        let tables = Arc::new(Mutex::new(JobTables::default()));
        let completed = Arc::new(Mutex::new(Vec::new()));
        let num_solvers = Arc::new(AtomicUsize::new(0));
        let num_loading = Arc::new(AtomicUsize::new(0));
        let commands = Arc::new(Mutex::new(VecDeque::new()));
        let router = Router {
            tables: Arc::clone(&tables),
            completed: Arc::clone(&completed),
            num_solvers: Arc::clone(&num_solvers),
            num_loading: Arc::clone(&num_loading),
            commands: Arc::clone(&commands),
        };
        let adapter = BrokerAdapter::new(name, broker, router);

        Self { adapter, tables, completed, num_solvers, num_loading, commands }
    }

    /// Sends a fire-and-forget message to the broker, e.g. the
    /// `solver solved_sgf ...`/`solver openings ...` annotations the
    /// manager emits after integrating job results.
    pub fn output_async(&self, command: &str) {
        self.adapter.output_async_pub(command);
    }

    /// Pops the next queued broadcast command (`load_model ...`, `quit`),
    /// if any, mirroring `JobHandler::popCommand`.
    pub fn pop_command(&self) -> Option<String> {
        self.commands.lock().expect("could not acquire lock").pop_front()
    }

    /// Queues a command as if it had arrived from the broker, for a
    /// brokerless CLI admin console (or a test) to drive the same
    /// `load_model`/`quit` path a real broker broadcast would.
    pub fn push_command(&self, command: impl Into<String>) {
        self.commands.lock().expect("could not acquire lock").push_back(command.into());
    }

    pub fn connect(&self, host: &str, port: u16) -> std::io::Result<()> {
        self.adapter.connect(host, port)
    }

    /// Requests a job for `solver_job` on behalf of `owner`, returning
    /// whether the broker accepted it (mirrors `addJob`'s bool result;
    /// `assert(false)` on rejection in the original becomes an `Err`
    /// here since a Rust worker/manager should recover, not abort).
    pub fn add_job(&self, owner: OwnerId, mut solver_job: SolverJob, timeout: Option<Duration>) -> Result<(), String> {
        let command = format!("solve \"{}\"", solver_job.job_string(false));
        let job = self.adapter.request_job(&command, timeout);

        let id = job.lock().expect("could not acquire lock").id();
        match id {
            Some(id) => {
                solver_job.job_id = Some(id);
                let mut tables = self.tables.lock().expect("could not acquire lock");
                tables.by_owner.insert(owner, id);
                tables.by_id.insert(id, JobPackage { job, owner, solver_job });
                Ok(())
            }
            None => Err("broker rejected job request".to_string()),
        }
    }

    pub fn remove_job(&self, owner: OwnerId) -> bool {
        let package = {
            let mut tables = self.tables.lock().expect("could not acquire lock");
            let id = match tables.by_owner.remove(&owner) {
                Some(id) => id,
                None => return false,
            };
            tables.by_id.remove(&id)
        };

        match package {
            Some(package) => {
                self.adapter.terminate_job(&package.job, Some(Duration::from_secs(5)));
                true
            }
            None => false,
        }
    }

    /// Drains every result that has arrived since the last call.
    pub fn take_completed(&self) -> Vec<(OwnerId, SolverJob)> {
        std::mem::take(&mut *self.completed.lock().expect("could not acquire lock"))
    }

    pub fn pending_count(&self) -> usize {
        self.tables.lock().expect("could not acquire lock").by_id.len()
    }

    /// Whether the broker has reported spare worker capacity, mirroring
    /// `JobHandler::hasIdleSolvers` -- a manager uses this to decide
    /// whether dispatching a leaf remotely is worth the round-trip versus
    /// evaluating it locally.
    pub fn has_idle_solvers(&self) -> bool {
        self.num_loading.load(Ordering::Acquire) < self.num_solvers.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_job_without_a_connection_reports_rejection() {
        let handler = JobHandler::new("client", "broker");
        let result = handler.add_job(1, SolverJob::new(";B[ab]".to_string(), 0.0), Some(Duration::from_millis(20)));
        assert!(result.is_err());
    }

    #[test]
    fn remove_job_for_unknown_owner_is_a_no_op() {
        let handler = JobHandler::new("client", "broker");
        assert!(!handler.remove_job(999));
    }

    #[test]
    fn idle_solvers_tracks_state_changed_and_confirmed_notifications() {
        let handler = JobHandler::new("client", "broker");
        assert!(!handler.has_idle_solvers());

        let router = Router {
            tables: Arc::clone(&handler.tables),
            completed: Arc::clone(&handler.completed),
            num_solvers: Arc::clone(&handler.num_solvers),
            num_loading: Arc::clone(&handler.num_loading),
            commands: Arc::clone(&handler.commands),
        };
        router.on_state_changed("idle", 0, 2, "");
        assert!(handler.has_idle_solvers());

        router.on_job_confirmed(&Job::new("noop".to_string()), true);
        router.on_job_confirmed(&Job::new("noop".to_string()), true);
        assert!(!handler.has_idle_solvers());
    }

    #[test]
    fn extended_messages_enqueue_known_broadcast_commands() {
        let handler = JobHandler::new("client", "broker");
        let router = Router {
            tables: Arc::clone(&handler.tables),
            completed: Arc::clone(&handler.completed),
            num_solvers: Arc::clone(&handler.num_solvers),
            num_loading: Arc::clone(&handler.num_loading),
            commands: Arc::clone(&handler.commands),
        };

        assert!(!router.handle_extended_message("unrelated chatter", "broker"));
        assert!(handler.pop_command().is_none());

        assert!(router.handle_extended_message("quit", "broker"));
        assert_eq!(handler.pop_command().as_deref(), Some("quit"));
    }
}
