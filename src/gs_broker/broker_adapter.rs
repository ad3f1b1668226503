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

use std::collections::{HashMap, VecDeque};
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use regex::Regex;

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobState {
    Unconfirmed,
    Confirmed,
    Assigned,
    Completed,
    Terminated,
}

/// A request in flight with the broker: starts `Unconfirmed`, becomes
/// `Confirmed` once the broker hands out an id, `Assigned` once a worker
/// picks it up, and finally `Completed` or `Terminated`.
#[derive(Debug, Clone)]
pub struct Job {
    id: Option<JobId>,
    state: JobState,
    command: String,
    code: i32,
    output: String,
}

impl Job {
    pub(crate) fn new(command: String) -> Self {
        Self { id: None, state: JobState::Unconfirmed, command, code: -1, output: String::new() }
    }

    pub fn id(&self) -> Option<JobId> {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    /// Decodes the `\n`/`\t`/`\\` escapes the wire protocol uses to keep a
    /// job's (possibly multi-line) output on a single line.
    pub fn output(&self) -> String {
        self.output.replace("\\n", "\n").replace("\\t", "\t").replace("\\\\", "\\")
    }
}

/// The hooks a broker client reacts to, each defaulting to the teacher's
/// "ignore unless you care" stance so a worker or manager only overrides
/// what it actually needs, mirroring `BrokerAdapter`'s protected virtuals.
pub trait BrokerCallbacks: Send + Sync {
    fn on_job_completed(&self, _job: &Job) -> bool {
        true
    }

    fn on_job_confirmed(&self, _job: &Job, _accepted: bool) {}

    fn on_job_assigned(&self, _job: &Job, _worker: &str) {}

    fn on_state_changed(&self, _state: &str, _loading: usize, _capacity: usize, _details: &str) {}

    fn on_capacity_changed(&self, _capacity: usize, _details: &str) {}

    fn on_network_error(&self, _msg: &str) {}

    fn handle_extended_message(&self, _message: &str, _sender: &str) -> bool {
        false
    }
}

lazy_static! {
    static ref RE_MESSAGE_FROM: Regex = Regex::new(r"^(\S+) >> (.+)$").unwrap();
    static ref RE_CONFIRM_REQUEST: Regex = Regex::new(r"^(accept|reject) request (\d+)? ?(\{(.+)\})?$").unwrap();
    static ref RE_RESPONSE: Regex = Regex::new(r"^response (\d+) (-?\d+) \{(.*)\}$").unwrap();
    static ref RE_NOTIFY_ASSIGN: Regex = Regex::new(r"^notify assign request (\d+) to (\S+)$").unwrap();
    static ref RE_NOTIFY_STATE: Regex = Regex::new(r"^notify state (idle|busy|full)(?: (\d+)/(\d+)(?: (.+))?)?$").unwrap();
    static ref RE_NOTIFY_CAPACITY: Regex = Regex::new(r"^notify capacity (\d+) ?(.*)$").unwrap();
    static ref RE_CONFIRM_TERMINATE: Regex = Regex::new(r"^(accept|confirm|reject) terminate (\d+)$").unwrap();
}

/// A line-oriented TCP client for the broker's chat-room protocol: a
/// `request` becomes `Confirmed` with an id, gets `notify assign`ed to a
/// worker, and eventually a `response` carries back a `Completed` or
/// `Terminated` result. Every inbound line is matched against the
/// protocol's fixed grammar with `regex`, the same tool the teacher
/// reaches for on its own config/command-line text (`dg_utils::config`).
pub struct BrokerAdapter<C> {
    name: Mutex<String>,
    broker: String,
    stream: Mutex<Option<TcpStream>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    unconfirmed: Mutex<VecDeque<Arc<Mutex<Job>>>>,
    accepted: Mutex<HashMap<JobId, Arc<Mutex<Job>>>>,
    wait_mutex: Mutex<()>,
    wait_cv: Condvar,
    callbacks: C,
}

impl<C: BrokerCallbacks + 'static> BrokerAdapter<C> {
    pub fn new(name: impl Into<String>, broker: impl Into<String>, callbacks: C) -> Arc<Self> {
        Arc::new(Self {
            name: Mutex::new(name.into()),
            broker: broker.into(),
            stream: Mutex::new(None),
            reader: Mutex::new(None),
            unconfirmed: Mutex::new(VecDeque::new()),
            accepted: Mutex::new(HashMap::new()),
            wait_mutex: Mutex::new(()),
            wait_cv: Condvar::new(),
            callbacks,
        })
    }

    pub fn connect(self: &Arc<Self>, host: &str, port: u16) -> io::Result<()> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true).ok();
        let reader_stream = stream.try_clone()?;
        *self.stream.lock().expect("could not acquire lock") = Some(stream);

        log::info!("connected to broker at {}:{}", host, port);
        self.output_async(&format!("name {}", self.name.lock().expect("could not acquire lock")), false);

        let this = Arc::clone(self);
        let handle = thread::spawn(move || this.read_loop(reader_stream));
        *self.reader.lock().expect("could not acquire lock") = Some(handle);
        Ok(())
    }

    pub fn disconnect(&self) {
        if let Some(stream) = self.stream.lock().expect("could not acquire lock").take() {
            stream.shutdown(std::net::Shutdown::Both).ok();
        }
        if let Some(handle) = self.reader.lock().expect("could not acquire lock").take() {
            handle.join().expect("could not join reader thread");
        }
        log::info!("disconnected from broker");
    }

    fn read_loop(self: Arc<Self>, stream: TcpStream) {
        for line in BufReader::new(stream).lines() {
            match line {
                Ok(input) => self.handle_input(&input),
                Err(err) => {
                    log::warn!("broker connection read error: {}", err);
                    self.callbacks.on_network_error(&format!("read error: {}", err));
                    break;
                }
            }
        }
    }

    /// Sends `command` to the broker, formatted the way the broker expects
    /// unsolicited client output: `request {command}`.
    pub fn request_job(self: &Arc<Self>, command: &str, timeout: Option<Duration>) -> Arc<Mutex<Job>> {
        let job = Arc::new(Mutex::new(Job::new(command.to_string())));
        self.unconfirmed.lock().expect("could not acquire lock").push_back(Arc::clone(&job));

        self.output_async(&format!("request {{{}}}", command), true);
        self.wait_job_until(&job, JobState::Confirmed, timeout);
        job
    }

    pub fn terminate_job(self: &Arc<Self>, job: &Arc<Mutex<Job>>, timeout: Option<Duration>) {
        let id = job.lock().expect("could not acquire lock").id;
        if let Some(id) = id {
            self.output_async(&format!("terminate {}", id), true);
            self.wait_job_until(job, JobState::Terminated, timeout);
        }
    }

    pub fn wait_job_until(&self, job: &Arc<Mutex<Job>>, state: JobState, timeout: Option<Duration>) {
        let guard = self.wait_mutex.lock().expect("could not acquire lock");
        let predicate = || job.lock().expect("could not acquire lock").state >= state;

        if predicate() {
            return;
        }

        match timeout {
            Some(timeout) => {
                let _guard = self.wait_cv.wait_timeout_while(guard, timeout, |_| !predicate());
            }
            None => {
                let _guard = self.wait_cv.wait_while(guard, |_| !predicate());
            }
        }
    }

    /// Sends a fire-and-forget message to the broker that is not a job
    /// request -- the manager's `solver solved_sgf ...`/`solver openings
    /// ...` annotations.
    pub fn output_async_pub(&self, command: &str) {
        self.output_async(command, true);
    }

    fn output_async(&self, command: &str, to_broker: bool) {
        let mut line = String::with_capacity(command.len() + self.broker.len() + 8);
        if to_broker {
            line.push_str(&self.broker);
            line.push_str(" << ");
        }
        line.push_str(command);
        line.push('\n');

        if let Some(stream) = self.stream.lock().expect("could not acquire lock").as_mut() {
            if let Err(err) = stream.write_all(line.as_bytes()) {
                self.callbacks.on_network_error(&format!("write error: {}, {}", err, command));
            }
        }
    }

    fn notify_all_waits(&self) {
        let _guard = self.wait_mutex.lock().expect("could not acquire lock");
        self.wait_cv.notify_all();
    }

    fn handle_input(&self, input: &str) {
        let from = match RE_MESSAGE_FROM.captures(input) {
            Some(captures) => captures,
            None => return,
        };

        let sender = &from[1];
        let message = &from[2];

        if sender != self.broker {
            self.callbacks.handle_extended_message(message, sender);
            return;
        }

        if let Some(captures) = RE_CONFIRM_REQUEST.captures(message) {
            self.handle_confirm_request(&captures);
        } else if let Some(captures) = RE_RESPONSE.captures(message) {
            self.handle_response(&captures);
        } else if let Some(captures) = RE_NOTIFY_ASSIGN.captures(message) {
            self.handle_notify_assign(&captures);
        } else if let Some(captures) = RE_NOTIFY_STATE.captures(message) {
            let loading = captures.get(2).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
            let capacity = captures.get(3).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
            let details = captures.get(4).map(|m| m.as_str()).unwrap_or("");
            self.callbacks.on_state_changed(&captures[1], loading, capacity, details);
        } else if let Some(captures) = RE_NOTIFY_CAPACITY.captures(message) {
            let capacity = captures[1].parse().unwrap_or(0);
            self.callbacks.on_capacity_changed(capacity, &captures[2]);
        } else if let Some(captures) = RE_CONFIRM_TERMINATE.captures(message) {
            self.handle_confirm_terminate(&captures);
        } else {
            self.callbacks.handle_extended_message(message, sender);
        }
    }

    fn handle_confirm_request(&self, captures: &regex::Captures<'_>) {
        let accepted = &captures[1] == "accept";
        let id: Option<JobId> = captures.get(2).and_then(|m| m.as_str().parse().ok());
        let command = captures.get(4).map(|m| m.as_str().to_string()).unwrap_or_default();

        let mut unconfirmed = self.unconfirmed.lock().expect("could not acquire lock");
        let position = if !command.is_empty() {
            unconfirmed.iter().position(|job| {
                let job = job.lock().expect("could not acquire lock");
                job.command == command && job.id.is_none()
            })
        } else if let Some(id) = id {
            unconfirmed.iter().position(|job| job.lock().expect("could not acquire lock").id == Some(id))
        } else {
            None
        };

        let job = position.map(|index| unconfirmed.remove(index).unwrap());
        drop(unconfirmed);

        if let Some(job) = job {
            {
                let mut guard = job.lock().expect("could not acquire lock");
                guard.id = id;
                guard.state = JobState::Confirmed;
            }
            if accepted {
                if let Some(id) = id {
                    self.accepted.lock().expect("could not acquire lock").insert(id, Arc::clone(&job));
                }
            }
            self.callbacks.on_job_confirmed(&job.lock().expect("could not acquire lock"), accepted);
            self.notify_all_waits();
        }
    }

    fn handle_response(&self, captures: &regex::Captures<'_>) {
        let id: JobId = match captures[1].parse() {
            Ok(id) => id,
            Err(_) => return,
        };
        let code = &captures[2];
        let output = &captures[3];

        let job = self.accepted.lock().expect("could not acquire lock").remove(&id);
        let job = match job {
            Some(job) => job,
            None => return,
        };

        let accept = {
            let mut guard = job.lock().expect("could not acquire lock");
            match code.parse::<i32>() {
                Ok(code) => {
                    guard.code = code;
                    guard.output = output.to_string();
                    guard.state = JobState::Completed;
                }
                Err(_) => {
                    guard.code = -1;
                    guard.output = code.to_string();
                    guard.state = JobState::Terminated;
                }
            }
            drop(guard);
            self.callbacks.on_job_completed(&job.lock().expect("could not acquire lock"))
        };

        if !accept {
            let mut guard = job.lock().expect("could not acquire lock");
            guard.state = JobState::Unconfirmed;
            drop(guard);
            self.unconfirmed.lock().expect("could not acquire lock").push_back(job);
        }

        self.output_async(&format!("{} response {}", if accept { "accept" } else { "reject" }, id), true);
        self.notify_all_waits();
    }

    fn handle_notify_assign(&self, captures: &regex::Captures<'_>) {
        let id: JobId = match captures[1].parse() {
            Ok(id) => id,
            Err(_) => return,
        };
        let worker = &captures[2];

        if let Some(job) = self.accepted.lock().expect("could not acquire lock").get(&id) {
            {
                let mut guard = job.lock().expect("could not acquire lock");
                guard.output = worker.to_string();
                guard.state = JobState::Assigned;
            }
            self.callbacks.on_job_assigned(&job.lock().expect("could not acquire lock"), worker);
            self.notify_all_waits();
        }
    }

    fn handle_confirm_terminate(&self, captures: &regex::Captures<'_>) {
        let accepted = &captures[1] != "reject";
        let id: Option<JobId> = if accepted { captures[2].parse().ok() } else { None };

        let job = id.and_then(|id| self.accepted.lock().expect("could not acquire lock").remove(&id));
        if let Some(job) = job {
            {
                let mut guard = job.lock().expect("could not acquire lock");
                guard.code = -1;
                guard.output = "terminate".to_string();
                guard.state = JobState::Terminated;
            }
            self.callbacks.on_job_completed(&job.lock().expect("could not acquire lock"));
            self.notify_all_waits();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    struct RecordingCallbacks {
        completed: Mutex<Vec<String>>,
    }

    impl BrokerCallbacks for RecordingCallbacks {
        fn on_job_completed(&self, job: &Job) -> bool {
            self.completed.lock().unwrap().push(job.output());
            true
        }
    }

    #[test]
    fn job_output_decodes_escape_sequences() {
        let job = Job { id: Some(1), state: JobState::Completed, command: "solve".into(), code: 0, output: "a\\nb\\tc".into() };
        assert_eq!(job.output(), "a\nb\tc");
    }

    #[test]
    fn confirm_request_assigns_id_and_moves_to_accepted() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 256];
            let _ = socket.read(&mut buf);
            socket.write_all(b"broker >> accept request 42 {solve board}\n").unwrap();
            thread::sleep(Duration::from_millis(50));
        });

        let adapter = BrokerAdapter::new("client-1", "broker", RecordingCallbacks { completed: Mutex::new(Vec::new()) });
        adapter.connect(&addr.ip().to_string(), addr.port()).unwrap();

        let job = adapter.request_job("solve board", Some(Duration::from_millis(500)));
        assert_eq!(job.lock().unwrap().id(), Some(42));
        assert_eq!(job.lock().unwrap().state(), JobState::Confirmed);
        assert!(adapter.accepted.lock().unwrap().contains_key(&42));

        adapter.disconnect();
        server.join().unwrap();
    }
}
