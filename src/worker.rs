//! Background execution of requests
//!
//! Front ends describe what they want as a [`Request`] and hand it to an
//! [`ActionHandler`]. The TUI runs the handler on a [`Worker`] thread so the
//! event loop never blocks on `wsl.exe`; the CLI calls the handler directly.
//!
//! One request at a time: `submit` refuses while a request is in flight, and
//! every accepted request produces exactly one [`Response`].

use std::io;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::core::{DistroManager, Outcome};
use crate::error::{Result, WslError};
use crate::types::*;
use crate::wsl::WslRunner;

/// Work a front end can ask for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    RefreshInstalled,
    RefreshAvailable,
    Delete { name: String },
    Rename { from: String, to: String },
    Install { name: String, custom_name: Option<String> },
}

impl Request {
    /// Short present-tense description for status lines
    pub fn describe(&self) -> String {
        match self {
            Self::RefreshInstalled => "Loading installed distributions".to_string(),
            Self::RefreshAvailable => "Loading online catalog".to_string(),
            Self::Delete { name } => format!("Deleting '{name}'"),
            Self::Rename { from, to } => format!("Renaming '{from}' to '{to}'"),
            Self::Install {
                name,
                custom_name: Some(custom),
            } => format!("Installing '{name}' as '{custom}'"),
            Self::Install { name, .. } => format!("Installing '{name}'"),
        }
    }

    /// Whether this changes the machine (as opposed to reading a listing)
    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, Self::RefreshInstalled | Self::RefreshAvailable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Installed(Snapshot<Distribution>),
    Available(Snapshot<AvailableDistribution>),
    Completed(Outcome),
}

impl Reply {
    pub fn summary(&self) -> String {
        match self {
            Self::Installed(s) => with_skipped(format!("{} installed distribution(s)", s.len()), s.skipped_rows()),
            Self::Available(s) => with_skipped(format!("{} distribution(s) available", s.len()), s.skipped_rows()),
            Self::Completed(outcome) => outcome.message(),
        }
    }
}

fn with_skipped(text: String, skipped: usize) -> String {
    if skipped == 0 {
        text
    } else {
        format!("{text} ({skipped} unreadable row(s) skipped)")
    }
}

#[derive(Debug)]
pub struct Response {
    pub id: u64,
    pub request: Request,
    pub result: Result<Reply>,
}

/// Executes requests; implemented by [`DistroManager`] and by test doubles
pub trait ActionHandler: Send + 'static {
    fn handle(&self, request: &Request) -> Result<Reply>;
}

impl<R: WslRunner + 'static> ActionHandler for DistroManager<R> {
    fn handle(&self, request: &Request) -> Result<Reply> {
        match request {
            Request::RefreshInstalled => self.installed().map(Reply::Installed),
            Request::RefreshAvailable => self.available().map(Reply::Available),
            Request::Delete { name } => self.delete(name).map(Reply::Completed),
            Request::Rename { from, to } => self.rename(from, to).map(Reply::Completed),
            Request::Install { name, custom_name } => self
                .install(name, custom_name.as_deref())
                .map(Reply::Completed),
        }
    }
}

/// Idle -> Running -> Succeeded | Failed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActionStatus {
    #[default]
    Idle,
    Running(String),
    Succeeded(String),
    Failed(String),
}

impl ActionStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running(_))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("busy: {0}")]
    Busy(String),
    #[error("the background worker has stopped")]
    Disconnected,
}

pub struct Worker {
    requests: Option<Sender<(u64, Request)>>,
    responses: Receiver<Response>,
    handle: Option<JoinHandle<()>>,
    next_id: u64,
    in_flight: Option<u64>,
    status: ActionStatus,
}

impl Worker {
    pub fn spawn<H: ActionHandler>(handler: H) -> io::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<(u64, Request)>();
        let (response_tx, response_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("wslm-worker".into())
            .spawn(move || {
                for (id, request) in request_rx {
                    debug!(id, ?request, "handling request");
                    let result = handler.handle(&request);
                    if let Err(e) = &result {
                        error!(id, error = %e, "request failed");
                    }
                    if response_tx.send(Response { id, request, result }).is_err() {
                        break;
                    }
                }
                debug!("worker exiting");
            })?;

        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            handle: Some(handle),
            next_id: 0,
            in_flight: None,
            status: ActionStatus::Idle,
        })
    }

    /// Queue a request. Refused while another is in flight.
    pub fn submit(&mut self, request: Request) -> std::result::Result<u64, WorkerError> {
        if let ActionStatus::Running(what) = &self.status {
            return Err(WorkerError::Busy(what.clone()));
        }
        let sender = self.requests.as_ref().ok_or(WorkerError::Disconnected)?;

        self.next_id += 1;
        let id = self.next_id;
        let description = request.describe();
        sender
            .send((id, request))
            .map_err(|_| WorkerError::Disconnected)?;

        info!(id, "{description}");
        self.in_flight = Some(id);
        self.status = ActionStatus::Running(description);
        Ok(id)
    }

    /// Non-blocking check for the in-flight response
    pub fn poll(&mut self) -> std::result::Result<Option<Response>, WorkerError> {
        match self.responses.try_recv() {
            Ok(response) => Ok(Some(self.finish(response))),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.disconnected()),
        }
    }

    /// Block until the in-flight response arrives
    pub fn wait(&mut self) -> std::result::Result<Response, WorkerError> {
        match self.responses.recv() {
            Ok(response) => Ok(self.finish(response)),
            Err(_) => Err(self.disconnected()),
        }
    }

    pub fn status(&self) -> &ActionStatus {
        &self.status
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Return a finished status to Idle
    pub fn clear_status(&mut self) {
        if !self.status.is_running() {
            self.status = ActionStatus::Idle;
        }
    }

    fn finish(&mut self, response: Response) -> Response {
        if self.in_flight == Some(response.id) {
            self.in_flight = None;
        }
        self.status = match &response.result {
            Ok(reply) => ActionStatus::Succeeded(reply.summary()),
            Err(e) => ActionStatus::Failed(e.to_string()),
        };
        response
    }

    fn disconnected(&mut self) -> WorkerError {
        if self.in_flight.take().is_some() {
            self.status = ActionStatus::Failed(WorkerError::Disconnected.to_string());
        }
        WorkerError::Disconnected
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once the current request is done
        drop(self.requests.take());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("worker thread panicked");
        }
    }
}

/// Whether an error left the machine in a state the user must check by hand
pub fn needs_attention(error: &WslError) -> bool {
    matches!(
        error,
        WslError::PartialLifecycleFailure(_) | WslError::NotConfirmed { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Echo;

    impl ActionHandler for Echo {
        fn handle(&self, request: &Request) -> Result<Reply> {
            match request {
                Request::Delete { name } => Err(WslError::NotFound(name.clone())),
                _ => Ok(Reply::Installed(Snapshot::default())),
            }
        }
    }

    /// Blocks each request until the test releases it
    struct Gated(Mutex<Receiver<()>>);

    impl ActionHandler for Gated {
        fn handle(&self, _request: &Request) -> Result<Reply> {
            self.0.lock().unwrap().recv().unwrap();
            Ok(Reply::Available(Snapshot::default()))
        }
    }

    #[test]
    fn one_response_per_request() {
        let mut worker = Worker::spawn(Echo).unwrap();
        let id = worker.submit(Request::RefreshInstalled).unwrap();
        let response = worker.wait().unwrap();
        assert_eq!(response.id, id);
        assert_eq!(response.request, Request::RefreshInstalled);
        assert!(!worker.is_busy());
        assert_eq!(
            worker.status(),
            &ActionStatus::Succeeded("0 installed distribution(s)".to_string())
        );
        assert!(worker.poll().unwrap().is_none());
    }

    #[test]
    fn failures_are_reported_not_swallowed() {
        let mut worker = Worker::spawn(Echo).unwrap();
        worker
            .submit(Request::Delete {
                name: "Arch".to_string(),
            })
            .unwrap();
        let response = worker.wait().unwrap();
        assert!(matches!(response.result, Err(WslError::NotFound(_))));
        assert_eq!(
            worker.status(),
            &ActionStatus::Failed("distribution 'Arch' is not installed".to_string())
        );
        worker.clear_status();
        assert_eq!(worker.status(), &ActionStatus::Idle);
    }

    #[test]
    fn second_submission_while_running_is_refused() {
        let (release, gate) = mpsc::channel();
        let mut worker = Worker::spawn(Gated(Mutex::new(gate))).unwrap();

        worker.submit(Request::RefreshAvailable).unwrap();
        assert_eq!(
            worker.submit(Request::RefreshInstalled),
            Err(WorkerError::Busy("Loading online catalog".to_string()))
        );

        thread::sleep(Duration::from_millis(10));
        assert!(worker.poll().unwrap().is_none());

        release.send(()).unwrap();
        worker.wait().unwrap();
        assert!(worker.submit(Request::RefreshInstalled).is_ok());
        release.send(()).unwrap();
        worker.wait().unwrap();
    }

    #[test]
    fn descriptions_name_the_targets() {
        let request = Request::Install {
            name: "Ubuntu".to_string(),
            custom_name: Some("Work".to_string()),
        };
        assert_eq!(request.describe(), "Installing 'Ubuntu' as 'Work'");
        assert!(request.is_lifecycle());
        assert!(!Request::RefreshInstalled.is_lifecycle());
    }
}
