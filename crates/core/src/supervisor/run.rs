//! The task that owns one worker process from spawn to reap.

use crate::decoder::{BufferedDecoder, BufferedOutput, DecodedLine, LineDecoder, Utf8ChunkDecoder};
use crate::daemon::DaemonReadiness;
use crate::events::Subscriber;
use crate::state::{OperationRegistry, SharedHandle};
use crate::supervisor::exit::{
    capture_tail, category_for_exit_code, exit_message, STDERR_TAIL_BYTES,
};
use crate::workers::{OutputProtocol, TimeoutPolicy};
use ace_protocol::ipc::{FailureCategory, OperationOutcome, OperationValue, WarningLevel};
use ace_protocol::progress_models::FrameTerminal;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

const READ_BUF_BYTES: usize = 8 * 1024;

/// How long to wait for a killed worker to be reaped.
const KILL_WAIT: Duration = Duration::from_secs(5);

/// How long to wait for stderr to close after the worker is gone.
const STDERR_DRAIN: Duration = Duration::from_millis(500);

/// Which deadline the timer is currently armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deadline {
    Primary,
    Grace,
    Final,
}

/// Why supervision stopped.
#[derive(Debug)]
enum Ending {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
    Lost(std::io::Error),
}

/// Decoder state for the worker's output protocol.
enum Output {
    Raw {
        decoder: Utf8ChunkDecoder,
        text: String,
    },
    Lines(LineDecoder),
    Buffered(BufferedDecoder),
}

impl Output {
    fn new(protocol: OutputProtocol, line_max_bytes: usize) -> Self {
        match protocol {
            OutputProtocol::Raw => Output::Raw {
                decoder: Utf8ChunkDecoder::new(),
                text: String::new(),
            },
            OutputProtocol::LineDelimited => {
                Output::Lines(LineDecoder::with_line_max(line_max_bytes))
            }
            OutputProtocol::Buffered => Output::Buffered(BufferedDecoder::new()),
        }
    }
}

/// Everything the supervising task takes ownership of.
pub(crate) struct OperationTask {
    pub(crate) child: Child,
    pub(crate) handle: SharedHandle,
    pub(crate) subscriber: Subscriber,
    pub(crate) protocol: OutputProtocol,
    pub(crate) line_max_bytes: usize,
    pub(crate) policy: TimeoutPolicy,
    pub(crate) cancel: oneshot::Receiver<()>,
    pub(crate) registry: OperationRegistry,
    /// Set for daemon-backed workers.
    pub(crate) daemon: Option<DaemonReadiness>,
}

impl OperationTask {
    /// Supervise the worker until it has exited or been killed and reaped,
    /// resolve the operation, then drop it from the registry.
    pub(crate) async fn run(self) {
        let OperationTask {
            mut child,
            handle,
            subscriber,
            protocol,
            line_max_bytes,
            policy,
            cancel,
            registry,
            daemon,
        } = self;

        let id = subscriber.operation_id();
        let mut sink = Sink {
            id,
            handle,
            subscriber,
            output: Output::new(protocol, line_max_bytes),
            saw_output: false,
            frames_closed: false,
            daemon,
        };
        sink.subscriber.started();

        let stdout = child.stdout.take();
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(capture_tail(stderr, STDERR_TAIL_BYTES)));

        let ending = supervise(&mut child, stdout, cancel, &policy, &mut sink).await;
        let stderr_tail = collect_stderr(stderr_task).await;
        if !stderr_tail.trim().is_empty() {
            debug!(operation_id = %id, stderr = %stderr_tail, "Worker stderr");
        }

        sink.finish(ending, &stderr_tail, &policy).await;
        registry.remove(id).await;
        debug!(operation_id = %id, "Operation released");

        // Hand over whatever the reader has not taken yet
        sink.subscriber.deliver_all().await;
    }
}

async fn supervise(
    child: &mut Child,
    stdout: Option<ChildStdout>,
    mut cancel: oneshot::Receiver<()>,
    policy: &TimeoutPolicy,
    sink: &mut Sink,
) -> Ending {
    let id = sink.id;
    let started = Instant::now();
    let mut stdout = stdout;
    let mut buf = vec![0u8; READ_BUF_BYTES];
    let mut phase = Deadline::Primary;
    let mut cancel_armed = true;

    let sleep = tokio::time::sleep_until(started + policy.primary);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            // Reading pauses while the consumer is behind, so the worker
            // blocks on its pipe instead of the events piling up here
            read = read_chunk(&mut stdout, &mut buf),
                if stdout.is_some() && !sink.subscriber.is_backlogged() =>
            {
                match read {
                    Ok(0) => {
                        stdout = None;
                        sink.flush().await;
                    }
                    Ok(n) => sink.feed(&buf[..n]).await,
                    Err(e) => {
                        warn!(operation_id = %id, error = %e, "Failed to read worker output");
                        stdout = None;
                        sink.flush().await;
                    }
                }
            }
            _ = sink.subscriber.deliver(), if sink.subscriber.has_pending() => {}
            status = child.wait(), if stdout.is_none() => {
                return match status {
                    Ok(status) => Ending::Exited(status),
                    Err(e) => Ending::Lost(e),
                };
            }
            _ = &mut sleep => {
                match (phase, policy.grace) {
                    (Deadline::Primary, Some(grace)) => {
                        warn!(operation_id = %id, "Primary deadline reached, grace period started");
                        sink.subscriber
                            .warning(
                                WarningLevel::DeadlineReached,
                                format!(
                                    "Still running after {}s; allowing up to {}s more",
                                    policy.primary.as_secs(),
                                    grace.extension.as_secs()
                                ),
                            );
                        phase = Deadline::Grace;
                        sleep
                            .as_mut()
                            .reset(started + policy.primary + grace.extension - grace.final_window);
                    }
                    (Deadline::Grace, Some(grace)) => {
                        warn!(operation_id = %id, "Grace period nearly spent");
                        sink.subscriber
                            .warning(
                                WarningLevel::FinalWarning,
                                format!(
                                    "Will be stopped in {}s if it does not finish",
                                    grace.final_window.as_secs()
                                ),
                            );
                        phase = Deadline::Final;
                        sleep.as_mut().reset(started + policy.hard_limit());
                    }
                    _ => {
                        warn!(
                            operation_id = %id,
                            after_secs = policy.hard_limit().as_secs(),
                            "Deadline exceeded, terminating worker"
                        );
                        terminate(child, id).await;
                        return Ending::TimedOut;
                    }
                }
            }
            res = &mut cancel, if cancel_armed => {
                cancel_armed = false;
                if res.is_ok() {
                    info!(operation_id = %id, "Cancellation requested, terminating worker");
                    terminate(child, id).await;
                    return Ending::Cancelled;
                }
            }
        }
    }
}

async fn read_chunk(stdout: &mut Option<ChildStdout>, buf: &mut [u8]) -> std::io::Result<usize> {
    match stdout {
        Some(out) => out.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Kill the worker and reap it.
async fn terminate(child: &mut Child, id: Uuid) {
    if let Err(e) = child.start_kill() {
        debug!(operation_id = %id, error = %e, "Worker already gone");
    }

    match timeout(KILL_WAIT, child.wait()).await {
        Ok(Ok(status)) => debug!(operation_id = %id, ?status, "Killed worker reaped"),
        Ok(Err(e)) => warn!(operation_id = %id, error = %e, "Failed to reap killed worker"),
        Err(_) => warn!(operation_id = %id, "Killed worker did not exit in time"),
    }
}

async fn collect_stderr(task: Option<JoinHandle<String>>) -> String {
    let Some(mut task) = task else {
        return String::new();
    };

    match timeout(STDERR_DRAIN, &mut task).await {
        Ok(Ok(tail)) => tail,
        Ok(Err(_)) => String::new(),
        Err(_) => {
            // A grandchild still holds the pipe open
            task.abort();
            String::new()
        }
    }
}

/// Turns worker output into events and settles the operation.
struct Sink {
    id: Uuid,
    handle: SharedHandle,
    subscriber: Subscriber,
    output: Output,
    saw_output: bool,
    /// A terminal frame was seen; later frames are ignored.
    frames_closed: bool,
    daemon: Option<DaemonReadiness>,
}

impl Sink {
    async fn feed(&mut self, bytes: &[u8]) {
        if !self.saw_output {
            self.saw_output = true;
            if self.handle.lock().await.mark_streaming() {
                debug!(operation_id = %self.id, "First worker output");
            }
        }

        match &mut self.output {
            Output::Raw { decoder, text } => {
                if let Some(chunk) = decoder.push(bytes) {
                    text.push_str(&chunk);
                    self.subscriber.chunk(chunk);
                }
            }
            Output::Lines(decoder) => {
                let lines = decoder.push(bytes);
                for line in lines {
                    self.on_line(line).await;
                }
            }
            Output::Buffered(decoder) => decoder.push(bytes),
        }
    }

    /// Stdout closed: emit whatever the decoder was holding back.
    async fn flush(&mut self) {
        match &mut self.output {
            Output::Raw { decoder, text } => {
                if let Some(chunk) = decoder.finish() {
                    text.push_str(&chunk);
                    self.subscriber.chunk(chunk);
                }
            }
            Output::Lines(decoder) => {
                if let Some(line) = decoder.finish() {
                    self.on_line(line).await;
                }
            }
            Output::Buffered(_) => {}
        }
    }

    async fn on_line(&mut self, line: DecodedLine) {
        if self.frames_closed {
            return;
        }

        match line {
            DecodedLine::Malformed(frame) => {
                warn!(operation_id = %self.id, status = %frame.status, "Malformed progress line");
                self.subscriber.progress(frame, true);
            }
            DecodedLine::Frame(frame) => {
                let terminal = frame.terminal();
                self.subscriber.progress(frame.clone(), false);

                match terminal {
                    Some(FrameTerminal::Success) => {
                        self.frames_closed = true;
                        self.settle(OperationOutcome::Succeeded {
                            value: OperationValue::Frame(frame),
                        })
                        .await;
                    }
                    Some(FrameTerminal::Failure) => {
                        self.frames_closed = true;
                        let message = if frame.status.is_empty() {
                            "Worker reported an error".to_string()
                        } else {
                            frame.status
                        };
                        self.settle(OperationOutcome::failed(
                            FailureCategory::OperationFailed,
                            message,
                        ))
                        .await;
                    }
                    None => {}
                }
            }
        }
    }

    /// Resolve the operation unless it already is.
    async fn settle(&mut self, outcome: OperationOutcome) -> bool {
        if !self.handle.lock().await.resolve(&outcome) {
            return false;
        }

        match &outcome {
            OperationOutcome::Succeeded { .. } => {
                info!(operation_id = %self.id, "Operation succeeded");
            }
            OperationOutcome::Failed { category, message } => {
                warn!(operation_id = %self.id, ?category, %message, "Operation failed");
            }
            OperationOutcome::TimedOut { after_secs } => {
                warn!(operation_id = %self.id, after_secs, "Operation timed out");
            }
        }
        if outcome.failure_category() == Some(FailureCategory::NetworkFailure) {
            if let Some(daemon) = &self.daemon {
                warn!(operation_id = %self.id, "Worker could not reach the daemon");
                daemon.invalidate();
            }
        }
        self.subscriber.resolve(outcome)
    }

    async fn finish(&mut self, ending: Ending, stderr_tail: &str, policy: &TimeoutPolicy) {
        match ending {
            Ending::TimedOut => {
                self.settle(OperationOutcome::TimedOut {
                    after_secs: policy.hard_limit().as_secs(),
                })
                .await;
            }
            Ending::Cancelled => {
                self.settle(OperationOutcome::failed(
                    FailureCategory::Cancelled,
                    "Cancelled by request",
                ))
                .await;
            }
            Ending::Lost(e) => {
                self.settle(OperationOutcome::failed(
                    FailureCategory::OperationFailed,
                    format!("Lost track of the worker: {e}"),
                ))
                .await;
            }
            Ending::Exited(status) => {
                info!(operation_id = %self.id, exit_code = ?status.code(), "Worker exited");
                if self.subscriber.is_resolved() {
                    if !status.success() {
                        warn!(
                            operation_id = %self.id,
                            exit_code = ?status.code(),
                            "Worker exited with an error after reporting a terminal frame"
                        );
                    }
                    return;
                }
                let outcome = self.exit_outcome(status, stderr_tail);
                self.settle(outcome).await;
            }
        }
    }

    fn exit_outcome(&mut self, status: ExitStatus, stderr_tail: &str) -> OperationOutcome {
        let exit_failure = || {
            OperationOutcome::failed(
                category_for_exit_code(status.code()),
                exit_message(&status, stderr_tail),
            )
        };

        match &mut self.output {
            Output::Raw { text, .. } => {
                if status.success() {
                    OperationOutcome::Succeeded {
                        value: OperationValue::Text(std::mem::take(text)),
                    }
                } else {
                    exit_failure()
                }
            }
            Output::Lines(decoder) => {
                if !status.success() {
                    exit_failure()
                } else if decoder.frames() == 0 && decoder.malformed() > 0 {
                    OperationOutcome::failed(
                        FailureCategory::Decode,
                        "Worker output contained no readable progress frames",
                    )
                } else {
                    OperationOutcome::failed(
                        FailureCategory::ProtocolViolation,
                        "Worker exited without reporting completion",
                    )
                }
            }
            Output::Buffered(decoder) => match std::mem::take(decoder).finish() {
                BufferedOutput::Value(value) if status.success() => OperationOutcome::Succeeded {
                    value: OperationValue::Json(value),
                },
                BufferedOutput::Failure(message) => {
                    let category = if status.success() {
                        FailureCategory::OperationFailed
                    } else {
                        category_for_exit_code(status.code())
                    };
                    OperationOutcome::failed(category, message)
                }
                _ if !status.success() => exit_failure(),
                BufferedOutput::Empty => OperationOutcome::failed(
                    FailureCategory::ProtocolViolation,
                    "Worker exited without printing a result",
                ),
                BufferedOutput::Invalid(reason) => OperationOutcome::failed(
                    FailureCategory::Decode,
                    format!("Worker printed unreadable output: {reason}"),
                ),
                BufferedOutput::Value(_) => exit_failure(),
            },
        }
    }
}
