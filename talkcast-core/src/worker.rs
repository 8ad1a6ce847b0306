//! Background generation worker
//!
//! Runs a [`DialoguePipeline`] on its own thread so an interactive caller
//! never blocks: commands go in over one channel, progress and results come
//! back over another and are picked up with [`CastWorker::poll_events`].

use crossbeam_channel::{bounded, never, select, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::CastError;
use crate::pipeline::{CancelFlag, DialoguePipeline, GenerateRequest, GenerationReport, PipelineEvent, ProgressCallback};
use crate::synthesis::{EngineConfig, TtsEngine};
use crate::voice_assignment::VoiceCatalog;

const CHANNEL_CAPACITY: usize = 100;

// ============================================================================
// DATA MODELS
// ============================================================================

/// State shared between the caller and the worker thread
#[derive(Debug, Default)]
pub struct WorkerState {
    /// Whether a generation is running
    pub busy: bool,
    /// Job id of the running generation
    pub current_job: Option<u64>,
    pub completed_jobs: usize,
    pub last_report: Option<GenerationReport>,
    /// Cancel flags of queued and running jobs
    pub jobs: BTreeMap<u64, CancelFlag>,
}

/// Commands sent to the worker
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    Generate {
        job_id: u64,
        request: GenerateRequest,
        cancel: CancelFlag,
    },
    Reconfigure(EngineConfig),
    RefreshVoices,
}

/// Events sent back from the worker
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Started { job_id: u64 },
    Progress { job_id: u64, event: PipelineEvent },
    Finished { job_id: u64, report: GenerationReport },
    Failed { job_id: u64, message: String },
    Cancelled { job_id: u64 },
    Reconfigured,
    VoicesRefreshed(VoiceCatalog),
    Error { message: String },
}

// ============================================================================
// WORKER
// ============================================================================

pub struct CastWorker {
    state: Arc<RwLock<WorkerState>>,
    /// Caller → worker
    command_tx: Sender<WorkerCommand>,
    /// Worker → caller
    event_rx: Receiver<WorkerEvent>,
    worker_handle: Option<thread::JoinHandle<()>>,
    stop_tx: Option<Sender<()>>,
    next_job_id: u64,
}

impl CastWorker {
    /// Spawn a worker thread that owns `pipeline`
    pub fn spawn<E>(pipeline: Arc<DialoguePipeline<E>>) -> Self
    where
        E: TtsEngine + 'static,
    {
        let (command_tx, command_rx) = bounded(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = bounded(CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = bounded(1);

        let state = Arc::new(RwLock::new(WorkerState::default()));

        let state_clone = state.clone();
        let handle = thread::Builder::new()
            .name("talkcast-worker".to_string())
            .spawn(move || {
                Self::worker_thread(pipeline, state_clone, command_rx, event_tx, stop_rx);
            });

        let worker_handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to spawn worker thread: {}", e);
                None
            }
        };

        Self {
            state,
            command_tx,
            event_rx,
            worker_handle,
            stop_tx: Some(stop_tx),
            next_job_id: 1,
        }
    }

    /// Get shared state
    pub fn state(&self) -> Arc<RwLock<WorkerState>> {
        self.state.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.state.read().busy
    }

    /// Queue a generation and return its job id
    pub fn generate(&mut self, request: GenerateRequest) -> Option<u64> {
        let job_id = self.next_job_id;
        self.next_job_id += 1;

        let cancel = CancelFlag::new();
        self.state.write().jobs.insert(job_id, cancel.clone());

        if self.send_command(WorkerCommand::Generate { job_id, request, cancel }) {
            Some(job_id)
        } else {
            self.state.write().jobs.remove(&job_id);
            None
        }
    }

    /// Send command to the worker thread without waiting for queue space
    pub fn send_command(&self, command: WorkerCommand) -> bool {
        match self.command_tx.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::error!("Command queue full, dropping command");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::error!("Failed to send command (worker stopped?)");
                false
            }
        }
    }

    /// Cancel every queued or running generation.
    ///
    /// Jobs queued afterwards are not affected.
    pub fn cancel(&self) {
        let state = self.state.read();
        log::info!("Cancelling {} generation(s)", state.jobs.len());
        for flag in state.jobs.values() {
            flag.cancel();
        }
    }

    /// Flag of a queued or running job; setting it cancels only that job
    pub fn cancel_flag(&self, job_id: u64) -> Option<CancelFlag> {
        self.state.read().jobs.get(&job_id).cloned()
    }

    /// Poll for events without blocking
    pub fn poll_events(&self) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Whether the worker thread is still alive
    pub fn is_running(&self) -> bool {
        self.worker_handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Wait up to `timeout` for the next event
    pub fn next_event(&self, timeout: Duration) -> Option<WorkerEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn worker_thread<E: TtsEngine + 'static>(
        pipeline: Arc<DialoguePipeline<E>>,
        state: Arc<RwLock<WorkerState>>,
        command_rx: Receiver<WorkerCommand>,
        event_tx: Sender<WorkerEvent>,
        stop_rx: Receiver<()>,
    ) {
        log::debug!("Worker started with engine '{}'", pipeline.engine_name());

        loop {
            let command = select! {
                recv(stop_rx) -> _ => {
                    log::debug!("Worker received stop signal");
                    break;
                }
                recv(command_rx) -> command => match command {
                    Ok(command) => command,
                    Err(_) => break,
                },
            };

            match command {
                WorkerCommand::Generate { job_id, request, cancel } => {
                    Self::run_job(&pipeline, &state, &cancel, &event_tx, job_id, &request);
                }
                WorkerCommand::Reconfigure(config) => match pipeline.reconfigure(config) {
                    Ok(()) => {
                        let _ = event_tx.send(WorkerEvent::Reconfigured);
                    }
                    Err(e) => {
                        let _ = event_tx.send(WorkerEvent::Error { message: e.to_string() });
                    }
                },
                WorkerCommand::RefreshVoices => match pipeline.refresh_voices() {
                    Ok(catalog) => {
                        let _ = event_tx.send(WorkerEvent::VoicesRefreshed(catalog));
                    }
                    Err(e) => {
                        let _ = event_tx.send(WorkerEvent::Error { message: e.to_string() });
                    }
                },
            }
        }

        log::debug!("Worker stopped");
    }

    fn run_job<E: TtsEngine + 'static>(
        pipeline: &DialoguePipeline<E>,
        state: &RwLock<WorkerState>,
        cancel: &CancelFlag,
        event_tx: &Sender<WorkerEvent>,
        job_id: u64,
        request: &GenerateRequest,
    ) {
        {
            let mut state = state.write();
            state.busy = true;
            state.current_job = Some(job_id);
        }
        let _ = event_tx.send(WorkerEvent::Started { job_id });

        let progress_tx = event_tx.clone();
        let observer: ProgressCallback = Arc::new(move |event: &PipelineEvent| {
            let progress = WorkerEvent::Progress {
                job_id,
                event: event.clone(),
            };
            if let Err(TrySendError::Full(_)) = progress_tx.try_send(progress) {
                log::debug!("Event queue full, dropping progress event");
            }
        });

        let event = match pipeline.generate(request, Some(&observer), cancel) {
            Ok(report) => {
                let mut state = state.write();
                state.completed_jobs += 1;
                state.last_report = Some(report.clone());
                WorkerEvent::Finished { job_id, report }
            }
            Err(CastError::Cancelled) => WorkerEvent::Cancelled { job_id },
            Err(e) => {
                log::error!("Job {} failed: {}", job_id, e);
                WorkerEvent::Failed {
                    job_id,
                    message: e.to_string(),
                }
            }
        };

        {
            let mut state = state.write();
            state.busy = false;
            state.current_job = None;
            state.jobs.remove(&job_id);
        }
        // Fails instead of blocking once the caller has dropped the worker
        let _ = event_tx.send(event);
    }
}

impl Drop for CastWorker {
    fn drop(&mut self) {
        self.cancel();

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        // Disconnect the event queue so a worker blocked on a full queue wakes up
        drop(std::mem::replace(&mut self.event_rx, never()));

        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_mixer::{AudioMixer, ExportFormat, MixerConfig};
    use crate::engines::ToneEngine;
    use crate::pipeline::PipelineOptions;
    use crate::synthesis::SynthesisAdapter;
    use std::path::Path;

    fn worker(dir: &Path) -> CastWorker {
        let adapter = SynthesisAdapter::new(ToneEngine::new(), EngineConfig::default()).unwrap();
        let mixer = AudioMixer::new(MixerConfig {
            export_format: ExportFormat::Wav,
            ..Default::default()
        });
        let options = PipelineOptions {
            output_dir: dir.to_path_buf(),
            ..Default::default()
        };
        CastWorker::spawn(Arc::new(DialoguePipeline::new(adapter, mixer, options)))
    }

    /// Collect events until one matches `done`
    fn wait_for(worker: &CastWorker, done: impl Fn(&WorkerEvent) -> bool) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        while let Some(event) = worker.next_event(Duration::from_secs(30)) {
            let finished = done(&event);
            events.push(event);
            if finished {
                break;
            }
        }
        events
    }

    #[test]
    fn test_generate_reports_progress_and_result() {
        let dir = tempfile::tempdir().unwrap();
        let mut worker = worker(dir.path());

        let job = worker
            .generate(GenerateRequest::new("[Host] Welcome [Guest] Thanks").with_output("show"))
            .unwrap();
        let events = wait_for(&worker, |e| matches!(e, WorkerEvent::Finished { .. } | WorkerEvent::Failed { .. }));

        assert!(matches!(events.first(), Some(WorkerEvent::Started { job_id }) if *job_id == job));
        let progress = events
            .iter()
            .filter(|e| matches!(e, WorkerEvent::Progress { .. }))
            .count();
        assert_eq!(progress, 5);

        match events.last() {
            Some(WorkerEvent::Finished { report, .. }) => {
                assert_eq!(report.output_file, dir.path().join("show.wav"));
                assert!(report.output_file.exists());
            }
            other => panic!("unexpected final event: {:?}", other),
        }

        let state = worker.state();
        let state = state.read();
        assert!(!state.busy);
        assert_eq!(state.completed_jobs, 1);
    }

    #[test]
    fn test_failed_job_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut worker = worker(dir.path());

        worker.generate(GenerateRequest::new("")).unwrap();
        let events = wait_for(&worker, |e| matches!(e, WorkerEvent::Failed { .. } | WorkerEvent::Finished { .. }));

        match events.last() {
            Some(WorkerEvent::Failed { message, .. }) => assert!(message.contains("No valid dialogue")),
            other => panic!("unexpected final event: {:?}", other),
        }
    }

    #[test]
    fn test_refresh_voices() {
        let dir = tempfile::tempdir().unwrap();
        let worker = worker(dir.path());

        assert!(worker.send_command(WorkerCommand::RefreshVoices));
        let events = wait_for(&worker, |e| matches!(e, WorkerEvent::VoicesRefreshed(_)));
        assert!(matches!(events.last(), Some(WorkerEvent::VoicesRefreshed(catalog)) if catalog.len() == 6));
    }

    fn long_dialogue(turns: usize) -> String {
        (0..turns)
            .map(|i| format!("[S{}] line number {}", i % 2, i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_cancel_reaches_queued_job() {
        let dir = tempfile::tempdir().unwrap();
        let mut worker = worker(dir.path());

        let first = worker.generate(GenerateRequest::new(long_dialogue(60))).unwrap();
        let second = worker.generate(GenerateRequest::new("[A] queued [B] job")).unwrap();
        assert!(worker.cancel_flag(second).is_some());
        worker.cancel();

        let events = wait_for(&worker, |e| {
            matches!(e, WorkerEvent::Finished { job_id, .. } | WorkerEvent::Cancelled { job_id } if *job_id == second)
        });

        assert!(matches!(events.last(), Some(WorkerEvent::Cancelled { job_id }) if *job_id == second));
        assert!(events
            .iter()
            .all(|e| !matches!(e, WorkerEvent::Finished { job_id, .. } if *job_id == first)));
        assert!(worker.cancel_flag(second).is_none());
    }

    #[test]
    fn test_cancel_does_not_leak_into_later_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let mut worker = worker(dir.path());

        worker.cancel();
        let job = worker.generate(GenerateRequest::new("[A] after [B] cancel")).unwrap();
        let events = wait_for(&worker, |e| {
            matches!(e, WorkerEvent::Finished { .. } | WorkerEvent::Cancelled { .. } | WorkerEvent::Failed { .. })
        });

        assert!(matches!(events.last(), Some(WorkerEvent::Finished { job_id, .. }) if *job_id == job));
    }

    #[test]
    fn test_drop_with_undrained_events_returns() {
        let dir = tempfile::tempdir().unwrap();
        let mut worker = worker(dir.path());

        // more progress events than the queue holds
        worker.generate(GenerateRequest::new(long_dialogue(120))).unwrap();
        let state = worker.state();
        let deadline = std::time::Instant::now() + Duration::from_secs(60);
        while state.read().completed_jobs == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(state.read().completed_jobs, 1);

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        thread::spawn(move || {
            drop(worker);
            let _ = done_tx.send(());
        });
        assert!(done_rx.recv_timeout(Duration::from_secs(30)).is_ok());
    }

    #[test]
    fn test_drop_stops_thread() {
        let dir = tempfile::tempdir().unwrap();
        let worker = worker(dir.path());
        assert!(worker.is_running());
        assert!(worker.poll_events().is_empty());
        drop(worker);
    }
}
