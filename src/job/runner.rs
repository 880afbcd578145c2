//! Background job runner

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use log::{debug, error, info};

use crate::audio::{AudioBackend, AudioInfo, LoadedAudio};
use crate::error::{AudioProcError, Result};
use crate::job::frontend::{Frontend, JobEvent, SubmitOutcome};
use crate::processing::{suggested_output_path, validate, JobParams, Pipeline, ProcessingParams};

const WORKER_THREAD_NAME: &str = "audioproc-job";
const WORKER_LOST_MESSAGE: &str = "Processing worker stopped unexpectedly";

/// Running flag and progress shared with the worker
#[derive(Debug, Default)]
pub struct JobState {
    running: AtomicBool,
    progress: AtomicU8,
}

impl JobState {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }

    fn start(&self) {
        self.progress.store(0, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
    }

    fn set_progress(&self, percent: u8) {
        self.progress.store(percent.min(100), Ordering::SeqCst);
    }

    fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.progress.store(0, Ordering::SeqCst);
    }
}

pub struct JobRunner<B: AudioBackend> {
    backend: Arc<B>,
    loaded: Option<Arc<LoadedAudio>>,
    state: Arc<JobState>,
    events: Option<Receiver<JobEvent>>,
    worker: Option<JoinHandle<()>>,
}

impl<B: AudioBackend> JobRunner<B> {
    pub fn new(backend: B) -> Self {
        Self::with_backend(Arc::new(backend))
    }

    pub fn with_backend(backend: Arc<B>) -> Self {
        Self {
            backend,
            loaded: None,
            state: Arc::new(JobState::default()),
            events: None,
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn progress(&self) -> u8 {
        self.state.progress()
    }

    pub fn loaded(&self) -> Option<&LoadedAudio> {
        self.loaded.as_deref()
    }

    pub fn loaded_info(&self) -> Option<AudioInfo> {
        self.loaded.as_ref().map(|audio| audio.info())
    }

    /// Decode `path` and make it the current file.
    ///
    /// A running job keeps its own reference to the previous file.
    pub fn load<F: Frontend + ?Sized>(&mut self, path: &Path, frontend: &mut F) -> Result<AudioInfo> {
        match self.backend.load(path) {
            Ok(audio) => {
                let info = audio.info();
                debug!("Replacing loaded file with {}", path.display());
                self.loaded = Some(Arc::new(audio));
                frontend.update_info(&info);
                Ok(info)
            }
            Err(e) => {
                error!("Failed to load {}: {}", path.display(), e);
                frontend.notify_error(&e.to_string());
                Err(e)
            }
        }
    }

    pub fn submit<F: Frontend + ?Sized>(&mut self, params: &ProcessingParams, frontend: &mut F) -> SubmitOutcome {
        if self.is_running() {
            debug!("Submit ignored, a job is already running");
            return SubmitOutcome::Busy;
        }

        // hand over whatever the previous job left in its queue
        self.dispatch_events(frontend);
        self.join_worker();

        let Some(audio) = self.loaded.clone() else {
            frontend.notify_error(&AudioProcError::NoFileSelected.to_string());
            return SubmitOutcome::Rejected;
        };

        let validated = match validate(params) {
            Ok(validated) => validated,
            Err(e) => {
                frontend.notify_error(&e.to_string());
                return SubmitOutcome::Rejected;
            }
        };

        let format = validated.format.format();
        let suggested = suggested_output_path(audio.source_path(), format);
        let output_path = match frontend.ask_save_path(format, &suggested) {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => {
                info!("Save cancelled");
                return SubmitOutcome::Cancelled;
            }
        };

        let job = match JobParams::new(validated, output_path) {
            Ok(job) => job,
            Err(e) => {
                frontend.notify_error(&e.to_string());
                return SubmitOutcome::Rejected;
            }
        };

        self.state.start();
        frontend.set_processing(true);
        frontend.update_progress(0);

        match self.spawn_worker(audio, job) {
            Ok(()) => SubmitOutcome::Started,
            Err(e) => {
                error!("{}", e);
                self.state.finish();
                self.events = None;
                frontend.notify_error(&e.to_string());
                frontend.set_processing(false);
                frontend.update_progress(0);
                SubmitOutcome::Rejected
            }
        }
    }

    fn spawn_worker(&mut self, audio: Arc<LoadedAudio>, job: JobParams) -> Result<()> {
        let (tx, rx) = channel();
        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);

        info!("Job started: {} -> {}", audio.source_path().display(), job.output_path().display());

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_job(backend, audio, job, state, tx))
            .map_err(|e| AudioProcError::io(format!("Cannot start processing thread: {}", e)))?;

        self.events = Some(rx);
        self.worker = Some(handle);
        Ok(())
    }

    /// Deliver queued events without blocking. Returns how many were delivered.
    pub fn dispatch_events<F: Frontend + ?Sized>(&mut self, frontend: &mut F) -> usize {
        let mut delivered = 0;
        let mut finished = false;

        if let Some(rx) = &self.events {
            loop {
                let event = match rx.try_recv() {
                    Ok(event) => event,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => JobEvent::Failed(WORKER_LOST_MESSAGE.to_string()),
                };
                delivered += 1;
                if deliver(frontend, event) {
                    finished = true;
                    break;
                }
            }
        }

        if finished {
            self.events = None;
            self.join_worker();
            self.state.finish();
        }
        delivered
    }

    /// Block until the current job's terminal event has been delivered.
    pub fn wait_until_idle<F: Frontend + ?Sized>(&mut self, frontend: &mut F) {
        while let Some(rx) = &self.events {
            let event = rx
                .recv()
                .unwrap_or_else(|_| JobEvent::Failed(WORKER_LOST_MESSAGE.to_string()));
            if deliver(frontend, event) {
                self.events = None;
            }
        }
        self.join_worker();
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("Processing thread panicked");
                self.state.finish();
            }
        }
    }
}

impl<B: AudioBackend> Drop for JobRunner<B> {
    fn drop(&mut self) {
        self.join_worker();
    }
}

/// Returns true for the terminal event.
fn deliver<F: Frontend + ?Sized>(frontend: &mut F, event: JobEvent) -> bool {
    let terminal = event.is_terminal();
    match event {
        JobEvent::Progress(percent) => frontend.update_progress(percent),
        JobEvent::Succeeded => frontend.notify_success(),
        JobEvent::Failed(message) => frontend.notify_error(&message),
    }

    if terminal {
        frontend.set_processing(false);
        frontend.update_progress(0);
    }
    terminal
}

fn run_job<B: AudioBackend>(
    backend: Arc<B>,
    audio: Arc<LoadedAudio>,
    job: JobParams,
    state: Arc<JobState>,
    tx: Sender<JobEvent>,
) {
    let start = Instant::now();
    let pipeline = Pipeline::new(backend);

    let result = pipeline.process(audio, &job, |percent| {
        state.set_progress(percent);
        let _ = tx.send(JobEvent::Progress(percent));
    });

    match result {
        Ok(output) => {
            state.set_progress(100);
            let _ = tx.send(JobEvent::Progress(100));
            let _ = tx.send(JobEvent::Succeeded);
            info!(
                "Job finished in {:.2}s: {} ({} ch, {} Hz, {} bit)",
                start.elapsed().as_secs_f64(),
                job.output_path().display(),
                output.channels(),
                output.sample_rate(),
                output.bit_depth()
            );
        }
        Err(e) => {
            error!("Job failed: {}", e);
            let _ = tx.send(JobEvent::Failed(e.to_string()));
        }
    }

    state.finish();
}
