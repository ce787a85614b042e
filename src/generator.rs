//! Background rendition generation.
//!
//! Each profile owns one [`Generator`]: a fixed-size rayon pool fed in FIFO
//! order. A job is `{key, apply_orientation}`; the generator turns it into a
//! [`Rendition`] and hands it back through a [`CompletionSink`], which is how
//! the repository learns about results without the generator knowing about
//! caches or subscribers.
//!
//! ## Per-job flow
//!
//! ```text
//! job ──► sink.complete_from_store? ──yes──► done (restored rendition)
//!                 │ no
//!                 ▼
//!         backend.render (decode, orient, box-fit)
//!                 │
//!        ok ──────┴────── error / panic
//!         │                     │
//!   Rendition::generated    profile placeholder (logged)
//!         └──────────┬──────────┘
//!                    ▼
//!          sink.on_generated(key, rendition)
//! ```
//!
//! Every job ends in exactly one `on_generated` call or one successful store
//! completion. A decoder panic is caught rather than left to rayon, which
//! would abort the process and strand every waiting subscriber.

use crate::imaging::{ImageBackend, RenderParams, ResizeFilter};
use crate::key::Key;
use crate::rendition::Rendition;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// One unit of generation work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub key: Key,
    pub apply_orientation: bool,
}

impl Job {
    fn render_params(&self, filter: ResizeFilter) -> RenderParams {
        RenderParams {
            source: self.key.source().to_path_buf(),
            width: self.key.width(),
            height: self.key.height(),
            apply_orientation: self.apply_orientation,
            filter,
        }
    }
}

/// Receives the outcome of jobs. Implemented by the repository.
pub trait CompletionSink: Send + Sync + 'static {
    /// Called on the worker before decoding. Returns true when the job was
    /// completed from persistent storage and must not be rendered.
    fn complete_from_store(&self, job: &Job) -> bool;

    /// Called exactly once per rendered job, with the real rendition or the
    /// profile placeholder when rendering failed.
    fn on_generated(&self, key: Key, rendition: Rendition);
}

pub struct Generator {
    pool: rayon::ThreadPool,
    backend: Arc<dyn ImageBackend>,
    filter: ResizeFilter,
    fallback: Rendition,
}

impl Generator {
    /// Start a pool of `workers` threads named `<name>-worker-<n>`.
    pub fn new(
        name: &str,
        workers: usize,
        backend: Arc<dyn ImageBackend>,
        filter: ResizeFilter,
        fallback: Rendition,
    ) -> Result<Self, GeneratorError> {
        let name = name.to_string();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(move |i| format!("{name}-worker-{i}"))
            .build()?;
        Ok(Self {
            pool,
            backend,
            filter,
            fallback,
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue a job. Returns immediately; the outcome is reported to `sink`.
    pub fn submit(&self, job: Job, sink: Arc<dyn CompletionSink>) {
        let backend = Arc::clone(&self.backend);
        let fallback = self.fallback.clone();
        let filter = self.filter;
        self.pool.spawn_fifo(move || {
            if sink.complete_from_store(&job) {
                return;
            }
            let rendition = render(backend.as_ref(), &job, filter, fallback);
            sink.on_generated(job.key, rendition);
        });
    }
}

/// Render one job, substituting `fallback` on any failure.
fn render(
    backend: &dyn ImageBackend,
    job: &Job,
    filter: ResizeFilter,
    fallback: Rendition,
) -> Rendition {
    let params = job.render_params(filter);
    match panic::catch_unwind(AssertUnwindSafe(|| backend.render(&params))) {
        Ok(Ok(image)) => {
            debug!(
                key = %job.key,
                width = image.width(),
                height = image.height(),
                "rendition generated"
            );
            Rendition::generated(image)
        }
        Ok(Err(e)) => {
            warn!(key = %job.key, error = %e, "rendition failed, delivering placeholder");
            fallback
        }
        Err(payload) => {
            warn!(
                key = %job.key,
                panic = panic_message(payload.as_ref()),
                "backend panicked, delivering placeholder"
            );
            fallback
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic>"
    }
}
