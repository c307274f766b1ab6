use std::sync::{Mutex, OnceLock};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PipelineProgress {
    /// `separate`, `derive` or `assemble`
    Stage(&'static str),
    Track {
        slug: &'static str,
        done: usize,
        total: usize,
    },
    Finished,
}

type ProgressCallback = Box<dyn Fn(PipelineProgress) + Send + 'static>;

static PROGRESS_CB: OnceLock<Mutex<Option<ProgressCallback>>> = OnceLock::new();

/// Install the process-wide progress callback, replacing any previous one.
pub fn set_progress_callback(cb: impl Fn(PipelineProgress) + Send + 'static) {
    let slot = PROGRESS_CB.get_or_init(|| Mutex::new(None));
    if let Ok(mut g) = slot.lock() {
        *g = Some(Box::new(cb));
    }
}

pub fn emit_progress(progress: PipelineProgress) {
    if let Some(m) = PROGRESS_CB.get() {
        if let Ok(g) = m.lock() {
            if let Some(cb) = &*g {
                cb(progress);
            }
        }
    }
}
