//! Request fan-out helpers for adapters whose provider takes one text, or a
//! small fixed number of texts, per call.
//!
//! [`embed_each`] runs single-text calls on a bounded pool of scoped threads.
//! Each job carries its input index and results are slotted back by index,
//! so output order never depends on completion order. The first failure
//! stops further dispatch and is returned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::bounded;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use scalemb_core::{Embedding, Error, Result};

pub fn embed_each<F>(provider: &str, texts: &[String], workers: usize, embed_one: F) -> Result<Vec<Embedding>>
where
    F: Fn(&str) -> Result<Embedding> + Sync,
{
    let bar = progress_bar(provider, texts.len());
    let workers = workers.max(1).min(texts.len().max(1));
    if workers == 1 {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(embed_one(text)?);
            bar.inc(1);
        }
        bar.finish_and_clear();
        return Ok(out);
    }

    debug!(provider, texts = texts.len(), workers, "embedding with worker pool");
    let (job_tx, job_rx) = bounded::<(usize, &str)>(workers * 2);
    let (result_tx, result_rx) = bounded::<(usize, Result<Embedding>)>(workers * 2);
    let failed = AtomicBool::new(false);
    let mut slots: Vec<Option<Embedding>> = vec![None; texts.len()];
    let mut first_err: Option<Error> = None;

    thread::scope(|s| {
        for _ in 0..workers {
            let rx = job_rx.clone();
            let tx = result_tx.clone();
            let embed_one = &embed_one;
            let failed = &failed;
            s.spawn(move || {
                for (idx, text) in rx.iter() {
                    if failed.load(Ordering::Relaxed) { continue; }
                    let result = embed_one(text);
                    if result.is_err() { failed.store(true, Ordering::Relaxed); }
                    if tx.send((idx, result)).is_err() { break; }
                }
            });
        }
        drop(job_rx);
        drop(result_tx);

        let failed = &failed;
        s.spawn(move || {
            for (idx, text) in texts.iter().enumerate() {
                if failed.load(Ordering::Relaxed) { break; }
                if job_tx.send((idx, text.as_str())).is_err() { break; }
            }
        });

        for (idx, result) in result_rx.iter() {
            match result {
                Ok(v) => { slots[idx] = Some(v); bar.inc(1); }
                Err(e) => { if first_err.is_none() { first_err = Some(e); } }
            }
        }
    });
    bar.finish_and_clear();

    if let Some(err) = first_err {
        return Err(err);
    }
    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| Error::unavailable(provider, "worker pool dropped a result"))
}

/// Calls `embed_chunk` on consecutive slices of at most `batch_size` texts
/// and checks each reply has one vector per text.
pub fn embed_chunks<F>(provider: &str, texts: &[String], batch_size: usize, mut embed_chunk: F) -> Result<Vec<Embedding>>
where
    F: FnMut(&[String]) -> Result<Vec<Embedding>>,
{
    let bar = progress_bar(provider, texts.len());
    let mut out = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(batch_size.max(1)) {
        let vectors = embed_chunk(chunk)?;
        if vectors.len() != chunk.len() {
            return Err(Error::VectorCountMismatch { expected: chunk.len(), actual: vectors.len() });
        }
        out.extend(vectors);
        bar.inc(chunk.len() as u64);
    }
    bar.finish_and_clear();
    Ok(out)
}

fn progress_bar(provider: &str, len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} items ({percent}%) {msg}") {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(provider.to_string());
    pb
}
