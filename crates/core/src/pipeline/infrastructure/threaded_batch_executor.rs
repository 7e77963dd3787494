use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::detection::domain::face_engine::FaceEngine;
use crate::pipeline::batch_executor::BatchExecutor;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::result_row::{EngineCell, ImageDescriptor, ResultRow};
use crate::shared::constants::DEFAULT_MAX_IN_FLIGHT;

/// A finished image as reported by a worker.
struct CompletedImage {
    slot: usize,
    row: ResultRow,
    elapsed: Vec<Duration>,
}

/// Executes a batch on a fixed pool of scoped worker threads.
///
/// Layout: `queue → N workers [engine 1 … engine M] → main [slot array]`
///
/// At most `max_in_flight` images are under detection at any instant.
/// Engines run sequentially within an image; only images run in parallel.
/// Workers pull from a shared queue and report completed rows back to the
/// coordinating thread, which places each row in the slot for its input
/// position and drives the logger.
pub struct ThreadedBatchExecutor {
    max_in_flight: usize,
}

impl ThreadedBatchExecutor {
    pub fn new() -> Self {
        Self::with_max_in_flight(DEFAULT_MAX_IN_FLIGHT)
    }

    pub fn with_max_in_flight(max_in_flight: usize) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}

impl Default for ThreadedBatchExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchExecutor for ThreadedBatchExecutor {
    fn execute(
        &self,
        images: &[ImageDescriptor],
        engines: &[Box<dyn FaceEngine>],
        logger: &mut dyn PipelineLogger,
    ) -> Vec<ResultRow> {
        let total = images.len();
        let mut slots: Vec<Option<ResultRow>> = vec![None; total];
        if total == 0 {
            return Vec::new();
        }

        let (work_tx, work_rx) = crossbeam_channel::unbounded::<(usize, &ImageDescriptor)>();
        for item in images.iter().enumerate() {
            // Receiver is alive in this scope; send cannot fail.
            let _ = work_tx.send(item);
        }
        drop(work_tx);

        let workers = self.max_in_flight.min(total);
        log::debug!("Dispatching {total} images to {workers} workers");

        std::thread::scope(|scope| {
            let (done_tx, done_rx) = crossbeam_channel::unbounded::<CompletedImage>();

            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let work_rx = work_rx.clone();
                    let done_tx = done_tx.clone();
                    scope.spawn(move || run_worker(work_rx, done_tx, engines))
                })
                .collect();
            drop(done_tx);

            let mut completed = 0;
            for image in done_rx {
                record_completion(&image, engines, logger);
                slots[image.slot] = Some(image.row);
                completed += 1;
                logger.progress(completed, total);
            }

            for handle in handles {
                if handle.join().is_err() {
                    log::error!("Detection worker panicked");
                }
            }
        });

        images
            .iter()
            .zip(slots)
            .map(|(image, slot)| {
                slot.unwrap_or_else(|| {
                    log::warn!("{}: no result recorded", image.path);
                    ResultRow::failed(image, engines.len(), "worker terminated")
                })
            })
            .collect()
    }
}

fn run_worker(
    work_rx: Receiver<(usize, &ImageDescriptor)>,
    done_tx: Sender<CompletedImage>,
    engines: &[Box<dyn FaceEngine>],
) {
    for (slot, image) in work_rx {
        let mut cells = Vec::with_capacity(engines.len());
        let mut elapsed = Vec::with_capacity(engines.len());
        for engine in engines {
            let start = Instant::now();
            cells.push(detect_cell(engine.as_ref(), image));
            elapsed.push(start.elapsed());
        }
        let row = ResultRow::new(image, cells);
        if done_tx.send(CompletedImage { slot, row, elapsed }).is_err() {
            break;
        }
    }
}

/// Runs one engine on one image. Errors and panics both become a failed cell.
fn detect_cell(engine: &dyn FaceEngine, image: &ImageDescriptor) -> EngineCell {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.detect(image.as_path())));
    match outcome {
        Ok(Ok(result)) => EngineCell::Detected(result),
        Ok(Err(e)) => {
            log::warn!("{} [{}]: {e}", image.path, engine.name());
            EngineCell::Failed(e.to_string())
        }
        Err(_) => {
            log::error!("{} [{}]: engine panicked", image.path, engine.name());
            EngineCell::Failed("engine panicked".to_string())
        }
    }
}

fn record_completion(
    image: &CompletedImage,
    engines: &[Box<dyn FaceEngine>],
    logger: &mut dyn PipelineLogger,
) {
    for ((engine, cell), elapsed) in engines.iter().zip(&image.row.cells).zip(&image.elapsed) {
        logger.timing(engine.name(), elapsed.as_secs_f64() * 1000.0);
        if let Some(count) = cell.face_count() {
            logger.metric("faces", count as f64);
        }
    }
    logger.metric("failed_cells", image.row.failed_cells() as f64);
}
