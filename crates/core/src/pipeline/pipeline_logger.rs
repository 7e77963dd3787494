use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for batch orchestration events.
///
/// Keeps use cases independent of where progress ends up (stdout, log
/// crate, nothing at all). Executors call it from the coordinating thread
/// only, so implementations need no internal locking.
pub trait PipelineLogger: Send {
    /// Report image-level progress.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long a named stage (usually an engine) took for one image.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces found, failed cells).
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-batch summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events. Backs quiet batch runs.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// CLI logger: throttled progress through `log::info!`, plus per-engine
/// latency and throughput in the closing summary.
pub struct StdoutPipelineLogger {
    throttle_images: usize,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
    total_images: usize,
    completed_images: usize,
    messages: Vec<String>,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_images: usize) -> Self {
        Self {
            throttle_images: throttle_images.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            total_images: 0,
            completed_images: 0,
            messages: Vec::new(),
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let images = self.completed_images;
        let mut lines = vec![format!(
            "Batch summary ({images}/{} images, {elapsed_s:.1}s total):",
            self.total_images
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = mean(durations);
            let calls = durations.len();
            lines.push(format!(
                "  {stage:14}: avg {avg_ms:7.1}ms  total {total_ms:8.0}ms  ({calls} calls)"
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let values = &self.metrics[name];
            let sum: f64 = values.iter().sum();
            lines.push(format!("  {name}: total {sum:.0}, avg {:.2}", mean(values)));
        }

        if images > 0 && elapsed_s > 0.0 {
            lines.push(format!("  Throughput: {:.2} images/s", images as f64 / elapsed_s));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.total_images = total;
        self.completed_images = current;
        if total > 0 && (current % self.throttle_images == 0 || current == total) {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processed {current}/{total} images ({pct:.1}%)");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
