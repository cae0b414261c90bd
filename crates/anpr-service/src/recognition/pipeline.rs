use futures::future::join_all;
use image::DynamicImage;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use telemetry::metrics::{ANPR_ADAPTER_LATENCY, ANPR_BOXES_DETECTED};
use tokio::{sync::Semaphore, time::timeout};
use tracing::{debug, warn};

use super::{
    CandidateSelector, PlateBox, PlateDetector, Reading, Recognition, RecognitionError,
    SelectionPolicy, Stage, TextReader,
};

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub detect_timeout: Duration,
    /// Applied to each box separately, from the moment the reader admits it
    pub read_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(5),
        }
    }
}

/// Decode → detect → crop and read every box → select.
///
/// A detector failure fails the request. A reader failure only empties the
/// readings of the box it was reading.
///
/// Reads share `read_slots` across requests, sized by
/// [`TextReader::max_concurrent_reads`].
pub struct PlatePipeline {
    detector: Arc<dyn PlateDetector>,
    reader: Arc<dyn TextReader>,
    read_slots: Arc<Semaphore>,
    selector: CandidateSelector,
    config: PipelineConfig,
}

impl PlatePipeline {
    pub fn new(
        detector: Arc<dyn PlateDetector>,
        reader: Arc<dyn TextReader>,
        selector: CandidateSelector,
        config: PipelineConfig,
    ) -> Self {
        let slots = reader.max_concurrent_reads().clamp(1, Semaphore::MAX_PERMITS);
        Self {
            detector,
            reader,
            read_slots: Arc::new(Semaphore::new(slots)),
            selector,
            config,
        }
    }

    pub fn selector(&self) -> &CandidateSelector {
        &self.selector
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    pub fn reader_name(&self) -> &'static str {
        self.reader.name()
    }

    /// Decode encoded image bytes (any format the `image` crate can sniff)
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage, RecognitionError> {
        if bytes.is_empty() {
            return Err(RecognitionError::InvalidInput("empty upload".to_string()));
        }
        let image = image::load_from_memory(bytes)
            .map_err(|e| RecognitionError::InvalidInput(format!("cannot decode image: {e}")))?;
        if image.width() == 0 || image.height() == 0 {
            return Err(RecognitionError::InvalidInput(
                "image has zero width or height".to_string(),
            ));
        }
        Ok(image)
    }

    pub async fn recognize(
        &self,
        bytes: &[u8],
        policy: SelectionPolicy,
    ) -> Result<Recognition, RecognitionError> {
        let owned = bytes.to_vec();
        let image = tokio::task::spawn_blocking(move || Self::decode(&owned))
            .await
            .map_err(RecognitionError::model)??;
        self.recognize_image(Arc::new(image), policy).await
    }

    pub async fn recognize_image(
        &self,
        image: Arc<DynamicImage>,
        policy: SelectionPolicy,
    ) -> Result<Recognition, RecognitionError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(RecognitionError::InvalidInput(
                "image has zero width or height".to_string(),
            ));
        }

        let boxes = self.detect(image.clone()).await?;
        debug!(boxes = boxes.len(), detector = self.detector.name(), "detection finished");
        if boxes.is_empty() {
            return Ok(Recognition::empty(policy));
        }

        // join_all keeps input order, so results line up with detection order
        let per_box: Vec<Vec<Reading>> = join_all(
            boxes
                .iter()
                .enumerate()
                .map(|(index, plate)| self.read_box(&image, index, *plate)),
        )
        .await;

        Ok(self.selector.select(policy, &per_box))
    }

    async fn detect(&self, image: Arc<DynamicImage>) -> Result<Vec<PlateBox>, RecognitionError> {
        let started = Instant::now();
        let result = timeout(self.config.detect_timeout, self.detector.detect(image))
            .await
            .map_err(|_| RecognitionError::Timeout {
                stage: Stage::Detect,
                after_ms: self.config.detect_timeout.as_millis() as u64,
            })?;
        ANPR_ADAPTER_LATENCY
            .with_label_values(&[Stage::Detect.as_str()])
            .observe(started.elapsed().as_secs_f64());
        result
    }

    async fn read_box(&self, image: &DynamicImage, index: usize, plate: PlateBox) -> Vec<Reading> {
        let Some(clipped) = plate.clamp_to(image.width(), image.height()) else {
            debug!(box_index = index, ?plate, "box has no area inside the image, skipping");
            ANPR_BOXES_DETECTED.with_label_values(&["degenerate"]).inc();
            return Vec::new();
        };

        let crop = image.crop_imm(
            clipped.x1 as u32,
            clipped.y1 as u32,
            clipped.width() as u32,
            clipped.height() as u32,
        );

        let slot = match Arc::clone(&self.read_slots).acquire_owned().await {
            Ok(slot) => slot,
            Err(e) => {
                warn!(box_index = index, error = %e, "reader slots closed, skipping box");
                ANPR_BOXES_DETECTED.with_label_values(&["read_failed"]).inc();
                return Vec::new();
            }
        };

        // The slot travels with the read, so a timed-out read keeps it until
        // the reader actually returns.
        let reader = Arc::clone(&self.reader);
        let started = Instant::now();
        let task = tokio::spawn(async move {
            let _slot = slot;
            reader.read(crop, clipped).await
        });
        let outcome = timeout(self.config.read_timeout, task).await;
        ANPR_ADAPTER_LATENCY
            .with_label_values(&[Stage::Read.as_str()])
            .observe(started.elapsed().as_secs_f64());

        match outcome {
            Ok(Ok(Ok(readings))) => {
                ANPR_BOXES_DETECTED.with_label_values(&["read"]).inc();
                readings
            }
            Ok(Ok(Err(e))) => {
                warn!(box_index = index, error = %e, reader = self.reader.name(), "text reader failed, skipping box");
                ANPR_BOXES_DETECTED.with_label_values(&["read_failed"]).inc();
                Vec::new()
            }
            Ok(Err(e)) => {
                warn!(box_index = index, error = %e, "text reader task aborted, skipping box");
                ANPR_BOXES_DETECTED.with_label_values(&["read_failed"]).inc();
                Vec::new()
            }
            Err(_) => {
                warn!(
                    box_index = index,
                    timeout_ms = self.config.read_timeout.as_millis() as u64,
                    "text reader timed out, skipping box"
                );
                ANPR_BOXES_DETECTED.with_label_values(&["read_timeout"]).inc();
                Vec::new()
            }
        }
    }
}
