//! Upload/preview controller.
//!
//! Owns one upload session at a time: validates the selection, keeps a local
//! preview, and runs the request/retry cycle in a background task. Starting a
//! new upload, changing the confidence with a file loaded, or deleting the
//! file cancels the running cycle through its token before touching state.
//!
//! Methods that start a cycle spawn onto the current Tokio runtime.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use jewel_models::{
    validate_upload, AcceptedImage, ConfidenceThreshold, ImageFile, SegmentationResult,
    SessionStatus,
};

use crate::client::Segmenter;
use crate::error::{SegmentError, SegmentResult};
use crate::metrics::record_terminal_failure;
use crate::preview::PreviewHandle;
use crate::retry::{run_with_retry, AttemptRecord, RetryOutcome, RetryPolicy};

/// Point-in-time copy of the session, for rendering.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub file_name: Option<String>,
    pub preview_path: Option<PathBuf>,
    pub confidence: ConfidenceThreshold,
    pub result: Option<SegmentationResult>,
    pub error_message: Option<String>,
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Default)]
struct UploadSession {
    cycle_id: Option<Uuid>,
    image: Option<Arc<AcceptedImage>>,
    preview: Option<PreviewHandle>,
    confidence: ConfidenceThreshold,
    status: SessionStatus,
    result: Option<SegmentationResult>,
    error_message: Option<String>,
    attempts: Vec<AttemptRecord>,
}

impl UploadSession {
    fn clear_outcome(&mut self) {
        self.result = None;
        self.error_message = None;
        self.attempts.clear();
    }
}

struct ActiveCycle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives one upload session against a [`Segmenter`].
pub struct UploadController<S> {
    segmenter: Arc<S>,
    policy: RetryPolicy,
    session: Arc<Mutex<UploadSession>>,
    shutdown: CancellationToken,
    active: Option<ActiveCycle>,
}

impl<S: Segmenter + 'static> UploadController<S> {
    pub fn new(segmenter: S, policy: RetryPolicy) -> Self {
        Self {
            segmenter: Arc::new(segmenter),
            policy,
            session: Arc::new(Mutex::new(UploadSession::default())),
            shutdown: CancellationToken::new(),
            active: None,
        }
    }

    /// Set the initial confidence without triggering a request.
    pub fn with_confidence(self, confidence: ConfidenceThreshold) -> Self {
        lock_session(&self.session).confidence = confidence;
        self
    }

    /// Token that abandons the running cycle when cancelled. Afterwards the
    /// controller refuses new work with [`SegmentError::ShutDown`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn status(&self) -> SessionStatus {
        lock_session(&self.session).status
    }

    /// Whether a new file may be selected (controls are disabled while uploading).
    pub fn can_select(&self) -> bool {
        self.status() != SessionStatus::Uploading
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let session = lock_session(&self.session);
        SessionSnapshot {
            status: session.status,
            file_name: session.image.as_ref().map(|i| i.file_name.clone()),
            preview_path: session.preview.as_ref().map(|p| p.path().to_path_buf()),
            confidence: session.confidence,
            result: session.result.clone(),
            error_message: session.error_message.clone(),
            attempts: session.attempts.clone(),
        }
    }

    /// Accept a user selection and start processing the first file.
    ///
    /// A rejected selection discards the previous file and issues no request;
    /// the session ends in `Failed` with the validation message.
    pub fn select_files(&mut self, files: Vec<ImageFile>) -> SegmentResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(SegmentError::ShutDown);
        }
        if !self.can_select() {
            return Err(SegmentError::SessionBusy);
        }
        if files.len() > 1 {
            warn!(ignored = files.len() - 1, "Multiple files dropped, only the first is used");
        }

        let image = match validate_upload(files) {
            Ok(image) => image,
            Err(rejection) => {
                warn!("Upload rejected: {}", rejection);
                self.abandon_cycle();
                let old_preview = {
                    let mut session = lock_session(&self.session);
                    session.cycle_id = None;
                    session.image = None;
                    session.clear_outcome();
                    session.status = SessionStatus::Failed;
                    session.error_message = Some(rejection.to_string());
                    session.preview.take()
                };
                release_preview(old_preview);
                return Err(rejection.into());
            }
        };

        let preview = PreviewHandle::create(&image)?;
        info!(
            file = %image.file_name,
            kind = %image.kind,
            bytes = image.len(),
            "Image accepted"
        );

        let old_preview = {
            let mut session = lock_session(&self.session);
            session.image = Some(Arc::new(image));
            session.clear_outcome();
            session.preview.replace(preview)
        };
        release_preview(old_preview);

        self.begin_cycle();
        Ok(())
    }

    /// Change the confidence. With a file loaded this re-runs the whole
    /// request sequence against the same content, replacing any running one.
    ///
    /// Returns whether a new sequence was started.
    pub fn set_confidence(&mut self, confidence: ConfidenceThreshold) -> SegmentResult<bool> {
        if self.shutdown.is_cancelled() {
            return Err(SegmentError::ShutDown);
        }
        let has_file = {
            let mut session = lock_session(&self.session);
            session.confidence = confidence;
            session.image.is_some()
        };

        if has_file {
            info!(confidence = %confidence, "Confidence changed, re-running segmentation");
            self.begin_cycle();
        }
        Ok(has_file)
    }

    /// Discard file, preview, result and error, and return to `Idle`.
    pub fn delete(&mut self) {
        self.abandon_cycle();
        let old_preview = {
            let mut session = lock_session(&self.session);
            session.cycle_id = None;
            session.image = None;
            session.clear_outcome();
            session.status = SessionStatus::Idle;
            session.preview.take()
        };
        release_preview(old_preview);
    }

    /// Wait for the running sequence (if any) to finish.
    pub async fn wait(&mut self) -> SessionStatus {
        if let Some(active) = self.active.take() {
            if let Err(e) = active.handle.await {
                error!("Upload cycle task failed: {}", e);
            }
        }
        self.status()
    }

    fn begin_cycle(&mut self) {
        self.abandon_cycle();

        let cycle_id = Uuid::new_v4();
        let (image, confidence) = {
            let mut session = lock_session(&self.session);
            let Some(image) = session.image.clone() else {
                return;
            };
            session.cycle_id = Some(cycle_id);
            session.clear_outcome();
            session.status = SessionStatus::Uploading;
            (image, session.confidence)
        };

        let cancel = self.shutdown.child_token();
        let span = info_span!("upload_cycle", cycle_id = %cycle_id);
        let handle = tokio::spawn(
            run_cycle(
                Arc::clone(&self.segmenter),
                self.policy,
                Arc::clone(&self.session),
                image,
                confidence,
                cancel.clone(),
                cycle_id,
            )
            .instrument(span),
        );

        self.active = Some(ActiveCycle { cancel, handle });
    }

    fn abandon_cycle(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}

impl<S> Drop for UploadController<S> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}

async fn run_cycle<S: Segmenter + 'static>(
    segmenter: Arc<S>,
    policy: RetryPolicy,
    session: Arc<Mutex<UploadSession>>,
    image: Arc<AcceptedImage>,
    confidence: ConfidenceThreshold,
    cancel: CancellationToken,
    cycle_id: Uuid,
) {
    info!(file = %image.file_name, confidence = %confidence, "Processing image");

    let outcome = run_with_retry(&policy, &cancel, |_attempt| {
        let segmenter = Arc::clone(&segmenter);
        let image = Arc::clone(&image);
        async move { segmenter.segment(&image, confidence).await }
    })
    .await;

    let mut session = lock_session(&session);
    if session.cycle_id != Some(cycle_id) {
        // Superseded by a newer upload, confidence change or delete.
        return;
    }

    match outcome {
        RetryOutcome::Succeeded { value, attempts } => {
            info!(
                attempts = attempts.len(),
                components = value.analysis.total(),
                "Segmentation succeeded"
            );
            session.status = SessionStatus::Succeeded;
            session.result = Some(value);
            session.error_message = None;
            session.attempts = attempts;
        }
        RetryOutcome::Exhausted { error, attempts } => {
            let category = error.category();
            record_terminal_failure(category.as_str());
            error!(
                attempts = attempts.len(),
                category = category.as_str(),
                "Segmentation failed: {}",
                error
            );
            session.status = SessionStatus::Failed;
            session.result = None;
            session.error_message = Some(error.terminal_message());
            session.attempts = attempts;
        }
        RetryOutcome::Cancelled { attempts } => {
            info!(attempts = attempts.len(), "Segmentation abandoned");
            session.cycle_id = None;
            session.status = SessionStatus::Idle;
            session.clear_outcome();
        }
    }
}

fn lock_session(session: &Mutex<UploadSession>) -> MutexGuard<'_, UploadSession> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn release_preview(preview: Option<PreviewHandle>) {
    if let Some(preview) = preview {
        if let Err(e) = preview.release() {
            warn!("Failed to release preview: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::decode::ErrorBody;
    use crate::error::AttemptError;
    use jewel_models::{Analysis, ZipArchive};

    #[derive(Clone, Copy)]
    enum Step {
        Ok,
        Gateway,
    }

    #[derive(Default)]
    struct ScriptedSegmenter {
        script: Mutex<VecDeque<Step>>,
        fallback: Option<Step>,
        delay: Duration,
        calls: AtomicU32,
        seen: Mutex<Vec<(Vec<u8>, String)>>,
    }

    impl ScriptedSegmenter {
        fn new(steps: &[Step], fallback: Option<Step>) -> Self {
            Self {
                script: Mutex::new(steps.iter().copied().collect()),
                fallback,
                ..Default::default()
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Segmenter for ScriptedSegmenter {
        async fn segment(
            &self,
            image: &AcceptedImage,
            confidence: ConfidenceThreshold,
        ) -> Result<SegmentationResult, AttemptError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((image.bytes.clone(), confidence.to_form_value()));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let step = self.script.lock().unwrap().pop_front().or(self.fallback);
            match step {
                Some(Step::Ok) => Ok(sample_result(&confidence.to_form_value())),
                Some(Step::Gateway) | None => Err(AttemptError::BadGateway { body: ErrorBody::Unknown }),
            }
        }
    }

    fn sample_result(message: &str) -> SegmentationResult {
        SegmentationResult {
            analysis: Analysis {
                message: message.to_string(),
                components: [("pearl".to_string(), 3)].into_iter().collect(),
            },
            segmented_image: "data:image/png;base64,AQID".to_string(),
            component_images: Default::default(),
            zip_file: ZipArchive {
                data: "UEsDBA==".to_string(),
                filename: "components.zip".to_string(),
            },
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            step: Duration::from_millis(1),
        }
    }

    fn png(name: &str, bytes: &[u8]) -> ImageFile {
        ImageFile::new(name, "image/png", bytes.to_vec())
    }

    fn controller(segmenter: &Arc<ScriptedSegmenter>) -> UploadController<Arc<ScriptedSegmenter>> {
        UploadController::new(Arc::clone(segmenter), fast_policy())
    }

    #[tokio::test]
    async fn test_accepted_file_issues_one_request() {
        let segmenter = Arc::new(ScriptedSegmenter::new(&[Step::Ok], None));
        let mut ctl = controller(&segmenter);

        ctl.select_files(vec![png("necklace.png", b"abc")]).unwrap();
        assert_eq!(ctl.wait().await, SessionStatus::Succeeded);

        assert_eq!(segmenter.calls(), 1);
        let seen = segmenter.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![(b"abc".to_vec(), "0.5".to_string())]);

        let snap = ctl.snapshot();
        assert!(snap.result.is_some());
        assert!(snap.error_message.is_none());
        assert!(snap.preview_path.is_some());
    }

    #[tokio::test]
    async fn test_webp_never_reaches_network() {
        let segmenter = Arc::new(ScriptedSegmenter::new(&[], Some(Step::Ok)));
        let mut ctl = controller(&segmenter);

        let err = ctl
            .select_files(vec![ImageFile::new("ring.webp", "image/webp", vec![1])])
            .unwrap_err();
        assert!(matches!(err, SegmentError::Rejected(_)));
        assert_eq!(ctl.wait().await, SessionStatus::Failed);
        assert_eq!(segmenter.calls(), 0);

        let snap = ctl.snapshot();
        assert!(snap.error_message.unwrap().contains("WebP"));
        assert!(snap.result.is_none());
        assert!(snap.preview_path.is_none());
    }

    #[tokio::test]
    async fn test_recovers_on_fifth_attempt() {
        let segmenter = Arc::new(ScriptedSegmenter::new(
            &[Step::Gateway, Step::Gateway, Step::Gateway, Step::Gateway, Step::Ok],
            None,
        ));
        let mut ctl = controller(&segmenter);

        ctl.select_files(vec![png("a.png", b"x")]).unwrap();
        assert_eq!(ctl.wait().await, SessionStatus::Succeeded);
        assert_eq!(segmenter.calls(), 5);

        let snap = ctl.snapshot();
        assert!(snap.error_message.is_none());
        let delays: Vec<Duration> = snap.attempts.iter().map(|a| a.delay_before).collect();
        assert_eq!(delays.len(), 5);
        assert!(delays.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_gateway_exhaustion_sets_gateway_message() {
        let segmenter = Arc::new(ScriptedSegmenter::new(&[], Some(Step::Gateway)));
        let mut ctl = controller(&segmenter);

        ctl.select_files(vec![png("a.png", b"x")]).unwrap();
        assert_eq!(ctl.wait().await, SessionStatus::Failed);
        assert_eq!(segmenter.calls(), 5);

        let snap = ctl.snapshot();
        assert!(snap.result.is_none());
        assert!(snap.error_message.unwrap().contains("bad gateway"));
    }

    #[tokio::test]
    async fn test_new_upload_clears_previous_result_first() {
        let segmenter = Arc::new(ScriptedSegmenter::new(&[Step::Ok, Step::Ok], None));
        let mut ctl = controller(&segmenter);

        ctl.select_files(vec![png("first.png", b"1")]).unwrap();
        assert_eq!(ctl.wait().await, SessionStatus::Succeeded);

        ctl.select_files(vec![png("second.png", b"2")]).unwrap();
        let snap = ctl.snapshot();
        assert_eq!(snap.status, SessionStatus::Uploading);
        assert!(snap.result.is_none());
        assert!(snap.error_message.is_none());
        assert_eq!(snap.file_name.as_deref(), Some("second.png"));

        assert_eq!(ctl.wait().await, SessionStatus::Succeeded);
        assert_eq!(segmenter.calls(), 2);
    }

    #[tokio::test]
    async fn test_confidence_change_requeries_same_file() {
        let segmenter = Arc::new(ScriptedSegmenter::new(&[Step::Ok], Some(Step::Gateway)));
        let mut ctl = controller(&segmenter);

        ctl.select_files(vec![png("a.png", b"same")]).unwrap();
        assert_eq!(ctl.wait().await, SessionStatus::Succeeded);

        assert!(ctl.set_confidence(ConfidenceThreshold::new(0.8).unwrap()).unwrap());
        assert_eq!(ctl.wait().await, SessionStatus::Failed);

        let seen = segmenter.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 6);
        assert!(seen[1..].iter().all(|(bytes, conf)| bytes == b"same" && conf == "0.8"));

        let snap = ctl.snapshot();
        assert!(snap.result.is_none());
        assert!(snap.error_message.is_some());
    }

    #[tokio::test]
    async fn test_confidence_change_without_file_does_nothing() {
        let segmenter = Arc::new(ScriptedSegmenter::new(&[], Some(Step::Ok)));
        let mut ctl = controller(&segmenter);

        assert!(!ctl.set_confidence(ConfidenceThreshold::new(0.3).unwrap()).unwrap());
        assert_eq!(ctl.wait().await, SessionStatus::Idle);
        assert_eq!(segmenter.calls(), 0);
        assert_eq!(ctl.snapshot().confidence.value(), 0.3);
    }

    #[tokio::test]
    async fn test_delete_resets_to_idle() {
        let segmenter = Arc::new(ScriptedSegmenter::new(&[Step::Ok], None));
        let mut ctl = controller(&segmenter);

        ctl.select_files(vec![png("a.png", b"x")]).unwrap();
        ctl.wait().await;
        let preview = ctl.snapshot().preview_path.unwrap();
        assert!(preview.exists());

        ctl.delete();
        let snap = ctl.snapshot();
        assert_eq!(snap.status, SessionStatus::Idle);
        assert!(snap.result.is_none());
        assert!(snap.error_message.is_none());
        assert!(snap.preview_path.is_none());
        assert!(snap.file_name.is_none());
        assert!(!preview.exists());
    }

    #[tokio::test]
    async fn test_delete_abandons_in_flight_request() {
        let segmenter = Arc::new(
            ScriptedSegmenter::new(&[], Some(Step::Ok)).with_delay(Duration::from_secs(30)),
        );
        let mut ctl = controller(&segmenter);

        ctl.select_files(vec![png("a.png", b"x")]).unwrap();
        tokio::task::yield_now().await;
        ctl.delete();

        assert_eq!(ctl.wait().await, SessionStatus::Idle);
        assert!(ctl.snapshot().result.is_none());
    }

    #[tokio::test]
    async fn test_busy_session_refuses_new_selection() {
        let segmenter = Arc::new(
            ScriptedSegmenter::new(&[], Some(Step::Ok)).with_delay(Duration::from_millis(50)),
        );
        let mut ctl = controller(&segmenter);

        ctl.select_files(vec![png("a.png", b"x")]).unwrap();
        let err = ctl.select_files(vec![png("b.png", b"y")]).unwrap_err();
        assert!(matches!(err, SegmentError::SessionBusy));

        assert_eq!(ctl.wait().await, SessionStatus::Succeeded);
        assert_eq!(ctl.snapshot().file_name.as_deref(), Some("a.png"));
    }

    #[tokio::test]
    async fn test_shutdown_token_abandons_cycle() {
        let segmenter = Arc::new(
            ScriptedSegmenter::new(&[], Some(Step::Ok)).with_delay(Duration::from_secs(30)),
        );
        let mut ctl = controller(&segmenter);
        let shutdown = ctl.shutdown_token();

        ctl.select_files(vec![png("a.png", b"x")]).unwrap();
        tokio::task::yield_now().await;
        shutdown.cancel();

        assert_eq!(ctl.wait().await, SessionStatus::Idle);
        assert!(ctl.snapshot().file_name.is_some());

        assert!(matches!(
            ctl.select_files(vec![png("b.png", b"y")]),
            Err(SegmentError::ShutDown)
        ));
        assert!(matches!(
            ctl.set_confidence(ConfidenceThreshold::new(0.9).unwrap()),
            Err(SegmentError::ShutDown)
        ));
        assert_eq!(ctl.snapshot().file_name.as_deref(), Some("a.png"));
    }
}
