use facepos_core::{FaceDetect, FrameSource, PositionValidator, PositionVerdict};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("capture error: {0}")]
    Capture(BoxError),
    #[error("detector error: {0}")]
    Detector(BoxError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Result of one capture → detect → evaluate pass.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub verdict: PositionVerdict,
    pub width: u32,
    pub height: u32,
    /// The still was almost entirely black (lens covered, no light).
    pub dark: bool,
}

/// Messages sent from async callers to the engine thread.
enum EngineRequest {
    Check {
        reply: oneshot::Sender<Result<CheckOutcome, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Capture a still, detect the face, and evaluate its position.
    ///
    /// Dropping the returned future discards the result; the capture itself
    /// still runs to completion on the engine thread.
    pub async fn check(&self) -> Result<CheckOutcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Check { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The source and detector are already open (models loaded once, up front).
/// `warmup_frames` stills are captured and discarded before the first request.
pub fn spawn_engine<S, D>(
    mut source: S,
    mut detector: D,
    validator: PositionValidator,
    warmup_frames: usize,
) -> Result<EngineHandle, EngineError>
where
    S: FrameSource + Send + 'static,
    D: FaceDetect + Send + 'static,
{
    if warmup_frames > 0 {
        tracing::info!(count = warmup_frames, "discarding warmup frames");
        for _ in 0..warmup_frames {
            if let Err(err) = source.capture() {
                tracing::warn!(error = %err, "warmup capture failed");
            }
        }
    }

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("facepos-engine".into())
        .spawn(move || {
            tracing::debug!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Check { reply } => {
                        let result = run_check(&mut source, &mut detector, &validator);
                        // Caller may have given up on this capture
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::debug!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

fn run_check<S: FrameSource, D: FaceDetect>(
    source: &mut S,
    detector: &mut D,
    validator: &PositionValidator,
) -> Result<CheckOutcome, EngineError> {
    let frame = source
        .capture()
        .map_err(|e| EngineError::Capture(Box::new(e)))?;

    let dark = facepos_hw::pixel::is_dark(frame.data(), facepos_hw::pixel::DARK_FRAME_RATIO);
    if dark {
        tracing::warn!("captured still is dark; check lighting or lens cover");
    }

    let detection = detector
        .detect_single(&frame)
        .map_err(|e| EngineError::Detector(Box::new(e)))?;

    let verdict = validator.evaluate(&frame, detection.as_ref());
    tracing::info!(
        positioned = verdict.positioned,
        centered = verdict.centered,
        visible = verdict.visible,
        face = detection.is_some(),
        "check complete"
    );

    Ok(CheckOutcome {
        verdict,
        width: frame.width(),
        height: frame.height(),
        dark,
    })
}
