use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dotart_contracts::attempts::{AttemptRecord, AttemptStatus, GenerationAttemptResult};
use dotart_contracts::backends::{BackendDescriptor, BackendRegistry};
use dotart_contracts::events::{EventPayload, EventWriter};
use dotart_contracts::runs::receipts::{ConversionPath, ConversionReceipt};
use serde_json::{json, Value};

use crate::adapters::{build_adapter, BedrockTransport, GenerationAdapter, HttpBedrockTransport};
use crate::config::EngineConfig;
use crate::error::ConvertError;
use crate::local::local_generate_canonical;
use crate::normalize::{
    decode_rgb, normalize, CanonicalImage, GENERATION_ALIGNMENT, GENERATION_SIZE,
};
use crate::reduce::{reduce, PixelArtResult};
use crate::{map_object, sha256_hex};

/// Everything a caller gets back from one conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub conversion_id: String,
    pub art: PixelArtResult,
    pub path: ConversionPath,
    pub backend: Option<String>,
    pub attempts: Vec<AttemptRecord>,
    pub input_sha256: String,
    pub input_bytes: u64,
    pub declared_content_type: Option<String>,
}

impl ConversionOutcome {
    pub fn receipt(&self) -> ConversionReceipt {
        ConversionReceipt {
            conversion_id: self.conversion_id.clone(),
            input_sha256: self.input_sha256.clone(),
            input_bytes: self.input_bytes,
            declared_content_type: self.declared_content_type.clone(),
            path: self.path,
            backend: self.backend.clone(),
            attempts: self.attempts.clone(),
            output_bytes: self.art.bytes().len() as u64,
            output_sha256: sha256_hex(self.art.bytes()),
            grid: self.art.grid(),
            palette_size: self.art.palette_size() as u64,
        }
    }
}

/// Linear conversion states. Backends are only ever visited forward.
enum State {
    Decoding,
    TryBackends {
        image: CanonicalImage,
        next: usize,
    },
    Reduce {
        image: CanonicalImage,
        next: usize,
        backend: String,
        generated: Vec<u8>,
    },
    LocalFallback {
        image: CanonicalImage,
    },
    Done {
        art: PixelArtResult,
        path: ConversionPath,
        backend: Option<String>,
    },
}

/// Owns the ordered adapter chain and runs the fallback state machine.
pub struct Orchestrator {
    adapters: Vec<Box<dyn GenerationAdapter>>,
    events: Option<EventWriter>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Orchestrator {
    pub fn new(registry: &BackendRegistry, transport: Arc<dyn BedrockTransport>) -> Self {
        let adapters = registry
            .list()
            .map(|descriptor| build_adapter(descriptor.clone(), transport.clone()))
            .collect();
        Self::from_adapters(adapters)
    }

    pub fn from_adapters(adapters: Vec<Box<dyn GenerationAdapter>>) -> Self {
        Self {
            adapters,
            events: None,
            cancel: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> anyhow::Result<Self> {
        let transport: Arc<dyn BedrockTransport> = Arc::new(HttpBedrockTransport::new(config)?);
        Ok(Self::new(&config.backend_registry(), transport))
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    /// Once the flag is set, remaining backends are abandoned and the
    /// conversion goes straight to the local fallback.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn descriptors(&self) -> Vec<&BackendDescriptor> {
        self.adapters
            .iter()
            .map(|adapter| adapter.descriptor())
            .collect()
    }

    /// The single entrypoint for callers. Rejects non-image content types up
    /// front; the decode itself remains the authoritative check.
    pub fn convert_to_pixel_art(
        &self,
        source: &[u8],
        declared_content_type: Option<&str>,
    ) -> Result<ConversionOutcome, ConvertError> {
        let declared = declared_content_type
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(content_type) = declared {
            if !content_type.to_ascii_lowercase().starts_with("image/") {
                return Err(ConvertError::InvalidImage(format!(
                    "declared content type {content_type} is not an image"
                )));
            }
        }
        self.run(source, declared.map(str::to_string))
    }

    pub fn generate(&self, source: &[u8]) -> Result<ConversionOutcome, ConvertError> {
        self.run(source, None)
    }

    fn run(
        &self,
        source: &[u8],
        declared_content_type: Option<String>,
    ) -> Result<ConversionOutcome, ConvertError> {
        let conversion_id = uuid::Uuid::new_v4().to_string();
        let input_sha256 = sha256_hex(source);
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        tracing::info!(
            conversion_id = %conversion_id,
            input_bytes = source.len(),
            backends = self.adapters.len(),
            "conversion started"
        );
        self.emit(
            "conversion_started",
            &conversion_id,
            map_object(json!({
                "input_bytes": source.len(),
                "input_sha256": input_sha256,
                "declared_content_type": declared_content_type,
                "backends": self
                    .adapters
                    .iter()
                    .map(|adapter| adapter.descriptor().id.clone())
                    .collect::<Vec<String>>(),
            })),
        );

        let mut state = State::Decoding;
        let (art, path, backend) = loop {
            state = match state {
                State::Decoding => {
                    let image = normalize(source, GENERATION_SIZE, GENERATION_SIZE)
                        .inspect_err(|err| {
                            tracing::info!(conversion_id = %conversion_id, "rejected input: {err}");
                        })?;
                    debug_assert!(image.is_aligned(GENERATION_ALIGNMENT));
                    State::TryBackends { image, next: 0 }
                }
                State::TryBackends { image, next } => {
                    self.try_backends(&conversion_id, image, next, &mut attempts)
                }
                State::Reduce {
                    image,
                    next,
                    backend,
                    generated,
                } => match decode_rgb(&generated) {
                    Ok(generated) => {
                        if let Some(last) = attempts.last() {
                            self.emit_attempt(&conversion_id, last);
                        }
                        State::Done {
                            art: reduce(&generated)?,
                            path: ConversionPath::Backend,
                            backend: Some(backend),
                        }
                    }
                    Err(err) => {
                        let reason = format!("generated image is not decodable: {err}");
                        tracing::warn!(backend = %backend, "{reason}");
                        if let Some(last) = attempts.last_mut() {
                            last.status = AttemptStatus::Failure;
                            last.reason = Some(reason);
                            self.emit_attempt(&conversion_id, last);
                        }
                        State::TryBackends { image, next }
                    }
                },
                State::LocalFallback { image } => State::Done {
                    art: local_generate_canonical(&image)?,
                    path: ConversionPath::Local,
                    backend: None,
                },
                State::Done { art, path, backend } => break (art, path, backend),
            };
        };

        tracing::info!(
            conversion_id = %conversion_id,
            path = ?path,
            backend = backend.as_deref().unwrap_or("local"),
            output_bytes = art.bytes().len(),
            "conversion finished"
        );
        self.emit(
            "conversion_finished",
            &conversion_id,
            map_object(json!({
                "path": path,
                "backend": backend,
                "output_bytes": art.bytes().len(),
                "palette_size": art.palette_size(),
            })),
        );

        Ok(ConversionOutcome {
            conversion_id,
            art,
            path,
            backend,
            attempts,
            input_sha256,
            input_bytes: source.len() as u64,
            declared_content_type,
        })
    }

    fn try_backends(
        &self,
        conversion_id: &str,
        image: CanonicalImage,
        start: usize,
        attempts: &mut Vec<AttemptRecord>,
    ) -> State {
        for (idx, adapter) in self.adapters.iter().enumerate().skip(start) {
            let descriptor = adapter.descriptor();
            if self.is_cancelled() {
                self.skip_remaining(conversion_id, idx, "cancelled", attempts);
                tracing::info!(conversion_id, "cancelled; abandoning remaining backends");
                return State::LocalFallback { image };
            }

            let started = Instant::now();
            let result = if descriptor.generative {
                adapter.attempt(&image)
            } else {
                GenerationAttemptResult::Unsupported
            };
            let record = AttemptRecord::from_result(
                &descriptor.id,
                descriptor.kind,
                &result,
                started.elapsed().as_millis() as u64,
            );
            // A success is only reported once Reduce has decoded its bytes.
            if !result.is_success() {
                self.emit_attempt(conversion_id, &record);
            }
            attempts.push(record);

            match result {
                GenerationAttemptResult::Success(generated) => {
                    tracing::info!(
                        conversion_id,
                        backend = %descriptor.id,
                        generated_bytes = generated.len(),
                        "backend produced an image"
                    );
                    return State::Reduce {
                        image,
                        next: idx + 1,
                        backend: descriptor.id.clone(),
                        generated,
                    };
                }
                GenerationAttemptResult::Unsupported => {
                    tracing::info!(
                        conversion_id,
                        backend = %descriptor.id,
                        kind = %descriptor.kind,
                        "backend cannot generate images; using local fallback"
                    );
                    self.skip_remaining(
                        conversion_id,
                        idx + 1,
                        "unsupported backend ended the chain",
                        attempts,
                    );
                    return State::LocalFallback { image };
                }
                GenerationAttemptResult::Failure(reason) => {
                    tracing::warn!(
                        conversion_id,
                        backend = %descriptor.id,
                        "backend attempt failed: {reason}"
                    );
                }
            }
        }
        tracing::info!(conversion_id, "no backend succeeded; using local fallback");
        State::LocalFallback { image }
    }

    fn skip_remaining(
        &self,
        conversion_id: &str,
        start: usize,
        reason: &str,
        attempts: &mut Vec<AttemptRecord>,
    ) {
        for adapter in self.adapters.iter().skip(start) {
            let descriptor = adapter.descriptor();
            let record = AttemptRecord {
                backend: descriptor.id.clone(),
                kind: descriptor.kind,
                status: AttemptStatus::Skipped,
                reason: Some(reason.to_string()),
                elapsed_ms: 0,
            };
            self.emit_attempt(conversion_id, &record);
            attempts.push(record);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    fn emit_attempt(&self, conversion_id: &str, record: &AttemptRecord) {
        let payload = match serde_json::to_value(record) {
            Ok(Value::Object(map)) => map,
            _ => EventPayload::new(),
        };
        self.emit("backend_attempt", conversion_id, payload);
    }

    fn emit(&self, event_type: &str, conversion_id: &str, payload: EventPayload) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = events.emit(event_type, conversion_id, payload) {
            tracing::warn!(
                path = %events.path().display(),
                "failed writing {event_type} event: {err:#}"
            );
        }
    }
}
