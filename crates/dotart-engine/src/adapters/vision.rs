use dotart_contracts::attempts::GenerationAttemptResult;
use dotart_contracts::backends::BackendDescriptor;

use super::GenerationAdapter;
use crate::normalize::CanonicalImage;

/// Vision models can only describe an image, so there is no request that
/// could ever yield image bytes. Holds no transport.
pub struct VisionDescriptionAdapter {
    descriptor: BackendDescriptor,
}

impl VisionDescriptionAdapter {
    pub fn new(descriptor: BackendDescriptor) -> Self {
        Self { descriptor }
    }
}

impl GenerationAdapter for VisionDescriptionAdapter {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    fn attempt(&self, _image: &CanonicalImage) -> GenerationAttemptResult {
        GenerationAttemptResult::Unsupported
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dotart_contracts::attempts::GenerationAttemptResult;
    use dotart_contracts::backends::{BackendDescriptor, BackendKind};
    use serde_json::json;

    use crate::adapters::testing::{generated_png_base64, generation_input, RecordingTransport};
    use crate::adapters::{build_adapter, GenerationAdapter};

    #[test]
    fn vision_backend_is_unsupported_without_network_io() {
        let transport = Arc::new(RecordingTransport::responding(json!({
            "images": [generated_png_base64([9, 9, 9])]
        })));
        let adapter = build_adapter(
            BackendDescriptor::new(
                "anthropic.claude-3-haiku-20240307-v1:0",
                BackendKind::VisionDescription,
            ),
            transport.clone(),
        );
        assert!(!adapter.descriptor().generative);
        assert_eq!(
            adapter.attempt(&generation_input()),
            GenerationAttemptResult::Unsupported
        );
        assert!(transport.calls().is_empty());
    }
}
