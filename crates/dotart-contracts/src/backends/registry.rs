use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Request shape a generation provider expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Image-to-image diffusion driven by an init image plus strength/guidance.
    Diffusion,
    /// Variation of a source image, one output per request.
    Variation,
    /// Vision model that can only describe the image; never yields image bytes.
    VisionDescription,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Diffusion => "diffusion",
            Self::Variation => "variation",
            Self::VisionDescription => "vision_description",
        }
    }

    pub fn produces_images(self) -> bool {
        !matches!(self, Self::VisionDescription)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub id: String,
    pub kind: BackendKind,
    pub generative: bool,
}

impl BackendDescriptor {
    pub fn new(id: impl Into<String>, kind: BackendKind) -> Self {
        Self {
            id: id.into(),
            kind,
            generative: kind.produces_images(),
        }
    }
}

/// Ordered, read-only list of generation providers. Insertion order is
/// attempt order.
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    backends: IndexMap<String, BackendDescriptor>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl BackendRegistry {
    pub fn new(backends: Option<IndexMap<String, BackendDescriptor>>) -> Self {
        Self {
            backends: backends.unwrap_or_else(default_backends),
        }
    }

    pub fn empty() -> Self {
        Self {
            backends: IndexMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&BackendDescriptor> {
        self.backends.get(id)
    }

    pub fn list(&self) -> impl Iterator<Item = &BackendDescriptor> {
        self.backends.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Keeps only the requested ids, in the requested order. Returns the
    /// registry plus the ids that did not match any known backend.
    pub fn reordered(&self, ids: &[String]) -> (Self, Vec<String>) {
        let mut backends = IndexMap::new();
        let mut unknown = Vec::new();
        for id in ids {
            let trimmed = id.trim();
            if trimmed.is_empty() {
                continue;
            }
            match self.backends.get(trimmed) {
                Some(descriptor) => {
                    backends
                        .entry(trimmed.to_string())
                        .or_insert_with(|| descriptor.clone());
                }
                None => unknown.push(trimmed.to_string()),
            }
        }
        (Self { backends }, unknown)
    }
}

fn default_backends() -> IndexMap<String, BackendDescriptor> {
    let mut map = IndexMap::new();
    let mut insert = |id: &str, kind: BackendKind| {
        map.insert(id.to_string(), BackendDescriptor::new(id, kind));
    };

    insert("stability.stable-diffusion-xl-v1", BackendKind::Diffusion);
    insert("amazon.titan-image-generator-v1", BackendKind::Variation);
    insert(
        "anthropic.claude-3-haiku-20240307-v1:0",
        BackendKind::VisionDescription,
    );

    map
}
