//! Known embedding model limits and default thresholds.

/// Static info for a known embedding model
#[derive(Debug, Clone, Copy)]
pub struct EncoderInfo {
    pub name: &'static str,
    pub token_limit: usize,
    pub threshold: f32,
}

/// Default model when none is configured
pub const DEFAULT_MODEL: &str = "BAAI/bge-large-zh-v1.5";

/// Token limit assumed for models missing from the table
pub const FALLBACK_TOKEN_LIMIT: usize = 8192;

/// Score threshold assumed for models missing from the table
pub const FALLBACK_THRESHOLD: f32 = 0.7;

const KNOWN_MODELS: &[EncoderInfo] = &[
    EncoderInfo {
        name: "BAAI/bge-large-zh-v1.5",
        token_limit: 512,
        threshold: 0.7,
    },
    EncoderInfo {
        name: "BAAI/bge-base-zh-v1.5",
        token_limit: 512,
        threshold: 0.7,
    },
    EncoderInfo {
        name: "BAAI/bge-small-zh-v1.5",
        token_limit: 512,
        threshold: 0.7,
    },
    EncoderInfo {
        name: "BAAI/bge-large-en-v1.5",
        token_limit: 512,
        threshold: 0.7,
    },
    EncoderInfo {
        name: "text-embedding-ada-002",
        token_limit: 8192,
        threshold: 0.82,
    },
    EncoderInfo {
        name: "text-embedding-3-small",
        token_limit: 8192,
        threshold: 0.3,
    },
    EncoderInfo {
        name: "text-embedding-3-large",
        token_limit: 8192,
        threshold: 0.3,
    },
];

/// Look up a known model by name
pub fn encoder_info(name: &str) -> Option<EncoderInfo> {
    KNOWN_MODELS.iter().find(|m| m.name == name).copied()
}
