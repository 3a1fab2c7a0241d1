pub mod client;
pub mod err;
pub mod upload;
pub mod wire;

// Used unless --endpoint / $HF_ENDPOINT says otherwise
pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

// The hub sniffs this many leading bytes to decide between regular and LFS storage
pub const SAMPLE_SIZE: usize = 512;

// Files per preupload request
pub const PREUPLOAD_CHUNK: usize = 256;

// Objects per LFS batch request
pub const LFS_BATCH_CHUNK: usize = 256;
