//! TFLite flatbuffer handling.
//!
//! A minimal reader over the TFLite schema subset the pipeline needs
//! (model → subgraphs → tensors, buffers, operator codes), the model
//! inspection used for conversion pre-analysis, and the fp16→fp32
//! upcast rewriter.

pub mod fb;
pub mod inspect;
pub mod upcast;

#[cfg(test)]
pub(crate) mod testfb;

pub use inspect::{buffer_f32, inspect, ModelFlags, TensorSummary};
pub use upcast::{upcast_fp16_bytes, upcast_fp16_file, UpcastOutcome};

/// TFLite `TensorType` values the rewriter cares about.
pub const TENSOR_TYPE_FLOAT32: u8 = 0;
pub const TENSOR_TYPE_FLOAT16: u8 = 1;

/// Field ids (per the TFLite schema).
pub(crate) mod field {
    // Model
    pub const MODEL_VERSION: u16 = 0;
    pub const MODEL_OPERATOR_CODES: u16 = 1;
    pub const MODEL_SUBGRAPHS: u16 = 2;
    pub const MODEL_BUFFERS: u16 = 4;
    // SubGraph
    pub const SUBGRAPH_TENSORS: u16 = 0;
    // Tensor
    pub const TENSOR_TYPE: u16 = 1;
    pub const TENSOR_BUFFER: u16 = 2;
    // Buffer
    pub const BUFFER_DATA: u16 = 0;
    // OperatorCode
    pub const OPERATOR_CODE_CUSTOM_CODE: u16 = 1;
}
