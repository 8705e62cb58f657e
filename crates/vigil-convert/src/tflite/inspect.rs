//! TFLite model inspection (conversion pre-analysis).

use serde::{Deserialize, Serialize};

use crate::error::ConvertResult;
use crate::tflite::fb::Fb;
use crate::tflite::{field, TENSOR_TYPE_FLOAT16, TENSOR_TYPE_FLOAT32};

/// Per-tensor summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorSummary {
    pub subgraph: usize,
    pub index: usize,
    pub tensor_type: u8,
    pub buffer: u32,
}

/// Risk flags and counts from a parsed model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelFlags {
    pub version: i32,
    pub tensor_count: usize,
    pub fp16_tensors: usize,
    pub fp32_tensors: usize,
    /// Custom operator code names, when present.
    pub custom_ops: Vec<String>,
    /// Any custom op name mentions Flex / Select-TF.
    pub has_flex_ops: bool,
    /// Tensors, in order, for callers that need the full list.
    #[serde(skip)]
    pub tensors: Vec<TensorSummary>,
}

impl ModelFlags {
    pub fn is_fp16(&self) -> bool {
        self.fp16_tensors > 0
    }
}

/// Parse a TFLite flatbuffer and summarize it.
///
/// Succeeding here is also the validity check used after rewrites.
pub fn inspect(data: &[u8]) -> ConvertResult<ModelFlags> {
    let fb = Fb::new(data);
    let model = fb.root()?;

    let mut flags = ModelFlags {
        version: fb.i32_field(model, field::MODEL_VERSION, 0)?,
        ..Default::default()
    };

    if let Some(subgraphs) = fb.vector_field(model, field::MODEL_SUBGRAPHS)? {
        for sg_idx in 0..subgraphs.len {
            let subgraph = fb.vector_table(subgraphs, sg_idx)?;
            let Some(tensors) = fb.vector_field(subgraph, field::SUBGRAPH_TENSORS)? else {
                continue;
            };
            for t_idx in 0..tensors.len {
                let tensor = fb.vector_table(tensors, t_idx)?;
                let tensor_type = fb.u8_field(tensor, field::TENSOR_TYPE, TENSOR_TYPE_FLOAT32)?;
                let buffer = fb.u32_field(tensor, field::TENSOR_BUFFER, 0)?;
                flags.tensor_count += 1;
                match tensor_type {
                    TENSOR_TYPE_FLOAT16 => flags.fp16_tensors += 1,
                    TENSOR_TYPE_FLOAT32 => flags.fp32_tensors += 1,
                    _ => {}
                }
                flags.tensors.push(TensorSummary {
                    subgraph: sg_idx,
                    index: t_idx,
                    tensor_type,
                    buffer,
                });
            }
        }
    }

    if let Some(opcodes) = fb.vector_field(model, field::MODEL_OPERATOR_CODES)? {
        for idx in 0..opcodes.len {
            let opcode = fb.vector_table(opcodes, idx)?;
            if let Some(name) = fb.string_field(opcode, field::OPERATOR_CODE_CUSTOM_CODE)? {
                let lowered = name.to_lowercase();
                if lowered.contains("flex") || lowered.contains("select") {
                    flags.has_flex_ops = true;
                }
                flags.custom_ops.push(name);
            }
        }
    }

    Ok(flags)
}

/// Read a buffer's contents as little-endian f32 values.
pub fn buffer_f32(data: &[u8], buffer_index: u32) -> ConvertResult<Vec<f32>> {
    let fb = Fb::new(data);
    let model = fb.root()?;
    let buffers = fb
        .vector_field(model, field::MODEL_BUFFERS)?
        .ok_or_else(|| crate::error::ConvertError::InvalidFlatbuffer("no buffers".to_string()))?;
    let buffer = fb.vector_table(buffers, buffer_index as usize)?;
    let Some(contents) = fb.vector_field(buffer, field::BUFFER_DATA)? else {
        return Ok(Vec::new());
    };
    let bytes = fb.vector_bytes(contents)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tflite::testfb::minimal_fp16_model;

    #[test]
    fn test_inspect_counts_fp16() {
        let bytes = minimal_fp16_model(&[1.5, -2.25]);
        let flags = inspect(&bytes).unwrap();
        assert_eq!(flags.version, 3);
        assert_eq!(flags.tensor_count, 1);
        assert_eq!(flags.fp16_tensors, 1);
        assert!(flags.is_fp16());
        assert!(flags.custom_ops.is_empty());
    }

    #[test]
    fn test_inspect_rejects_garbage() {
        assert!(inspect(&[0u8; 16]).is_err());
        assert!(inspect(b"not a flatbuffer at all").is_err());
    }
}
