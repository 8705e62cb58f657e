//! fp16 → fp32 upcast at the flatbuffer level.
//!
//! Every FLOAT16 tensor's type byte is patched to FLOAT32 in place, and
//! each affected weight buffer is re-pointed at a freshly appended f32
//! vector holding the converted values. Nothing else moves, so all
//! untouched bytes of the model are preserved exactly; the superseded
//! f16 bytes stay in the file as unreferenced space, which flatbuffers
//! permit.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use half::f16;
use tracing::{debug, info};

use crate::error::{ConvertError, ConvertResult};
use crate::tflite::fb::Fb;
use crate::tflite::{field, TENSOR_TYPE_FLOAT16, TENSOR_TYPE_FLOAT32};

/// What the rewriter did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpcastOutcome {
    /// Model had no fp16 tensors; the input was copied unchanged.
    Unchanged { output: PathBuf },
    /// Model was rewritten.
    Rewritten {
        output: PathBuf,
        tensors_patched: usize,
        buffers_converted: usize,
    },
}

impl UpcastOutcome {
    pub fn output(&self) -> &Path {
        match self {
            UpcastOutcome::Unchanged { output } => output,
            UpcastOutcome::Rewritten { output, .. } => output,
        }
    }
}

/// Upcast a TFLite file; writes `<stem>.fp32.tflite` next to the input
/// unless an explicit output path is given.
pub async fn upcast_fp16_file(
    input: &Path,
    output: Option<&Path>,
) -> ConvertResult<UpcastOutcome> {
    let data = tokio::fs::read(input)
        .await
        .map_err(|_| ConvertError::FileNotFound(input.to_path_buf()))?;

    let output = output.map(Path::to_path_buf).unwrap_or_else(|| {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "model".to_string());
        input.with_file_name(format!("{stem}.fp32.tflite"))
    });

    match upcast_fp16_bytes(&data)? {
        None => {
            tokio::fs::write(&output, &data).await?;
            info!(input = %input.display(), "no fp16 tensors; copied unchanged");
            Ok(UpcastOutcome::Unchanged { output })
        }
        Some((rewritten, tensors_patched, buffers_converted)) => {
            tokio::fs::write(&output, &rewritten).await?;
            info!(
                input = %input.display(),
                output = %output.display(),
                tensors_patched,
                buffers_converted,
                "upcast fp16 model to fp32"
            );
            Ok(UpcastOutcome::Rewritten {
                output,
                tensors_patched,
                buffers_converted,
            })
        }
    }
}

/// Rewrite in memory. `None` when the model holds no fp16 tensors.
pub fn upcast_fp16_bytes(data: &[u8]) -> ConvertResult<Option<(Vec<u8>, usize, usize)>> {
    let fb = Fb::new(data);
    let model = fb.root()?;

    // Pass 1: find fp16 tensor type bytes and their buffer indices.
    let mut type_positions = Vec::new();
    let mut affected_buffers: BTreeSet<u32> = BTreeSet::new();
    if let Some(subgraphs) = fb.vector_field(model, field::MODEL_SUBGRAPHS)? {
        for sg_idx in 0..subgraphs.len {
            let subgraph = fb.vector_table(subgraphs, sg_idx)?;
            let Some(tensors) = fb.vector_field(subgraph, field::SUBGRAPH_TENSORS)? else {
                continue;
            };
            for t_idx in 0..tensors.len {
                let tensor = fb.vector_table(tensors, t_idx)?;
                let Some(type_pos) = fb.field_pos(tensor, field::TENSOR_TYPE)? else {
                    // Absent type field defaults to FLOAT32.
                    continue;
                };
                if fb.u8_at(type_pos)? == TENSOR_TYPE_FLOAT16 {
                    type_positions.push(type_pos);
                    affected_buffers.insert(fb.u32_field(tensor, field::TENSOR_BUFFER, 0)?);
                }
            }
        }
    }

    if type_positions.is_empty() {
        return Ok(None);
    }

    let mut out = data.to_vec();

    // Pass 2: patch the tensor type bytes.
    for pos in &type_positions {
        out[*pos] = TENSOR_TYPE_FLOAT32;
    }

    // Pass 3: append converted buffers and re-point their data fields.
    let buffers = fb
        .vector_field(model, field::MODEL_BUFFERS)?
        .ok_or_else(|| ConvertError::InvalidFlatbuffer("model has no buffers".to_string()))?;
    let mut buffers_converted = 0usize;
    for &buffer_index in &affected_buffers {
        if buffer_index as usize >= buffers.len {
            return Err(ConvertError::InvalidFlatbuffer(format!(
                "tensor references buffer {buffer_index} of {}",
                buffers.len
            )));
        }
        let buffer = fb.vector_table(buffers, buffer_index as usize)?;
        let Some(data_field_pos) = fb.field_pos(buffer, field::BUFFER_DATA)? else {
            // Activation tensors reference empty buffers; nothing to do.
            continue;
        };
        let vector = fb
            .vector_field(buffer, field::BUFFER_DATA)?
            .expect("field position implies vector");
        let f16_bytes = fb.vector_bytes(vector)?;
        if f16_bytes.len() % 2 != 0 {
            return Err(ConvertError::InvalidFlatbuffer(format!(
                "fp16 buffer {buffer_index} has odd length {}",
                f16_bytes.len()
            )));
        }

        // Append the f32 vector, 4-aligned, and re-point the field.
        while out.len() % 4 != 0 {
            out.push(0);
        }
        let new_vec_pos = out.len();
        let element_count = (f16_bytes.len() / 2) * 4;
        out.extend_from_slice(&(element_count as u32).to_le_bytes());
        for pair in f16_bytes.chunks_exact(2) {
            let value = f16::from_le_bytes([pair[0], pair[1]]).to_f32();
            out.extend_from_slice(&value.to_le_bytes());
        }

        let rel = (new_vec_pos - data_field_pos) as u32;
        out[data_field_pos..data_field_pos + 4].copy_from_slice(&rel.to_le_bytes());
        buffers_converted += 1;
        debug!(buffer = buffer_index, bytes = element_count, "buffer upcast");
    }

    Ok(Some((out, type_positions.len(), buffers_converted)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tflite::inspect::{buffer_f32, inspect};
    use crate::tflite::testfb::{minimal_fp16_model, minimal_fp32_model};

    /// The rewritten model parses, reports zero FLOAT16
    /// tensors, and the buffer values equal the f16 values cast to f32
    /// exactly.
    #[test]
    fn test_upcast_values_exact() {
        // 65504 is the largest finite f16.
        let values = [1.5f32, -2.25, 0.0, 65504.0];
        let bytes = minimal_fp16_model(&values);

        let (rewritten, tensors, buffers) = upcast_fp16_bytes(&bytes).unwrap().unwrap();
        assert_eq!(tensors, 1);
        assert_eq!(buffers, 1);

        let flags = inspect(&rewritten).unwrap();
        assert_eq!(flags.fp16_tensors, 0);
        assert_eq!(flags.fp32_tensors, 1);

        let converted = buffer_f32(&rewritten, 1).unwrap();
        assert_eq!(converted, values);
    }

    #[test]
    fn test_untouched_bytes_preserved() {
        let bytes = minimal_fp16_model(&[1.0, 2.0]);
        let (rewritten, ..) = upcast_fp16_bytes(&bytes).unwrap().unwrap();

        // The rewrite only grows the file.
        assert!(rewritten.len() > bytes.len());

        // Locate the patched positions: the tensor type byte and the
        // buffer data field. Everything else in the original extent is
        // byte-identical.
        let mut diffs: Vec<usize> = (0..bytes.len())
            .filter(|&i| bytes[i] != rewritten[i])
            .collect();
        // One type byte plus up to four bytes of the re-pointed offset.
        assert!(diffs.len() <= 5, "unexpected diffs: {diffs:?}");
        assert!(!diffs.is_empty());
    }

    #[test]
    fn test_fp32_model_unchanged() {
        let bytes = minimal_fp32_model(&[1.0, 2.0]);
        assert!(upcast_fp16_bytes(&bytes).unwrap().is_none());
    }

    #[test]
    fn test_subnormal_and_specials_convert_exactly() {
        let values = [
            f32::from(half::f16::MIN_POSITIVE_SUBNORMAL),
            -0.0,
            1.0 / 3.0,
        ];
        // Values are quantized to f16 by the builder; expectation is the
        // f16 value cast back up.
        let expected: Vec<f32> = values
            .iter()
            .map(|v| half::f16::from_f32(*v).to_f32())
            .collect();
        let bytes = minimal_fp16_model(&values);
        let (rewritten, ..) = upcast_fp16_bytes(&bytes).unwrap().unwrap();
        assert_eq!(buffer_f32(&rewritten, 1).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("pose.tflite");
        tokio::fs::write(&input, minimal_fp16_model(&[4.0, 8.0]))
            .await
            .unwrap();

        let outcome = upcast_fp16_file(&input, None).await.unwrap();
        let output = outcome.output().to_path_buf();
        assert!(output.ends_with("pose.fp32.tflite"));
        let flags = inspect(&tokio::fs::read(&output).await.unwrap()).unwrap();
        assert_eq!(flags.fp16_tensors, 0);
    }

    #[tokio::test]
    async fn test_missing_input_file() {
        let err = upcast_fp16_file(Path::new("/nonexistent/m.tflite"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::FileNotFound(_)));
    }
}
