//! Model artifacts discovered by the scanner and shipped to the hub.

use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// On-disk model format, classified by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModelFormat {
    /// PyTorch checkpoint (`.pt` / `.pth`).
    Pt,
    /// TensorFlow Lite flatbuffer (`.tflite`).
    Tflite,
    /// ONNX graph (`.onnx`).
    Onnx,
    /// Traced TorchScript module (`.torchscript`).
    Torchscript,
}

impl ModelFormat {
    /// Classify a path by its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pt" | "pth" => Some(ModelFormat::Pt),
            "tflite" => Some(ModelFormat::Tflite),
            "onnx" => Some(ModelFormat::Onnx),
            "torchscript" => Some(ModelFormat::Torchscript),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFormat::Pt => "pt",
            ModelFormat::Tflite => "tflite",
            ModelFormat::Onnx => "onnx",
            ModelFormat::Torchscript => "torchscript",
        }
    }
}

/// Requested post-training precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuantizationHint {
    #[default]
    None,
    Int8,
    Fp16,
}

/// Element type of a model tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Dtype {
    Float32,
    Float16,
    Int8,
    Int32,
    Uint8,
}

impl Dtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dtype::Float32 => "float32",
            Dtype::Float16 => "float16",
            Dtype::Int8 => "int8",
            Dtype::Int32 => "int32",
            Dtype::Uint8 => "uint8",
        }
    }
}

/// Shape and dtype of one named input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TensorSpec {
    /// Fixed dimensions; dynamic (non-positive) dims are rejected before
    /// submission.
    pub shape: Vec<i64>,
    pub dtype: Dtype,
}

impl TensorSpec {
    pub fn new(shape: Vec<i64>, dtype: Dtype) -> Self {
        Self { shape, dtype }
    }

    /// True when every dimension is a positive constant.
    pub fn is_concrete(&self) -> bool {
        !self.shape.is_empty() && self.shape.iter().all(|&d| d > 0)
    }
}

/// Ordered named input specs for a model.
pub type InputSpec = Vec<(String, TensorSpec)>;

/// A model file the pipeline knows about.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ModelArtifact {
    pub path: PathBuf,
    pub format: ModelFormat,
    /// Declared input shapes; empty until the converter or caller fills
    /// them in.
    #[serde(default)]
    pub input_specs: InputSpec,
    #[serde(default)]
    pub quantization: QuantizationHint,
}

impl ModelArtifact {
    pub fn new(path: impl Into<PathBuf>, format: ModelFormat) -> Self {
        Self {
            path: path.into(),
            format,
            input_specs: Vec::new(),
            quantization: QuantizationHint::None,
        }
    }

    /// File stem used to derive output names.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "model".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_classification() {
        assert_eq!(
            ModelFormat::from_path(Path::new("a/pose.TFLITE")),
            Some(ModelFormat::Tflite)
        );
        assert_eq!(
            ModelFormat::from_path(Path::new("m.pth")),
            Some(ModelFormat::Pt)
        );
        assert_eq!(ModelFormat::from_path(Path::new("readme.md")), None);
        assert_eq!(ModelFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_concrete_shapes() {
        assert!(TensorSpec::new(vec![1, 3, 256, 256], Dtype::Float32).is_concrete());
        assert!(!TensorSpec::new(vec![-1, 3, 256, 256], Dtype::Float32).is_concrete());
        assert!(!TensorSpec::new(vec![], Dtype::Float32).is_concrete());
    }
}
