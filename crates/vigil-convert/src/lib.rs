//! Model scanning and conversion.
//!
//! The scanner walks a model root and classifies files into artifacts.
//! The converters rewrite TFLite fp16 models to fp32 at the flatbuffer
//! level, drive the external TFLite→ONNX converter with structured error
//! classification, and guard TorchScript→ONNX exports against dynamic
//! shapes.

pub mod error;
pub mod onnx;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod tflite;
pub mod torch;

pub use error::{ConvertError, ConvertResult};
pub use onnx::{Conversion, ConverterConfig, TfliteConverter};
pub use report::{BatchReport, ModelOutcome, ModelReport};
pub use rules::{classify, Classification, RuleTag};
pub use scanner::scan_models;
pub use torch::{TorchExportConfig, TorchExporter};
