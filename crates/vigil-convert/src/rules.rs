//! Converter error classification.
//!
//! Raw converter logs are matched against a rule table; the first hit
//! names the root cause and the remediation. When no rule matches, the
//! pre-analysis flags of the input model decide the attribution before
//! falling back to `Unknown`.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tflite::ModelFlags;

/// Stable tags for conversion failure causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTag {
    Fp16DtypeNotSupported,
    SelectTfOpsOrFlex,
    UnknownCustomOp,
    ShapeInference,
    Unknown,
}

impl RuleTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleTag::Fp16DtypeNotSupported => "fp16_dtype_not_supported",
            RuleTag::SelectTfOpsOrFlex => "select_tf_ops_or_flex",
            RuleTag::UnknownCustomOp => "unknown_custom_op",
            RuleTag::ShapeInference => "shape_inference",
            RuleTag::Unknown => "unknown",
        }
    }

    /// Only the fp16 cause is retried (after the fp32 upcast).
    pub fn retry_with_upcast(&self) -> bool {
        matches!(self, RuleTag::Fp16DtypeNotSupported)
    }
}

/// A classified conversion failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub tag: RuleTag,
    pub root_cause: String,
    pub remediation: String,
    /// Tail of the converter log, preserved for diagnostics.
    pub log_tail: String,
}

struct Rule {
    tag: RuleTag,
    pattern: Regex,
    root_cause: &'static str,
    remediation: &'static str,
}

fn rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            Rule {
                tag: RuleTag::Fp16DtypeNotSupported,
                pattern: Regex::new(r"(?i)(float16|fp16).*(not\s+supported|unsupported|cannot|fail)")
                    .expect("fp16 rule regex"),
                root_cause: "model holds float16 tensors the converter cannot map",
                remediation: "upcast the TFLite model to float32 and retry",
            },
            Rule {
                tag: RuleTag::SelectTfOpsOrFlex,
                pattern: Regex::new(r"(?i)(select[_ ]?tf[_ ]?ops|flex)")
                    .expect("flex rule regex"),
                root_cause: "model uses Select TF Ops / Flex operators with no ONNX mapping",
                remediation: "rewrite the offending subgraph or deploy the TFLite model directly",
            },
            Rule {
                tag: RuleTag::ShapeInference,
                pattern: Regex::new(r"(?i)(shape inference|dim\b.*mismatch|dimension.*mismatch)")
                    .expect("shape rule regex"),
                root_cause: "shape inference failed; the graph likely carries dynamic dimensions",
                remediation: "fix the input shape to static dimensions before converting",
            },
            Rule {
                tag: RuleTag::UnknownCustomOp,
                pattern: Regex::new(r"(?i)(custom op|unknown op|unsupported op|delegate)")
                    .expect("custom-op rule regex"),
                root_cause: "the converter does not recognize a custom or delegated operator",
                remediation: "replace the operator with an equivalent ONNX-expressible subgraph",
            },
        ]
    })
}

const LOG_TAIL_BYTES: usize = 1_200;

fn tail(log: &str) -> String {
    if log.len() <= LOG_TAIL_BYTES {
        return log.to_string();
    }
    let start = log.len() - LOG_TAIL_BYTES;
    // Stay on a char boundary.
    let start = (start..log.len()).find(|&i| log.is_char_boundary(i)).unwrap_or(start);
    log[start..].to_string()
}

/// Classify a converter failure log.
///
/// `flags` is the pre-analysis of the input model; it attributes
/// failures whose log matches no rule.
pub fn classify(log: &str, flags: &ModelFlags) -> Classification {
    for rule in rules() {
        if rule.pattern.is_match(log) {
            return Classification {
                tag: rule.tag,
                root_cause: rule.root_cause.to_string(),
                remediation: rule.remediation.to_string(),
                log_tail: tail(log),
            };
        }
    }

    if flags.fp16_tensors > 0 {
        return Classification {
            tag: RuleTag::Fp16DtypeNotSupported,
            root_cause: "converter log is inconclusive, but the model is float16".to_string(),
            remediation: "upcast the TFLite model to float32 and retry".to_string(),
            log_tail: tail(log),
        };
    }
    if flags.has_flex_ops || !flags.custom_ops.is_empty() {
        return Classification {
            tag: RuleTag::UnknownCustomOp,
            root_cause: "converter log is inconclusive; the model carries custom operators"
                .to_string(),
            remediation: "replace the operator with an equivalent ONNX-expressible subgraph"
                .to_string(),
            log_tail: tail(log),
        };
    }

    Classification {
        tag: RuleTag::Unknown,
        root_cause: "converter reported a generic failure".to_string(),
        remediation: "inspect the converter log and the model structure".to_string(),
        log_tail: tail(log),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_flags() -> ModelFlags {
        ModelFlags::default()
    }

    #[test]
    fn test_fp16_rule() {
        let c = classify("ValueError: FLOAT16 is not supported by this op", &no_flags());
        assert_eq!(c.tag, RuleTag::Fp16DtypeNotSupported);
        assert!(c.tag.retry_with_upcast());
    }

    #[test]
    fn test_flex_rule_no_retry() {
        let c = classify("Op is part of Select TF Ops, cannot convert", &no_flags());
        assert_eq!(c.tag, RuleTag::SelectTfOpsOrFlex);
        assert!(!c.tag.retry_with_upcast());
    }

    #[test]
    fn test_shape_rule_beats_custom_rule() {
        // A log mentioning both shape inference and an op name classifies
        // as shape inference (rule order).
        let c = classify("shape inference failed for unsupported op DENSIFY", &no_flags());
        assert_eq!(c.tag, RuleTag::ShapeInference);
    }

    #[test]
    fn test_custom_op_rule() {
        let c = classify("encountered unknown op: DENSIFY", &no_flags());
        assert_eq!(c.tag, RuleTag::UnknownCustomOp);
    }

    #[test]
    fn test_flag_attribution_when_log_useless() {
        let mut flags = ModelFlags::default();
        flags.fp16_tensors = 3;
        let c = classify("exited with status 1", &flags);
        assert_eq!(c.tag, RuleTag::Fp16DtypeNotSupported);
    }

    #[test]
    fn test_unknown_keeps_log_tail() {
        let long_log = "x".repeat(5_000);
        let c = classify(&long_log, &no_flags());
        assert_eq!(c.tag, RuleTag::Unknown);
        assert_eq!(c.log_tail.len(), 1_200);
    }
}
