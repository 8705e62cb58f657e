//! Hand-rolled minimal TFLite flatbuffers for tests.
//!
//! Forward-writing builder: offset fields are written as placeholders
//! and patched once their targets are placed. All referenced data is
//! laid out after the referencing field, so every uoffset is positive;
//! vtables sit right after their tables (negative soffset).

use half::f16;

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
    // (field position, target label)
    fixups: Vec<(usize, u32)>,
    // label -> resolved position
    targets: Vec<(u32, usize)>,
}

impl Writer {
    fn pos(&self) -> usize {
        self.buf.len()
    }

    fn align(&mut self, n: usize) {
        while self.buf.len() % n != 0 {
            self.buf.push(0);
        }
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Write a uoffset placeholder pointing at `label`.
    fn offset_to(&mut self, label: u32) {
        self.fixups.push((self.pos(), label));
        self.u32(0);
    }

    /// Declare that `label` lives at the current position.
    fn here(&mut self, label: u32) {
        self.targets.push((label, self.pos()));
    }

    fn finish(mut self) -> Vec<u8> {
        for (field_pos, label) in std::mem::take(&mut self.fixups) {
            let target = self
                .targets
                .iter()
                .find(|(l, _)| *l == label)
                .map(|(_, p)| *p)
                .expect("unresolved fixup label");
            let rel = (target - field_pos) as u32;
            self.buf[field_pos..field_pos + 4].copy_from_slice(&rel.to_le_bytes());
        }
        self.buf
    }
}

// Fixup labels.
const L_ROOT: u32 = 1;
const L_SUBGRAPHS_VEC: u32 = 2;
const L_SUBGRAPH: u32 = 3;
const L_TENSORS_VEC: u32 = 4;
const L_TENSOR: u32 = 5;
const L_BUFFERS_VEC: u32 = 6;
const L_BUFFER0: u32 = 7;
const L_BUFFER1: u32 = 8;
const L_DATA_VEC: u32 = 9;

/// Build a valid TFLite flatbuffer holding exactly one fp16 weight
/// tensor (buffer 1) with the given values.
pub(crate) fn minimal_fp16_model(values: &[f32]) -> Vec<u8> {
    let data: Vec<u8> = values
        .iter()
        .flat_map(|v| f16::from_f32(*v).to_le_bytes())
        .collect();
    build_model(1, &data)
}

/// Build the same model with an fp32 tensor (no rewrite needed).
pub(crate) fn minimal_fp32_model(values: &[f32]) -> Vec<u8> {
    let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    build_model(0, &data)
}

fn build_model(tensor_type: u8, buffer1_data: &[u8]) -> Vec<u8> {
    let mut w = Writer::default();

    // Header: root offset + file identifier.
    w.offset_to(L_ROOT);
    w.buf.extend_from_slice(b"TFL3");

    // Model table: version (i32), subgraphs, buffers.
    w.align(4);
    w.here(L_ROOT);
    let model_pos = w.pos();
    w.i32(-16); // vtable sits 16 bytes after the table start
    w.i32(3); // version
    w.offset_to(L_SUBGRAPHS_VEC);
    w.offset_to(L_BUFFERS_VEC);
    debug_assert_eq!(w.pos(), model_pos + 16);
    // vtable: size 14 (5 slots), table size 16,
    // version@4, operator_codes absent, subgraphs@8, description absent,
    // buffers@12.
    w.u16(14);
    w.u16(16);
    w.u16(4);
    w.u16(0);
    w.u16(8);
    w.u16(0);
    w.u16(12);

    // subgraphs vector: one table.
    w.align(4);
    w.here(L_SUBGRAPHS_VEC);
    w.u32(1);
    w.offset_to(L_SUBGRAPH);

    // SubGraph table: tensors only.
    w.align(4);
    w.here(L_SUBGRAPH);
    w.i32(-8);
    w.offset_to(L_TENSORS_VEC);
    w.u16(6); // vtable: one slot
    w.u16(8);
    w.u16(4);
    w.align(4);
    w.here(L_TENSORS_VEC);
    w.u32(1);
    w.offset_to(L_TENSOR);

    // Tensor table: buffer (u32) then type (u8).
    w.align(4);
    w.here(L_TENSOR);
    let tensor_pos = w.pos();
    w.i32(-12);
    w.u32(1); // buffer index
    w.u8(tensor_type);
    w.u8(0);
    w.u8(0);
    w.u8(0);
    debug_assert_eq!(w.pos(), tensor_pos + 12);
    // vtable: shape absent, type@8, buffer@4.
    w.u16(10);
    w.u16(12);
    w.u16(0);
    w.u16(8);
    w.u16(4);

    // buffers vector: [empty sentinel, weights].
    w.align(4);
    w.here(L_BUFFERS_VEC);
    w.u32(2);
    w.offset_to(L_BUFFER0);
    w.offset_to(L_BUFFER1);

    // Buffer 0: no fields.
    w.align(4);
    w.here(L_BUFFER0);
    w.i32(-4);
    w.u16(4);
    w.u16(4);

    // Buffer 1: data vector.
    w.align(4);
    w.here(L_BUFFER1);
    w.i32(-8);
    w.offset_to(L_DATA_VEC);
    w.u16(6);
    w.u16(8);
    w.u16(4);
    w.align(4);
    w.here(L_DATA_VEC);
    w.u32(buffer1_data.len() as u32);
    w.buf.extend_from_slice(buffer1_data);

    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tflite::inspect::inspect;

    #[test]
    fn test_builder_emits_parseable_model() {
        let bytes = minimal_fp16_model(&[1.0, 2.0, 3.0]);
        let flags = inspect(&bytes).unwrap();
        assert_eq!(flags.tensor_count, 1);
        assert_eq!(flags.fp16_tensors, 1);
    }

    #[test]
    fn test_fp32_builder() {
        let bytes = minimal_fp32_model(&[1.0]);
        let flags = inspect(&bytes).unwrap();
        assert_eq!(flags.fp16_tensors, 0);
        assert_eq!(flags.fp32_tensors, 1);
    }
}
