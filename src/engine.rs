//! Synthesis engine: drives one channel's compiled program across its buffer.
//!
//! Rendering is pure with respect to the channel table: the engine reads the
//! output registry and returns a freshly rendered buffer; the scheduler swaps
//! it into the table only on success, so a faulting run never disturbs the
//! channel's last completed output.

use crate::channel::{StereoBuffer, MAX_CHANNELS};
use crate::generator::{run_program, Frame, GeneratorContext, RuntimeFault};
use crate::script::Program;
use crate::timing::DEFAULT_SAMPLE_RATE;

/// Engine parameters shared by every synthesis run.
///
/// `block_size` unifies the two execution granularities: 1 is
/// sample-accurate, larger values compute fold times and registers once per
/// block of contiguous samples - a throughput/resolution tradeoff, not a
/// different opcode set.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub block_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: 1,
        }
    }
}

/// Render `len` samples of one channel.
///
/// `outputs` is the cross-channel registry in ordinal order; each step reads
/// every other channel's buffer at `n mod len` into that channel's register.
/// This is an unsynchronized snapshot: a neighbor not yet recomputed in the
/// current scheduling pass contributes stale data from its previous run. The
/// synthesizing channel's own register stays zero, matching a read of its
/// not-yet-written output at the current position.
///
/// On a fault the partial render is abandoned and the fault returned; the
/// caller decides what the channel keeps.
pub fn render_channel(
    ordinal: usize,
    program: &Program,
    len: usize,
    tempo_coefficient: f64,
    config: &EngineConfig,
    outputs: &[&StereoBuffer],
) -> Result<StereoBuffer, RuntimeFault> {
    let mut out = StereoBuffer::zeroed(len);
    let mut ctx = GeneratorContext::new(
        config.sample_rate as f64,
        tempo_coefficient,
        outputs.len(),
    );
    let block = config.block_size.max(1);

    let mut n = 0;
    while n < len {
        ctx.begin_step(n);
        for (i, buffer) in outputs.iter().enumerate().take(MAX_CHANNELS) {
            ctx.registers[i] = if i == ordinal || buffer.is_empty() {
                Frame::default()
            } else {
                let at = n % buffer.len();
                Frame {
                    left: buffer.left[at] as f64,
                    right: buffer.right[at] as f64,
                }
            };
        }

        let mut frame = Frame::default();
        run_program(program, &mut ctx, &mut frame)?;
        if !frame.left.is_finite() || !frame.right.is_finite() {
            return Err(RuntimeFault::NonFinite { position: n });
        }

        let end = (n + block).min(len);
        for i in n..end {
            out.left[i] = frame.left as f32;
            out.right[i] = frame.right as f32;
        }
        n = end;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::compile;

    #[test]
    fn renders_are_deterministic() {
        let program = compile("mod(1/4);sin(3);mul(.5)").unwrap();
        let neighbor = StereoBuffer::zeroed(100);
        let config = EngineConfig::default();
        let first = render_channel(0, &program, 1_000, 2.0, &config, &[&neighbor]).unwrap();
        let second = render_channel(0, &program, 1_000, 2.0, &config, &[&neighbor]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn neighbor_reads_wrap_modulo_length() {
        // Channel B copies A; A's buffer is shorter than B's.
        let mut a = StereoBuffer::zeroed(3);
        a.left.copy_from_slice(&[1.0, 2.0, 3.0]);
        a.right.copy_from_slice(&[1.0, 2.0, 3.0]);
        let b_prev = StereoBuffer::zeroed(0);
        let program = compile("set(A.L)").unwrap();
        let config = EngineConfig::default();
        let b = render_channel(1, &program, 7, 2.0, &config, &[&a, &b_prev]).unwrap();
        assert_eq!(b.left, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn self_register_reads_zero() {
        let program = compile("set(A.L + 1)").unwrap();
        let prev = StereoBuffer {
            left: vec![0.5; 4],
            right: vec![0.5; 4],
        };
        let config = EngineConfig::default();
        let out = render_channel(0, &program, 4, 2.0, &config, &[&prev]).unwrap();
        assert_eq!(out.left, vec![1.0; 4]);
    }

    #[test]
    fn division_blowup_faults_with_position() {
        // 1 / bt-derived zero at the first step.
        let program = compile("set(1 / A.L)").unwrap();
        let a = StereoBuffer::zeroed(4);
        let config = EngineConfig::default();
        let fault = render_channel(1, &program, 4, 2.0, &config, &[&a, &a]).unwrap_err();
        assert_eq!(fault, RuntimeFault::NonFinite { position: 0 });
    }

    #[test]
    fn block_mode_holds_values_per_block() {
        let program = compile("mod(1);sin(5)").unwrap();
        let sample_accurate = EngineConfig {
            sample_rate: 48_000,
            block_size: 1,
        };
        let control_rate = EngineConfig {
            sample_rate: 48_000,
            block_size: 64,
        };
        let fine = render_channel(0, &program, 4_096, 2.0, &sample_accurate, &[]).unwrap();
        let coarse = render_channel(0, &program, 4_096, 2.0, &control_rate, &[]).unwrap();
        for block_start in (0..4_096).step_by(64) {
            // Block value equals the sample-accurate value at the block start,
            // held for the whole block.
            for i in block_start..block_start + 64 {
                assert_eq!(coarse.left[i], fine.left[block_start]);
            }
        }
    }
}
