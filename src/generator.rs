//! Opcode execution against the per-run generator context.
//!
//! The context is transient: created fresh for each synthesis run, positioned
//! at each step by the engine, and discarded afterward. Compiled programs are
//! plain opcode lists with no loops, so a run over one step always terminates.

use crate::channel::{channel_letter, MAX_CHANNELS};
use crate::script::{Expr, Lane, Op, Program};
use crate::timing;
use std::f64::consts::TAU;
use thiserror::Error;

/// One stereo value pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frame {
    pub left: f64,
    pub right: f64,
}

/// Error raised while a compiled program executes against a step.
///
/// Caught at the per-channel synthesis boundary; the faulting run's partial
/// output is discarded and the channel keeps its last completed buffer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeFault {
    #[error("script references channel {0} which does not exist yet")]
    UnknownChannel(char),
    #[error("non-finite sample value at position {position}")]
    NonFinite { position: usize },
}

/// Ephemeral per-run state: step position, fold times, and one read-only
/// register pair per channel holding that channel's output at the current
/// position. Does not outlive one synthesis run.
pub struct GeneratorContext {
    sample_rate: f64,
    tempo_coefficient: f64,
    channel_count: usize,
    n: usize,
    fold_period: f64,
    rt: f64,
    bt: f64,
    pub registers: [Frame; MAX_CHANNELS],
}

impl GeneratorContext {
    pub fn new(sample_rate: f64, tempo_coefficient: f64, channel_count: usize) -> Self {
        Self {
            sample_rate,
            tempo_coefficient,
            channel_count: channel_count.min(MAX_CHANNELS),
            n: 0,
            fold_period: f64::INFINITY,
            rt: 0.0,
            bt: 0.0,
            registers: [Frame::default(); MAX_CHANNELS],
        }
    }

    /// Position the context at step `n`. The fold period resets to infinite
    /// at the start of every step, under which both folds are identity.
    pub fn begin_step(&mut self, n: usize) {
        self.n = n;
        self.set_fold_period(f64::INFINITY);
    }

    fn set_fold_period(&mut self, period: f64) {
        let t = self.n as f64 / self.sample_rate;
        self.fold_period = period;
        self.rt = timing::fold(t, period);
        self.bt = timing::bar_fold(t, period, self.tempo_coefficient);
    }

    /// Active fold period: infinite outside any `mod` call.
    pub fn fold_period(&self) -> f64 {
        self.fold_period
    }

    /// Wall-clock folded time.
    pub fn rt(&self) -> f64 {
        self.rt
    }

    /// Bar-time folded time.
    pub fn bt(&self) -> f64 {
        self.bt
    }
}

/// Run a compiled program once against the current step, shaping `frame`.
pub fn run_program(
    program: &Program,
    ctx: &mut GeneratorContext,
    frame: &mut Frame,
) -> Result<(), RuntimeFault> {
    for op in &program.ops {
        match op {
            Op::Mod(period) => {
                let period = eval(period, ctx)?;
                ctx.set_fold_period(period);
            }
            Op::Sin { freq, phase } => {
                let freq = eval(freq, ctx)?;
                let phase = eval(phase, ctx)?;
                let value = (ctx.bt * freq * TAU + phase).sin();
                frame.left = value;
                frame.right = value;
            }
            Op::Set(value) => {
                let value = eval(value, ctx)?;
                frame.left = value;
                frame.right = value;
            }
            Op::Mul(value) => {
                let value = eval(value, ctx)?;
                frame.left *= value;
                frame.right *= value;
            }
            Op::Exp(amount) => {
                let amount = eval(amount, ctx)?;
                let decay = (-ctx.bt * amount * 2.0).exp();
                frame.left *= decay;
                frame.right *= decay;
            }
            Op::Pow(amount) => {
                let amount = eval(amount, ctx)?;
                frame.left = frame.left.powf(amount);
                frame.right = frame.right.powf(amount);
            }
        }
    }
    Ok(())
}

fn eval(expr: &Expr, ctx: &GeneratorContext) -> Result<f64, RuntimeFault> {
    Ok(match expr {
        Expr::Number(value) => *value,
        Expr::Register { channel, lane } => {
            if *channel >= ctx.channel_count {
                return Err(RuntimeFault::UnknownChannel(channel_letter(*channel)));
            }
            let frame = ctx.registers[*channel];
            match lane {
                Lane::Left => frame.left,
                Lane::Right => frame.right,
            }
        }
        Expr::Neg(inner) => -eval(inner, ctx)?,
        Expr::Add(lhs, rhs) => eval(lhs, ctx)? + eval(rhs, ctx)?,
        Expr::Sub(lhs, rhs) => eval(lhs, ctx)? - eval(rhs, ctx)?,
        Expr::Mul(lhs, rhs) => eval(lhs, ctx)? * eval(rhs, ctx)?,
        Expr::Div(lhs, rhs) => eval(lhs, ctx)? / eval(rhs, ctx)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::compile;

    fn step(ctx: &mut GeneratorContext, program: &Program, n: usize) -> Frame {
        ctx.begin_step(n);
        let mut frame = Frame::default();
        run_program(program, ctx, &mut frame).unwrap();
        frame
    }

    #[test]
    fn fold_defaults_to_identity() {
        let mut ctx = GeneratorContext::new(48_000.0, 2.0, 1);
        ctx.begin_step(72_000);
        assert_eq!(ctx.rt(), 1.5);
        assert_eq!(ctx.bt(), 1.5);
    }

    #[test]
    fn mod_rekeys_bar_time() {
        let program = compile("mod(1/4)").unwrap();
        let mut ctx = GeneratorContext::new(48_000.0, 2.0, 1);
        // 0.6 s with a quarter fold at coefficient 2: bt wraps every 0.5 s.
        let _ = step(&mut ctx, &program, 28_800);
        assert_eq!(ctx.fold_period(), 0.25);
        assert!((ctx.rt() - 0.1).abs() < 1e-12);
        assert!((ctx.bt() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn opcode_chain_shapes_frame() {
        let program = compile("set(1);exp(12);mul(.8)").unwrap();
        let mut ctx = GeneratorContext::new(48_000.0, 2.0, 1);
        let frame = step(&mut ctx, &program, 0);
        assert_eq!(frame.left, 0.8);
        assert_eq!(frame.right, 0.8);
    }

    #[test]
    fn register_read_uses_lane() {
        let program = compile("set(B.R)").unwrap();
        let mut ctx = GeneratorContext::new(48_000.0, 2.0, 2);
        ctx.registers[1] = Frame {
            left: 0.25,
            right: -0.5,
        };
        let frame = step(&mut ctx, &program, 0);
        assert_eq!(frame.left, -0.5);
    }

    #[test]
    fn missing_channel_is_a_fault() {
        let program = compile("set(Q.L)").unwrap();
        let mut ctx = GeneratorContext::new(48_000.0, 2.0, 2);
        ctx.begin_step(0);
        let mut frame = Frame::default();
        assert_eq!(
            run_program(&program, &mut ctx, &mut frame),
            Err(RuntimeFault::UnknownChannel('Q'))
        );
    }
}
