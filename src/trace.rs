//! Waveform trace: the renderer interface the scheduler notifies after every
//! successful resynthesis, plus a terminal implementation.

use crate::channel::channel_letter;

/// Default trace dimensions, in character cells.
pub const DEFAULT_TRACE_WIDTH: usize = 72;
pub const DEFAULT_TRACE_HEIGHT: usize = 9;

/// Consumes a channel's left lane after every successful resynthesis.
/// Nothing is returned to the core.
pub trait TraceRenderer {
    fn render(&mut self, ordinal: usize, left: &[f32], width: usize, height: usize);
}

/// Renderer that discards every trace. Used by tests and offline paths.
pub struct NullTrace;

impl TraceRenderer for NullTrace {
    fn render(&mut self, _ordinal: usize, _left: &[f32], _width: usize, _height: usize) {}
}

/// Column min/max peak trace printed to stdout.
pub struct AsciiTrace;

impl AsciiTrace {
    /// Downsample the lane into per-column amplitude extents.
    fn columns(samples: &[f32], width: usize) -> Vec<(f32, f32)> {
        let mut columns = Vec::with_capacity(width);
        for x in 0..width {
            let start = x * samples.len() / width;
            let end = (((x + 1) * samples.len()) / width).clamp(start + 1, samples.len());
            let mut min = f32::MAX;
            let mut max = f32::MIN;
            for &sample in &samples[start..end] {
                min = min.min(sample);
                max = max.max(sample);
            }
            columns.push((min, max));
        }
        columns
    }

    /// Render the lane as a character grid, top row = +1, bottom row = -1.
    pub fn draw(samples: &[f32], width: usize, height: usize) -> String {
        if samples.is_empty() || width == 0 || height == 0 {
            return String::new();
        }
        let columns = Self::columns(samples, width);
        let mut out = String::with_capacity((width + 1) * height);
        for row in 0..height {
            let hi = 1.0 - 2.0 * row as f32 / height as f32;
            let lo = 1.0 - 2.0 * (row + 1) as f32 / height as f32;
            for &(min, max) in &columns {
                if max >= lo && min <= hi {
                    out.push('#');
                } else if row == height / 2 {
                    out.push('-');
                } else {
                    out.push(' ');
                }
            }
            out.push('\n');
        }
        out
    }
}

impl TraceRenderer for AsciiTrace {
    fn render(&mut self, ordinal: usize, left: &[f32], width: usize, height: usize) {
        println!("[{}]", channel_letter(ordinal));
        print!("{}", Self::draw(left, width, height));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_traces_as_center_line() {
        let trace = AsciiTrace::draw(&[0.0; 64], 8, 5);
        let lines: Vec<&str> = trace.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "        ");
        // Zero sits in the center row.
        assert_eq!(lines[2], "########");
        assert_eq!(lines[4], "        ");
    }

    #[test]
    fn extremes_land_on_outer_rows() {
        let mut samples = vec![1.0f32; 32];
        samples.extend(vec![-1.0f32; 32]);
        let trace = AsciiTrace::draw(&samples, 4, 5);
        let lines: Vec<&str> = trace.lines().collect();
        // +1 half in the top row, -1 half in the bottom row, neither crosses
        // the center.
        assert_eq!(lines[0], "##  ");
        assert_eq!(lines[2], "----");
        assert_eq!(lines[4], "  ##");
    }

    #[test]
    fn degenerate_dimensions_are_empty() {
        assert_eq!(AsciiTrace::draw(&[], 8, 5), "");
        assert_eq!(AsciiTrace::draw(&[0.0], 0, 5), "");
    }
}
