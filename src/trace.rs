//! Reporting of visited states.
//!
//! A [`TraceSink`] is told about every node the search driver visits, with
//! the control vector and the region of the state. It cannot influence the
//! search. Sinks that report nothing should return `false` from
//! [`enabled`][TraceSink::enabled], so the driver can skip rendering
//! regions altogether.

use std::io::Write;

use log::{info, warn};

use crate::state::Region;
use crate::types::ControlVector;

pub trait TraceSink {
    /// Called once per visited node, at search depth `depth`.
    fn visit(&mut self, depth: usize, control: &ControlVector, region: &Region);

    fn enabled(&self) -> bool {
        true
    }
}

/// Reports nothing.
#[derive(Debug, Default, Copy, Clone)]
pub struct Silent;

impl TraceSink for Silent {
    fn visit(&mut self, _depth: usize, _control: &ControlVector, _region: &Region) {}

    fn enabled(&self) -> bool {
        false
    }
}

/// Reports every state through `log::info!`.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn visit(&mut self, depth: usize, control: &ControlVector, region: &Region) {
        info!("visit @{}: {} {}", depth, control, region);
    }
}

/// Writes one line per state to a writer.
///
/// Write failures are logged and counted, never propagated.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    out: W,
    failures: usize,
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, failures: 0 }
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TraceSink for WriterSink<W> {
    fn visit(&mut self, _depth: usize, control: &ControlVector, region: &Region) {
        if let Err(e) = writeln!(self.out, "{} {}", control, region) {
            self.failures += 1;
            warn!("trace sink: {}", e);
        }
    }
}

impl<F> TraceSink for F
where
    F: FnMut(usize, &ControlVector, &Region),
{
    fn visit(&mut self, depth: usize, control: &ControlVector, region: &Region) {
        self(depth, control, region)
    }
}
