//! Structured diagnostics. Every outcome in the session is reported as a
//! `<key=value>` tag; nothing in the session path panics or propagates
//! errors upward.

use core::fmt;

pub trait DiagSink {
    fn tag(&mut self, key: &str, value: fmt::Arguments<'_>);
}

/// Sink that drops everything. Handy for quiet harness runs.
pub struct NullDiag;

impl DiagSink for NullDiag {
    fn tag(&mut self, _key: &str, _value: fmt::Arguments<'_>) {}
}

impl<T: DiagSink + ?Sized> DiagSink for &mut T {
    fn tag(&mut self, key: &str, value: fmt::Arguments<'_>) {
        (**self).tag(key, value)
    }
}
