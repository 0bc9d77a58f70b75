use core::fmt;

use esp_println::println;

use relink::session::DiagSink;

/// Mirrors the serial marker format the bench tooling greps for.
pub(crate) struct SerialDiag;

impl DiagSink for SerialDiag {
    fn tag(&mut self, key: &str, value: fmt::Arguments<'_>) {
        println!("<{key}={value}>");
    }
}
