use std::io::BufWriter;
use std::io::Cursor;
use std::io::Write;

/// A sink that is either a real output stream or an in-memory buffer.
/// Tests use the buffered flavor to capture everything the tools print.
enum Sink {
    Buffer(Cursor<Vec<u8>>),
    Stream(BufWriter<Box<dyn Write>>),
}

impl Sink {
    fn write_str(&mut self, msg: &str) {
        match self {
            Sink::Buffer(inner) => inner
                .write_all(msg.as_bytes())
                .expect("Failed to write to in-memory buffer."),
            Sink::Stream(inner) => inner
                .write_all(msg.as_bytes())
                .expect("Failed to write to output stream."),
        }
    }

    fn flush(&mut self) {
        if let Sink::Stream(inner) = self {
            inner.flush().expect("Failed to flush output stream.");
        }
    }

    fn contents(&self) -> Option<String> {
        match self {
            Sink::Buffer(inner) => Some(
                core::str::from_utf8(inner.get_ref())
                    .expect("Output is not valid utf-8.")
                    .to_owned(),
            ),
            Sink::Stream(_) => None,
        }
    }
}

/// All user visible output of the tools goes through this type: regular
/// output, diagnostics from the analysis, and errors from the frontend.
/// Keeping the channels together makes it possible to check the complete
/// output of a run in tests.
pub struct DiagnosticEmitter {
    out: Sink,
    err: Sink,
}

impl DiagnosticEmitter {
    pub fn new(out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self {
            out: Sink::Stream(BufWriter::new(out)),
            err: Sink::Stream(BufWriter::new(err)),
        }
    }

    /// Capture all output in memory, see [`DiagnosticEmitter::out_buffer`]
    /// and [`DiagnosticEmitter::err_buffer`].
    pub fn log_to_buffer() -> Self {
        Self {
            out: Sink::Buffer(Cursor::new(Vec::new())),
            err: Sink::Buffer(Cursor::new(Vec::new())),
        }
    }

    pub fn out(&mut self, msg: &str) {
        self.out.write_str(msg);
    }

    pub fn out_ln(&mut self, msg: &str) {
        self.out(msg);
        self.out("\n");
    }

    pub fn err(&mut self, msg: &str) {
        self.err.write_str(msg);
    }

    pub fn err_ln(&mut self, msg: &str) {
        self.err(msg);
        self.err("\n");
    }

    /// Report a frontend error tied to a source line. Frontend errors are
    /// hard failures, unlike the diagnostics computed by the analysis.
    pub fn error(&mut self, line: u32, message: &str) {
        self.report(line, "", message);
    }

    pub fn report(&mut self, line: u32, item: &str, message: &str) {
        self.err(&format!("[line {line}] Error {item}: {message}\n"));
    }

    pub fn out_buffer(&self) -> Option<String> {
        self.out.contents()
    }

    pub fn err_buffer(&self) -> Option<String> {
        self.err.contents()
    }

    pub fn flush(&mut self) {
        self.out.flush();
        self.err.flush();
    }
}

impl Drop for DiagnosticEmitter {
    fn drop(&mut self) {
        self.flush();
    }
}
