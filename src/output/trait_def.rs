use std::io;

/// Destination for report lines.
///
/// Receives one complete line per call, without a line terminator.
pub trait LineSink {
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

/// Collects lines in memory
impl LineSink for Vec<String> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.push(line.to_string());
        Ok(())
    }
}
