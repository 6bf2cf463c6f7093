use std::io::{self, BufRead, Read, Write};

use termgate_protocol::{ControlFrame, GridSize, OUTPUT_CHUNK_SIZE};

/// The two things the control plane can do to a PTY
pub trait PtyControl {
    fn write_input(&mut self, data: &[u8]) -> io::Result<()>;
    fn resize(&mut self, grid: GridSize) -> anyhow::Result<()>;
}

/// What a single control line did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Input(usize),
    Resized(GridSize),
    Ignored,
    Malformed,
}

/// Applies newline-delimited control records to a PTY, in arrival order
pub struct ControlRelay<P> {
    pty: P,
}

impl<P: PtyControl> ControlRelay<P> {
    pub fn new(pty: P) -> Self {
        Self { pty }
    }

    pub fn into_inner(self) -> P {
        self.pty
    }

    /// Apply one record. Only a failed PTY write is an error; bad records
    /// and rejected resizes are logged and skipped.
    pub fn apply_line(&mut self, line: &[u8]) -> io::Result<Applied> {
        let frame = match ControlFrame::parse_line(line) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Discarding control line: {}", e);
                return Ok(Applied::Malformed);
            }
        };

        match frame {
            ControlFrame::Input { data } => {
                self.pty.write_input(data.as_bytes())?;
                Ok(Applied::Input(data.len()))
            }
            ControlFrame::Resize { .. } => match frame.grid() {
                Some(grid) => match self.pty.resize(grid) {
                    Ok(()) => {
                        tracing::debug!(cols = grid.cols(), rows = grid.rows(), "PTY resized");
                        Ok(Applied::Resized(grid))
                    }
                    Err(e) => {
                        tracing::warn!("PTY resize to {} failed: {}", grid, e);
                        Ok(Applied::Ignored)
                    }
                },
                None => {
                    tracing::debug!("Ignoring resize without positive dimensions");
                    Ok(Applied::Ignored)
                }
            },
            ControlFrame::Unknown => Ok(Applied::Ignored),
        }
    }

    /// Consume records until EOF. Blank lines are skipped.
    pub fn run<R: BufRead>(&mut self, mut reader: R) -> io::Result<()> {
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                return Ok(());
            }
            if line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }
            self.apply_line(&line)?;
        }
    }
}

/// How the output relay finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEnd {
    /// PTY closed (shell gone)
    Eof,
    /// Whoever reads our output went away
    ReaderGone,
}

/// Copy PTY output to `sink` verbatim, flushing after every chunk
pub fn relay_output<R: Read, W: Write>(mut source: R, mut sink: W) -> OutputEnd {
    let mut buffer = vec![0u8; OUTPUT_CHUNK_SIZE];
    loop {
        let n = match source.read(&mut buffer) {
            Ok(0) => return OutputEnd::Eof,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            // Linux reports EIO on the master once the slave side is gone
            Err(_) => return OutputEnd::Eof,
        };

        let written = sink.write_all(&buffer[..n]).and_then(|_| sink.flush());
        match written {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return OutputEnd::ReaderGone,
            Err(e) => {
                tracing::warn!("Output relay write failed: {}", e);
                return OutputEnd::ReaderGone;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct RecordingPty {
        input: Vec<u8>,
        grids: Vec<GridSize>,
        fail_writes: bool,
    }

    impl PtyControl for RecordingPty {
        fn write_input(&mut self, data: &[u8]) -> io::Result<()> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pty closed"));
            }
            self.input.extend_from_slice(data);
            Ok(())
        }

        fn resize(&mut self, grid: GridSize) -> anyhow::Result<()> {
            self.grids.push(grid);
            Ok(())
        }
    }

    #[test]
    fn test_input_bytes_arrive_in_order() {
        let stream = concat!(
            r#"{"type":"input","data":"ec"}"#, "\n",
            r#"{"type":"input","data":"ho hi"}"#, "\n",
            r#"{"type":"input","data":"\r"}"#, "\n",
        );
        let mut relay = ControlRelay::new(RecordingPty::default());
        relay.run(stream.as_bytes()).unwrap();
        assert_eq!(relay.into_inner().input, b"echo hi\r".to_vec());
    }

    #[test]
    fn test_last_positive_resize_wins() {
        let stream = concat!(
            r#"{"type":"resize","cols":100,"rows":30}"#, "\n",
            r#"{"type":"resize","cols":0,"rows":30}"#, "\n",
            r#"{"type":"resize","cols":120,"rows":40}"#, "\n",
            r#"{"type":"resize","cols":-1,"rows":-1}"#, "\n",
            r#"{"type":"resize"}"#, "\n",
        );
        let mut relay = ControlRelay::new(RecordingPty::default());
        relay.run(stream.as_bytes()).unwrap();
        let pty = relay.into_inner();
        assert_eq!(
            pty.grids,
            vec![GridSize::new(100, 30).unwrap(), GridSize::new(120, 40).unwrap()]
        );
    }

    #[test]
    fn test_malformed_and_unknown_lines_do_not_stop_the_relay() {
        let stream = concat!(
            "not json\n",
            "\n",
            "   \n",
            r#"{"type":"bell"}"#, "\n",
            r#"{"type":"input","data":"ls\n"}"#, "\n",
        );
        let mut relay = ControlRelay::new(RecordingPty::default());
        relay.run(stream.as_bytes()).unwrap();
        assert_eq!(relay.into_inner().input, b"ls\n".to_vec());
    }

    #[test]
    fn test_apply_line_reports_outcome() {
        let mut relay = ControlRelay::new(RecordingPty::default());
        assert_eq!(relay.apply_line(b"{oops").unwrap(), Applied::Malformed);
        assert_eq!(
            relay.apply_line(br#"{"type":"input","data":"abc"}"#).unwrap(),
            Applied::Input(3)
        );
        assert_eq!(
            relay.apply_line(br#"{"type":"resize","cols":10,"rows":5}"#).unwrap(),
            Applied::Resized(GridSize::new(10, 5).unwrap())
        );
    }

    #[test]
    fn test_pty_write_failure_ends_the_relay() {
        let pty = RecordingPty {
            fail_writes: true,
            ..Default::default()
        };
        let mut relay = ControlRelay::new(pty);
        let stream = concat!(r#"{"type":"input","data":"x"}"#, "\n");
        assert!(relay.run(stream.as_bytes()).is_err());
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_output_relay_copies_verbatim() {
        let source: &[u8] = b"\x1b[32mhello\x1b[0m\r\n";
        let mut sink = Vec::new();
        assert_eq!(relay_output(source, &mut sink), OutputEnd::Eof);
        assert_eq!(sink, source.to_vec());
    }

    #[test]
    fn test_output_relay_detects_broken_pipe() {
        let source: &[u8] = b"data";
        assert_eq!(relay_output(source, ClosedPipe), OutputEnd::ReaderGone);
    }
}
