use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use log::{debug, info, trace, warn};

use crate::config::FIELD_COUNT;
use crate::reading::{Reading, ReadingTable};

/// The board starts streaming once it receives the sample count as plain decimal text.
pub fn encode_command(count: usize) -> String {
    count.to_string()
}

/// Reads up to the next `\n`, giving up once `timeout` has passed.
///
/// The timeout covers the whole line, not each byte. Running out of time, a
/// read timeout or end of stream ends the line early and returns whatever
/// arrived so far, which may be nothing. A trailing `\r` is dropped.
pub fn read_line<R: Read>(port: &mut R, timeout: Duration) -> Result<String> {
    let deadline = Instant::now() + timeout;
    let mut buffer = Vec::new();
    let mut byte = [0u8; 1];

    while Instant::now() < deadline {
        match port.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                if byte[0] == b'\n' {
                    break;
                }
                buffer.push(byte[0]);
            }
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => break,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("Failed to read from serial port"),
        }
    }

    if buffer.last() == Some(&b'\r') {
        buffer.pop();
    }

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Splits a line on commas and parses each field as a float.
///
/// Parsing stops at the first field that is not a number, so `"1,2,x,4"`
/// yields `[1.0, 2.0]`. Blank lines yield nothing.
pub fn parse_fields(line: &str) -> Vec<f64> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }

    line.split(',')
        .map(str::trim)
        .map_while(|field| field.parse::<f64>().ok())
        .collect()
}

/// One acquisition run over an exclusively owned port.
///
/// `new` leaves the session idle, `request` sends the command and
/// `read_samples` performs the reads. `close` consumes the session, so a
/// closed port cannot be read again.
pub struct Session<P: Read + Write> {
    dev: P,
    line_timeout: Duration,
    requested: Option<usize>,
}

impl<P: Read + Write> Session<P> {
    pub fn new(dev: P, line_timeout: Duration) -> Self {
        Session {
            dev,
            line_timeout,
            requested: None,
        }
    }

    pub fn request(&mut self, count: usize) -> Result<()> {
        let command = encode_command(count);
        debug!("Requesting {count} samples");

        self.dev
            .write_all(command.as_bytes())
            .context("Failed to send sample count")?;
        self.dev.flush().context("Failed to flush serial port")?;

        self.requested = Some(count);
        Ok(())
    }

    /// Performs exactly as many line reads as were requested.
    ///
    /// A line is kept only if it has `field_count` numeric fields; otherwise
    /// its slot stays empty and the loop moves on.
    pub fn read_samples(&mut self, field_count: usize) -> Result<ReadingTable> {
        let count = self
            .requested
            .take()
            .ok_or_else(|| anyhow!("No sample count was sent to the device"))?;

        if field_count != FIELD_COUNT {
            warn!(
                "Expecting {field_count} fields but readings have {FIELD_COUNT}, every line will be dropped"
            );
        }

        let mut table = ReadingTable::new(count);

        for index in 0..count {
            let line = read_line(&mut self.dev, self.line_timeout)?;
            trace!("[{index}] {line:?}");

            let fields = parse_fields(&line);
            if fields.len() != field_count {
                debug!(
                    "Dropping line {index}: {} fields, expected {field_count}",
                    fields.len()
                );
                continue;
            }

            match Reading::from_fields(&fields) {
                Some(reading) => table.set(index, reading),
                None => debug!("Dropping line {index}: not a time/temp/pressure/gas reading"),
            }
        }

        info!("Captured {} of {} readings", table.filled(), count);

        Ok(table)
    }

    pub fn close(self) {
        debug!("Closing serial port");
    }
}

/// Sends the count, reads `count` lines and closes the port.
pub fn acquire<P: Read + Write>(
    dev: P,
    count: usize,
    field_count: usize,
    line_timeout: Duration,
) -> Result<ReadingTable> {
    let mut session = Session::new(dev, line_timeout);
    session.request(count)?;
    let table = session.read_samples(field_count)?;
    session.close();

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::RowPolicy;
    use std::collections::VecDeque;
    use std::thread;

    const LINE_TIMEOUT: Duration = Duration::from_millis(100);

    enum Chunk {
        Data(Vec<u8>),
        Timeout,
        Fail,
    }

    /// Plays back a fixed script of chunks and records what was written.
    struct ScriptedPort {
        script: VecDeque<Chunk>,
        written: Vec<u8>,
    }

    impl ScriptedPort {
        fn new(script: Vec<Chunk>) -> Self {
            ScriptedPort {
                script: script.into(),
                written: Vec::new(),
            }
        }

        fn lines(lines: &[&str]) -> Self {
            Self::new(
                lines
                    .iter()
                    .map(|l| {
                        if l.is_empty() {
                            Chunk::Timeout
                        } else {
                            Chunk::Data(format!("{l}\n").into_bytes())
                        }
                    })
                    .collect(),
            )
        }
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.script.pop_front() {
                Some(Chunk::Data(mut data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    let rest = data.split_off(n);
                    if !rest.is_empty() {
                        self.script.push_front(Chunk::Data(rest));
                    }
                    Ok(n)
                }
                Some(Chunk::Fail) => Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")),
                Some(Chunk::Timeout) | None => {
                    Err(io::Error::new(io::ErrorKind::TimedOut, "Operation timed out"))
                }
            }
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn rows(table: &ReadingTable) -> Vec<[f64; 4]> {
        table.rows(RowPolicy::ZeroFill).collect()
    }

    #[test]
    fn scripted_run_keeps_slot_positions() {
        let mut port = ScriptedPort::lines(&["1,20,3,4", "", "2,21", "3,22,5,6"]);
        let table = acquire(&mut port, 4, FIELD_COUNT, LINE_TIMEOUT).unwrap();

        assert_eq!(
            rows(&table),
            vec![
                [1.0, 20.0, 3.0, 4.0],
                [0.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0, 0.0],
                [3.0, 22.0, 5.0, 6.0]
            ]
        );
        assert_eq!(table.filled(), 2);
    }

    #[test]
    fn command_is_plain_decimal_count() {
        let mut port = ScriptedPort::lines(&[]);
        acquire(&mut port, 200, FIELD_COUNT, LINE_TIMEOUT).unwrap();

        assert_eq!(port.written, b"200");
        assert_eq!(encode_command(7), "7");
        assert_eq!(encode_command(1000), "1000");
    }

    #[test]
    fn silent_device_still_yields_full_table() {
        let mut port = ScriptedPort::lines(&[]);
        let table = acquire(&mut port, 5, FIELD_COUNT, LINE_TIMEOUT).unwrap();

        assert_eq!(table.len(), 5);
        assert_eq!(table.filled(), 0);
        assert!(rows(&table).iter().all(|r| *r == [0.0; 4]));
    }

    #[test]
    fn stops_after_count_reads() {
        let mut port = ScriptedPort::lines(&["1,1,1,1", "2,2,2,2", "3,3,3,3"]);
        let table = acquire(&mut port, 2, FIELD_COUNT, LINE_TIMEOUT).unwrap();

        assert_eq!(rows(&table), vec![[1.0; 4], [2.0; 4]]);

        // the third line is still waiting on the port
        assert_eq!(read_line(&mut port, LINE_TIMEOUT).unwrap(), "3,3,3,3");
    }

    #[test]
    fn wrong_field_counts_are_dropped() {
        let mut port = ScriptedPort::lines(&["1,2,3", "1,2,3,4,5", "9,8,7,6"]);
        let table = acquire(&mut port, 3, FIELD_COUNT, LINE_TIMEOUT).unwrap();

        assert!(table.get(0).is_none());
        assert!(table.get(1).is_none());
        assert_eq!(table.get(2).unwrap().values(), [9.0, 8.0, 7.0, 6.0]);
    }

    #[test]
    fn timeout_mid_line_splits_the_record() {
        let mut port = ScriptedPort::new(vec![
            Chunk::Data(b"1,2,".to_vec()),
            Chunk::Timeout,
            Chunk::Data(b"3,4\n5,6,7,8\n".to_vec()),
        ]);
        let table = acquire(&mut port, 3, FIELD_COUNT, LINE_TIMEOUT).unwrap();

        assert!(table.get(0).is_none());
        assert!(table.get(1).is_none());
        assert_eq!(table.get(2).unwrap().values(), [5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn read_line_strips_carriage_return() {
        let mut port = ScriptedPort::new(vec![Chunk::Data(b"1,2,3,4\r\n".to_vec())]);
        assert_eq!(read_line(&mut port, LINE_TIMEOUT).unwrap(), "1,2,3,4");
        assert_eq!(read_line(&mut port, LINE_TIMEOUT).unwrap(), "");
    }

    #[test]
    fn read_error_propagates() {
        let mut port = ScriptedPort::new(vec![Chunk::Data(b"1,2,3,4\n".to_vec()), Chunk::Fail]);
        assert!(acquire(&mut port, 2, FIELD_COUNT, LINE_TIMEOUT).is_err());
    }

    #[test]
    fn reading_before_request_fails() {
        let mut session = Session::new(ScriptedPort::lines(&["1,2,3,4"]), LINE_TIMEOUT);
        assert!(session.read_samples(FIELD_COUNT).is_err());
    }

    #[test]
    fn parse_fields_accepts_whitespace_and_exponents() {
        assert_eq!(parse_fields(" 1.5e2 , 2 ,3,-4 "), vec![150.0, 2.0, 3.0, -4.0]);
        assert_eq!(parse_fields(""), Vec::<f64>::new());
        assert_eq!(parse_fields("   "), Vec::<f64>::new());
    }

    #[test]
    fn parse_fields_stops_at_garbage() {
        assert_eq!(parse_fields("1,2,x,4"), vec![1.0, 2.0]);
        assert_eq!(parse_fields("1,2,3,4,"), vec![1.0, 2.0, 3.0, 4.0]);
    }

    /// Sends one byte every `delay` without ever hitting a read timeout.
    struct Trickle {
        data: VecDeque<u8>,
        delay: Duration,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            thread::sleep(self.delay);
            match self.data.pop_front() {
                Some(b) => {
                    buf[0] = b;
                    Ok(1)
                }
                None => Ok(0),
            }
        }
    }

    #[test]
    fn slow_line_is_cut_at_the_line_timeout() {
        let mut data: VecDeque<u8> = std::iter::repeat_n(b'1', 25).collect();
        data.push_back(b'\n');
        let mut port = Trickle {
            data,
            delay: Duration::from_millis(20),
        };

        let started = Instant::now();
        let line = read_line(&mut port, LINE_TIMEOUT).unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_millis(300), "took {elapsed:?}");
        assert!(!line.is_empty());
        assert!(line.len() < 25, "got {} bytes", line.len());
    }

    #[test]
    fn other_field_counts_drop_every_line() {
        let mut port = ScriptedPort::lines(&["1,2,3", "4,5,6"]);
        let table = acquire(&mut port, 2, 3, LINE_TIMEOUT).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.filled(), 0);
    }
}
