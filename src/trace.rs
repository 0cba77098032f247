use std::{
    fs,
    io::{self, BufRead, BufReader},
    mem,
    num::ParseIntError,
    path::{Path, PathBuf},
    str::FromStr,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{Receiver, Sender};
use thiserror::Error;
use xz2::read::XzDecoder;

use crate::addr::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub op: Op,
    pub addr: Address,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("operation `{0}` is not a single character")]
    BadOp(String),
    #[error("unknown operation `{0}` (expected `r` or `w`)")]
    UnknownOp(char),
    #[error("missing address")]
    MissingAddress,
    #[error("address `{0}` is missing the 0x prefix")]
    MissingPrefix(String),
    #[error("invalid address `{text}`: {source}")]
    BadAddress {
        text: String,
        source: ParseIntError,
    },
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("could not open trace {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("trace line {line}: {source}")]
    Read { line: usize, source: io::Error },
    #[error("trace line {line}: command format error: {source}")]
    Parse { line: usize, source: ParseError },
}

/// Parses one `<op> 0x<hex>` trace line. Tokens past the address are ignored.
///
/// A well-formed line whose op is neither `r` nor `w` yields
/// [`ParseError::UnknownOp`]; the reader skips those instead of stopping.
impl FromStr for Request {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let op_text = tokens.next().ok_or(ParseError::Empty)?;
        let mut chars = op_text.chars();
        let op_char = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => return Err(ParseError::BadOp(op_text.to_owned())),
        };
        let text = tokens.next().ok_or(ParseError::MissingAddress)?;
        let hex = text
            .strip_prefix("0x")
            .ok_or_else(|| ParseError::MissingPrefix(text.to_owned()))?;
        let addr = Address::from_str_radix(hex, 16).map_err(|source| ParseError::BadAddress {
            text: text.to_owned(),
            source,
        })?;
        let op = match op_char {
            'r' => Op::Read,
            'w' => Op::Write,
            other => return Err(ParseError::UnknownOp(other)),
        };
        Ok(Request { op, addr })
    }
}

/// Requests streamed in file order from a reader thread.
pub struct Trace {
    pub rec: Receiver<Result<Vec<Request>, TraceError>>,
    _thread: JoinHandle<()>,
}

impl Trace {
    /// Opens a text trace, decompressing it first when the name ends in `.xz`.
    pub fn open(
        path: &Path,
        requests_per_block: usize,
        blocks_per_queue: usize,
    ) -> Result<Trace, TraceError> {
        let stream = fs::File::open(path).map_err(|source| TraceError::Open {
            path: path.to_owned(),
            source,
        })?;
        let trace = if path.extension().is_some_and(|ext| ext == "xz") {
            log::debug!("reading {} as xz", path.display());
            Trace::from_reader(
                BufReader::new(XzDecoder::new(stream)),
                requests_per_block,
                blocks_per_queue,
            )
        } else {
            Trace::from_reader(BufReader::new(stream), requests_per_block, blocks_per_queue)
        };
        Ok(trace)
    }

    pub fn from_reader<R: BufRead + Send + 'static>(
        reader: R,
        requests_per_block: usize,
        blocks_per_queue: usize,
    ) -> Trace {
        let requests_per_block = requests_per_block.max(1);
        let (sender, receiver) = crossbeam::channel::bounded(blocks_per_queue);

        let t = thread::spawn(move || Trace::run_thread(reader, requests_per_block, sender));

        Trace {
            rec: receiver,
            _thread: t,
        }
    }

    fn run_thread<R: BufRead>(
        reader: R,
        requests_per_block: usize,
        queue: Sender<Result<Vec<Request>, TraceError>>,
    ) {
        let mut buffer = Vec::with_capacity(requests_per_block);
        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let request = line
                .map_err(|source| TraceError::Read {
                    line: line_no,
                    source,
                })
                .and_then(|text| {
                    text.parse::<Request>().map_err(|source| TraceError::Parse {
                        line: line_no,
                        source,
                    })
                });

            match request {
                Ok(request) => buffer.push(request),
                Err(TraceError::Parse {
                    line,
                    source: ParseError::UnknownOp(op),
                }) => {
                    log::warn!("trace line {line}: skipping unknown operation `{op}`");
                    continue;
                }
                Err(err) => {
                    // Nothing after a bad line may be simulated.
                    let _ = queue.send(Err(err));
                    return;
                }
            }

            if buffer.len() == requests_per_block {
                let block = mem::replace(&mut buffer, Vec::with_capacity(requests_per_block));
                if queue.send(Ok(block)).is_err() {
                    return;
                }
            }
        }
        if !buffer.is_empty() {
            let _ = queue.send(Ok(buffer));
        }
    }

    pub fn blocks(&self) -> impl Iterator<Item = Result<Vec<Request>, TraceError>> + '_ {
        self.rec.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use xz2::write::XzEncoder;

    use super::*;

    fn collect(trace: &Trace) -> Result<Vec<Request>, TraceError> {
        let mut requests = Vec::new();
        for block in trace.blocks() {
            requests.extend(block?);
        }
        Ok(requests)
    }

    #[test]
    fn parses_read_and_write() {
        assert_eq!(
            "r 0x1f".parse::<Request>(),
            Ok(Request {
                op: Op::Read,
                addr: 0x1f
            })
        );
        assert_eq!(
            "w\t0xDEADBEEF trailing".parse::<Request>(),
            Ok(Request {
                op: Op::Write,
                addr: 0xdead_beef
            })
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!("".parse::<Request>(), Err(ParseError::Empty));
        assert_eq!("r".parse::<Request>(), Err(ParseError::MissingAddress));
        assert_eq!("x".parse::<Request>(), Err(ParseError::MissingAddress));
        assert_eq!(
            "foo 0x8".parse::<Request>(),
            Err(ParseError::BadOp("foo".into()))
        );
        assert_eq!(
            "x 10".parse::<Request>(),
            Err(ParseError::MissingPrefix("10".into()))
        );
        assert_eq!(
            "r 10".parse::<Request>(),
            Err(ParseError::MissingPrefix("10".into()))
        );
        assert!(matches!(
            "w 0xzz".parse::<Request>(),
            Err(ParseError::BadAddress { .. })
        ));
        assert!(matches!(
            "w 0x100000000".parse::<Request>(),
            Err(ParseError::BadAddress { .. })
        ));
    }

    #[test]
    fn streams_in_order_across_blocks() {
        let text = "r 0x0\nw 0x4\nr 0x8\nw 0xc\nr 0x10\n";
        let trace = Trace::from_reader(Cursor::new(text), 2, 1);
        let addrs: Vec<_> = collect(&trace).unwrap().iter().map(|r| r.addr).collect();
        assert_eq!(addrs, vec![0x0, 0x4, 0x8, 0xc, 0x10]);
    }

    #[test]
    fn unknown_single_char_op_is_reported_separately() {
        assert_eq!("R 0x0".parse::<Request>(), Err(ParseError::UnknownOp('R')));
        assert_eq!("x 0x8".parse::<Request>(), Err(ParseError::UnknownOp('x')));
    }

    #[test]
    fn skips_unknown_ops_and_keeps_going() {
        let text = "r 0x0\nx 0x8\nR 0xc\nw 0x4\n";
        let trace = Trace::from_reader(Cursor::new(text), 1, 4);
        let requests = collect(&trace).unwrap();
        assert_eq!(
            requests,
            vec![
                Request {
                    op: Op::Read,
                    addr: 0x0
                },
                Request {
                    op: Op::Write,
                    addr: 0x4
                },
            ]
        );
    }

    #[test]
    fn stops_at_first_bad_line() {
        let text = "r 0x0\nw 0x4\nx\nr 0xc\n";
        let trace = Trace::from_reader(Cursor::new(text), 16, 4);
        match collect(&trace) {
            Err(TraceError::Parse { line, source }) => {
                assert_eq!(line, 3);
                assert_eq!(source, ParseError::MissingAddress);
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
        assert!(trace.rec.recv().is_err());
    }

    #[test]
    fn opens_plain_and_xz_files() {
        let text = "r 0x0\nw 0x40\n";
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("trace.txt");
        fs::write(&plain, text).unwrap();

        let packed = dir.path().join("trace.txt.xz");
        let mut encoder = XzEncoder::new(Vec::new(), 6);
        encoder.write_all(text.as_bytes()).unwrap();
        fs::write(&packed, encoder.finish().unwrap()).unwrap();

        for path in [plain, packed] {
            let trace = Trace::open(&path, 8, 2).unwrap();
            let requests = collect(&trace).unwrap();
            assert_eq!(
                requests,
                vec![
                    Request {
                        op: Op::Read,
                        addr: 0x0
                    },
                    Request {
                        op: Op::Write,
                        addr: 0x40
                    },
                ]
            );
        }
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Trace::open(&dir.path().join("absent"), 8, 2);
        assert!(matches!(result, Err(TraceError::Open { .. })));
    }
}
