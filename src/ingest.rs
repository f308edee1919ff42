//! Purpose: Turn the `ingest` inputs (files and/or stdin) into one line stream.
//! Exports: `InputSource`, `InputLines`.
//! Role: Input reader used by the CLI; isolates file handling from main.
//! Invariants: Lines keep their terminators; a last unterminated line is kept as is.
//! Invariants: Inputs are read in order and never merged across input boundaries.
//! Invariants: Buffering is per line; nothing is read ahead of the consumer.
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use bstr::ByteSlice;
use jsonpipe::api::{Error, ErrorKind};

pub enum InputSource {
    Stdin,
    File(PathBuf),
    #[cfg(test)]
    Reader {
        label: String,
        reader: Box<dyn BufRead>,
    },
}

impl InputSource {
    /// `-` names stdin, as with most line-oriented tools.
    pub fn from_operand(operand: PathBuf) -> Self {
        if operand.as_os_str() == "-" {
            InputSource::Stdin
        } else {
            InputSource::File(operand)
        }
    }
}

struct OpenInput {
    label: String,
    reader: Box<dyn BufRead>,
    line: u64,
}

pub struct InputLines {
    pending: VecDeque<InputSource>,
    current: Option<OpenInput>,
}

impl InputLines {
    /// An empty `sources` list reads stdin.
    pub fn new(sources: Vec<InputSource>) -> Self {
        let mut pending: VecDeque<InputSource> = sources.into();
        if pending.is_empty() {
            pending.push_back(InputSource::Stdin);
        }
        Self {
            pending,
            current: None,
        }
    }

    fn open_next(&mut self) -> Option<Result<(), Error>> {
        let source = self.pending.pop_front()?;
        let opened = match source {
            InputSource::Stdin => Ok(OpenInput {
                label: "<stdin>".to_string(),
                reader: Box::new(io::stdin().lock()),
                line: 0,
            }),
            InputSource::File(path) => File::open(&path)
                .map(|file| OpenInput {
                    label: path.display().to_string(),
                    reader: Box::new(BufReader::new(file)),
                    line: 0,
                })
                .map_err(|err| open_error(err, path)),
            #[cfg(test)]
            InputSource::Reader { label, reader } => Ok(OpenInput {
                label,
                reader,
                line: 0,
            }),
        };
        Some(opened.map(|input| {
            tracing::debug!(input = %input.label, "reading input");
            self.current = Some(input);
        }))
    }
}

impl Iterator for InputLines {
    type Item = Result<String, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                if let Err(err) = self.open_next()? {
                    return Some(Err(err));
                }
                continue;
            }
            let input = self.current.as_mut()?;
            let mut buf = Vec::new();
            match input.reader.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    self.current = None;
                }
                Ok(_) => {
                    input.line += 1;
                    return Some(decode_line(buf, &input.label, input.line));
                }
                Err(err) => {
                    let err = Error::new(ErrorKind::Io)
                        .with_message(format!("failed to read {}", input.label))
                        .with_line(input.line + 1)
                        .with_source(err);
                    self.current = None;
                    self.pending.clear();
                    return Some(Err(err));
                }
            }
        }
    }
}

fn open_error(err: io::Error, path: PathBuf) -> Error {
    let kind = match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        _ => ErrorKind::Io,
    };
    Error::new(kind)
        .with_message("failed to open input")
        .with_path(path)
        .with_source(err)
}

fn decode_line(buf: Vec<u8>, label: &str, line: u64) -> Result<String, Error> {
    match buf.to_str() {
        Ok(text) => Ok(text.to_owned()),
        Err(err) => Err(Error::new(ErrorKind::Decode)
            .with_message(format!("{label}: line is not valid UTF-8"))
            .with_hint(format!(
                "Invalid byte at offset {} of the line.",
                err.valid_up_to()
            ))
            .with_line(line)),
    }
}
