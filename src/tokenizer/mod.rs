//! Streaming SQL script tokenizer
//!
//! Splits a script into statements on a configurable delimiter, keeping
//! track of where each statement sits in the source. The delimiter can
//! be changed mid-stream with a `@DELIMITER` directive comment.

pub use fallible_iterator::FallibleIterator;
use std::collections::VecDeque;
use std::io::BufRead;

mod error;
mod scan;

pub use error::Error;
pub use scan::{Splitter, SqlSplitter, DEFAULT_DELIMITER, DEFAULT_LINE_SEPARATOR};

use scan::ScanState;

/// One statement extracted from a script.
///
/// `text` is the trimmed statement body: the delimiter is stripped and
/// interior lines are joined by the configured line separator. Rows and
/// columns are 0-based byte offsets into the source, except that the
/// configured context origin shifts all rows and the columns of the
/// first line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    /// Statement body, trimmed, without the terminating delimiter
    pub text: String,
    /// First row of the statement (inclusive)
    pub start_row: usize,
    /// Column where the statement starts on `start_row` (inclusive)
    pub start_column: usize,
    /// Last row of the statement (inclusive)
    pub end_row: usize,
    /// Column just past the statement on `end_row` (exclusive)
    pub end_column: usize,
}

/// Splits a script read line-by-line into [`Statement`]s.
///
/// The input is consumed to the end of the stream and is never closed
/// here; pass `&mut reader` to keep ownership on the caller's side. One
/// physical line may complete several statements, so completed
/// statements are queued and handed out one at a time through
/// [`FallibleIterator`], or all at once through
/// [`parse`](ScriptTokenizer::parse).
///
/// ```
/// use sql_script_splitter::tokenizer::ScriptTokenizer;
///
/// let script = "CREATE TABLE t (x INT);\nDROP TABLE t;";
/// let mut tokenizer = ScriptTokenizer::new(script.as_bytes());
/// let statements = tokenizer.parse().unwrap();
/// assert_eq!(2, statements.len());
/// assert_eq!("DROP TABLE t", statements[1].text);
/// assert_eq!(1, statements[1].start_row);
/// ```
pub struct ScriptTokenizer<R: BufRead, S: Splitter = SqlSplitter> {
    input: R,
    splitter: S,
    state: ScanState,
    ready: VecDeque<Statement>,
    line: String,
    eof: bool,
}

impl<R: BufRead> ScriptTokenizer<R> {
    /// Tokenizer over `input` with the stock [`SqlSplitter`] behavior.
    pub fn new(input: R) -> ScriptTokenizer<R> {
        Self::with_splitter(input, SqlSplitter)
    }
}

impl<R: BufRead, S: Splitter> ScriptTokenizer<R, S> {
    /// Tokenizer over `input` with a custom [`Splitter`] strategy.
    pub fn with_splitter(input: R, splitter: S) -> ScriptTokenizer<R, S> {
        ScriptTokenizer {
            input,
            splitter,
            state: ScanState::new(),
            ready: VecDeque::new(),
            line: String::new(),
            eof: false,
        }
    }

    /// Delimiter currently in effect.
    ///
    /// Starts as the configured delimiter and follows any `@DELIMITER`
    /// directives encountered while scanning.
    pub fn delimiter(&self) -> &str {
        self.state.delimiter()
    }

    /// Replace the statement delimiter used from now on.
    ///
    /// The default is [`DEFAULT_DELIMITER`]. Must not be empty.
    pub fn set_delimiter(&mut self, delimiter: &str) {
        self.state.set_delimiter(delimiter);
    }

    /// Separator joining the lines of a multi-line statement.
    ///
    /// The default is [`DEFAULT_LINE_SEPARATOR`], regardless of platform.
    pub fn set_line_separator(&mut self, separator: &str) {
        self.state.set_line_separator(separator);
    }

    /// Place the start of the input at `(row, column)` of an enclosing
    /// source, so reported spans line up with it. Resets the scan
    /// counters; the column shift applies to the first line only.
    pub fn set_context_start(&mut self, row: usize, column: usize) {
        self.state.set_context_start(row, column);
    }

    /// Row the scan is currently on.
    pub fn row(&self) -> usize {
        self.state.row()
    }

    /// Parse `input` as if freshly constructed, keeping the configured
    /// delimiter, line separator and context origin. A delimiter set by
    /// a directive in the previous input does not carry over.
    pub fn reset(&mut self, input: R) {
        self.input = input;
        self.state.rewind();
        self.ready.clear();
        self.eof = false;
    }

    /// Read the whole input and return the statements in source order.
    ///
    /// Malformed content never fails: an unterminated trailing statement
    /// is flushed at end of stream, stray delimiters produce nothing. An
    /// I/O error from the reader aborts the parse.
    pub fn parse(&mut self) -> Result<Vec<Statement>, Error> {
        let mut statements = Vec::new();
        while let Some(statement) = self.next()? {
            statements.push(statement);
        }
        Ok(statements)
    }
}

impl<R: BufRead, S: Splitter> FallibleIterator for ScriptTokenizer<R, S> {
    type Item = Statement;
    type Error = Error;

    fn next(&mut self) -> Result<Option<Statement>, Error> {
        loop {
            if let Some(statement) = self.ready.pop_front() {
                return Ok(Some(statement));
            }
            if self.eof {
                return Ok(None);
            }
            self.line.clear();
            if self.input.read_line(&mut self.line)? == 0 {
                self.eof = true;
                self.state.finish(&mut self.splitter, &mut self.ready);
                continue;
            }
            let line = trim_terminator(&self.line);
            self.state
                .handle_line(line, &mut self.splitter, &mut self.ready);
        }
    }
}

/// Strip the terminator `read_line` leaves in place; the last line of
/// the input may not have one.
fn trim_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
