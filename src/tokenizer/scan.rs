//! Per-line scan state and the pluggable split strategy.

use std::collections::VecDeque;

use log::debug;
use memchr::memmem;
use uncased::UncasedStr;

use super::Statement;

/// Statement delimiter in effect when a scan starts.
pub const DEFAULT_DELIMITER: &str = ";";

/// Separator joining the lines of a multi-line statement.
pub const DEFAULT_LINE_SEPARATOR: &str = "\n";

const DIRECTIVE_KEYWORD: &str = "@DELIMITER";

/// Classification and search steps of the scan.
///
/// The line loop in the tokenizer calls back into these for every line,
/// so the splitting behavior can be swapped out without touching the
/// loop itself. [`SqlSplitter`] is the stock SQL-script behavior.
pub trait Splitter {
    /// Byte offset of the next occurrence of `delimiter` in `line`, at
    /// or after `from`, or `None` if the rest of the line has none.
    ///
    /// An offset before `from` is a contract violation.
    fn find_delimiter(&mut self, line: &str, delimiter: &str, from: usize) -> Option<usize>;

    /// Whether `trimmed` (whitespace already stripped) is a line comment.
    fn is_comment_line(&mut self, trimmed: &str) -> bool;

    /// Whether `trimmed` is exactly one `/* ... */` block comment.
    fn is_block_comment(&mut self, trimmed: &str) -> bool;

    /// The new delimiter if `trimmed` is a delimiter directive line.
    fn delimiter_directive<'input>(&mut self, trimmed: &'input str) -> Option<&'input str>;
}

/// Stock SQL-script splitting: literal delimiter search, `--` and `//`
/// line comments, `/* ... */` block comments, `@DELIMITER` directives.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqlSplitter;

impl Splitter for SqlSplitter {
    fn find_delimiter(&mut self, line: &str, delimiter: &str, from: usize) -> Option<usize> {
        if delimiter.is_empty() {
            return None;
        }
        memmem::find(line[from..].as_bytes(), delimiter.as_bytes()).map(|at| from + at)
    }

    fn is_comment_line(&mut self, trimmed: &str) -> bool {
        trimmed.starts_with("--") || trimmed.starts_with("//")
    }

    fn is_block_comment(&mut self, trimmed: &str) -> bool {
        trimmed.starts_with("/*") && trimmed.ends_with("*/")
    }

    fn delimiter_directive<'input>(&mut self, trimmed: &'input str) -> Option<&'input str> {
        delimiter_directive(trimmed)
    }
}

/// Parses `[--|//] [//] @DELIMITER <token>` out of a trimmed line.
///
/// The keyword is matched case-insensitively. The token is the maximal
/// run of non-whitespace after it; anything further on the line is
/// ignored.
fn delimiter_directive(trimmed: &str) -> Option<&str> {
    let rest = trimmed
        .strip_prefix("--")
        .or_else(|| trimmed.strip_prefix("//"))
        .unwrap_or(trimmed);
    let rest = rest.trim_start();
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let rest = rest.trim_start();
    let keyword = rest.get(..DIRECTIVE_KEYWORD.len())?;
    if UncasedStr::new(keyword) != UncasedStr::new(DIRECTIVE_KEYWORD) {
        return None;
    }
    let rest = &rest[DIRECTIVE_KEYWORD.len()..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let token = rest.trim_start();
    let end = token.find(char::is_whitespace).unwrap_or(token.len());
    if end == 0 {
        return None;
    }
    Some(&token[..end])
}

/// Scan counters, the active delimiter, and the accumulation buffer.
///
/// Positions are byte offsets. The buffer holds the statement being
/// accumulated; start/end positions track where its text sits in the
/// source and are only read when a statement is emitted.
#[derive(Debug)]
pub(super) struct ScanState {
    /// row of the line being scanned
    row: usize,
    start_row: usize,
    start_column: usize,
    end_row: usize,
    end_column: usize,
    /// delimiter in effect for text scanned from now on
    delimiter: String,
    /// configured delimiter, restored by `rewind`
    initial_delimiter: String,
    line_separator: String,
    context_start_row: usize,
    context_start_column: usize,
    buffer: String,
}

impl ScanState {
    pub fn new() -> ScanState {
        ScanState {
            row: 0,
            start_row: 0,
            start_column: 0,
            end_row: 0,
            end_column: 0,
            delimiter: DEFAULT_DELIMITER.to_owned(),
            initial_delimiter: DEFAULT_DELIMITER.to_owned(),
            line_separator: DEFAULT_LINE_SEPARATOR.to_owned(),
            context_start_row: 0,
            context_start_column: 0,
            buffer: String::new(),
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn set_delimiter(&mut self, delimiter: &str) {
        debug_assert!(!delimiter.is_empty());
        self.delimiter = delimiter.to_owned();
        self.initial_delimiter = delimiter.to_owned();
    }

    pub fn set_line_separator(&mut self, separator: &str) {
        self.line_separator = separator.to_owned();
    }

    pub fn set_context_start(&mut self, row: usize, column: usize) {
        self.context_start_row = row;
        self.context_start_column = column;
        self.row = row;
        self.start_row = row;
        self.start_column = column;
        self.end_row = row;
        self.end_column = column;
    }

    pub fn row(&self) -> usize {
        self.row
    }

    /// Start over on fresh input, keeping the configuration.
    pub fn rewind(&mut self) {
        self.delimiter = self.initial_delimiter.clone();
        self.buffer.clear();
        self.row = self.context_start_row;
        self.start_row = self.context_start_row;
        self.start_column = self.context_start_column;
        self.end_row = self.context_start_row;
        self.end_column = self.context_start_column;
    }

    /// Only the first line is shifted by the context column.
    fn column_at(&self, index: usize) -> usize {
        if self.row == self.context_start_row {
            self.context_start_column + index
        } else {
            index
        }
    }

    /// Scan one line (terminator already stripped), queueing any
    /// statements it completes.
    pub fn handle_line<S: Splitter>(
        &mut self,
        line: &str,
        splitter: &mut S,
        out: &mut VecDeque<Statement>,
    ) {
        debug!(target: "tokenizer", "handle_line(row: {}, len: {})", self.row, line.len());
        let mut buffer_empty = self.buffer.is_empty();
        let mut scan_line = true;

        let trimmed = line.trim();

        if trimmed.is_empty() {
            if !buffer_empty {
                self.buffer.push_str(line);
                self.buffer.push_str(&self.line_separator);
            }
            scan_line = false;
        }

        let comment_line = splitter.is_comment_line(trimmed);
        if comment_line {
            if let Some(token) = splitter.delimiter_directive(trimmed) {
                debug!(target: "tokenizer", "delimiter {:?} -> {:?} (row {})", self.delimiter, token, self.row);
                self.delimiter = token.to_owned();
                // keep the statement's line count aligned with the source
                if !buffer_empty {
                    self.buffer.push_str(&self.line_separator);
                }
                scan_line = false;
            }
        }

        if scan_line {
            let mut index = 0;
            while index < line.len() {
                if buffer_empty {
                    self.start_row = self.row;
                    self.start_column = self.column_at(index);
                }
                match splitter.find_delimiter(line, &self.delimiter, index) {
                    None => {
                        // a comment with no statement open contributes nothing
                        if !(comment_line && buffer_empty) {
                            self.buffer.push_str(&line[index..]);
                            self.buffer.push_str(&self.line_separator);
                            buffer_empty = false;
                        }
                        self.end_row = self.row;
                        self.end_column = self.column_at(line.len());
                        index = line.len();
                    }
                    Some(at) => {
                        if at > 0 {
                            self.end_row = self.row;
                            self.end_column = self.column_at(at);
                            self.buffer.push_str(&line[index..at]);
                        }
                        self.emit(splitter, out);
                        buffer_empty = true;
                        index = at + self.delimiter.len();
                    }
                }
            }
        }

        self.row += 1;
    }

    /// End-of-stream flush of an unterminated trailing statement.
    pub fn finish<S: Splitter>(&mut self, splitter: &mut S, out: &mut VecDeque<Statement>) {
        self.emit(splitter, out);
    }

    /// Queue the buffered statement, unless it trims to nothing or to a
    /// lone block comment.
    fn emit<S: Splitter>(&mut self, splitter: &mut S, out: &mut VecDeque<Statement>) {
        let text = self.buffer.trim();
        if !text.is_empty() && !splitter.is_block_comment(text) {
            out.push_back(Statement {
                text: text.to_owned(),
                start_row: self.start_row,
                start_column: self.start_column,
                end_row: self.end_row,
                end_column: self.end_column,
            });
        }
        self.buffer.clear();
    }
}
