//! Indented source writer for emitted Ruby files.
//!
//! One writer produces one output file. Blocks opened with [`RubyWriter::open_block`]
//! must be closed with [`RubyWriter::close_block`] on every path before
//! [`RubyWriter::finalize`] hands the text to the file manifest.

use crate::{Error, Result};

const INDENT: &str = "  ";

#[derive(Default)]
pub struct RubyWriter {
    buf: String,
    indent: usize,
    open_blocks: usize,
    underflow: bool,
}

impl RubyWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one or more lines at the current indent level.
    /// Embedded newlines split the text into separate indented lines.
    pub fn write(&mut self, text: impl AsRef<str>) -> &mut Self {
        for line in text.as_ref().split('\n') {
            if line.is_empty() {
                self.buf.push('\n');
            } else {
                for _ in 0..self.indent {
                    self.buf.push_str(INDENT);
                }
                self.buf.push_str(line);
                self.buf.push('\n');
            }
        }
        self
    }

    /// Append text to the buffer verbatim, without indent or trailing newline.
    pub fn write_inline(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.buf.push_str(text.as_ref());
        self
    }

    /// Write an empty line.
    pub fn blank(&mut self) -> &mut Self {
        self.buf.push('\n');
        self
    }

    /// Write a line after substituting `$name` placeholders from `args`.
    pub fn templ(&mut self, template: &str, args: &[(&str, &str)]) -> &mut Self {
        let line = subst(template, args);
        self.write(line)
    }

    /// Write `prefix` and indent until the matching [`RubyWriter::close_block`].
    pub fn open_block(&mut self, prefix: impl AsRef<str>) -> &mut Self {
        self.write(prefix);
        self.indent += 1;
        self.open_blocks += 1;
        self
    }

    /// Close the innermost open block, writing `suffix` at the outer level.
    /// Closing with no block open poisons the writer; the error surfaces
    /// from [`RubyWriter::finalize`].
    pub fn close_block(&mut self, suffix: impl AsRef<str>) -> &mut Self {
        if self.open_blocks == 0 {
            self.underflow = true;
            return self;
        }
        self.open_blocks -= 1;
        self.indent -= 1;
        self.write(suffix);
        self
    }

    /// Raise the indent level without opening a block.
    pub fn indent(&mut self) -> &mut Self {
        self.indent += 1;
        self
    }

    /// Lower the indent level raised by [`RubyWriter::indent`].
    pub fn dedent(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self
    }

    /// Invoke `f` with this writer, for composing emitters mid-chain.
    pub fn call<F>(&mut self, f: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut RubyWriter) -> Result<()>,
    {
        f(self)?;
        Ok(self)
    }

    /// Consume the writer and return the file text.
    /// Fails if any block is still open or a close underflowed. This is the
    /// only exit; a writer abandoned on an error path is simply dropped.
    pub fn finalize(self) -> Result<String> {
        if self.underflow {
            return Err(Error::UnbalancedBlock(
                "close_block called with no open block".to_string(),
            ));
        }
        if self.open_blocks > 0 {
            return Err(Error::UnbalancedBlock(format!(
                "{} block(s) left open",
                self.open_blocks
            )));
        }
        Ok(self.buf)
    }
}

/// Replace `$name` placeholders with values from `args`.
/// `$$` escapes a literal dollar sign; unknown placeholders are left as-is.
pub fn subst(template: &str, args: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        if let Some(&(_, next)) = chars.peek() {
            if next == '$' {
                chars.next();
                out.push('$');
                continue;
            }
        }
        let mut name = String::new();
        while let Some(&(_, nc)) = chars.peek() {
            if nc.is_ascii_alphanumeric() || nc == '_' {
                name.push(nc);
                chars.next();
            } else {
                break;
            }
        }
        match args.iter().find(|(k, _)| *k == name) {
            Some((_, v)) => out.push_str(v),
            None => {
                out.push('$');
                out.push_str(&name);
            }
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    fn finalize(w: RubyWriter) -> String {
        w.finalize().expect("balanced writer")
    }

    #[test]
    fn writes_indented_blocks() {
        let mut w = RubyWriter::new();
        w.open_block("module Sample")
            .open_block("class Thing")
            .write("VALUE = 1")
            .close_block("end")
            .close_block("end");
        assert_eq!(
            finalize(w),
            "module Sample\n  class Thing\n    VALUE = 1\n  end\nend\n"
        );
    }

    #[test]
    fn multiline_write_indents_every_line() {
        let mut w = RubyWriter::new();
        w.open_block("begin").write("a = 1\nb = 2").close_block("end");
        assert_eq!(finalize(w), "begin\n  a = 1\n  b = 2\nend\n");
    }

    #[test]
    fn unclosed_block_fails_finalize() {
        let mut w = RubyWriter::new();
        w.open_block("module Sample");
        let err = w.finalize().unwrap_err();
        assert!(matches!(err, Error::UnbalancedBlock(_)));
    }

    #[test]
    fn close_underflow_fails_finalize() {
        let mut w = RubyWriter::new();
        w.close_block("end");
        let err = w.finalize().unwrap_err();
        assert!(matches!(err, Error::UnbalancedBlock(_)));
    }

    #[test]
    fn subst_replaces_named_args() {
        assert_eq!(
            subst("data[:$name] = input[:$name]", &[("name", "id")]),
            "data[:id] = input[:id]"
        );
        assert_eq!(subst("cost: $$5", &[]), "cost: $5");
        assert_eq!(subst("missing $other", &[("name", "x")]), "missing $other");
    }

    #[test]
    fn templ_writes_substituted_line() {
        let mut w = RubyWriter::new();
        w.templ("http_req.headers['$key'] = $value", &[("key", "X-Id"), ("value", "v")]);
        assert_eq!(finalize(w), "http_req.headers['X-Id'] = v\n");
    }
}
