use std::fmt;

/// A final reply on the control connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
    /// Extra lines of a multi-line reply (FEAT).
    pub lines: Vec<String>,
}

impl Reply {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
            lines: Vec::new(),
        }
    }

    pub fn multiline(code: u16, text: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            code,
            text: text.into(),
            lines,
        }
    }

    /// Parses a "NNN text" line as produced by the error types.
    pub fn from_response(response: &str) -> Self {
        let (code, text) = response.split_once(' ').unwrap_or((response, ""));
        Self::new(code.parse().unwrap_or(451), text)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lines.is_empty() {
            return write!(f, "{} {}\r\n", self.code, self.text);
        }
        write!(f, "{}-{}\r\n", self.code, self.text)?;
        for line in &self.lines {
            write!(f, " {}\r\n", line)?;
        }
        write!(f, "{} End\r\n", self.code)
    }
}
