//! Splits text chunks into line units without losing terminators.

/// Line terminator retained by a [`LineUnit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    Lf,
    CrLf,
    /// Trailing partial line, or a synthetic diagnostic.
    None,
}

impl Terminator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Terminator::Lf => "\n",
            Terminator::CrLf => "\r\n",
            Terminator::None => "",
        }
    }
}

/// One framed line: content plus its original terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineUnit {
    content: String,
    terminator: Terminator,
}

impl LineUnit {
    pub fn new(content: impl Into<String>, terminator: Terminator) -> Self {
        Self {
            content: content.into(),
            terminator,
        }
    }

    /// A synthetic message reported to the client in place of file content.
    pub fn diagnostic(message: impl Into<String>) -> Self {
        Self::new(message, Terminator::None)
    }

    fn from_raw(raw: &str) -> Self {
        if let Some(content) = raw.strip_suffix("\r\n") {
            Self::new(content, Terminator::CrLf)
        } else if let Some(content) = raw.strip_suffix('\n') {
            Self::new(content, Terminator::Lf)
        } else {
            Self::new(raw, Terminator::None)
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn terminator(&self) -> Terminator {
        self.terminator
    }

    pub fn is_complete(&self) -> bool {
        self.terminator != Terminator::None
    }

    /// Content followed by its terminator, exactly as read from the file.
    pub fn as_wire(&self) -> String {
        let mut out = String::with_capacity(self.wire_len());
        out.push_str(&self.content);
        out.push_str(self.terminator.as_str());
        out
    }

    pub fn wire_len(&self) -> usize {
        self.content.len() + self.terminator.as_str().len()
    }
}

/// Split `chunk` into ordered line units.
///
/// Concatenating `as_wire()` of every unit reproduces `chunk` exactly. A final
/// line without a terminator is still returned, as an incomplete unit.
pub fn frame(chunk: &str) -> Vec<LineUnit> {
    chunk.split_inclusive('\n').map(LineUnit::from_raw).collect()
}
