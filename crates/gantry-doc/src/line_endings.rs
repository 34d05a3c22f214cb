//! Line-ending detection and enforcement.
//!
//! The editor regenerates documents from scratch, so the user's original
//! line-ending choice would otherwise be lost. We detect the dominant style
//! once, when the document is first loaded, and re-apply it to every
//! serialized output.

/// A text line-ending style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// The dominant line ending in `text`, by occurrence count. Ties favor LF.
pub fn dominant_line_ending(text: &str) -> LineEnding {
    let crlf = text.matches("\r\n").count();
    let lf = text.matches('\n').count() - crlf;

    if crlf > lf {
        LineEnding::CrLf
    } else {
        LineEnding::Lf
    }
}

/// Rewrite every line break in `text` to `ending`.
pub fn enforce_line_ending(text: &str, ending: LineEnding) -> String {
    let normalized = text.replace("\r\n", "\n");
    match ending {
        LineEnding::Lf => normalized,
        LineEnding::CrLf => normalized.replace('\n', "\r\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lf_only_text_is_lf() {
        assert_eq!(dominant_line_ending("a\nb\nc\n"), LineEnding::Lf);
    }

    #[test]
    fn crlf_only_text_is_crlf() {
        assert_eq!(dominant_line_ending("a\r\nb\r\nc\r\n"), LineEnding::CrLf);
    }

    #[test]
    fn majority_wins() {
        assert_eq!(dominant_line_ending("a\r\nb\r\nc\n"), LineEnding::CrLf);
        assert_eq!(dominant_line_ending("a\nb\nc\r\n"), LineEnding::Lf);
    }

    #[test]
    fn tie_favors_lf() {
        assert_eq!(dominant_line_ending("a\r\nb\n"), LineEnding::Lf);
    }

    #[test]
    fn empty_text_is_lf() {
        assert_eq!(dominant_line_ending(""), LineEnding::Lf);
    }

    #[test]
    fn enforce_rewrites_mixed_endings() {
        assert_eq!(
            enforce_line_ending("a\nb\r\nc\n", LineEnding::CrLf),
            "a\r\nb\r\nc\r\n"
        );
        assert_eq!(
            enforce_line_ending("a\r\nb\r\n", LineEnding::Lf),
            "a\nb\n"
        );
    }
}
