// ── Wire grammar ──
//
// Recognizes the lines of the two status listings every kind answers:
// the name listing (`<tag> add` without arguments) and the info dump
// (`<tag> info`). Built once per collection from the kind's tag.

pub mod audio;

use std::collections::HashMap;

use regex::Regex;

/// Classification of one info listing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoLine<'a> {
    /// Section title or column legend.
    Header,
    /// `max <tag>s : N`
    MaxCount(u32),
    /// `verbose level : N`
    VerboseLevel(u32),
    /// `-<tag> <id> : <fields>`
    Detail { id: u32, fields: &'a str },
    Unrecognized,
}

/// Compiled line patterns for one kind tag.
#[derive(Debug)]
pub struct LineGrammar {
    name_line: Regex,
    detail_line: Regex,
    max_line: Regex,
    verbose_line: Regex,
    header_line: Regex,
}

impl LineGrammar {
    pub fn new(tag: &str) -> Self {
        // Words of the tag may be separated by any run of whitespace.
        let tag = regex::escape(tag).replace(' ', r"\s+");
        let compile = |pattern: String| {
            Regex::new(&pattern).expect("escaped tag always forms a valid pattern")
        };

        Self {
            name_line: compile(format!(r"^\s*{tag}\s+(\d+)\s+<(.*)>\s*$")),
            detail_line: compile(format!(r"^-?\s*{tag}\s+(\d+)\s*:\s*(.*?)\s*$")),
            max_line: compile(format!(r"^max\s+{tag}s\s*:\s*(\d+)\s*$")),
            verbose_line: compile(r"^verbose\s+level\s*:\s*(\d+)\s*$".to_owned()),
            header_line: compile(format!(r"^(?:{tag}s|{tag}\s+id\s*:.*)$")),
        }
    }

    /// Parse a name listing into `id -> name`. Lines that are not name
    /// entries (titles, footers) are ignored, and so is id 0.
    pub fn parse_names<S: AsRef<str>>(&self, lines: &[S]) -> HashMap<u32, String> {
        lines
            .iter()
            .filter_map(|line| {
                let caps = self.name_line.captures(line.as_ref())?;
                let id = caps.get(1)?.as_str().parse::<u32>().ok().filter(|&id| id != 0)?;
                let name = caps.get(2)?.as_str().to_owned();
                Some((id, name))
            })
            .collect()
    }

    pub fn classify<'a>(&self, line: &'a str) -> InfoLine<'a> {
        let line = line.trim();

        if let Some(caps) = self.detail_line.captures(line) {
            let id = caps
                .get(1)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .filter(|&id| id != 0);
            let fields = caps.get(2).map(|m| m.as_str());
            if let (Some(id), Some(fields)) = (id, fields) {
                return InfoLine::Detail { id, fields };
            }
            return InfoLine::Unrecognized;
        }
        if let Some(n) = capture_number(&self.max_line, line) {
            return InfoLine::MaxCount(n);
        }
        if let Some(n) = capture_number(&self.verbose_line, line) {
            return InfoLine::VerboseLevel(n);
        }
        if self.header_line.is_match(line) {
            return InfoLine::Header;
        }
        InfoLine::Unrecognized
    }
}

fn capture_number(re: &Regex, line: &str) -> Option<u32> {
    re.captures(line)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mixer() -> LineGrammar {
        LineGrammar::new("audio mixer")
    }

    #[test]
    fn names_are_read_from_angle_brackets() {
        let names = mixer().parse_names(&[
            "audio mixers",
            "audio mixer 1 <Main>",
            "  audio mixer 12 <Studio B monitor>",
            "audio feed 3 <Mic>",
        ]);

        assert_eq!(names.len(), 2);
        assert_eq!(names.get(&1).map(String::as_str), Some("Main"));
        assert_eq!(names.get(&12).map(String::as_str), Some("Studio B monitor"));
    }

    #[test]
    fn detail_line_with_and_without_dash() {
        let grammar = mixer();
        assert_eq!(
            grammar.classify("-audio mixer 1 : RUNNING, 48000, 2"),
            InfoLine::Detail {
                id: 1,
                fields: "RUNNING, 48000, 2"
            }
        );
        assert_eq!(
            grammar.classify("audio mixer 7 :  READY, 44100 "),
            InfoLine::Detail {
                id: 7,
                fields: "READY, 44100"
            }
        );
    }

    #[test]
    fn metadata_lines_are_captured() {
        let grammar = mixer();
        assert_eq!(grammar.classify("max audio mixers : 8"), InfoLine::MaxCount(8));
        assert_eq!(grammar.classify("verbose level : 2"), InfoLine::VerboseLevel(2));
    }

    #[test]
    fn headers_are_recognized() {
        let grammar = mixer();
        assert_eq!(grammar.classify("audio mixers"), InfoLine::Header);
        assert_eq!(
            grammar.classify("audio mixer id : state, rate, channels, bytespersample"),
            InfoLine::Header
        );
    }

    #[test]
    fn other_kinds_and_noise_are_unrecognized() {
        let grammar = mixer();
        assert_eq!(grammar.classify("audio feed 1 : RUNNING"), InfoLine::Unrecognized);
        assert_eq!(grammar.classify("something new : 42"), InfoLine::Unrecognized);
        assert_eq!(grammar.classify("max audio feeds : 8"), InfoLine::Unrecognized);
    }

    #[test]
    fn id_zero_is_not_an_object() {
        let grammar = mixer();
        let names = grammar.parse_names(&["audio mixer 0 <Ghost>", "audio mixer 1 <Main>"]);

        assert_eq!(names.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(grammar.classify("-audio mixer 0 : READY"), InfoLine::Unrecognized);
    }

    #[test]
    fn tag_whitespace_is_tolerant() {
        assert_eq!(
            mixer().classify("audio   mixer 2 : READY"),
            InfoLine::Detail {
                id: 2,
                fields: "READY"
            }
        );
    }
}
