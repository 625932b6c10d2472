//! Caption payload parsing and transcript cleanup.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

/// Non-speech annotations inserted by caption authors and ASR systems.
static NOISE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\[\s*(music|applause|laughter|laughs|cheering|cheers|inaudible|silence|noise|background noise|crosstalk|foreign|no audio|sound effects?)\s*\]|\(\s*(music|applause|laughter|laughs|cheering|inaudible)\s*\)|♪+|♫+",
    )
    .expect("valid noise regex")
});

fn decode_entities(line: &str) -> String {
    line.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn is_cue_header(line: &str) -> bool {
    line.starts_with("WEBVTT")
        || line.starts_with("Kind:")
        || line.starts_with("Language:")
        || line.starts_with("NOTE")
        || line == "STYLE"
        || line == "REGION"
}

/// Turn a WebVTT/SRT caption payload into running text.
///
/// Drops headers, cue timings and cue numbers, strips inline tags, removes
/// immediately repeated lines and joins what is left with single spaces.
pub fn parse_captions(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || is_cue_header(line) || line.contains("-->") {
            continue;
        }
        if line.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        let text = decode_entities(&TAG_RE.replace_all(line, ""));
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if lines.last().map(String::as_str) == Some(text) {
            continue;
        }
        lines.push(text.to_string());
    }

    lines.join(" ")
}

/// Remove non-speech markers and collapse whitespace.
pub fn clean_transcript(text: &str) -> String {
    let stripped = NOISE_RE.replace_all(text, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-delimited token count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_VTT: &str = "WEBVTT\n\
Kind: captions\n\
Language: en\n\
\n\
1\n\
00:00:00.000 --> 00:00:02.000 align:start position:0%\n\
Hello world\n\
\n\
2\n\
00:00:02.000 --> 00:00:04.000\n\
Hello world\n\
\n\
3\n\
00:00:04.000 --> 00:00:06.000\n\
<c.colorE5E5E5>Goodbye</c><00:00:05.000><c> world</c>\n";

    #[test]
    fn test_parse_captions_dedupes_adjacent_lines() {
        assert_eq!(parse_captions(SAMPLE_VTT), "Hello world Goodbye world");
    }

    #[test]
    fn test_parse_captions_keeps_non_adjacent_repeats() {
        let raw = "00:00:00.000 --> 00:00:01.000\nyes\n\n00:00:01.000 --> 00:00:02.000\nno\n\n00:00:02.000 --> 00:00:03.000\nyes\n";
        assert_eq!(parse_captions(raw), "yes no yes");
    }

    #[test]
    fn test_parse_captions_srt_and_entities() {
        let raw = "1\n00:00:01,000 --> 00:00:02,000\nTom &amp; Jerry\n\n2\n00:00:02,000 --> 00:00:03,000\n<i>say &quot;hi&quot;</i>\n";
        assert_eq!(parse_captions(raw), "Tom & Jerry say \"hi\"");
    }

    #[test]
    fn test_parse_captions_is_idempotent() {
        let once = parse_captions(SAMPLE_VTT);
        assert_eq!(parse_captions(&once), once);
    }

    #[test]
    fn test_clean_transcript_removes_markers() {
        assert_eq!(clean_transcript("Hello [Music] world"), "Hello world");
        assert_eq!(
            clean_transcript("[Applause] thanks ♪♪ everyone (laughter)"),
            "thanks everyone"
        );
        assert_eq!(clean_transcript("[ MUSIC ] intro"), "intro");
    }

    #[test]
    fn test_clean_transcript_collapses_whitespace() {
        assert_eq!(clean_transcript("Hello    world   again"), "Hello world again");
        assert_eq!(clean_transcript("  \n\tpadded\n  "), "padded");
        assert_eq!(clean_transcript(""), "");
    }

    #[test]
    fn test_clean_transcript_keeps_other_brackets() {
        assert_eq!(clean_transcript("see [1] and [Speaker 2]"), "see [1] and [Speaker 2]");
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("one two  three\nfour"), 4);
        assert_eq!(word_count("   "), 0);
    }
}
