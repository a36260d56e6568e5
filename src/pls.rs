//! Reader and writer for the line oriented `.pls` playlist format.
//!
//! ```text
//! [playlist]
//! File1=/album/song.mp3
//! Title1=Song
//! Length1=180
//! NumberOfEntries=1
//! Version=2
//! ```
//!
//! Values are kept verbatim. A value containing a newline cannot be
//! represented.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const EXTENSION: &str = "pls";

/// One playlist row. Its position in the playlist is its index in the
/// surrounding sequence, not the number it was stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
}

impl Track {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            title: None,
            length: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_length(mut self, length: impl Into<String>) -> Self {
        self.length = Some(length.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    File,
    Title,
    Length,
}

#[derive(Default)]
struct PartialTrack {
    file: Option<String>,
    title: Option<String>,
    length: Option<String>,
}

/// Parse playlist text. Unknown lines are skipped; indices without a `File`
/// entry are dropped; tracks come out ordered by their stored index.
pub fn parse(text: &str) -> Vec<Track> {
    let mut entries: BTreeMap<u64, PartialTrack> = BTreeMap::new();

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let trimmed = line.trim_start();
        if trimmed.trim_end().is_empty() || trimmed.starts_with('[') {
            continue;
        }

        let Some((field, index, value)) = parse_line(trimmed) else {
            continue;
        };

        let entry = entries.entry(index).or_default();
        let value = value.to_string();
        match field {
            Field::File => entry.file = Some(value).filter(|v| !v.is_empty()),
            Field::Title => entry.title = Some(value),
            Field::Length => entry.length = Some(value),
        }
    }

    entries
        .into_values()
        .filter_map(|entry| {
            Some(Track {
                file: entry.file?,
                title: entry.title,
                length: entry.length,
            })
        })
        .collect()
}

/// Matches `Key<N>=Value` where Key is File, Title or Length in any case.
fn parse_line(line: &str) -> Option<(Field, u64, &str)> {
    let (key, value) = line.split_once('=')?;

    let digits_at = key.find(|c: char| c.is_ascii_digit())?;
    let (name, number) = key.split_at(digits_at);
    if !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let field = if name.eq_ignore_ascii_case("file") {
        Field::File
    } else if name.eq_ignore_ascii_case("title") {
        Field::Title
    } else if name.eq_ignore_ascii_case("length") {
        Field::Length
    } else {
        return None;
    };

    let index = number.parse().ok()?;
    Some((field, index, value))
}

/// Render tracks as playlist text, numbered from 1 in sequence order.
pub fn serialize(tracks: &[Track]) -> String {
    let mut out = String::from("[playlist]\n");

    for (i, track) in tracks.iter().enumerate() {
        let n = i + 1;
        out.push_str(&format!("File{}={}\n", n, track.file));
        if let Some(title) = &track.title {
            out.push_str(&format!("Title{}={}\n", n, title));
        }
        if let Some(length) = &track.length {
            out.push_str(&format!("Length{}={}\n", n, length));
        }
    }

    out.push_str(&format!("NumberOfEntries={}\n", tracks.len()));
    out.push_str("Version=2\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_entries() {
        let text = "[playlist]\n\
                    File1=/path/to/song1.mp3\n\
                    Title1=First Song\n\
                    Length1=180\n\
                    File2=/path/to/song2.mp3\n\
                    Title2=Second Song\n\
                    Length2=240\n\
                    NumberOfEntries=2";

        let tracks = parse(text);
        assert_eq!(
            tracks,
            vec![
                Track::new("/path/to/song1.mp3")
                    .with_title("First Song")
                    .with_length("180"),
                Track::new("/path/to/song2.mp3")
                    .with_title("Second Song")
                    .with_length("240"),
            ]
        );
    }

    #[test]
    fn test_parse_file_only() {
        let tracks = parse("[playlist]\nFile1=/path/to/song.mp3\nNumberOfEntries=1");
        assert_eq!(tracks, vec![Track::new("/path/to/song.mp3")]);
    }

    #[test]
    fn test_parse_crlf() {
        let tracks = parse("[playlist]\r\nFile1=/song.mp3\r\nTitle1=Test\r\n");
        assert_eq!(tracks, vec![Track::new("/song.mp3").with_title("Test")]);
    }

    #[test]
    fn test_parse_skips_blank_and_unknown_lines() {
        let text = "[playlist]\n\nFile1=/song.mp3\n\n   \nTitle1=Test Song\n\
                    Comment1=ignored\nVersion=2\nNumberOfEntries=1\ngarbage\n";
        let tracks = parse(text);
        assert_eq!(tracks, vec![Track::new("/song.mp3").with_title("Test Song")]);
    }

    #[test]
    fn test_parse_keys_are_case_insensitive() {
        let tracks = parse("FILE1=/a.mp3\ntitle1=A\nLENGTH1=10\n");
        assert_eq!(
            tracks,
            vec![Track::new("/a.mp3").with_title("A").with_length("10")]
        );
    }

    #[test]
    fn test_parse_orders_by_index_and_drops_missing_files() {
        let text = "File10=/ten.mp3\nTitle3=orphan\nFile2=/two.mp3\nFile7=\n";
        let tracks = parse(text);
        assert_eq!(tracks, vec![Track::new("/two.mp3"), Track::new("/ten.mp3")]);
    }

    #[test]
    fn test_parse_rejects_malformed_keys() {
        let text = "File=/none.mp3\nFile1a=/bad.mp3\nFileX1=/bad.mp3\nFile-1=/neg.mp3\nFile1=/ok.mp3\n";
        assert_eq!(parse(text), vec![Track::new("/ok.mp3")]);
    }

    #[test]
    fn test_parse_keeps_equals_in_value() {
        let tracks = parse("File1=/a=b.mp3\n");
        assert_eq!(tracks[0].file, "/a=b.mp3");
    }

    #[test]
    fn test_parse_empty_document() {
        assert!(parse("").is_empty());
        assert!(parse("[playlist]\nNumberOfEntries=0\nVersion=2\n").is_empty());
    }

    #[test]
    fn test_serialize_layout() {
        let tracks = vec![
            Track::new("/a.mp3").with_title("A").with_length("100"),
            Track::new("/b.mp3").with_length("200"),
        ];

        assert_eq!(
            serialize(&tracks),
            "[playlist]\n\
             File1=/a.mp3\n\
             Title1=A\n\
             Length1=100\n\
             File2=/b.mp3\n\
             Length2=200\n\
             NumberOfEntries=2\n\
             Version=2\n"
        );
    }

    #[test]
    fn test_serialize_empty() {
        assert_eq!(serialize(&[]), "[playlist]\nNumberOfEntries=0\nVersion=2\n");
    }

    #[test]
    fn test_serialize_renumbers_from_one() {
        let parsed = parse("File5=/five.mp3\nFile9=/nine.mp3\n");
        let text = serialize(&parsed);
        assert!(text.contains("File1=/five.mp3\n"));
        assert!(text.contains("File2=/nine.mp3\n"));
    }

    #[test]
    fn test_parse_of_serialize_is_identity() {
        let tracks = vec![
            Track::new("/music/Artist - Song.flac").with_title("Song (Live)"),
            Track::new("relative/path.ogg").with_length("-1"),
            Track::new("http://radio.example/stream").with_title("  padded  "),
            Track::new("/x.mp3").with_title("").with_length("0"),
        ];
        assert_eq!(parse(&serialize(&tracks)), tracks);
    }

    #[test]
    fn test_track_json_omits_missing_fields() {
        let json = serde_json::to_string(&Track::new("/a.mp3")).unwrap();
        assert_eq!(json, r#"{"file":"/a.mp3"}"#);

        let track: Track = serde_json::from_str(r#"{"file":"/b.mp3","title":"B"}"#).unwrap();
        assert_eq!(track, Track::new("/b.mp3").with_title("B"));
    }
}
