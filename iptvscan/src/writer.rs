//! Serialization of ranked results to the output directory.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;

use iptvscan_protocol::SpeedSample;

use crate::ranker::{CategorySection, RankedPlaylist};

/// Full diagnostic record of every measured channel.
pub const SPEED_RESULTS_FILE: &str = "speed_results.txt";

/// Categorized, capped playlist.
pub const PLAYLIST_FILE: &str = "itvlist.txt";

/// Timestamp format used in section headers.
pub const HEADER_TIME_FORMAT: &str = "%Y/%m/%d %H:%M";

/// `name,url,<speed> MB/s` per line.
pub fn render_speed_results(samples: &[SpeedSample]) -> String {
    let mut out = String::new();
    for sample in samples {
        let _ = writeln!(out, "{},{},{:.3} MB/s", sample.name, sample.url, sample.speed_mb_s);
    }
    out
}

/// `<label><timestamp>更新,#genre#`
pub fn section_header(section: &CategorySection) -> String {
    format!(
        "{}{}更新,#genre#",
        section.label,
        section.generated_at.format(HEADER_TIME_FORMAT)
    )
}

pub fn render_playlist(sections: &[CategorySection]) -> String {
    let mut out = String::new();
    for (i, section) in sections.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&section_header(section));
        out.push('\n');
        for entry in &section.entries {
            let _ = writeln!(out, "{},{}", entry.name, entry.url);
        }
    }
    out
}

/// Paths written by [`OutputWriter::write`].
#[derive(Debug, Clone)]
pub struct WrittenFiles {
    pub speed_results: PathBuf,
    pub playlist: PathBuf,
}

pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write both output files, creating the directory if needed.
    pub fn write(&self, playlist: &RankedPlaylist) -> io::Result<WrittenFiles> {
        fs::create_dir_all(&self.dir)?;

        let speed_results = self.dir.join(SPEED_RESULTS_FILE);
        fs::write(&speed_results, render_speed_results(&playlist.flat))?;

        let playlist_path = self.dir.join(PLAYLIST_FILE);
        fs::write(&playlist_path, render_playlist(&playlist.sections))?;

        info!(
            "Wrote {} measured channels and {} playlist rows",
            playlist.flat.len(),
            playlist.entries().count()
        );

        Ok(WrittenFiles {
            speed_results,
            playlist: playlist_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone, Utc};
    use iptvscan_protocol::CategoryMarkers;

    use crate::ranker::Ranker;

    fn sample(name: &str, url: &str, speed: f64) -> SpeedSample {
        SpeedSample {
            name: name.to_string(),
            url: url.to_string(),
            speed_mb_s: speed,
        }
    }

    fn playlist() -> RankedPlaylist {
        let ranker = Ranker::new(
            CategoryMarkers::default(),
            8,
            FixedOffset::east_opt(8 * 3600).unwrap(),
        );
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 1, 30, 0).unwrap();
        ranker.rank_at(
            vec![
                sample("CCTV1", "http://a/1.m3u8", 100.0),
                sample("湖南卫视", "http://a/2.m3u8", 2.5),
            ],
            now,
        )
    }

    #[test]
    fn test_render_speed_results() {
        let text = render_speed_results(&[sample("CCTV5", "http://x/5.m3u8", 100.0)]);
        assert_eq!(text, "CCTV5,http://x/5.m3u8,100.000 MB/s\n");
    }

    #[test]
    fn test_render_playlist() {
        let text = render_playlist(&playlist().sections);
        assert_eq!(
            text,
            "央视频道2024/03/01 09:30更新,#genre#\n\
             CCTV1,http://a/1.m3u8\n\
             \n\
             卫视频道2024/03/01 09:30更新,#genre#\n\
             湖南卫视,http://a/2.m3u8\n\
             \n\
             其他频道2024/03/01 09:30更新,#genre#\n"
        );
    }

    #[test]
    fn test_write_creates_directory() {
        let dir = std::env::temp_dir().join(format!("iptvscan-writer-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let written = OutputWriter::new(dir.join("nested")).write(&playlist()).unwrap();

        let speeds = fs::read_to_string(&written.speed_results).unwrap();
        assert_eq!(speeds.lines().count(), 2);
        assert!(speeds.starts_with("CCTV1,http://a/1.m3u8,100.000 MB/s"));

        let list = fs::read_to_string(&written.playlist).unwrap();
        assert!(list.contains("湖南卫视,http://a/2.m3u8"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
