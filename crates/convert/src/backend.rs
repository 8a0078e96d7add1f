use crate::error::{Error, ErrorKind};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use tokio::process::Command;

/// External tools we know how to drive, in the order they're usually
/// preferred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendId {
    /// The `AAXtoMP3` script; splits by chapter.
    AaxToMp3,
    /// Plain FFmpeg; one output file per source.
    Ffmpeg,
}
impl BackendId {
    pub const ALL: [BackendId; 2] = [Self::AaxToMp3, Self::Ffmpeg];

    /// Config id, as written in `converter.backends`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AaxToMp3 => "aaxtomp3",
            Self::Ffmpeg => "ffmpeg",
        }
    }

    /// Executable name looked up on `PATH`.
    pub fn program(&self) -> &'static str {
        match self {
            Self::AaxToMp3 => "AAXtoMP3",
            Self::Ffmpeg => "ffmpeg",
        }
    }
}
impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for BackendId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        match Self::ALL.into_iter().find(|id| id.as_str().eq_ignore_ascii_case(wanted)) {
            Some(id) => Ok(id),
            None => exn::bail!(ErrorKind::UnknownBackend(s.to_string())),
        }
    }
}

/// A backend whose executable was found and passed its capability check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Backend {
    id: BackendId,
    program: PathBuf,
}
impl Backend {
    /// Use `program` for `id` without probing.
    pub fn new(id: BackendId, program: impl Into<PathBuf>) -> Self {
        Self { id, program: program.into() }
    }

    /// Looks for `id` on `PATH`. Blocking: it may run `<program> -version`.
    pub fn discover(id: BackendId) -> Option<Self> {
        let Ok(program) = which::which(id.program()) else {
            tracing::debug!(backend = %id, "Converter executable not found in PATH");
            return None;
        };
        tracing::trace!(backend = %id, program = %program.display(), "Discovered converter executable");
        let capable = match id {
            BackendId::Ffmpeg => responds_to_version(&program),
            // AAXtoMP3 is a shell script wrapping FFmpeg; without it on PATH
            // the script fails on every file.
            BackendId::AaxToMp3 => {
                which::which(BackendId::Ffmpeg.program()).is_ok_and(|ffmpeg| responds_to_version(&ffmpeg))
            },
        };
        if !capable {
            tracing::info!(backend = %id, program = %program.display(), "Converter found but not usable");
            return None;
        }
        Some(Self { id, program })
    }

    pub fn id(&self) -> BackendId {
        self.id
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Builds the invocation that converts `source` into `out_dir` using the
    /// activation `secret`.
    pub(crate) fn command(&self, source: &Path, secret: &str, out_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(source, secret, out_dir));
        cmd
    }

    fn args(&self, source: &Path, secret: &str, out_dir: &Path) -> Vec<OsString> {
        match self.id {
            BackendId::AaxToMp3 => vec![
                "--authcode".into(),
                secret.into(),
                "--target_dir".into(),
                out_dir.into(),
                source.into(),
            ],
            BackendId::Ffmpeg => {
                let stem = source.file_stem().map(OsString::from).unwrap_or_else(|| "converted".into());
                let mut output = out_dir.join(stem);
                output.set_extension(crate::OUTPUT_EXTENSION);
                vec![
                    "-nostdin".into(),
                    "-hide_banner".into(),
                    "-loglevel".into(),
                    "error".into(),
                    "-y".into(),
                    "-activation_bytes".into(),
                    secret.into(),
                    "-i".into(),
                    source.into(),
                    "-vn".into(),
                    "-c:a".into(),
                    "libmp3lame".into(),
                    output.into(),
                ]
            },
        }
    }
}

fn responds_to_version(program: &Path) -> bool {
    std::process::Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("aaxtomp3", BackendId::AaxToMp3)]
    #[case("AAXtoMP3", BackendId::AaxToMp3)]
    #[case(" ffmpeg ", BackendId::Ffmpeg)]
    fn test_parse_backend_id(#[case] input: &str, #[case] expected: BackendId) {
        assert_eq!(input.parse::<BackendId>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_backend() {
        let err = "handbrake".parse::<BackendId>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnknownBackend(name) if name == "handbrake"));
    }

    #[test]
    fn test_display_matches_config_id() {
        for id in BackendId::ALL {
            assert_eq!(id.to_string().parse::<BackendId>().unwrap(), id);
        }
    }

    #[test]
    fn test_aaxtomp3_args() {
        let backend = Backend::new(BackendId::AaxToMp3, "/usr/bin/AAXtoMP3");
        let args = backend.args(Path::new("/in/Book.aax"), "1a2b3c4d", Path::new("/scratch"));
        let expected: Vec<OsString> = ["--authcode", "1a2b3c4d", "--target_dir", "/scratch", "/in/Book.aax"]
            .into_iter()
            .map(OsString::from)
            .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_ffmpeg_args_name_output_after_source() {
        let backend = Backend::new(BackendId::Ffmpeg, "ffmpeg");
        let args = backend.args(Path::new("/in/Book.aax"), "1a2b3c4d", Path::new("/scratch"));
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-activation_bytes") + 1], "1a2b3c4d");
        assert_eq!(args[pos("-i") + 1], "/in/Book.aax");
        assert_eq!(args.last().unwrap(), &OsString::from("/scratch/Book.mp3"));
    }
}
