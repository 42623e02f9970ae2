//! Video file and network stream capture through `ffmpeg` subprocesses.
//!
//! Metadata comes from `ffprobe` (JSON output); frames come from an `ffmpeg`
//! decoder writing `rgb24` rawvideo to its stdout. Seeking a file restarts
//! the decoder at the requested frame's timestamp, or from the start with the
//! leading frames discarded when the frame rate is unknown.

use crate::fourcc::FourCC;
use crate::source::{CaptureError, CaptureResource, FrameData, Property, SourceKind};
use image::RgbImage;
use serde::Deserialize;
use std::ffi::OsString;
use std::io::{self, ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Stream metadata reported by `ffprobe`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeInfo {
    pub width: u32,
    pub height: u32,
    pub fps: Option<f64>,
    pub frame_count: Option<u64>,
    /// Bits per second.
    pub bitrate: Option<f64>,
    pub fourcc: Option<FourCC>,
    pub codec: Option<String>,
    /// Seconds.
    pub duration: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    codec_name: Option<String>,
    codec_tag_string: Option<String>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

impl ProbeInfo {
    /// Parse the output of `ffprobe -of json -show_entries stream=...:format=...`.
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        let output: ProbeOutput = serde_json::from_str(json)
            .map_err(|e| CaptureError::UnsupportedFormat(format!("bad ffprobe output: {e}")))?;

        let stream = output
            .streams
            .into_iter()
            .find(|s| s.width.is_some() && s.height.is_some())
            .ok_or_else(|| CaptureError::UnsupportedFormat("no video stream".to_string()))?;
        let (width, height) = (stream.width.unwrap_or(0), stream.height.unwrap_or(0));
        if width == 0 || height == 0 {
            return Err(CaptureError::UnsupportedFormat(format!(
                "video stream has no pixels ({width}x{height})"
            )));
        }
        let format = output.format.unwrap_or_default();

        let fps = stream
            .avg_frame_rate
            .as_deref()
            .and_then(parse_rate)
            .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate));
        let duration = format.duration.as_deref().and_then(parse_number);
        let frame_count = stream
            .nb_frames
            .as_deref()
            .and_then(|n| n.parse::<u64>().ok())
            .filter(|&n| n > 0)
            .or_else(|| match (duration, fps) {
                (Some(d), Some(f)) => Some((d * f).round() as u64),
                _ => None,
            });
        let bitrate = stream
            .bit_rate
            .as_deref()
            .and_then(parse_number)
            .or_else(|| format.bit_rate.as_deref().and_then(parse_number));
        let fourcc = stream
            .codec_tag_string
            .as_deref()
            .filter(|tag| tag.len() == 4 && tag.bytes().all(|b| b.is_ascii_alphanumeric()))
            .and_then(|tag| tag.parse().ok());

        Ok(Self {
            width,
            height,
            fps,
            frame_count,
            bitrate,
            fourcc,
            codec: stream.codec_name,
            duration,
        })
    }

    fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Parse an ffprobe rational such as `30000/1001`. `0/0` is unknown.
fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    (den > 0.0 && num > 0.0).then(|| num / den)
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn is_rtsp(input: &str) -> bool {
    input.to_ascii_lowercase().starts_with("rtsp://")
}

#[derive(Debug, Clone)]
struct Tool {
    program: OsString,
    args: Vec<OsString>,
}

impl Tool {
    fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// How `ffmpeg` and `ffprobe` are invoked. Defaults to the programs on `PATH`.
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    ffmpeg: Tool,
    ffprobe: Tool,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self {
            ffmpeg: Tool::new("ffmpeg"),
            ffprobe: Tool::new("ffprobe"),
        }
    }
}

impl FfmpegTools {
    /// Run the decoder as `program args... <ffmpeg arguments>`.
    pub fn with_ffmpeg(
        mut self,
        program: impl Into<OsString>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Self {
        self.ffmpeg = Tool {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        };
        self
    }

    /// Run the prober as `program args... <ffprobe arguments>`.
    pub fn with_ffprobe(
        mut self,
        program: impl Into<OsString>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Self {
        self.ffprobe = Tool {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        };
        self
    }
}

struct Decoder {
    child: Child,
    stdout: ChildStdout,
    /// Frames to discard before the next one is returned.
    skip: u64,
}

impl Decoder {
    fn read_frame(&mut self, buffer: &mut [u8]) -> io::Result<()> {
        while self.skip > 0 {
            self.stdout.read_exact(buffer)?;
            self.skip -= 1;
        }
        self.stdout.read_exact(buffer)
    }

    fn stop(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A video file or network stream decoded by `ffmpeg`.
pub struct FfmpegCapture {
    input: String,
    kind: SourceKind,
    tools: FfmpegTools,
    info: ProbeInfo,
    decoder: Option<Decoder>,
    position: u64,
    start_time: Instant,
    exhausted: bool,
    open: bool,
}

impl FfmpegCapture {
    /// Open a video file.
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        Self::open_file_with(path, &FfmpegTools::default())
    }

    /// Open a video file using `tools`.
    pub fn open_file_with<P: AsRef<Path>>(
        path: P,
        tools: &FfmpegTools,
    ) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CaptureError::SourceUnavailable(format!(
                "could not read video '{}'",
                path.display()
            )));
        }
        Self::open(path.to_string_lossy().into_owned(), SourceKind::Video, tools)
    }

    /// Connect to a network stream such as `rtsp://host:554/path`.
    pub fn open_stream(address: &str) -> Result<Self, CaptureError> {
        Self::open_stream_with(address, &FfmpegTools::default())
    }

    /// Connect to a network stream using `tools`.
    pub fn open_stream_with(address: &str, tools: &FfmpegTools) -> Result<Self, CaptureError> {
        if address.trim().is_empty() {
            return Err(CaptureError::SourceUnavailable(
                "empty network address".to_string(),
            ));
        }
        Self::open(address.trim().to_string(), SourceKind::Network, tools)
    }

    fn open(input: String, kind: SourceKind, tools: &FfmpegTools) -> Result<Self, CaptureError> {
        info!("Opening {:?} source {}", kind, input);

        let info = probe(&tools.ffprobe, &input)?;
        info!(
            "Source opened: {}x{} @ {:?} fps, {:?} frames",
            info.width, info.height, info.fps, info.frame_count
        );

        let mut capture = Self {
            input,
            kind,
            tools: tools.clone(),
            info,
            decoder: None,
            position: 0,
            start_time: Instant::now(),
            exhausted: false,
            open: true,
        };
        // Fail now rather than on the first pull if ffmpeg cannot start.
        capture.ensure_decoder()?;
        Ok(capture)
    }

    /// Metadata read when the source was opened.
    pub fn info(&self) -> &ProbeInfo {
        &self.info
    }

    fn ensure_decoder(&mut self) -> Result<&mut Decoder, CaptureError> {
        if self.decoder.is_none() {
            let decoder = self.spawn_decoder()?;
            self.decoder = Some(decoder);
        }
        self.decoder.as_mut().ok_or(CaptureError::Closed)
    }

    fn spawn_decoder(&self) -> Result<Decoder, CaptureError> {
        let mut cmd = self.tools.ffmpeg.command();
        cmd.arg("-hide_banner").arg("-loglevel").arg("error");

        if is_rtsp(&self.input) {
            cmd.arg("-rtsp_transport").arg("tcp");
        }

        // Without a frame rate there is no timestamp to seek to, so decode
        // from the start and drop frames up to the position.
        let mut skip = 0;
        if self.kind == SourceKind::Video && self.position > 0 {
            match self.info.fps {
                Some(fps) => {
                    cmd.arg("-ss")
                        .arg(format!("{:.6}", self.position as f64 / fps));
                }
                None => skip = self.position,
            }
        }

        cmd.arg("-i")
            .arg(&self.input)
            .arg("-an")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-f")
            .arg("rawvideo")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        debug!("Starting decoder for {} at frame {}", self.input, self.position);

        let mut child = cmd.spawn().map_err(|e| {
            CaptureError::SourceUnavailable(format!("could not start ffmpeg: {e}"))
        })?;
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CaptureError::SourceUnavailable(
                "failed to capture ffmpeg stdout".to_string(),
            ));
        };

        Ok(Decoder {
            child,
            stdout,
            skip,
        })
    }

    fn stop_decoder(&mut self) {
        if let Some(decoder) = self.decoder.take() {
            decoder.stop();
        }
    }

    #[cfg(test)]
    fn decoder_pid(&self) -> Option<u32> {
        self.decoder.as_ref().map(|decoder| decoder.child.id())
    }
}

fn probe(ffprobe: &Tool, input: &str) -> Result<ProbeInfo, CaptureError> {
    let mut cmd = ffprobe.command();
    cmd.arg("-v").arg("error");
    if is_rtsp(input) {
        cmd.arg("-rtsp_transport").arg("tcp");
    }
    cmd.arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=width,height,codec_name,codec_tag_string,avg_frame_rate,r_frame_rate,nb_frames,bit_rate:format=duration,bit_rate")
        .arg("-of")
        .arg("json")
        .arg(input)
        .stdin(Stdio::null());

    let output = cmd
        .output()
        .map_err(|e| CaptureError::SourceUnavailable(format!("could not run ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CaptureError::SourceUnavailable(format!(
            "ffprobe rejected '{}': {}",
            input,
            stderr.trim()
        )));
    }

    let json = String::from_utf8_lossy(&output.stdout);
    ProbeInfo::from_json(&json).map_err(|e| CaptureError::SourceUnavailable(e.to_string()))
}

impl CaptureResource for FfmpegCapture {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn backend_name(&self) -> &str {
        "ffmpeg"
    }

    fn pull_frame(&mut self) -> Result<Option<FrameData>, CaptureError> {
        if !self.open {
            return Err(CaptureError::Closed);
        }
        if self.exhausted {
            return Ok(None);
        }

        let mut buffer = vec![0u8; self.info.frame_bytes()];
        let read = self.ensure_decoder()?.read_frame(&mut buffer);

        match read {
            Ok(()) => {
                let frame_number = self.position;
                let timestamp = match (self.kind, self.info.fps) {
                    (SourceKind::Video, Some(fps)) => frame_number as f64 / fps,
                    _ => self.start_time.elapsed().as_secs_f64(),
                };
                self.position += 1;
                let image = RgbImage::from_raw(self.info.width, self.info.height, buffer)
                    .ok_or_else(|| {
                        CaptureError::ReadFailure("frame buffer size mismatch".to_string())
                    })?;
                Ok(Some(FrameData::new(image, timestamp, frame_number)))
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("Decoder for {} reached end of stream", self.input);
                self.exhausted = true;
                self.stop_decoder();
                Ok(None)
            }
            Err(e) => {
                warn!("Read from {} failed: {}", self.input, e);
                Err(CaptureError::ReadFailure(e.to_string()))
            }
        }
    }

    fn seek(&mut self, frame: u64) -> Result<(), CaptureError> {
        if !self.open {
            return Err(CaptureError::Closed);
        }
        if self.kind != SourceKind::Video {
            return Ok(());
        }
        if let Some(count) = self.info.frame_count {
            if frame >= count {
                return Err(CaptureError::OutOfRange {
                    requested: frame,
                    available: count,
                });
            }
        }
        if frame == self.position && self.decoder.is_some() {
            return Ok(());
        }

        self.stop_decoder();
        self.position = frame;
        self.exhausted = false;
        Ok(())
    }

    fn is_seekable(&self) -> bool {
        self.kind == SourceKind::Video
    }

    fn property(&self, property: Property) -> Option<f64> {
        match property {
            Property::Width => Some(self.info.width as f64),
            Property::Height => Some(self.info.height as f64),
            Property::FourCC => self.info.fourcc.map(|code| code.to_u32() as f64),
            Property::Fps => self.info.fps,
            Property::Position => Some(self.position as f64),
            Property::PositionMs => self
                .info
                .fps
                .map(|fps| self.position as f64 * 1000.0 / fps),
            Property::FrameCount => self.info.frame_count.map(|n| n as f64),
            Property::Bitrate => self.info.bitrate,
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.stop_decoder();
        self.open = false;
        info!("Closed {} after {} frames", self.input, self.position);
    }
}

impl Drop for FfmpegCapture {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "programs": [],
        "streams": [
            {
                "codec_name": "h264",
                "codec_tag_string": "avc1",
                "width": 1280,
                "height": 720,
                "r_frame_rate": "30/1",
                "avg_frame_rate": "30000/1001",
                "bit_rate": "2500000",
                "nb_frames": "300"
            }
        ],
        "format": {
            "duration": "10.010000",
            "bit_rate": "2600000"
        }
    }"#;

    #[test]
    fn test_probe_parsing() {
        let info = ProbeInfo::from_json(PROBE_JSON).unwrap();
        assert_eq!((info.width, info.height), (1280, 720));
        assert!((info.fps.unwrap() - 29.97).abs() < 0.01);
        assert_eq!(info.frame_count, Some(300));
        assert_eq!(info.bitrate, Some(2_500_000.0));
        assert_eq!(info.fourcc, Some(FourCC(*b"avc1")));
        assert_eq!(info.codec.as_deref(), Some("h264"));
    }

    #[test]
    fn test_probe_estimates_frame_count() {
        let json = r#"{
            "streams": [{"width": 64, "height": 48, "avg_frame_rate": "0/0",
                         "r_frame_rate": "25/1", "codec_tag_string": "[0][0][0][0]"}],
            "format": {"duration": "2.0"}
        }"#;
        let info = ProbeInfo::from_json(json).unwrap();
        assert_eq!(info.fps, Some(25.0));
        assert_eq!(info.frame_count, Some(50));
        assert_eq!(info.fourcc, None);
        assert_eq!(info.bitrate, None);
    }

    #[test]
    fn test_probe_without_video_stream() {
        let json = r#"{"streams": [{"codec_name": "aac"}]}"#;
        assert!(matches!(
            ProbeInfo::from_json(json),
            Err(CaptureError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_zero_sized_stream_is_unsupported() {
        let json = r#"{"streams": [{"width": 0, "height": 480, "r_frame_rate": "25/1"}]}"#;
        assert!(matches!(
            ProbeInfo::from_json(json),
            Err(CaptureError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("25/1"), Some(25.0));
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("garbage"), None);
    }

    #[test]
    fn test_missing_video_is_unavailable() {
        let result = FfmpegCapture::open_file("/no/such/video.mp4");
        assert!(matches!(result, Err(CaptureError::SourceUnavailable(_))));
    }

    #[test]
    fn test_empty_address_is_unavailable() {
        let result = FfmpegCapture::open_stream("   ");
        assert!(matches!(result, Err(CaptureError::SourceUnavailable(_))));
    }

    /// Scratch directory holding shell stand-ins for `ffprobe` and `ffmpeg`.
    #[cfg(unix)]
    struct StubTools {
        dir: std::path::PathBuf,
    }

    #[cfg(unix)]
    impl StubTools {
        /// Ten 2x2 frames. `rate` is the reported frame rate, `0/0` for none.
        fn new(name: &str, rate: &str, decoder: &str) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "lantern-ffmpeg-{}-{}",
                name,
                std::process::id()
            ));
            std::fs::create_dir_all(&dir).unwrap();
            let json = format!(
                r#"{{"streams": [{{"width": 2, "height": 2, "avg_frame_rate": "{rate}", "r_frame_rate": "{rate}", "nb_frames": "10"}}], "format": {{}}}}"#
            );
            std::fs::write(dir.join("info.json"), json).unwrap();
            std::fs::write(
                dir.join("ffprobe.sh"),
                format!("cat '{}'\n", dir.join("info.json").display()),
            )
            .unwrap();
            std::fs::write(dir.join("ffmpeg.sh"), decoder).unwrap();
            std::fs::write(dir.join("clip.mp4"), b"").unwrap();
            Self { dir }
        }

        /// Every byte of frame `i` is `i`; honours `-ss` in whole seconds.
        fn counting(name: &str, rate: &str) -> Self {
            Self::new(
                name,
                rate,
                r#"start=0
while [ $# -gt 0 ]; do
  if [ "$1" = "-ss" ]; then start=${2%%.*}; fi
  shift
done
i=$start
while [ $i -lt 10 ]; do
  head -c 12 /dev/zero | tr '\000' "\\$(printf '%03o' $i)"
  i=$((i + 1))
done
"#,
            )
        }

        fn tools(&self) -> FfmpegTools {
            FfmpegTools::default()
                .with_ffprobe("sh", [self.dir.join("ffprobe.sh")])
                .with_ffmpeg("sh", [self.dir.join("ffmpeg.sh")])
        }

        fn open(&self) -> FfmpegCapture {
            FfmpegCapture::open_file_with(self.dir.join("clip.mp4"), &self.tools()).unwrap()
        }
    }

    #[cfg(unix)]
    impl Drop for StubTools {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    #[cfg(unix)]
    fn pull(capture: &mut FfmpegCapture) -> FrameData {
        capture.pull_frame().unwrap().unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn test_pull_reads_frames_in_order() {
        let stubs = StubTools::counting("order", "1/1");
        let mut capture = stubs.open();
        assert_eq!(capture.info().frame_count, Some(10));

        let first = pull(&mut capture);
        assert_eq!(first.frame_number, 0);
        assert_eq!(first.image.dimensions(), (2, 2));
        assert_eq!(first.image.get_pixel(1, 1).0, [0, 0, 0]);
        assert_eq!(capture.property(Property::Position), Some(1.0));

        let second = pull(&mut capture);
        assert_eq!(second.frame_number, 1);
        assert_eq!(second.image.get_pixel(0, 0).0, [1, 1, 1]);
        assert_eq!(second.timestamp, 1.0);
        assert_eq!(capture.property(Property::Position), Some(2.0));
    }

    #[cfg(unix)]
    #[test]
    fn test_end_of_stream() {
        let stubs = StubTools::counting("end", "1/1");
        let mut capture = stubs.open();
        for expected in 0..10 {
            assert_eq!(pull(&mut capture).frame_number, expected);
        }
        assert!(capture.pull_frame().unwrap().is_none());
        assert!(capture.pull_frame().unwrap().is_none());
        assert_eq!(capture.decoder_pid(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_seek_restarts_at_timestamp() {
        let stubs = StubTools::counting("seek", "1/1");
        let mut capture = stubs.open();
        pull(&mut capture);

        capture.seek(5).unwrap();
        let frame = pull(&mut capture);
        assert_eq!(frame.frame_number, 5);
        assert_eq!(frame.image.get_pixel(0, 0).0, [5, 5, 5]);
        assert_eq!(capture.property(Property::Position), Some(6.0));

        capture.seek(9).unwrap();
        assert_eq!(pull(&mut capture).image.get_pixel(0, 0).0, [9, 9, 9]);
        assert!(capture.pull_frame().unwrap().is_none());

        capture.seek(0).unwrap();
        assert_eq!(pull(&mut capture).image.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[cfg(unix)]
    #[test]
    fn test_seek_without_frame_rate_skips_frames() {
        let stubs = StubTools::counting("skip", "0/0");
        let mut capture = stubs.open();
        assert_eq!(capture.info().fps, None);

        capture.seek(5).unwrap();
        let frame = pull(&mut capture);
        assert_eq!(frame.frame_number, 5);
        assert_eq!(frame.image.get_pixel(0, 0).0, [5, 5, 5]);

        let next = pull(&mut capture);
        assert_eq!(next.frame_number, 6);
        assert_eq!(next.image.get_pixel(1, 0).0, [6, 6, 6]);
    }

    #[cfg(unix)]
    #[test]
    fn test_seek_past_end_is_out_of_range() {
        let stubs = StubTools::counting("range", "1/1");
        let mut capture = stubs.open();
        assert!(matches!(
            capture.seek(10),
            Err(CaptureError::OutOfRange {
                requested: 10,
                available: 10
            })
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_close_kills_decoder() {
        let stubs = StubTools::new(
            "close",
            "1/1",
            "while :; do head -c 12 /dev/zero; sleep 0.01; done\n",
        );
        let mut capture = stubs.open();
        pull(&mut capture);
        let pid = capture.decoder_pid().unwrap();
        let proc_dir = std::path::PathBuf::from(format!("/proc/{pid}"));
        assert!(proc_dir.exists());

        capture.close();
        assert!(!capture.is_open());
        assert_eq!(capture.decoder_pid(), None);
        assert!(!proc_dir.exists());
        assert!(matches!(capture.pull_frame(), Err(CaptureError::Closed)));
    }
}
