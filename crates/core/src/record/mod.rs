use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{RasterSurface, Result, VisualiserError};

/// Configuration options for the frame recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSettings {
    pub output_dir: PathBuf,
    /// Keep one frame out of every `every` offered.
    pub every: u32,
    pub max_frames: Option<u32>,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("frames"),
            every: 1,
            max_frames: None,
        }
    }
}

/// Writes numbered PNG snapshots of a surface into a directory.
#[derive(Debug, Default)]
pub struct FrameRecorder {
    settings: RecordingSettings,
    offered: u64,
    written: u32,
    is_recording: bool,
}

impl FrameRecorder {
    pub fn new(settings: RecordingSettings) -> Self {
        Self {
            settings,
            offered: 0,
            written: 0,
            is_recording: false,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.settings.every == 0 {
            return Err(VisualiserError::InvalidConfig(
                "recording interval must be at least one frame".into(),
            ));
        }
        std::fs::create_dir_all(&self.settings.output_dir)?;
        self.is_recording = true;
        tracing::debug!(dir = %self.settings.output_dir.display(), "frame recording started");
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.is_recording {
            tracing::debug!(frames = self.written, "frame recording stopped");
        }
        self.is_recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn frames_written(&self) -> u32 {
        self.written
    }

    pub fn output_dir(&self) -> &Path {
        &self.settings.output_dir
    }

    /// Offers a rendered frame. Returns the path written, if this frame was
    /// kept.
    pub fn capture(&mut self, surface: &RasterSurface) -> Result<Option<PathBuf>> {
        if !self.is_recording {
            return Ok(None);
        }
        if self
            .settings
            .max_frames
            .is_some_and(|limit| self.written >= limit)
        {
            return Ok(None);
        }

        let index = self.offered;
        self.offered += 1;
        if index % u64::from(self.settings.every) != 0 {
            return Ok(None);
        }

        let path = self
            .settings
            .output_dir
            .join(format!("frame_{:05}.png", self.written));
        surface.save_png(&path)?;
        self.written += 1;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(dir: &Path, every: u32, max_frames: Option<u32>) -> RecordingSettings {
        RecordingSettings {
            output_dir: dir.join("frames"),
            every,
            max_frames,
        }
    }

    #[test]
    fn ignores_frames_until_started() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = FrameRecorder::new(settings(dir.path(), 1, None));
        let surface = RasterSurface::new(4, 4).unwrap();

        assert!(recorder.capture(&surface).unwrap().is_none());
        assert!(!recorder.output_dir().exists());
    }

    #[test]
    fn keeps_every_nth_frame_up_to_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = FrameRecorder::new(settings(dir.path(), 3, Some(2)));
        let surface = RasterSurface::new(4, 4).unwrap();
        recorder.start().unwrap();

        let written: Vec<_> = (0..10)
            .filter_map(|_| recorder.capture(&surface).unwrap())
            .collect();

        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("frame_00000.png"));
        assert!(written[1].ends_with("frame_00001.png"));
        assert!(written.iter().all(|path| path.exists()));
        assert_eq!(recorder.frames_written(), 2);

        recorder.stop();
        assert!(!recorder.is_recording());
    }

    #[test]
    fn rejects_a_zero_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = FrameRecorder::new(settings(dir.path(), 0, None));
        assert!(recorder.start().is_err());
    }
}
