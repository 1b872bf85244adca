//! Scriptable stand-in for the speech model.
//!
//! Each script is keyed by a suffix of the source reference (normally the
//! upload's filename), so a test decides per file how "inference" behaves:
//! a fixed list of segments, a failure, silence probed from a WAV header, or
//! a live feed the test pushes segments into one at a time.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crossbeam_channel::{unbounded, Receiver, Sender};

use murmur::{
    InferenceAdapter, InferenceError, Segment, SegmentStream, SourceRef, Transcription,
    TranscriptionParams,
};

pub type Feed = Sender<Result<Segment, InferenceError>>;

enum Script {
    Segments {
        duration: Option<f64>,
        items: Vec<Result<Segment, InferenceError>>,
    },
    StartFailure(InferenceError),
    /// Reads the WAV header of the local file for the duration, yields nothing.
    Silence,
    Live {
        duration: Option<f64>,
        receiver: Receiver<Result<Segment, InferenceError>>,
    },
}

#[derive(Default)]
pub struct FakeAdapter {
    scripts: Mutex<Vec<(String, Script)>>,
    calls: AtomicUsize,
    seen_params: Mutex<Vec<TranscriptionParams>>,
}

impl FakeAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, key: &str, script: Script) {
        self.scripts.lock().unwrap().push((key.to_string(), script));
    }

    /// Yields `segments` in order, then ends.
    pub fn segments(&self, key: &str, duration: Option<f64>, segments: Vec<Segment>) {
        self.add(
            key,
            Script::Segments {
                duration,
                items: segments.into_iter().map(Ok).collect(),
            },
        );
    }

    /// Yields `before`, then fails with `error`.
    pub fn fail_after(&self, key: &str, duration: Option<f64>, before: Vec<Segment>, error: InferenceError) {
        let mut items: Vec<_> = before.into_iter().map(Ok).collect();
        items.push(Err(error));
        self.add(key, Script::Segments { duration, items });
    }

    pub fn fail_on_start(&self, key: &str, error: InferenceError) {
        self.add(key, Script::StartFailure(error));
    }

    pub fn silence(&self, key: &str) {
        self.add(key, Script::Silence);
    }

    /// Segments are delivered as the test sends them; the stream ends when
    /// the returned sender is dropped.
    pub fn live(&self, key: &str, duration: Option<f64>) -> Feed {
        let (sender, receiver) = unbounded();
        self.add(key, Script::Live { duration, receiver });
        sender
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_params(&self) -> Vec<TranscriptionParams> {
        self.seen_params.lock().unwrap().clone()
    }

    fn take_script(&self, source: &SourceRef) -> Option<Script> {
        let mut scripts = self.scripts.lock().unwrap();
        let index = scripts
            .iter()
            .position(|(key, _)| source.as_str().ends_with(key.as_str()))?;
        Some(scripts.remove(index).1)
    }
}

impl InferenceAdapter for FakeAdapter {
    fn transcribe(
        &self,
        source: &SourceRef,
        local_path: Option<&Path>,
        params: &TranscriptionParams,
    ) -> Result<Transcription, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_params.lock().unwrap().push(params.clone());

        let script = self
            .take_script(source)
            .ok_or_else(|| InferenceError::Decode(format!("no script for {}", source)))?;

        let language = params.language.clone().or_else(|| Some("en".to_string()));
        match script {
            Script::Segments { duration, items } => {
                let stream: SegmentStream = Box::new(items.into_iter());
                Ok(Transcription::new(stream)
                    .with_duration(duration)
                    .with_language(language))
            }
            Script::StartFailure(error) => Err(error),
            Script::Silence => {
                let path = local_path
                    .ok_or_else(|| InferenceError::Decode("source is not local".to_string()))?;
                let bytes = std::fs::read(path).map_err(|e| InferenceError::Decode(e.to_string()))?;
                let duration = wav_duration(&bytes)
                    .ok_or_else(|| InferenceError::Decode("not a WAV file".to_string()))?;
                let stream: SegmentStream = Box::new(std::iter::empty());
                Ok(Transcription::new(stream)
                    .with_duration(Some(duration))
                    .with_language(language))
            }
            Script::Live { duration, receiver } => {
                let stream: SegmentStream = Box::new(receiver.into_iter());
                Ok(Transcription::new(stream)
                    .with_duration(duration)
                    .with_language(language))
            }
        }
    }
}

/// 16-bit mono PCM WAV of silence.
pub fn silent_wav(seconds: u32) -> Vec<u8> {
    const SAMPLE_RATE: u32 = 16_000;
    let data_len = SAMPLE_RATE * 2 * seconds;

    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(44 + data_len as usize, 0);
    wav
}

fn wav_duration(bytes: &[u8]) -> Option<f64> {
    if bytes.len() < 44 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }
    let byte_rate = u32::from_le_bytes(bytes[28..32].try_into().ok()?);
    let data_len = u32::from_le_bytes(bytes[40..44].try_into().ok()?);
    (byte_rate > 0).then(|| f64::from(data_len) / f64::from(byte_rate))
}
