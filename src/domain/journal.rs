//! Journal entries and recording validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const MAX_AUDIO_SIZE: usize = 10 * 1024 * 1024;

/// Transcript attached to every recording until speech-to-text exists.
pub const SIMULATED_TRANSCRIPT: &str = "This is a simulated transcript of your audio recording. In a real application, this would be generated using a speech-to-text service.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub audio_url: Option<String>,
    pub transcript: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewJournalEntry {
    pub user_id: Uuid,
    pub audio_url: Option<String>,
    pub transcript: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalRequest {
    pub transcript: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    #[error("Add a recording transcript or some notes before saving")]
    Empty,
    #[error("No audio file provided")]
    NoAudio,
    #[error("Recording too large. Maximum size is 10MB.")]
    TooLarge,
    #[error("File content is not a supported audio format")]
    UnsupportedAudio,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Builds the entry to insert. The request transcript wins over the draft's.
pub fn validate_entry(
    user_id: Uuid,
    request: &JournalRequest,
    draft_audio_url: Option<String>,
    draft_transcript: Option<&str>,
) -> Result<NewJournalEntry, JournalError> {
    let transcript = match request.transcript.as_deref() {
        Some(t) => non_empty(Some(t)),
        None => non_empty(draft_transcript),
    };
    let notes = non_empty(request.notes.as_deref());
    if transcript.is_none() && notes.is_none() {
        return Err(JournalError::Empty);
    }
    Ok(NewJournalEntry {
        user_id,
        audio_url: draft_audio_url,
        transcript,
        notes,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Webm,
    Ogg,
    Mp3,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Webm => "webm",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Mp3 => "mp3",
        }
    }
}

pub fn detect_audio_format(bytes: &[u8]) -> Option<AudioFormat> {
    match bytes {
        // RIFF....WAVE
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x41, 0x56, 0x45, ..] => Some(AudioFormat::Wav),
        // EBML header
        [0x1A, 0x45, 0xDF, 0xA3, ..] => Some(AudioFormat::Webm),
        // OggS
        [0x4F, 0x67, 0x67, 0x53, ..] => Some(AudioFormat::Ogg),
        // ID3 tag or bare MPEG frame sync
        [0x49, 0x44, 0x33, ..] => Some(AudioFormat::Mp3),
        [0xFF, b, ..] if b & 0xE0 == 0xE0 => Some(AudioFormat::Mp3),
        _ => None,
    }
}

pub fn validate_audio(bytes: &[u8]) -> Result<AudioFormat, JournalError> {
    if bytes.is_empty() {
        return Err(JournalError::NoAudio);
    }
    if bytes.len() > MAX_AUDIO_SIZE {
        return Err(JournalError::TooLarge);
    }
    detect_audio_format(bytes).ok_or(JournalError::UnsupportedAudio)
}
