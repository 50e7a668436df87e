use rodio::{OutputStream, Sink, Source};
use std::f32::consts::PI;
use std::sync::{
    mpsc::{self, Sender},
    Mutex,
};
use std::thread;
use std::time::Duration;

use super::{NotificationSettings, Notifier};

const SAMPLE_RATE: u32 = 44100;
const FADE_SAMPLES: usize = 220;

/// Short mono sine beep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub freq: f32,
    pub duration: Duration,
    pub volume: f32,
}

impl Tone {
    pub fn from_settings(settings: &NotificationSettings) -> Self {
        Self {
            freq: settings.tone_hz,
            duration: Duration::from_millis(settings.tone_ms),
            volume: settings.volume.clamp(0.0, 1.0),
        }
    }

    fn source(&self) -> ToneSource {
        let total = (self.duration.as_millis() as u64 * SAMPLE_RATE as u64 / 1000) as usize;
        ToneSource {
            freq: self.freq,
            amplitude: self.volume * 0.3,
            num_sample: 0,
            total,
        }
    }
}

struct ToneSource {
    freq: f32,
    amplitude: f32,
    num_sample: usize,
    total: usize,
}

impl Iterator for ToneSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total {
            return None;
        }
        let t = self.num_sample as f32 / SAMPLE_RATE as f32;

        // Linear ramps at both ends keep the speaker from clicking
        let edge = self.num_sample.min(self.total - self.num_sample);
        let envelope = (edge as f32 / FADE_SAMPLES as f32).min(1.0);

        self.num_sample += 1;
        Some((2.0 * PI * self.freq * t).sin() * self.amplitude * envelope)
    }
}

impl Source for ToneSource {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total - self.num_sample)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(self.total as f32 / SAMPLE_RATE as f32))
    }
}

/// Plays the tone on a dedicated audio thread that owns the non-Send rodio objects.
pub struct ToneNotifier {
    tone: Tone,
    tx: Mutex<Option<Sender<Tone>>>,
}

impl ToneNotifier {
    pub fn new(tone: Tone) -> Self {
        Self {
            tone,
            tx: Mutex::new(None),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<Tone>, String> {
        let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<Tone>();
        thread::Builder::new()
            .name("detection-tone".to_string())
            .spawn(move || {
                let Ok((_stream, handle)) = OutputStream::try_default() else {
                    log::warn!("no audio output device; detection tones disabled");
                    return;
                };
                while let Ok(tone) = rx.recv() {
                    match Sink::try_new(&handle) {
                        Ok(sink) => {
                            sink.append(tone.source());
                            sink.detach();
                        }
                        Err(err) => log::warn!("failed to create audio sink: {err}"),
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl Notifier for ToneNotifier {
    fn beep(&self) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(self.tone).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_is_finite_and_fades() {
        let tone = Tone {
            freq: 1000.0,
            duration: Duration::from_millis(100),
            volume: 1.0,
        };
        let samples: Vec<f32> = tone.source().collect();
        assert_eq!(samples.len(), 4410);
        assert_eq!(samples[0], 0.0);
        assert!(samples.iter().all(|s| s.abs() <= 0.3 + f32::EPSILON));
    }
}
