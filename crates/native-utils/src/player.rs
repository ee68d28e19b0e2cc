use crate::audio::{resample_mono, shared_buffer};
use crate::device::get_or_default_output;
use anyhow::{Context, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use storytime_core::audio::AudioClip;
use storytime_core::playback::{AudioOutput, OutputState};
use tokio::sync::{Mutex, Notify, oneshot};

/// Seconds of audio the ring buffer between `play` and the device can hold.
pub const OUTPUT_BUFFER_SECS: usize = 2;
/// How long `play` waits for room in a full ring buffer before trying again.
const FEED_RETRY: Duration = Duration::from_millis(10);

enum Control {
    Resume(oneshot::Sender<Result<()>>),
    Shutdown,
}

struct Feed {
    producer: HeapProd<f32>,
    // Total samples ever pushed into the ring buffer.
    queued: u64,
}

/// The `play` side of the ring buffer: queues samples and waits for the device
/// to report them consumed.
struct PlaybackQueue {
    feed: Mutex<Feed>,
    played: Arc<AtomicU64>,
    drained: Arc<Notify>,
}

impl PlaybackQueue {
    fn new(producer: HeapProd<f32>, played: Arc<AtomicU64>, drained: Arc<Notify>) -> Self {
        Self {
            feed: Mutex::new(Feed {
                producer,
                queued: 0,
            }),
            played,
            drained,
        }
    }

    /// Queues `samples` and resolves once the device has consumed every one of them.
    async fn play(&self, samples: &[f32]) {
        let end = {
            let mut feed = self.feed.lock().await;
            let mut rest = samples;
            while !rest.is_empty() {
                let pushed = feed.producer.push_slice(rest);
                rest = &rest[pushed..];
                if !rest.is_empty() {
                    tokio::time::sleep(FEED_RETRY).await;
                }
            }
            feed.queued += samples.len() as u64;
            feed.queued
        };

        while self.played.load(Ordering::Acquire) < end {
            self.drained.notified().await;
        }
    }
}

/// The device side of the ring buffer, owned by the stream callback.
struct DeviceFeed {
    consumer: HeapCons<f32>,
    channel_count: usize,
    played: Arc<AtomicU64>,
    drained: Arc<Notify>,
}

impl DeviceFeed {
    /// Fills one device buffer: one mono sample per frame, copied to every channel,
    /// silence when nothing is queued.
    fn fill(&mut self, data: &mut [f32]) {
        let popped = fill_frames(&mut self.consumer, data, self.channel_count);
        if popped > 0 {
            self.played.fetch_add(popped, Ordering::AcqRel);
            self.drained.notify_one();
        }
    }
}

struct Ready {
    producer: HeapProd<f32>,
    sample_rate: u32,
    channels: u16,
    device_name: String,
}

/// The device's audio output, opened once at startup.
///
/// cpal streams cannot move between threads, so the stream lives on its own
/// thread. `play` feeds mono samples through a ring buffer and the device
/// callback counts every sample it consumes; a clip is finished once the count
/// reaches the end of that clip.
pub struct CpalOutput {
    control: std::sync::mpsc::Sender<Control>,
    queue: PlaybackQueue,
    running: AtomicBool,
    sample_rate: u32,
}

impl CpalOutput {
    /// Opens the named output device (or the default one). The stream starts suspended.
    pub fn open(device_name: Option<String>) -> Result<Self> {
        let played = Arc::new(AtomicU64::new(0));
        let drained = Arc::new(Notify::new());
        let (control_tx, control_rx) = std::sync::mpsc::channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let thread_played = played.clone();
        let thread_drained = drained.clone();
        std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                run_output_thread(
                    device_name,
                    thread_played,
                    thread_drained,
                    control_rx,
                    ready_tx,
                )
            })
            .context("Failed to spawn audio output thread")?;

        let ready = ready_rx
            .recv()
            .context("Audio output thread exited during startup")??;
        tracing::info!(
            "Using output device: {:?} ({}ch, {}hz)",
            ready.device_name,
            ready.channels,
            ready.sample_rate
        );

        Ok(Self {
            control: control_tx,
            queue: PlaybackQueue::new(ready.producer, played, drained),
            running: AtomicBool::new(false),
            sample_rate: ready.sample_rate,
        })
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.control.send(Control::Shutdown);
    }
}

#[async_trait]
impl AudioOutput for CpalOutput {
    fn state(&self) -> OutputState {
        if self.running.load(Ordering::Acquire) {
            OutputState::Running
        } else {
            OutputState::Suspended
        }
    }

    async fn resume(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.control
            .send(Control::Resume(ack_tx))
            .map_err(|_| anyhow::anyhow!("Audio output thread has stopped"))?;
        ack_rx
            .await
            .context("Audio output thread dropped the resume request")??;
        self.running.store(true, Ordering::Release);
        tracing::debug!("Audio output resumed.");
        Ok(())
    }

    async fn play(&self, clip: AudioClip) -> Result<()> {
        let samples = resample_mono(&clip.to_mono(), clip.sample_rate, self.sample_rate)
            .context("Failed to resample clip for the output device")?;

        self.queue.play(&samples).await;
        tracing::debug!("Clip finished playing.");
        Ok(())
    }
}

fn run_output_thread(
    device_name: Option<String>,
    played: Arc<AtomicU64>,
    drained: Arc<Notify>,
    control_rx: std::sync::mpsc::Receiver<Control>,
    ready_tx: std::sync::mpsc::Sender<Result<Ready>>,
) {
    let (stream, ready) = match build_stream(device_name.as_deref(), played, drained) {
        Ok(built) => built,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    if ready_tx.send(Ok(ready)).is_err() {
        return;
    }

    while let Ok(control) = control_rx.recv() {
        match control {
            Control::Resume(ack) => {
                let result = stream.play().context("Failed to start output stream");
                let _ = ack.send(result);
            }
            Control::Shutdown => break,
        }
    }
    tracing::debug!("Audio output thread stopped.");
}

fn build_stream(
    device_name: Option<&str>,
    played: Arc<AtomicU64>,
    drained: Arc<Notify>,
) -> Result<(cpal::Stream, Ready)> {
    let output = get_or_default_output(device_name)?;
    let name = output.name().context("Output device has no name")?;
    for config in output.supported_output_configs()? {
        tracing::debug!("Supported output config: {:?}", config);
    }

    let default_config = output
        .default_output_config()
        .context("Failed to get default output config")?;
    let config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    let SampleRate(sample_rate) = config.sample_rate;
    let channels = config.channels;
    tracing::debug!("Output stream config: {:?}", &config);

    let (producer, consumer) = shared_buffer(sample_rate as usize * OUTPUT_BUFFER_SECS).split();
    let mut device_feed = DeviceFeed {
        consumer,
        channel_count: channels as usize,
        played,
        drained,
    };

    let stream = output.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| device_feed.fill(data),
        move |err| tracing::error!("An error occurred on output stream: {}", err),
        None,
    )?;
    // Built streams may start playing on some hosts; keep it quiet until resumed.
    stream.pause().ok();

    Ok((
        stream,
        Ready {
            producer,
            sample_rate,
            channels,
            device_name: name,
        },
    ))
}

fn fill_frames(consumer: &mut HeapCons<f32>, data: &mut [f32], channel_count: usize) -> u64 {
    let mut popped = 0;
    for frame in data.chunks_mut(channel_count.max(1)) {
        let sample = match consumer.try_pop() {
            Some(sample) => {
                popped += 1;
                sample
            }
            None => 0.0,
        };
        frame.fill(sample);
    }
    popped
}
