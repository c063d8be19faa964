use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig, StreamError};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, warn};

use super::{Error, default_device};
use crate::backend::Renderer;

const CHECK_STREAM_INTERVAL: Duration = Duration::from_millis(500);

#[allow(clippy::large_enum_variant)]
enum State {
    Empty,
    Idle { renderer: Renderer },
    Running { stream: Stream, renderer_consumer: Consumer<Renderer> },
}

pub(super) struct StreamManagerController {
    should_drop: Arc<AtomicBool>,
}

impl StreamManagerController {
    pub(super) fn stop(&self) {
        self.should_drop.store(true, Ordering::SeqCst);
    }
}

/// Starts a cpal stream and restarts it if the default device gets
/// disconnected.
pub(super) struct StreamManager {
    state: State,
    device_name: String,
    config: StreamConfig,
}

impl StreamManager {
    pub(super) fn start(
        renderer: Renderer,
        device: Device,
        config: StreamConfig,
        custom_device: bool,
    ) -> Result<StreamManagerController, Error> {
        let should_drop = Arc::new(AtomicBool::new(false));
        let should_drop_clone = should_drop.clone();

        let (mut initial_result_producer, mut initial_result_consumer) = RingBuffer::new(1);

        std::thread::spawn(move || {
            let mut stream_manager = StreamManager {
                state: State::Idle { renderer },
                device_name: device_name(&device),
                config,
            };

            let mut unhandled_stream_error_consumer = match stream_manager.start_stream(&device) {
                Ok(unhandled_stream_error_consumer) => {
                    let _ = initial_result_producer.push(Ok(()));
                    unhandled_stream_error_consumer
                }
                Err(error) => {
                    let _ = initial_result_producer.push(Err(error));
                    return;
                }
            };

            loop {
                std::thread::sleep(CHECK_STREAM_INTERVAL);
                if should_drop.load(Ordering::SeqCst) {
                    break;
                }
                stream_manager.check_stream(&mut unhandled_stream_error_consumer, custom_device);
            }
        });

        loop {
            if let Ok(result) = initial_result_consumer.pop() {
                result?;
                break;
            }
            if initial_result_consumer.is_abandoned() {
                return Err(Error::StreamManagerExited);
            }
            std::thread::sleep(Duration::from_micros(100));
        }

        Ok(StreamManagerController {
            should_drop: should_drop_clone,
        })
    }

    /// Restarts the stream if the audio device gets disconnected.
    fn check_stream(&mut self, unhandled_stream_error_consumer: &mut Consumer<StreamError>, custom_device: bool) {
        if !matches!(self.state, State::Running { .. }) {
            return;
        }

        while let Ok(error) = unhandled_stream_error_consumer.pop() {
            match error {
                StreamError::DeviceNotAvailable if !custom_device => {
                    warn!(device = %self.device_name, "audio device is not available anymore, restarting the stream");
                    self.stop_stream();

                    let Ok(device) = default_device() else {
                        warn!("no default audio device available");
                        return;
                    };

                    match self.start_stream(&device) {
                        Ok(consumer) => *unhandled_stream_error_consumer = consumer,
                        Err(error) => {
                            warn!(%error, "failed to restart the audio stream");
                            return;
                        }
                    }
                }
                error => warn!(%error, "audio stream error"),
            }
        }
    }

    fn start_stream(&mut self, device: &Device) -> Result<Consumer<StreamError>, Error> {
        let State::Idle { mut renderer } = std::mem::replace(&mut self.state, State::Empty) else {
            panic!("trying to start a stream when the stream manager is not idle");
        };

        self.device_name = device_name(device);
        renderer.on_change_sample_rate(self.config.sample_rate.0);
        debug!(device = %self.device_name, "starting audio stream");

        let (mut renderer_wrapper, mut renderer_consumer) = SendOnDrop::new(renderer);
        let (mut unhandled_stream_error_producer, unhandled_stream_error_consumer) = RingBuffer::new(64);
        let channels = self.config.channels;

        let stream = device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _| {
                    process_renderer(&mut renderer_wrapper, data, channels);
                },
                move |error| {
                    let _ = unhandled_stream_error_producer.push(error);
                },
                None,
            )
            .map_err(Error::from)
            .and_then(|stream| {
                stream.play()?;
                Ok(stream)
            });

        let stream = match stream {
            Ok(stream) => stream,
            Err(error) => {
                // Failing to build or play the stream drops the callback, which
                // hands the renderer back.
                if let Ok(renderer) = renderer_consumer.pop() {
                    self.state = State::Idle { renderer };
                }
                return Err(error);
            }
        };

        self.state = State::Running { stream, renderer_consumer };
        Ok(unhandled_stream_error_consumer)
    }

    fn stop_stream(&mut self) {
        let State::Running {
            mut renderer_consumer,
            stream,
        } = std::mem::replace(&mut self.state, State::Empty)
        else {
            panic!("trying to stop the stream when it's not running")
        };

        drop(stream);
        let renderer = renderer_consumer
            .pop()
            .expect("could not retrieve the renderer after dropping a stream");
        self.state = State::Idle { renderer };
    }
}

fn device_name(device: &Device) -> String {
    device.name().unwrap_or_else(|_| "device name unavailable".to_string())
}

fn process_renderer(renderer: &mut SendOnDrop<Renderer>, data: &mut [f32], channels: u16) {
    renderer.on_start_processing();
    renderer.process(data, channels);
}

/// Wraps `T` so that when it's dropped, it gets sent
/// back through a thread channel.
///
/// This allows us to retrieve the data after a closure
/// that takes ownership of the data is dropped because of,
/// for instance, a cpal error.
struct SendOnDrop<T> {
    data: Option<T>,
    producer: Producer<T>,
}

impl<T> SendOnDrop<T> {
    fn new(data: T) -> (Self, Consumer<T>) {
        let (producer, consumer) = RingBuffer::new(1);
        (
            Self {
                data: Some(data),
                producer,
            },
            consumer,
        )
    }
}

impl<T> Deref for SendOnDrop<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.data.as_ref().expect("data is only taken on drop")
    }
}

impl<T> DerefMut for SendOnDrop<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data.as_mut().expect("data is only taken on drop")
    }
}

impl<T> Drop for SendOnDrop<T> {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            let _ = self.producer.push(data);
        }
    }
}
