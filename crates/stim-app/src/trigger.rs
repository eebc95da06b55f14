use std::io::{self, Write};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::Sender;

use crate::config::TriggerSettings;

const WRITE_TIMEOUT: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Somewhere trigger messages end up. Failures are logged, never returned:
/// a missed trigger must not stop the stimulus.
pub trait TriggerSink: Send {
    fn send(&mut self, message: &str);
}

type Device = Box<dyn Write + Send>;
type Opener = Box<dyn FnMut() -> io::Result<Device> + Send>;

/// Line-oriented writer for a microcontroller on a serial port.
pub struct SerialTrigger {
    port: String,
    open: Opener,
    device: Option<Device>,
}

impl SerialTrigger {
    /// Open `port` (e.g. `/dev/ttyACM0`, `COM3`) at `baud_rate`, 8N1.
    pub fn open(port: &str, baud_rate: u32) -> Self {
        let path = port.to_owned();
        Self::with_opener(port, move || {
            let device = serialport::new(path.as_str(), baud_rate).timeout(WRITE_TIMEOUT).open()?;
            Ok(Box::new(device) as Device)
        })
    }

    /// Connect through `open`, and again through `open` after a failure.
    pub fn with_opener(port: &str, open: impl FnMut() -> io::Result<Device> + Send + 'static) -> Self {
        let mut trigger = Self {
            port: port.to_owned(),
            open: Box::new(open),
            device: None,
        };
        match (trigger.open)() {
            Ok(device) => {
                log::info!("Trigger device connected on {}", trigger.port);
                trigger.device = Some(device);
            }
            Err(e) => log::warn!("Trigger device {} unavailable: {e}", trigger.port),
        }
        trigger
    }

    pub fn is_connected(&self) -> bool {
        self.device.is_some()
    }
}

impl TriggerSink for SerialTrigger {
    fn send(&mut self, message: &str) {
        let line = format!("\n{message}\n");
        // First attempt on the current connection, second after reconnecting.
        for _ in 0..2 {
            if self.device.is_none() {
                match (self.open)() {
                    Ok(device) => {
                        log::info!("Trigger device reconnected on {}", self.port);
                        self.device = Some(device);
                    }
                    Err(e) => {
                        log::warn!("Trigger device {} unavailable: {e}", self.port);
                        continue;
                    }
                }
            }
            if let Some(device) = &mut self.device {
                match device.write_all(line.as_bytes()).and_then(|()| device.flush()) {
                    Ok(()) => return,
                    Err(e) => {
                        log::warn!("Trigger write to {} failed: {e}", self.port);
                        self.device = None;
                    }
                }
            }
        }
        log::warn!("Trigger {message:?} dropped");
    }
}

/// Stand-in when no trigger hardware is attached.
pub struct NullTrigger;

impl TriggerSink for NullTrigger {
    fn send(&mut self, message: &str) {
        log::trace!("trigger (no device): {message}");
    }
}

// ---------------------------------------------------------------------------
// TriggerLink: sink on a worker thread
// ---------------------------------------------------------------------------

/// Queues trigger messages for a sink running on its own thread, so a slow
/// device never holds up a frame.
///
/// Dropping the link delivers everything already queued, then joins the
/// worker.
pub struct TriggerLink {
    tx: Option<Sender<String>>,
    worker: Option<JoinHandle<()>>,
    trigger_command: String,
    end_command: String,
}

impl TriggerLink {
    pub fn spawn(mut sink: Box<dyn TriggerSink>, trigger_command: &str, end_command: &str) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<String>();
        let worker = std::thread::Builder::new()
            .name("trigger".into())
            .spawn(move || {
                for message in rx {
                    sink.send(&message);
                }
            })
            .context("failed to start trigger thread")?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            trigger_command: trigger_command.to_owned(),
            end_command: end_command.to_owned(),
        })
    }

    pub fn from_settings(settings: &TriggerSettings) -> Result<Self> {
        let sink: Box<dyn TriggerSink> = if settings.enabled {
            Box::new(SerialTrigger::open(&settings.port, settings.baud_rate))
        } else {
            log::info!("Trigger output disabled");
            Box::new(NullTrigger)
        };
        Self::spawn(sink, &settings.trigger_command, &settings.end_command)
    }

    /// A new frame is on screen.
    pub fn trigger(&self) {
        self.enqueue(self.trigger_command.clone());
    }

    /// A new colour block starts.
    pub fn colour(&self, code: &str) {
        self.enqueue(code.to_owned());
    }

    /// Playback ended or was stopped.
    pub fn end(&self) {
        self.enqueue(self.end_command.clone());
    }

    fn enqueue(&self, message: String) {
        if let Some(tx) = &self.tx {
            if tx.send(message).is_err() {
                log::warn!("Trigger thread has exited; message dropped");
            }
        }
    }
}

impl Drop for TriggerLink {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once the queue is drained.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Trigger thread panicked");
            }
        }
    }
}

/// Sink that keeps every message, for tests that need no device.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct Recorder(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

#[cfg(test)]
impl Recorder {
    pub(crate) fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl TriggerSink for Recorder {
    fn send(&mut self, message: &str) {
        self.0.lock().unwrap().push(message.to_owned());
    }
}
