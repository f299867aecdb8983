//! Test and helper mocks for perfuser_core.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use perfuser_traits::{
    BubbleSensor, HwResult, IsolationValve, PressureSensor, PumpLink, TelemetrySink, TempSensor,
};

/// Link that records every sent frame and plays back queued replies.
#[derive(Default)]
pub struct MockLink {
    pub sent: Vec<Vec<u8>>,
    pub replies: VecDeque<Vec<u8>>,
}

impl MockLink {
    pub fn queue_reply(&mut self, frame: Vec<u8>) {
        self.replies.push_back(frame);
    }
}

impl PumpLink for MockLink {
    fn send(&mut self, frame: &[u8]) -> HwResult<()> {
        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> HwResult<usize> {
        match self.replies.pop_front() {
            Some(frame) => {
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }
}

/// Link backed by a shared frame log, for cores that own their link.
/// Confirms every request by echoing it straight back, the way the
/// drive answers a well-formed write.
#[derive(Clone, Default)]
pub struct EchoLink {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    pending_echo: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl EchoLink {
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().expect("echo link log").clone()
    }
}

impl PumpLink for EchoLink {
    fn send(&mut self, frame: &[u8]) -> HwResult<()> {
        self.sent.lock().expect("echo link log").push(frame.to_vec());
        self.pending_echo
            .lock()
            .expect("echo link queue")
            .push_back(frame.to_vec());
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> HwResult<usize> {
        match self.pending_echo.lock().expect("echo link queue").pop_front() {
            // A single-write reply is the request frame itself; a
            // multi-write reply echoes header and register count, which
            // the first 8 bytes of the request already carry with the
            // wrong CRC, so rebuild it.
            Some(frame) => {
                let reply = crate::protocol::echo_reply_for(&frame);
                let n = reply.len().min(buf.len());
                buf[..n].copy_from_slice(&reply[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }
}

/// Valve that records open/close calls.
#[derive(Clone, Default)]
pub struct SpyValve {
    pub closed: Arc<Mutex<bool>>,
    pub transitions: Arc<Mutex<Vec<&'static str>>>,
}

impl SpyValve {
    pub fn is_closed(&self) -> bool {
        *self.closed.lock().expect("valve state")
    }
}

impl IsolationValve for SpyValve {
    fn close(&mut self) -> HwResult<()> {
        *self.closed.lock().expect("valve state") = true;
        self.transitions.lock().expect("valve log").push("close");
        Ok(())
    }

    fn open(&mut self) -> HwResult<()> {
        *self.closed.lock().expect("valve state") = false;
        self.transitions.lock().expect("valve log").push("open");
        Ok(())
    }
}

/// Sensor that always returns the same raw reading.
pub struct ConstPressure(pub i16);

impl PressureSensor for ConstPressure {
    fn read(&mut self, _timeout: std::time::Duration) -> HwResult<i16> {
        Ok(self.0)
    }
}

/// Sensor that always errors; useful when driving the core with
/// externally produced raw values via `ingest_sample`.
pub struct NoopPressure;

impl PressureSensor for NoopPressure {
    fn read(&mut self, _timeout: std::time::Duration) -> HwResult<i16> {
        Err(Box::new(std::io::Error::other("noop pressure sensor")))
    }
}

/// Probe that always converts to the same temperature.
pub struct ConstTemp(pub f32);

impl TempSensor for ConstTemp {
    fn read_celsius(&mut self) -> HwResult<Option<f32>> {
        Ok(Some(self.0))
    }
}

/// Bubble sensor with a fixed reading.
pub struct ConstBubble(pub bool);

impl BubbleSensor for ConstBubble {
    fn bubble_present(&mut self) -> HwResult<bool> {
        Ok(self.0)
    }
}

/// Sink collecting emitted telemetry records.
#[derive(Clone, Default)]
pub struct VecSink {
    pub records: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl VecSink {
    pub fn records(&self) -> Vec<Vec<u8>> {
        self.records.lock().expect("sink records").clone()
    }
}

impl TelemetrySink for VecSink {
    fn emit(&mut self, record: &[u8]) -> HwResult<()> {
        self.records
            .lock()
            .expect("sink records")
            .push(record.to_vec());
        Ok(())
    }
}
