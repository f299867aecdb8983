pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Boxed error type used at every hardware seam.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Differential ADC channel delivering raw pressure counts.
pub trait PressureSensor {
    fn read(&mut self, timeout: std::time::Duration) -> HwResult<i16>;
}

/// One-wire style temperature probe; `None` when the probe misses a
/// conversion (callers keep the last-known value).
pub trait TempSensor {
    fn read_celsius(&mut self) -> HwResult<Option<f32>>;
}

/// Air-bubble presence detector on the arterial line.
pub trait BubbleSensor {
    fn bubble_present(&mut self) -> HwResult<bool>;
}

/// Isolation actuator that cuts the organ off the circuit during a purge.
pub trait IsolationValve {
    fn close(&mut self) -> HwResult<()>;
    fn open(&mut self) -> HwResult<()>;
}

/// Half-duplex serial link to the pump drive (RS-485 style).
///
/// `send` queues a complete request frame; `recv` polls for a reply and
/// must not block: it returns the number of bytes copied into `buf`,
/// 0 when nothing has arrived yet.
pub trait PumpLink {
    fn send(&mut self, frame: &[u8]) -> HwResult<()>;
    fn recv(&mut self, buf: &mut [u8]) -> HwResult<usize>;
}

/// Consumer of the fixed-size telemetry record (host link writer).
pub trait TelemetrySink {
    fn emit(&mut self, record: &[u8]) -> HwResult<()>;
}

impl<T: PumpLink + ?Sized> PumpLink for Box<T> {
    fn send(&mut self, frame: &[u8]) -> HwResult<()> {
        (**self).send(frame)
    }
    fn recv(&mut self, buf: &mut [u8]) -> HwResult<usize> {
        (**self).recv(buf)
    }
}

impl<T: IsolationValve + ?Sized> IsolationValve for Box<T> {
    fn close(&mut self) -> HwResult<()> {
        (**self).close()
    }
    fn open(&mut self) -> HwResult<()> {
        (**self).open()
    }
}
