//! Pump protocol retry/confirm behavior over a scripted link.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use perfuser_core::config::PumpCfg;
use perfuser_core::protocol::{self, PumpCommand, RotateDirection};
use perfuser_core::pump::{PumpProtocol, PumpState};
use perfuser_traits::HwResult;
use perfuser_traits::PumpLink;
use perfuser_traits::clock::test_clock::TestClock;

/// Link that logs sent frames and only replies when scripted to.
#[derive(Clone, Default)]
struct ScriptedLink {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    replies: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ScriptedLink {
    fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    fn queue_reply(&self, frame: Vec<u8>) {
        self.replies.lock().unwrap().push(frame);
    }
}

impl PumpLink for ScriptedLink {
    fn send(&mut self, frame: &[u8]) -> HwResult<()> {
        self.sent.lock().unwrap().push(frame.to_vec());
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> HwResult<usize> {
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Ok(0);
        }
        let frame = replies.remove(0);
        let n = frame.len().min(buf.len());
        buf[..n].copy_from_slice(&frame[..n]);
        Ok(n)
    }
}

fn protocol_under_test() -> (PumpProtocol<ScriptedLink>, ScriptedLink, TestClock) {
    let link = ScriptedLink::default();
    let clock = TestClock::new();
    let proto = PumpProtocol::new(link.clone(), &PumpCfg::default(), Arc::new(clock.clone()));
    (proto, link, clock)
}

#[test]
fn set_speed_writes_documented_frame_and_stays_pending_until_echo() {
    let (mut proto, link, _clock) = protocol_under_test();

    proto.issue(PumpCommand::SetSpeed(42.5));
    assert!((proto.status().speed - 42.5).abs() < f32::EPSILON);
    assert!(!proto.status().acks.speed);

    proto.service().unwrap();
    let sent = link.sent();
    assert_eq!(sent.len(), 1);
    // id 1, fct 0x10, addr 1002, qty 2, 4 data bytes of 42.5f32.
    assert_eq!(&sent[0][..7], &[0x01, 0x10, 0x03, 0xEA, 0x00, 0x02, 0x04]);
    assert_eq!(&sent[0][7..11], &[0x42, 0x2A, 0x00, 0x00]);

    // No reply yet: still pending, nothing re-sent this tick.
    proto.service().unwrap();
    assert!(proto.pending().is_some());
    assert_eq!(link.sent().len(), 1);

    // A confirming echo clears the pending command and flips the ack.
    link.queue_reply(protocol::echo_reply_for(&sent[0]));
    proto.service().unwrap();
    assert!(proto.pending().is_none());
    assert!(proto.status().acks.speed);
}

#[test]
fn silence_past_timeout_reports_offline_and_keeps_retrying() {
    let (mut proto, link, clock) = protocol_under_test();

    proto.issue(PumpCommand::Start);
    proto.service().unwrap();
    assert_eq!(proto.attempts(), 1);
    assert!(!proto.status().offline);

    // Past the reply window with no echo: offline, then a re-send.
    clock.advance(Duration::from_millis(2000));
    proto.service().unwrap();
    assert!(proto.status().offline);
    proto.service().unwrap();
    assert_eq!(proto.attempts(), 2);
    assert_eq!(link.sent().len(), 2);

    // A late echo recovers the link.
    link.queue_reply(protocol::echo_reply_for(&link.sent()[1]));
    proto.service().unwrap();
    assert!(!proto.status().offline);
    assert!(proto.status().acks.start);
    assert_eq!(proto.attempts(), 0);
}

#[test]
fn mismatched_echo_triggers_reissue() {
    let (mut proto, link, _clock) = protocol_under_test();

    proto.issue(PumpCommand::Start);
    proto.service().unwrap();

    // Echo for the wrong register value: not a confirmation.
    let bogus = protocol::encode_request(1, &PumpCommand::Stop);
    link.queue_reply(bogus);
    proto.service().unwrap();
    assert!(proto.pending().is_some());
    assert!(!proto.status().acks.start);

    proto.service().unwrap();
    assert_eq!(proto.attempts(), 2);
    assert_eq!(link.sent().len(), 2);
}

#[test]
fn newer_command_replaces_unconfirmed_older_one() {
    let (mut proto, link, _clock) = protocol_under_test();

    proto.issue(PumpCommand::SetSpeed(10.0));
    proto.issue(PumpCommand::SetSpeed(55.0));
    proto.service().unwrap();

    // Only the newer value ever reaches the wire.
    let sent = link.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        &sent[0][7..11],
        &55.0f32.to_be_bytes()[..],
        "frame must carry the replacing speed"
    );
    assert!((proto.status().speed - 55.0).abs() < f32::EPSILON);
}

#[test]
fn status_tracks_commanded_state_optimistically() {
    let (mut proto, _link, _clock) = protocol_under_test();

    proto.issue(PumpCommand::Start);
    assert_eq!(proto.status().state, PumpState::On);
    proto.issue(PumpCommand::SetDirection(RotateDirection::CounterClockwise));
    assert_eq!(proto.status().direction, RotateDirection::CounterClockwise);
    proto.issue(PumpCommand::Stop);
    assert_eq!(proto.status().state, PumpState::Off);
}
