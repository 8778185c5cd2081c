//! Completion-queue round trips through the doorbell

use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use xrp_driver::chip::comm::{self, flags};
use xrp_driver::sim::{SimDsp, SimEvent, SimPlatform};
use xrp_driver::{DeviceConfig, DeviceContext, ScanResult, Variant, XrpError};

const DSP_TIMEOUT: Duration = Duration::from_secs(5);

fn running(queue_count: usize) -> (SimPlatform, DeviceContext, SimDsp) {
    let platform = SimPlatform::new();
    let config = DeviceConfig::default().with_queue_count(queue_count);
    let mut dsp = DeviceContext::probe(&platform, Variant::Hailo15l, &config).unwrap();
    dsp.enable().unwrap();
    dsp.release();
    let firmware = SimDsp::new(dsp.comm().memory().clone(), platform.sim_mailbox().clone());
    (platform, dsp, firmware)
}

/// Poll until `firmware` sees a request on `queue`, then answer it.
fn serve_when_posted(firmware: &SimDsp, queue: usize, handler: impl Fn(&[u32]) -> Vec<u32>) {
    let deadline = Instant::now() + DSP_TIMEOUT;
    while Instant::now() < deadline {
        if let Some(request) = firmware.pending(queue) {
            firmware.respond(queue, &handler(&request));
            return;
        }
        thread::yield_now();
    }
    panic!("no request on queue {queue}");
}

#[test]
fn post_and_wait_round_trip() {
    let (platform, dsp, firmware) = running(1);

    let response = thread::scope(|s| {
        s.spawn(|| serve_when_posted(&firmware, 0, |req| req.iter().map(|w| w * 2).collect()));
        dsp.post_and_wait(0, &[1, 2, 3], Some(DSP_TIMEOUT)).unwrap()
    });

    assert_eq!(response, vec![2, 4, 6]);
    assert_eq!(platform.sim_mailbox().sent(), 1);
    assert_eq!(platform.log().count(&SimEvent::MailboxSend), 1);
    // Slot is free again.
    assert!(!dsp.queues().is_complete(0).unwrap());
    assert!(firmware.pending(0).is_none());
}

#[test]
fn independent_queues_complete_independently() {
    let (_platform, dsp, firmware) = running(4);

    thread::scope(|s| {
        let waiters: Vec<_> = [3usize, 1]
            .into_iter()
            .map(|queue| {
                let dsp = &dsp;
                s.spawn(move || {
                    #[allow(clippy::cast_possible_truncation)]
                    let request = [queue as u32];
                    dsp.post_and_wait(queue, &request, Some(DSP_TIMEOUT)).unwrap()
                })
            })
            .collect();

        serve_when_posted(&firmware, 1, |req| vec![req[0] + 100]);
        serve_when_posted(&firmware, 3, |req| vec![req[0] + 100]);

        let results: Vec<_> = waiters.into_iter().map(|w| w.join().unwrap()).collect();
        assert_eq!(results, vec![vec![103], vec![101]]);
    });
}

#[test]
fn wait_times_out_without_response() {
    let (_platform, dsp, firmware) = running(1);

    let err = dsp
        .post_and_wait(0, &[7], Some(Duration::from_millis(50)))
        .unwrap_err();
    assert!(matches!(err, XrpError::Timeout { duration_ms: 50 }));

    // The request is still posted for the DSP to pick up.
    assert_eq!(firmware.pending(0), Some(vec![7]));
}

#[test]
fn scan_signals_each_completion_once_and_keeps_flags() {
    let (_platform, dsp, firmware) = running(3);
    let queues = dsp.queues();

    assert_eq!(queues.scan(), ScanResult::NotMine);

    queues.post(1, &[9]).unwrap();
    assert_eq!(queues.scan(), ScanResult::NotMine);

    // Responding rings the host, which runs the scan.
    assert!(firmware.respond(1, &[10]));
    assert!(queues.get(1).unwrap().completion().is_signalled());
    assert!(!queues.get(0).unwrap().completion().is_signalled());

    // Already signalled: a second doorbell has nothing new.
    assert_eq!(queues.scan(), ScanResult::NotMine);

    let flags_word = queues.comm().word(comm::queue_offset(1) + comm::FLAGS_OFFSET);
    assert_eq!(flags_word.load(Ordering::Acquire), flags::COMPLETE);

    queues.wait(1, Some(Duration::ZERO)).unwrap();
    assert_eq!(queues.take_response(1).unwrap(), vec![10]);
    assert_eq!(flags_word.load(Ordering::Acquire), 0);
}

#[test]
fn response_without_request_is_not_complete() {
    let (_platform, dsp, _firmware) = running(2);
    let queues = dsp.queues();

    queues
        .comm()
        .word(comm::queue_offset(0) + comm::FLAGS_OFFSET)
        .store(flags::RESPONSE_VALID, Ordering::Release);

    assert_eq!(queues.scan(), ScanResult::NotMine);
    assert!(!queues.is_complete(0).unwrap());
    assert!(matches!(queues.take_response(0), Err(XrpError::InvalidState { .. })));
}

#[test]
fn invalid_queue_and_oversized_payload_rejected() {
    let (_platform, dsp, _firmware) = running(2);

    assert!(matches!(
        dsp.post_and_wait(2, &[1], Some(DSP_TIMEOUT)),
        Err(XrpError::InvalidQueue { index: 2, count: 2 })
    ));

    let oversized = vec![0u32; comm::PAYLOAD_WORDS + 1];
    assert!(matches!(
        dsp.queues().post(0, &oversized),
        Err(XrpError::PayloadTooLarge { .. })
    ));
}

#[test]
fn notify_with_doorbell_closed_sends_nothing() {
    let platform = SimPlatform::new();
    let dsp = DeviceContext::probe(&platform, Variant::Hailo15l, &DeviceConfig::default()).unwrap();

    dsp.notify();
    assert_eq!(platform.sim_mailbox().sent(), 0);
}

#[test]
fn lost_doorbell_send_is_not_an_error() {
    let (platform, dsp, _firmware) = running(1);
    platform.sim_mailbox().fail_send(true);

    dsp.notify();
    assert_eq!(platform.sim_mailbox().sent(), 0);

    platform.sim_mailbox().fail_send(false);
    dsp.notify();
    assert_eq!(platform.sim_mailbox().sent(), 1);
}
