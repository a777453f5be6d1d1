// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

use std::sync::{Arc, Mutex, OnceLock};

use axisboard::arbiter::{
    DeviceId, Requester, SpiArbiter, SpiMode, SpiPort, SubmitError, Transaction, TransferClient,
    MAX_FRAME,
};
use axisboard::error::{BusError, BusFault, FrameError, WithdrawError};

// ---------------------------------------------------------------------------
// Mock bus
// ---------------------------------------------------------------------------

#[derive(Default)]
struct BusLog {
    /// (device, mode, tx) of every started transfer.
    started: Vec<(u8, SpiMode, Vec<u8>)>,
    /// Result the next poll reports.
    outcome: Option<Result<(), BusError>>,
    refuse_next: bool,
    active: bool,
}

#[derive(Clone, Default)]
struct MockPort(Arc<Mutex<BusLog>>);

impl MockPort {
    fn finish(&self, result: Result<(), BusError>) {
        self.0.lock().unwrap().outcome = Some(result);
    }

    fn refuse_next(&self) {
        self.0.lock().unwrap().refuse_next = true;
    }

    fn started(&self) -> Vec<(u8, SpiMode, Vec<u8>)> {
        self.0.lock().unwrap().started.clone()
    }
}

impl SpiPort for MockPort {
    fn start(&mut self, device: DeviceId, mode: SpiMode, tx: &[u8]) -> Result<(), BusError> {
        let mut log = self.0.lock().unwrap();
        if log.refuse_next {
            log.refuse_next = false;
            return Err(BusError::Refused);
        }
        assert!(!log.active, "two transactions on the bus");
        log.active = true;
        log.started.push((device.0, mode, tx.to_vec()));
        Ok(())
    }

    fn poll(&mut self, tx: &[u8], rx: &mut [u8]) -> Option<Result<(), BusError>> {
        let mut log = self.0.lock().unwrap();
        let result = log.outcome.take()?;
        // Loopback with inverted bits
        for (r, t) in rx.iter_mut().zip(tx) {
            *r = !t;
        }
        log.active = false;
        Some(result)
    }
}

// ---------------------------------------------------------------------------
// Recording client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Completion {
    requester: u8,
    context: u32,
    result: Result<(), BusError>,
    rx: Vec<u8>,
}

#[derive(Default)]
struct Recorder {
    done: Mutex<Vec<Completion>>,
}

impl Recorder {
    fn contexts(&self) -> Vec<u32> {
        self.done.lock().unwrap().iter().map(|c| c.context).collect()
    }

    fn completions(&self) -> Vec<Completion> {
        self.done.lock().unwrap().clone()
    }
}

impl TransferClient for Recorder {
    fn transfer_complete(&self, transaction: Transaction<'_>, result: Result<(), BusError>) {
        self.done.lock().unwrap().push(Completion {
            requester: transaction.requester().0,
            context: transaction.context(),
            result,
            rx: transaction.rx().to_vec(),
        });
    }
}

fn txn(client: &Recorder, requester: u8, context: u32) -> Transaction<'_> {
    Transaction::new(
        Requester(requester),
        DeviceId(requester % 2),
        &[requester, 0x55],
        client,
    )
    .unwrap()
    .with_context(context)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn completions_follow_submission_order() {
    let client = Recorder::default();
    let port = MockPort::default();
    let bus: SpiArbiter<'_, _, 4> = SpiArbiter::new(port.clone());

    for (i, requester) in [0u8, 1, 1, 0].into_iter().enumerate() {
        bus.submit(txn(&client, requester, i as u32)).unwrap();
    }
    assert!(bus.is_busy());
    assert_eq!(bus.pending(), 3);
    assert_eq!(port.started().len(), 1);

    // Nothing finished yet.
    assert_eq!(bus.service(), 0);

    for n in 1..=4 {
        port.finish(Ok(()));
        assert_eq!(bus.service(), 1);
        assert_eq!(client.contexts().len(), n);
    }

    assert_eq!(client.contexts(), vec![0, 1, 2, 3]);
    let devices: Vec<u8> = port.started().iter().map(|s| s.0).collect();
    assert_eq!(devices, vec![0, 1, 1, 0]);
    assert!(!bus.is_busy());
    assert_eq!(bus.stats().completed, 4);
    assert_eq!(bus.stats().failed, 0);
}

#[test]
fn received_bytes_are_returned_with_the_transaction() {
    let client = Recorder::default();
    let port = MockPort::default();
    let bus: SpiArbiter<'_, _, 2> = SpiArbiter::new(port.clone());

    let t = Transaction::new(Requester(7), DeviceId(1), &[0x80, 0x00], &client)
        .unwrap()
        .with_mode(SpiMode::Mode1);
    assert_eq!(t.rx(), &[0, 0]);
    bus.submit(t).unwrap();
    assert_eq!(port.started()[0], (1, SpiMode::Mode1, vec![0x80, 0x00]));

    port.finish(Ok(()));
    bus.service();
    assert_eq!(
        client.completions(),
        vec![Completion {
            requester: 7,
            context: 0,
            result: Ok(()),
            rx: vec![0x7F, 0xFF],
        }]
    );
}

#[test]
fn fault_is_reported_once_and_never_retried() {
    let client = Recorder::default();
    let port = MockPort::default();
    let bus: SpiArbiter<'_, _, 4> = SpiArbiter::new(port.clone());

    bus.submit(txn(&client, 0, 10)).unwrap();
    bus.submit(txn(&client, 1, 11)).unwrap();

    port.finish(Err(BusError::Fault(BusFault::Overrun)));
    assert_eq!(bus.service(), 1);

    let done = client.completions();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].context, 10);
    assert_eq!(done[0].result, Err(BusError::Fault(BusFault::Overrun)));

    // The failed transfer is not restarted; the next one is.
    let started = port.started();
    assert_eq!(started.len(), 2);
    assert_eq!(started[1].2, vec![1, 0x55]);

    port.finish(Ok(()));
    assert_eq!(bus.service(), 1);
    assert_eq!(client.contexts(), vec![10, 11]);
    assert_eq!(bus.stats().completed, 1);
    assert_eq!(bus.stats().failed, 1);
}

#[test]
fn full_queue_hands_the_transaction_back() {
    let client = Recorder::default();
    let port = MockPort::default();
    let bus: SpiArbiter<'_, _, 2> = SpiArbiter::new(port.clone());

    bus.submit(txn(&client, 0, 0)).unwrap(); // active
    bus.submit(txn(&client, 0, 1)).unwrap();
    bus.submit(txn(&client, 0, 2)).unwrap();

    match bus.submit(txn(&client, 1, 3)) {
        Err(SubmitError::QueueFull(t)) => {
            assert_eq!(t.context(), 3);
            assert_eq!(t.requester(), Requester(1));
        }
        other => panic!("expected QueueFull, got {:?}", other),
    }
    assert_eq!(bus.pending(), 2);
}

#[test]
fn queued_transactions_can_be_withdrawn() {
    let client = Recorder::default();
    let port = MockPort::default();
    let bus: SpiArbiter<'_, _, 4> = SpiArbiter::new(port.clone());

    let a = bus.submit(txn(&client, 0, 0)).unwrap();
    let b = bus.submit(txn(&client, 1, 1)).unwrap();
    let _c = bus.submit(txn(&client, 0, 2)).unwrap();

    assert_eq!(bus.withdraw(a).unwrap_err(), WithdrawError::InFlight);
    assert_eq!(bus.withdraw(b).unwrap().context(), 1);
    assert_eq!(bus.withdraw(b).unwrap_err(), WithdrawError::Unknown);
    assert_eq!(bus.pending(), 1);

    port.finish(Ok(()));
    bus.service();
    port.finish(Ok(()));
    bus.service();

    // The withdrawn transaction never completes.
    assert_eq!(client.contexts(), vec![0, 2]);
}

#[test]
fn refused_start_fails_that_transaction_and_moves_on() {
    let client = Recorder::default();
    let port = MockPort::default();
    let bus: SpiArbiter<'_, _, 4> = SpiArbiter::new(port.clone());

    bus.submit(txn(&client, 0, 0)).unwrap();
    bus.submit(txn(&client, 1, 1)).unwrap();
    bus.submit(txn(&client, 0, 2)).unwrap();

    port.refuse_next();
    port.finish(Ok(()));
    assert_eq!(bus.service(), 2);

    let done = client.completions();
    assert_eq!(done[0].result, Ok(()));
    assert_eq!(done[1].context, 1);
    assert_eq!(done[1].result, Err(BusError::Refused));
    assert!(bus.is_busy());

    port.finish(Ok(()));
    assert_eq!(bus.service(), 1);
    assert_eq!(client.contexts(), vec![0, 1, 2]);
    assert_eq!(bus.stats().failed, 1);
}

#[test]
fn refused_start_on_idle_bus_is_returned_to_the_caller() {
    let client = Recorder::default();
    let port = MockPort::default();
    let bus: SpiArbiter<'_, _, 4> = SpiArbiter::new(port.clone());

    port.refuse_next();
    match bus.submit(txn(&client, 0, 9)) {
        Err(SubmitError::Refused(t, BusError::Refused)) => assert_eq!(t.context(), 9),
        other => panic!("expected Refused, got {:?}", other),
    }
    assert!(!bus.is_busy());
    assert_eq!(bus.service(), 0);
    assert!(client.completions().is_empty());

    // The bus is usable afterwards.
    bus.submit(txn(&client, 0, 10)).unwrap();
    port.finish(Ok(()));
    assert_eq!(bus.service(), 1);
}

#[test]
fn frame_length_is_checked() {
    let client = Recorder::default();
    let port = MockPort::default();
    let bus: SpiArbiter<'_, _, 4> = SpiArbiter::new(port);

    let long = [0u8; MAX_FRAME + 1];
    assert_eq!(
        Transaction::new(Requester(0), DeviceId(0), &long, &client).unwrap_err(),
        FrameError::TooLong(MAX_FRAME + 1)
    );

    let empty = Transaction::new(Requester(0), DeviceId(0), &[], &client).unwrap();
    assert!(matches!(
        bus.submit(empty),
        Err(SubmitError::InvalidLength(_))
    ));
    assert!(!bus.is_busy());
}

#[test]
fn many_clients_never_overlap() {
    let clients: Vec<Recorder> = (0..3).map(|_| Recorder::default()).collect();
    let port = MockPort::default();
    let bus: SpiArbiter<'_, _, 8> = SpiArbiter::new(port.clone());

    let mut expected = Vec::new();
    let mut context = 0;
    for round in 0..5 {
        for (i, client) in clients.iter().enumerate() {
            bus.submit(txn(client, i as u8, context)).unwrap();
            expected.push((i, context));
            context += 1;
        }
        // Drain a few per round so the queue keeps moving.
        for _ in 0..(2 + round % 2) {
            port.finish(Ok(()));
            bus.service();
        }
    }
    while bus.is_busy() {
        port.finish(Ok(()));
        bus.service();
    }

    for (i, client) in clients.iter().enumerate() {
        let mine: Vec<u32> = expected
            .iter()
            .filter(|(c, _)| *c == i)
            .map(|(_, ctx)| *ctx)
            .collect();
        assert_eq!(client.contexts(), mine);
    }
    assert_eq!(bus.stats().completed, 15);
    assert_eq!(port.started().len(), 15);
}

/// Submits the next transaction of a fixed-length chain from its completion callback.
struct Chain {
    bus: OnceLock<&'static SpiArbiter<'static, MockPort, 4>>,
    port: OnceLock<MockPort>,
    done: Mutex<Vec<u32>>,
}

const CHAIN_LENGTH: u32 = 4;

static CHAIN: Chain = Chain {
    bus: OnceLock::new(),
    port: OnceLock::new(),
    done: Mutex::new(Vec::new()),
};

impl TransferClient for Chain {
    fn transfer_complete(&self, transaction: Transaction<'_>, result: Result<(), BusError>) {
        assert_eq!(result, Ok(()));
        let context = transaction.context();
        self.done.lock().unwrap().push(context);
        if context + 1 == CHAIN_LENGTH {
            return;
        }

        let (Some(bus), Some(port)) = (self.bus.get(), self.port.get()) else {
            return;
        };
        // The next transfer finishes as soon as it is polled.
        port.finish(Ok(()));
        let next = Transaction::new(Requester(7), DeviceId(1), &[0xA0, context as u8], &CHAIN)
            .unwrap()
            .with_context(context + 1);
        bus.submit(next).unwrap();
    }
}

#[test]
fn callback_can_submit_the_next_transfer() {
    let port = MockPort::default();
    let bus: &'static SpiArbiter<'static, MockPort, 4> =
        Box::leak(Box::new(SpiArbiter::new(port.clone())));
    assert!(CHAIN.bus.set(bus).is_ok());
    assert!(CHAIN.port.set(port.clone()).is_ok());

    let first = Transaction::new(Requester(7), DeviceId(1), &[0xA0, 0xFF], &CHAIN).unwrap();
    bus.submit(first).unwrap();
    port.finish(Ok(()));

    // One service pass follows the chain to its end.
    assert_eq!(bus.service(), CHAIN_LENGTH as usize);
    assert_eq!(*CHAIN.done.lock().unwrap(), vec![0, 1, 2, 3]);
    assert!(!bus.is_busy());
    assert_eq!(bus.pending(), 0);
    assert_eq!(bus.stats().completed, CHAIN_LENGTH);
    assert_eq!(port.started().len(), CHAIN_LENGTH as usize);
}
