// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Shared SPI bus arbiter.
//!
//! Several logical clients (gate drivers, encoders, ...) share one physical SPI bus. Clients
//! [`submit`](SpiArbiter::submit) owned [`Transaction`]s without blocking; the arbiter runs them
//! one at a time in FIFO order and hands each one back through its client's
//! [`TransferClient::transfer_complete`] exactly once.
//!
//! The arbiter never drives the bus itself. An [`SpiPort`] starts a transfer and reports progress;
//! the bus-complete interrupt calls [`SpiArbiter::service`], which retires the finished transfer
//! and starts the next queued one before returning.
//!
//! Faults are reported to the affected client only and are never retried.

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;
use heapless::{Deque, Vec};

use crate::error::{BusError, FrameError, WithdrawError};
use crate::vectors::InterruptHandler;

/// Largest transfer, in bytes.
pub const MAX_FRAME: usize = 16;

/// Transmit or receive buffer of one transaction.
pub type Frame = Vec<u8, MAX_FRAME>;

/// Identity of the logical client that submitted a transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Requester(pub u8);

/// Chip-select line on the shared bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceId(pub u8);

/// Handle for an accepted transaction, used to withdraw it while it is still queued.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ticket(u32);

/// Clock polarity and phase of a device.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiMode {
    /// CPOL = 0, CPHA = 0.
    #[default]
    Mode0,
    /// CPOL = 0, CPHA = 1.
    Mode1,
    /// CPOL = 1, CPHA = 0.
    Mode2,
    /// CPOL = 1, CPHA = 1.
    Mode3,
}

impl SpiMode {
    /// Clock idles high.
    #[inline]
    pub const fn cpol(self) -> bool {
        matches!(self, SpiMode::Mode2 | SpiMode::Mode3)
    }

    /// Data captured on the second clock edge.
    #[inline]
    pub const fn cpha(self) -> bool {
        matches!(self, SpiMode::Mode1 | SpiMode::Mode3)
    }
}

/// Receives finished transactions.
///
/// Called from interrupt context, outside of any critical section. The implementation may submit
/// new transactions from here.
pub trait TransferClient: Sync {
    fn transfer_complete(&self, transaction: Transaction<'_>, result: Result<(), BusError>);
}

/// One full-duplex transfer: `tx` is clocked out while the same number of bytes is clocked into
/// `rx`.
pub struct Transaction<'a> {
    requester: Requester,
    device: DeviceId,
    mode: SpiMode,
    tx: Frame,
    rx: Frame,
    context: u32,
    client: &'a dyn TransferClient,
}

impl<'a> Transaction<'a> {
    pub fn new(
        requester: Requester,
        device: DeviceId,
        tx: &[u8],
        client: &'a dyn TransferClient,
    ) -> Result<Self, FrameError> {
        let tx_frame = Frame::from_slice(tx).map_err(|_| FrameError::TooLong(tx.len()))?;
        let mut rx = Frame::new();
        rx.resize(tx.len(), 0)
            .map_err(|_| FrameError::TooLong(tx.len()))?;

        Ok(Self {
            requester,
            device,
            mode: SpiMode::default(),
            tx: tx_frame,
            rx,
            context: 0,
            client,
        })
    }

    pub fn with_mode(mut self, mode: SpiMode) -> Self {
        self.mode = mode;
        self
    }

    /// Attach an opaque value for the client (e.g. a register address or a request id).
    pub fn with_context(mut self, context: u32) -> Self {
        self.context = context;
        self
    }

    #[inline]
    pub fn requester(&self) -> Requester {
        self.requester
    }

    #[inline]
    pub fn device(&self) -> DeviceId {
        self.device
    }

    #[inline]
    pub fn mode(&self) -> SpiMode {
        self.mode
    }

    #[inline]
    pub fn context(&self) -> u32 {
        self.context
    }

    #[inline]
    pub fn tx(&self) -> &[u8] {
        &self.tx
    }

    /// Bytes received during the transfer. All zero until the transaction completes.
    #[inline]
    pub fn rx(&self) -> &[u8] {
        &self.rx
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("requester", &self.requester)
            .field("device", &self.device)
            .field("mode", &self.mode)
            .field("tx", &self.tx)
            .field("rx", &self.rx)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// A transaction that was not accepted. The transaction is handed back untouched.
#[derive(Debug)]
pub enum SubmitError<'a> {
    /// Zero-length transaction.
    InvalidLength(Transaction<'a>),
    /// The queue is full.
    QueueFull(Transaction<'a>),
    /// The bus was idle but the hardware refused to start the transfer.
    Refused(Transaction<'a>, BusError),
}

impl<'a> SubmitError<'a> {
    /// Recover the rejected transaction.
    pub fn into_transaction(self) -> Transaction<'a> {
        match self {
            SubmitError::InvalidLength(t) | SubmitError::QueueFull(t) => t,
            SubmitError::Refused(t, _) => t,
        }
    }
}

impl fmt::Display for SubmitError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::InvalidLength(_) => write!(f, "empty transaction"),
            SubmitError::QueueFull(_) => write!(f, "bus queue full"),
            SubmitError::Refused(_, e) => write!(f, "{}", e),
        }
    }
}

/// Physical bus driven by the arbiter.
pub trait SpiPort {
    /// Select `device`, configure `mode` and begin clocking out `tx`.
    fn start(&mut self, device: DeviceId, mode: SpiMode, tx: &[u8]) -> Result<(), BusError>;

    /// Advance the running transfer after a bus interrupt.
    ///
    /// Received bytes are stored in `rx`. Returns `None` while the transfer is still in progress,
    /// otherwise its result. The device is deselected before a result is returned.
    fn poll(&mut self, tx: &[u8], rx: &mut [u8]) -> Option<Result<(), BusError>>;
}

/// Running totals of retired transactions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusStats {
    pub completed: u32,
    pub failed: u32,
}

struct Pending<'a> {
    ticket: Ticket,
    transaction: Transaction<'a>,
}

struct Active<'a> {
    pending: Pending<'a>,
    /// Set when the result is known before the hardware ran (refused start).
    outcome: Option<Result<(), BusError>>,
}

struct State<'a, P, const N: usize> {
    port: P,
    active: Option<Active<'a>>,
    queue: Deque<Pending<'a>, N>,
    next_ticket: u32,
    stats: BusStats,
}

impl<'a, P: SpiPort, const N: usize> State<'a, P, N> {
    fn issue_ticket(&mut self) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket = self.next_ticket.wrapping_add(1);
        ticket
    }

    /// Hand the head of the queue to the hardware. A refused start is recorded as the outcome so
    /// that the next service pass retires it.
    fn launch_next(&mut self) {
        let Some(next) = self.queue.pop_front() else {
            return;
        };
        let txn = &next.transaction;
        let outcome = match self.port.start(txn.device, txn.mode, &txn.tx) {
            Ok(()) => None,
            Err(e) => {
                warn!("bus refused transfer for device {}", txn.device.0);
                Some(Err(e))
            }
        };
        self.active = Some(Active {
            pending: next,
            outcome,
        });
    }

    /// Take the active transaction if it has finished, then start the next one.
    fn retire(&mut self) -> Option<(Transaction<'a>, Result<(), BusError>)> {
        let active = self.active.as_mut()?;
        let result = match active.outcome {
            Some(result) => result,
            None => {
                let txn = &mut active.pending.transaction;
                self.port.poll(&txn.tx, &mut txn.rx)?
            }
        };

        let done = self.active.take()?;
        match result {
            Ok(()) => self.stats.completed = self.stats.completed.wrapping_add(1),
            Err(_) => self.stats.failed = self.stats.failed.wrapping_add(1),
        }
        self.launch_next();
        Some((done.pending.transaction, result))
    }
}

/// FIFO arbiter for one physical bus with room for `N` queued transactions.
pub struct SpiArbiter<'a, P, const N: usize> {
    state: Mutex<RefCell<State<'a, P, N>>>,
}

impl<'a, P: SpiPort, const N: usize> SpiArbiter<'a, P, N> {
    pub const fn new(port: P) -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                port,
                active: None,
                queue: Deque::new(),
                next_ticket: 0,
                stats: BusStats {
                    completed: 0,
                    failed: 0,
                },
            })),
        }
    }

    /// Queue `transaction`, starting it right away if the bus is idle.
    ///
    /// Never blocks. On rejection the transaction is returned inside the error and no callback
    /// will ever be made for it.
    pub fn submit(&self, transaction: Transaction<'a>) -> Result<Ticket, SubmitError<'a>> {
        if transaction.is_empty() {
            return Err(SubmitError::InvalidLength(transaction));
        }

        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let state = &mut *state;

            if state.active.is_none() {
                let txn = &transaction;
                if let Err(e) = state.port.start(txn.device, txn.mode, &txn.tx) {
                    return Err(SubmitError::Refused(transaction, e));
                }
                let ticket = state.issue_ticket();
                trace!("bus start: device {}", transaction.device.0);
                state.active = Some(Active {
                    pending: Pending {
                        ticket,
                        transaction,
                    },
                    outcome: None,
                });
                return Ok(ticket);
            }

            if state.queue.is_full() {
                return Err(SubmitError::QueueFull(transaction));
            }
            let ticket = state.issue_ticket();
            // Not full, checked above.
            let _ = state.queue.push_back(Pending {
                ticket,
                transaction,
            });
            Ok(ticket)
        })
    }

    /// Remove a transaction that is still waiting in the queue.
    pub fn withdraw(&self, ticket: Ticket) -> Result<Transaction<'a>, WithdrawError> {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);

            if state
                .active
                .as_ref()
                .is_some_and(|a| a.pending.ticket == ticket)
            {
                return Err(WithdrawError::InFlight);
            }

            // Rotate the whole queue once, keeping every entry but the withdrawn one in order.
            let mut found = None;
            for _ in 0..state.queue.len() {
                let Some(pending) = state.queue.pop_front() else {
                    break;
                };
                if found.is_none() && pending.ticket == ticket {
                    found = Some(pending.transaction);
                } else {
                    let _ = state.queue.push_back(pending);
                }
            }
            found.ok_or(WithdrawError::Unknown)
        })
    }

    /// Retire every finished transaction and start the next ones.
    ///
    /// Completion callbacks run outside the critical section, in FIFO order. Returns the number of
    /// callbacks made.
    pub fn service(&self) -> usize {
        let mut retired = 0;
        loop {
            let finished = critical_section::with(|cs| self.state.borrow_ref_mut(cs).retire());
            let Some((transaction, result)) = finished else {
                break;
            };
            if let Err(e) = result {
                debug!("bus transfer failed on device {}: {}", transaction.device.0, e);
            }
            let client = transaction.client;
            client.transfer_complete(transaction, result);
            retired += 1;
        }
        retired
    }

    /// A transaction is on the bus.
    pub fn is_busy(&self) -> bool {
        critical_section::with(|cs| self.state.borrow_ref(cs).active.is_some())
    }

    /// Number of queued transactions, not counting the active one.
    pub fn pending(&self) -> usize {
        critical_section::with(|cs| self.state.borrow_ref(cs).queue.len())
    }

    pub fn stats(&self) -> BusStats {
        critical_section::with(|cs| self.state.borrow_ref(cs).stats)
    }
}

impl<P: SpiPort + Send, const N: usize> InterruptHandler for SpiArbiter<'_, P, N> {
    fn on_interrupt(&self) {
        self.service();
    }
}
