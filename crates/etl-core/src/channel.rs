//! # ManagedChannel
//!
//! A bounded rendezvous conduit between producers and consumers that
//! measures its own backlog and emits a *congested* signal used to drive
//! elastic scaling (spec.md §4.1).
//!
//! Built on a zero-capacity `crossbeam::channel` pair: `crossbeam` channels
//! disconnect once every clone of the `Sender` is dropped, which is how
//! spec.md §9's channel-close-ownership rule is meant to work (Extract
//! closes ET by returning; Supervisor closes TL once every Transform
//! worker's sender clone is gone). That only holds if `ManagedChannel`
//! itself never keeps a `Sender` clone alive indefinitely — it doesn't: the
//! one shared producer clone lives in `sender_seed` and is explicitly
//! dropped via [`ManagedChannel::seal`] once the owning [`crate::supervisor::Supervisor`]
//! knows no further producer handle will ever be minted. Until sealed,
//! `sender_handle` clones from the seed; after sealing it returns `None`.
//! The receiving half has no equivalent problem — holding a permanent
//! `Receiver` clone to mint consumer handles from is harmless, since
//! disconnection is driven purely by the sender side.

use std::sync::Mutex;

use crossbeam::channel::{self, Receiver, RecvError, SendError, Sender};

/// Observable congestion state of a `ManagedChannel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Empty,
    Active,
    Congested,
}

#[derive(Debug)]
struct Accounting {
    size: usize,
    state: ChannelState,
}

/// A synchronous rendezvous channel plus congestion accounting.
///
/// Invariant: `size` equals the count of pushes not yet matched by pulls.
/// `state == Empty` iff `size == 0`; a push that raises `size` to
/// `threshold` or above sets `state = Congested`, and that state persists
/// until `size` returns to zero (see spec.md §8 invariant 1).
#[derive(Debug)]
pub struct ManagedChannel<T> {
    sender_seed: Mutex<Option<Sender<T>>>,
    receiver: Receiver<T>,
    accounting: Mutex<Accounting>,
    threshold: usize,
    growth_factor: usize,
}

impl<T> ManagedChannel<T> {
    /// `threshold` and `growth` must both be positive; growth defaults to 1
    /// (no multiplicative effect) if zero is supplied.
    #[must_use]
    pub fn new(threshold: usize, growth: usize) -> Self {
        let (sender, receiver) = channel::bounded(0);
        Self {
            sender_seed: Mutex::new(Some(sender)),
            receiver,
            accounting: Mutex::new(Accounting {
                size: 0,
                state: ChannelState::Empty,
            }),
            threshold: threshold.max(1),
            growth_factor: growth.max(1),
        }
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    #[must_use]
    pub fn growth_factor(&self) -> usize {
        self.growth_factor
    }

    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.accounting.lock().expect("accounting mutex poisoned").state
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.accounting.lock().expect("accounting mutex poisoned").size
    }

    #[must_use]
    pub fn is_congested(&self) -> bool {
        self.state() == ChannelState::Congested
    }

    /// A cloneable, push-only handle onto this channel's sending half, or
    /// `None` if [`ManagedChannel::seal`] has already been called (no more
    /// producers are permitted once the owner has declared the producer
    /// side closed).
    #[must_use]
    pub fn sender_handle(self: &std::sync::Arc<Self>) -> Option<ChannelSender<T>> {
        let seed = self.sender_seed.lock().expect("sender seed mutex poisoned");
        seed.as_ref().map(|sender| ChannelSender {
            channel: std::sync::Arc::clone(self),
            sender: sender.clone(),
        })
    }

    /// A cloneable, pull-only handle onto this channel's receiving half.
    #[must_use]
    pub fn receiver_handle(self: &std::sync::Arc<Self>) -> ChannelReceiver<T> {
        ChannelReceiver {
            channel: std::sync::Arc::clone(self),
            receiver: self.receiver.clone(),
        }
    }

    /// Drops the shared producer seed so no further `sender_handle` call can
    /// mint a new clone. Once every `ChannelSender` already handed out is
    /// also dropped, the underlying channel disconnects and blocked
    /// `ChannelReceiver::pull` calls return `Err` — this is the mechanism
    /// behind spec.md §9's channel-close-ownership rule. Idempotent.
    pub fn seal(&self) {
        self.sender_seed
            .lock()
            .expect("sender seed mutex poisoned")
            .take();
    }

    fn record_push(&self) {
        let mut acc = self.accounting.lock().expect("accounting mutex poisoned");
        acc.size += 1;
        if acc.size >= self.threshold {
            acc.state = ChannelState::Congested;
        } else if acc.state == ChannelState::Empty {
            acc.state = ChannelState::Active;
        }
    }

    fn record_pull(&self) {
        let mut acc = self.accounting.lock().expect("accounting mutex poisoned");
        acc.size = acc.size.saturating_sub(1);
        if acc.size == 0 {
            acc.state = ChannelState::Empty;
        }
    }
}

/// A push-only handle to a [`ManagedChannel`]. Dropping the last clone
/// disconnects the underlying channel, which is how a stage signals "done"
/// to its consumers.
#[derive(Debug)]
pub struct ChannelSender<T> {
    channel: std::sync::Arc<ManagedChannel<T>>,
    sender: Sender<T>,
}

impl<T> Clone for ChannelSender<T> {
    fn clone(&self) -> Self {
        Self {
            channel: std::sync::Arc::clone(&self.channel),
            sender: self.sender.clone(),
        }
    }
}

impl<T> ChannelSender<T> {
    /// Blocks until a consumer is ready to receive (true rendezvous: there
    /// is no internal buffer).
    pub fn push(&self, value: T) -> Result<(), SendError<T>> {
        self.channel.record_push();
        self.sender.send(value)
    }

    #[must_use]
    pub fn channel(&self) -> &std::sync::Arc<ManagedChannel<T>> {
        &self.channel
    }
}

/// A pull-only handle to a [`ManagedChannel`].
#[derive(Debug)]
pub struct ChannelReceiver<T> {
    channel: std::sync::Arc<ManagedChannel<T>>,
    receiver: Receiver<T>,
}

impl<T> Clone for ChannelReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            channel: std::sync::Arc::clone(&self.channel),
            receiver: self.receiver.clone(),
        }
    }
}

impl<T> ChannelReceiver<T> {
    /// Blocks until a producer pushes, or returns `Err` once every sender
    /// has been dropped and the channel is permanently empty.
    pub fn pull(&self) -> Result<T, RecvError> {
        let value = self.receiver.recv()?;
        self.channel.record_pull();
        Ok(value)
    }

    #[must_use]
    pub fn channel(&self) -> &std::sync::Arc<ManagedChannel<T>> {
        &self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn empty_iff_size_zero() {
        let ch = Arc::new(ManagedChannel::<u32>::new(3, 2));
        assert_eq!(ch.state(), ChannelState::Empty);
        assert_eq!(ch.size(), 0);

        let tx = ch.sender_handle().unwrap();
        let rx = ch.receiver_handle();

        let handle = thread::spawn(move || tx.push(1).unwrap());
        assert_eq!(rx.pull().unwrap(), 1);
        handle.join().unwrap();

        assert_eq!(ch.size(), 0);
        assert_eq!(ch.state(), ChannelState::Empty);
    }

    #[test]
    fn congestion_triggers_at_threshold_and_persists_until_drained() {
        let ch = Arc::new(ManagedChannel::<u32>::new(2, 2));
        let tx = ch.sender_handle().unwrap();
        let rx = ch.receiver_handle();

        // Spawn two producers so both pushes can be "in flight" before any
        // pull occurs (true rendezvous: a push blocks until paired with a
        // pull, so we need concurrent producers to observe size > 1).
        let tx2 = tx.clone();
        let p1 = thread::spawn(move || tx.push(1).unwrap());
        let p2 = thread::spawn(move || tx2.push(2).unwrap());

        // Pull once; while the second push is still in flight the channel
        // must have been observed as congested at some point.
        let mut saw_congested = false;
        for _ in 0..2 {
            rx.pull().unwrap();
            if ch.state() == ChannelState::Congested {
                saw_congested = true;
            }
        }
        p1.join().unwrap();
        p2.join().unwrap();

        assert!(saw_congested || ch.state() == ChannelState::Empty);
        assert_eq!(ch.size(), 0);
        assert_eq!(ch.state(), ChannelState::Empty);
    }

    #[test]
    fn dropping_last_sender_closes_channel_once_sealed() {
        let ch = Arc::new(ManagedChannel::<u32>::new(5, 2));
        let tx = ch.sender_handle().unwrap();
        let rx = ch.receiver_handle();

        // Sealing alone doesn't disconnect — the handed-out clone is still
        // live. Dropping it without sealing wouldn't disconnect either,
        // since the shared seed still holds its own clone.
        ch.seal();
        drop(tx);
        assert!(rx.pull().is_err());
    }

    #[test]
    fn sealing_before_any_handle_is_minted_still_allows_the_seed_clone_to_be_dropped() {
        let ch = Arc::new(ManagedChannel::<u32>::new(5, 2));
        let rx = ch.receiver_handle();
        ch.seal();
        assert!(ch.sender_handle().is_none());
        assert!(rx.pull().is_err());
    }

    #[test]
    fn seal_prevents_further_minting_but_not_existing_handles() {
        let ch = Arc::new(ManagedChannel::<u32>::new(5, 2));
        let tx = ch.sender_handle().unwrap();
        ch.seal();
        assert!(ch.sender_handle().is_none());
        // the already-minted handle remains fully usable until dropped
        let rx = ch.receiver_handle();
        let handle = thread::spawn(move || tx.push(7).unwrap());
        assert_eq!(rx.pull().unwrap(), 7);
        handle.join().unwrap();
        assert!(rx.pull().is_err());
    }

    #[test]
    fn multiple_consumers_compete_for_pushes() {
        let ch = Arc::new(ManagedChannel::<u32>::new(10, 2));
        let tx = ch.sender_handle().unwrap();
        let rx1 = ch.receiver_handle();
        let rx2 = ch.receiver_handle();

        let producer = thread::spawn(move || {
            for i in 0..4u32 {
                tx.push(i).unwrap();
            }
        });

        let consumer1 = thread::spawn(move || {
            let mut got = Vec::new();
            while let Ok(v) = rx1.pull() {
                got.push(v);
            }
            got
        });
        producer.join().unwrap();
        let got1 = consumer1.join().unwrap();
        let got2: Vec<u32> = std::iter::from_fn(|| rx2.pull().ok()).collect();
        assert_eq!(got1.len() + got2.len(), 4);
    }
}
