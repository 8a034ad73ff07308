//! Background persistence for cart snapshots.
//!
//! Mutations hand their snapshot to the writer and return immediately. The
//! writer drains everything queued, keeps only the newest version per
//! identity, and writes that. Failed writes stay queued and are retried the
//! next time the writer wakes up, which happens on the next mutation.

use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use crate::domain::cart::{Cart, CartIdentity};
use crate::domain::ports::{CartRepository, CartWrite};

struct PendingWrite {
    version: i64,
    cart: Arc<Cart>,
}

enum Command {
    Save {
        identity: CartIdentity,
        version: i64,
        cart: Arc<Cart>,
    },
    Flush(Sender<usize>),
}

#[derive(Debug)]
pub struct CartWriter {
    tx: Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Save {
                identity, version, ..
            } => write!(f, "Save({identity:?}, v{version})"),
            Command::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl CartWriter {
    pub fn spawn<R: CartRepository>(repo: R) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("cart-writer".to_string())
            .spawn(move || run(&repo, &rx))?;
        Ok(Self { tx })
    }

    pub fn enqueue(&self, identity: CartIdentity, version: i64, cart: Arc<Cart>) {
        let key = identity.storage_key();
        if self
            .tx
            .send(Command::Save {
                identity,
                version,
                cart,
            })
            .is_err()
        {
            log::error!("Cart writer has stopped; dropping write for {key}");
        }
    }

    /// Blocks until everything queued so far has been attempted once.
    /// Returns how many identities still have a failed write pending.
    pub fn flush(&self) -> usize {
        let (ack, done) = mpsc::channel();
        if self.tx.send(Command::Flush(ack)).is_err() {
            return 0;
        }
        done.recv().unwrap_or(0)
    }
}

fn run<R: CartRepository>(repo: &R, rx: &Receiver<Command>) {
    let mut pending: HashMap<CartIdentity, PendingWrite> = HashMap::new();

    while let Ok(first) = rx.recv() {
        let mut flushes = Vec::new();
        absorb(first, &mut pending, &mut flushes);
        while let Ok(next) = rx.try_recv() {
            absorb(next, &mut pending, &mut flushes);
        }

        pending.retain(|identity, write| !write_once(repo, identity, write));

        for ack in flushes {
            let _ = ack.send(pending.len());
        }
    }
    log::debug!("Cart writer channel closed");
}

fn absorb(
    command: Command,
    pending: &mut HashMap<CartIdentity, PendingWrite>,
    flushes: &mut Vec<Sender<usize>>,
) {
    match command {
        Command::Save {
            identity,
            version,
            cart,
        } => {
            let newer = pending
                .get(&identity)
                .map_or(true, |existing| version > existing.version);
            if newer {
                pending.insert(identity, PendingWrite { version, cart });
            }
        }
        Command::Flush(ack) => flushes.push(ack),
    }
}

/// Returns `true` once the write no longer needs retrying.
fn write_once<R: CartRepository>(repo: &R, identity: &CartIdentity, write: &PendingWrite) -> bool {
    match repo.save(identity, write.version, &write.cart.items) {
        Ok(CartWrite::Applied) => true,
        Ok(CartWrite::Stale) => {
            log::debug!(
                "Discarded stale cart write for {} (v{})",
                identity.storage_key(),
                write.version
            );
            true
        }
        Err(e) => {
            log::warn!(
                "Failed to persist cart for {}: {e}; will retry",
                identity.storage_key()
            );
            false
        }
    }
}
