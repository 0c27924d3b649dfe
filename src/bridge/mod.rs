//! Message Bridge between the background context and its page contexts.
//!
//! Every page gets its own unbounded FIFO channel in each direction. Delivery is
//! best-effort: a message for a page that has gone away is dropped and reported
//! back to the sender as undelivered, never queued.

pub mod relay;

use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

use crate::core::{BackgroundToPage, PageId, PageToBackground};

pub use relay::WindowRelay;

type PageRegistry = HashMap<PageId, mpsc::UnboundedSender<BackgroundToPage>>;

/// Inbound side of the background context: every page's messages, tagged by sender.
pub type BackgroundInbox = mpsc::UnboundedReceiver<(PageId, PageToBackground)>;

#[derive(Clone)]
pub struct MessageBridge {
    pages: Arc<RwLock<PageRegistry>>,
    next_page: Arc<AtomicU64>,
    to_background: mpsc::UnboundedSender<(PageId, PageToBackground)>,
}

impl MessageBridge {
    /// Create the bridge together with the background context's inbox.
    pub fn new() -> (Self, BackgroundInbox) {
        let (to_background, inbox) = mpsc::unbounded_channel();
        let bridge = Self {
            pages: Arc::new(RwLock::new(HashMap::new())),
            next_page: Arc::new(AtomicU64::new(1)),
            to_background,
        };
        (bridge, inbox)
    }

    /// Attach a new page context.
    pub fn open_page(&self) -> PagePort {
        let page_id = PageId::new(self.next_page.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.pages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(page_id, tx);

        PagePort {
            sender: PageSender {
                page_id,
                to_background: self.to_background.clone(),
            },
            inbox: rx,
        }
    }

    /// Detach a page context; later messages addressed to it are dropped.
    pub fn close_page(&self, page_id: PageId) {
        self.pages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&page_id);
    }

    pub fn page_ids(&self) -> Vec<PageId> {
        let mut ids: Vec<PageId> = self
            .pages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .copied()
            .collect();
        ids.sort();
        ids
    }

    pub fn page_count(&self) -> usize {
        self.pages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Send to one page. Returns `false` if the page is unknown or torn down.
    pub fn send_to(&self, page_id: PageId, message: BackgroundToPage) -> bool {
        let delivered = {
            let pages = self
                .pages
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match pages.get(&page_id) {
                Some(tx) => tx.send(message).is_ok(),
                None => false,
            }
        };

        if !delivered {
            debug!("dropping message for unavailable {}", page_id);
            self.close_page(page_id);
        }
        delivered
    }

    /// Send to every attached page. Returns the number of pages reached.
    pub fn broadcast(&self, message: BackgroundToPage) -> usize {
        let mut reached = 0;
        let mut stale = Vec::new();
        {
            let pages = self
                .pages
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for (page_id, tx) in pages.iter() {
                if tx.send(message.clone()).is_ok() {
                    reached += 1;
                } else {
                    stale.push(*page_id);
                }
            }
        }

        for page_id in stale {
            self.close_page(page_id);
        }
        reached
    }
}

/// Sending half held by a page context (and its samplers).
#[derive(Clone)]
pub struct PageSender {
    page_id: PageId,
    to_background: mpsc::UnboundedSender<(PageId, PageToBackground)>,
}

impl PageSender {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Fire-and-forget. Returns `false` if the background context is gone.
    pub fn send(&self, message: PageToBackground) -> bool {
        self.to_background.send((self.page_id, message)).is_ok()
    }
}

/// A page context's attachment to the bridge.
pub struct PagePort {
    pub sender: PageSender,
    pub inbox: mpsc::UnboundedReceiver<BackgroundToPage>,
}

impl PagePort {
    pub fn page_id(&self) -> PageId {
        self.sender.page_id
    }
}
