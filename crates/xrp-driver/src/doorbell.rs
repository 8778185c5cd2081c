//! Mailbox doorbell between host and DSP
//!
//! The doorbell carries no data. Outbound it tells the DSP to look at its
//! queues; inbound it tells the host that some queue may have completed, and
//! the callback fans out to [`QueueSet::scan`]. Sends are best effort: a lost
//! doorbell is covered by the DSP polling and by caller timeouts.

use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::error::{Result, XrpError};
use crate::platform::{Mailbox, MailboxChannel, RxCallback};
use crate::queue::QueueSet;

/// Open doorbell channel. Dropping it frees the channel.
#[derive(Debug)]
pub struct Doorbell {
    channel: Box<dyn MailboxChannel>,
    index: usize,
}

impl Doorbell {
    /// Request mailbox channel `index`, routing inbound messages to
    /// `queues.scan()`.
    ///
    /// # Errors
    ///
    /// Returns [`XrpError::Mailbox`] if the channel cannot be requested.
    pub fn open(mailbox: &dyn Mailbox, index: usize, queues: Arc<QueueSet>) -> Result<Self> {
        debug!("Initializing mailbox channel {index}");

        let rx: RxCallback = Arc::new(move || {
            let result = queues.scan();
            trace!(?result, "doorbell scan");
        });

        let channel = mailbox.request_channel(index, rx).map_err(|source| {
            error!("Mailbox request channel failed: {source}");
            XrpError::Mailbox { source }
        })?;

        Ok(Self { channel, index })
    }

    /// Ring the DSP. Failures are logged, never returned.
    pub fn notify(&self) {
        if let Err(e) = self.channel.send(&[]) {
            error!("mbox_send_message error on channel {}: {e}", self.index);
        }
    }

    /// Free the channel.
    pub fn close(self) {
        debug!("Freeing mailbox channel {}", self.index);
        drop(self);
    }

    /// Channel index.
    pub const fn index(&self) -> usize {
        self.index
    }
}
