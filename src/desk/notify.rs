//! Outbound notifications.
//!
//! The state machine describes what should be said and to whom; the
//! [`Dispatcher`] hands each message to a [`NotificationSink`] per recipient.
//! Delivery is best effort: a failure is logged and the next recipient is tried.

use crate::desk::auth::AdminGate;
use crate::desk::error::DeliveryError;
use crate::desk::transaction::Transaction;
use crate::desk::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    User(UserId),
    /// Every identity in the admin set
    Admins,
}

/// Which message template the transport should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    TransactionRequested,
    /// Carries the admin bank destination the user should pay into
    PaymentInstructions { destination: String },
    UserProofSubmitted,
    AdminProofSubmitted,
    PaymentConfirmed,
    PaymentRejected,
    TransactionCanceled,
    UserRegistered,
    UserVerified,
    UserRemoved,
}

/// What a notification is about.
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    Transaction(Transaction),
    User(UserId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipient: Recipient,
    pub kind: NotificationKind,
    pub subject: Subject,
}

impl Notification {
    pub fn about_transaction(recipient: Recipient, kind: NotificationKind, snapshot: Transaction) -> Self {
        Self {
            recipient,
            kind,
            subject: Subject::Transaction(snapshot),
        }
    }

    pub fn about_user(recipient: Recipient, kind: NotificationKind, user: UserId) -> Self {
        Self {
            recipient,
            kind,
            subject: Subject::User(user),
        }
    }

    /// The transaction snapshot, if this is about a transaction
    pub fn snapshot(&self) -> Option<&Transaction> {
        match &self.subject {
            Subject::Transaction(tx) => Some(tx),
            Subject::User(_) => None,
        }
    }
}

/// Transport seam. Implementations talk to the chat platform.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, recipient: UserId, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Sink that only logs; used by the batch CLI.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, recipient: UserId, notification: &Notification) -> Result<(), DeliveryError> {
        match &notification.subject {
            Subject::Transaction(tx) => {
                log::info!("[notify] to={recipient} {:?}: {tx}", notification.kind);
            }
            Subject::User(user) => {
                log::info!("[notify] to={recipient} {:?}: user={user}", notification.kind);
            }
        }
        Ok(())
    }
}

/// Fans notifications out to their recipients.
pub struct Dispatcher {
    sink: Box<dyn NotificationSink>,
    admins: Vec<UserId>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("admins", &self.admins)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(sink: Box<dyn NotificationSink>, admins: &AdminGate) -> Self {
        Self {
            sink,
            admins: admins.identities(),
        }
    }

    /// Deliver to every recipient. Returns how many deliveries succeeded.
    pub fn dispatch(&self, notification: &Notification) -> usize {
        let recipients = match notification.recipient {
            Recipient::User(user) => vec![user],
            Recipient::Admins => self.admins.clone(),
        };

        let mut delivered = 0;
        for recipient in recipients {
            match self.sink.deliver(recipient, notification) {
                Ok(()) => delivered += 1,
                Err(e) => log::warn!("[notify] {:?} dropped: {e}", notification.kind),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FlakySink {
        fail_for: Vec<UserId>,
        seen: Arc<Mutex<Vec<UserId>>>,
    }

    impl NotificationSink for FlakySink {
        fn deliver(&self, recipient: UserId, _: &Notification) -> Result<(), DeliveryError> {
            self.seen.lock().unwrap().push(recipient);
            if self.fail_for.contains(&recipient) {
                return Err(DeliveryError {
                    recipient,
                    reason: "blocked by user".to_owned(),
                });
            }
            Ok(())
        }
    }

    fn make_notification(recipient: Recipient) -> Notification {
        Notification::about_user(recipient, NotificationKind::UserRegistered, 5)
    }

    #[test]
    fn test_admins_fan_out_to_every_admin() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = FlakySink {
            fail_for: vec![],
            seen: Arc::clone(&seen),
        };
        let dispatcher = Dispatcher::new(Box::new(sink), &AdminGate::new([1, 2, 3]));

        assert_eq!(dispatcher.dispatch(&make_notification(Recipient::Admins)), 3);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_failure_does_not_block_other_recipients() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = FlakySink {
            fail_for: vec![1],
            seen: Arc::clone(&seen),
        };
        let dispatcher = Dispatcher::new(Box::new(sink), &AdminGate::new([1, 2]));

        assert_eq!(dispatcher.dispatch(&make_notification(Recipient::Admins)), 1);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_user_recipient_gets_single_delivery() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = FlakySink {
            fail_for: vec![],
            seen: Arc::clone(&seen),
        };
        let dispatcher = Dispatcher::new(Box::new(sink), &AdminGate::new([1, 2]));

        assert_eq!(dispatcher.dispatch(&make_notification(Recipient::User(9))), 1);
        assert_eq!(*seen.lock().unwrap(), vec![9]);
    }
}
