use std::io::{Read, Write};

use super::auth::AdminGate;
use super::config::DeskConfig;
use super::error::{DeskError, Error, LedgerError, ValidationError};
use super::event::{Command, EventRecord};
use super::ledger::{InMemoryLedger, Ledger};
use super::notify::{Dispatcher, LogSink, Notification, NotificationKind, NotificationSink, Recipient};
use super::rate::{self, Unit};
use super::settings::Settings;
use super::state_machine::{self, Actor, AdminAction, Event, Policy};
use super::transaction::{Artifact, Direction, NewTransaction, Transaction, TransactionId, TransactionRow};
use super::user::{Country, Registration, User, UserId};
use super::Decimal;

/// The exchange desk: every operation the request-handling layer can call.
///
/// Safe to share across threads. Each transition is committed with a
/// compare-and-swap, so of two racing admins only the first succeeds.
#[derive(Debug)]
pub struct ExchangeDesk<L: Ledger = InMemoryLedger> {
    config: DeskConfig,
    ledger: L,
    dispatcher: Dispatcher,
}

impl ExchangeDesk<InMemoryLedger> {
    /// Create a desk over an empty in-memory ledger that logs its notifications
    pub fn new(config: DeskConfig) -> Self {
        Self::with_parts(config, InMemoryLedger::new(), Box::new(LogSink))
    }
}

impl<L: Ledger> ExchangeDesk<L> {
    pub fn with_parts(config: DeskConfig, ledger: L, sink: Box<dyn NotificationSink>) -> Self {
        let dispatcher = Dispatcher::new(sink, &config.admins);
        log::trace!("ExchangeDesk initialized with {} admins", config.admins.len());
        Self {
            config,
            ledger,
            dispatcher,
        }
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    pub fn admins(&self) -> &AdminGate {
        &self.config.admins
    }

    fn policy(&self) -> Policy {
        Policy {
            max_proof_bytes: self.config.max_proof_bytes,
            require_settlement_proof: self.config.require_settlement_proof,
        }
    }

    fn notify(&self, notification: &Notification) {
        let delivered = self.dispatcher.dispatch(notification);
        log::trace!("[notify] {:?} delivered to {delivered} recipients", notification.kind);
    }
}

// =============================================================================
// Transaction lifecycle
// =============================================================================

impl<L: Ledger> ExchangeDesk<L> {
    /// Price and open a new transaction for a verified user.
    pub fn request_transaction(
        &self,
        user_id: UserId,
        direction: Direction,
        raw_amount: Decimal,
        unit: Unit,
    ) -> Result<Transaction, DeskError> {
        log::trace!("[request] user={user_id} {direction} {raw_amount} {unit:?}");
        let user = self
            .ledger
            .user(user_id)?
            .ok_or(DeskError::UserNotFound { user: user_id })?;
        if !user.can_trade() {
            return Err(DeskError::UserNotVerified { user: user_id });
        }

        let settings = self.ledger.settings()?;
        let quote = rate::quote(&settings, direction, raw_amount, unit, &self.config.amount_band)?;

        let tx = self.ledger.create_transaction(NewTransaction {
            user_id,
            direction,
            amount: quote.amount,
            total_price: quote.total_price,
            rate: quote.rate,
        })?;

        self.notify(&Notification::about_transaction(
            Recipient::Admins,
            NotificationKind::TransactionRequested,
            tx.clone(),
        ));
        Ok(tx)
    }

    pub fn advance_by_admin(
        &self,
        tx_id: TransactionId,
        admin: UserId,
        action: AdminAction,
    ) -> Result<Transaction, DeskError> {
        self.config.admins.authorize(admin)?;
        let event = match action {
            AdminAction::InstructPayment => {
                let tx = self.transaction(tx_id)?;
                let settings = self.ledger.settings()?;
                Event::InstructPayment {
                    destination: settings.payment_destination(tx.direction()).to_owned(),
                }
            }
            AdminAction::Approve => Event::Approve,
            AdminAction::Reject => Event::Reject,
        };
        self.run(tx_id, Actor::Admin(admin), event)
    }

    pub fn submit_user_proof(
        &self,
        tx_id: TransactionId,
        user: UserId,
        proof: Artifact,
    ) -> Result<Transaction, DeskError> {
        self.run(tx_id, Actor::User(user), Event::SubmitUserProof(proof))
    }

    pub fn submit_admin_proof(
        &self,
        tx_id: TransactionId,
        admin: UserId,
        proof: Artifact,
    ) -> Result<Transaction, DeskError> {
        self.config.admins.authorize(admin)?;
        self.run(tx_id, Actor::Admin(admin), Event::SubmitAdminProof(proof))
    }

    /// Cancel as the owner, or as any admin.
    pub fn cancel(&self, tx_id: TransactionId, actor: UserId) -> Result<Transaction, DeskError> {
        let actor = if self.config.admins.is_admin(actor) {
            Actor::Admin(actor)
        } else {
            Actor::User(actor)
        };
        self.run(tx_id, actor, Event::Cancel)
    }

    pub fn transaction(&self, tx_id: TransactionId) -> Result<Transaction, DeskError> {
        self.ledger
            .transaction(tx_id)?
            .ok_or(DeskError::TransactionNotFound { id: tx_id })
    }

    /// Most recent first
    pub fn list_user_transactions(&self, user: UserId) -> Result<Vec<Transaction>, DeskError> {
        Ok(self.ledger.transactions_for_user(user)?)
    }

    /// Every transaction on the desk, most recent first. Admins only.
    pub fn list_all_transactions(&self, admin: UserId) -> Result<Vec<Transaction>, DeskError> {
        self.config.admins.authorize(admin)?;
        Ok(self.ledger.all_transactions()?)
    }

    /// Plan against the current snapshot, commit with compare-and-swap, then notify.
    fn run(&self, tx_id: TransactionId, actor: Actor, event: Event) -> Result<Transaction, DeskError> {
        let name = event.name();
        let current = self.transaction(tx_id)?;
        let transition = state_machine::plan(&current, actor, event, &self.policy())?;

        let committed = self
            .ledger
            .compare_and_swap(tx_id, transition.expected, transition.update)
            .map_err(|e| match e {
                LedgerError::StatusMismatch { actual, .. } => {
                    log::debug!("[{name}] tx={tx_id} lost the race, now {actual}");
                    DeskError::InvalidStateTransition {
                        id: tx_id,
                        from: actual,
                        event: name,
                    }
                }
                LedgerError::ProofSlotOccupied { .. } => DeskError::InvalidStateTransition {
                    id: tx_id,
                    from: transition.expected,
                    event: name,
                },
                LedgerError::MissingTransaction { id } => DeskError::TransactionNotFound { id },
                other => DeskError::Storage(other),
            })?;

        log::debug!("[{name}] tx={tx_id} by {actor:?} -> {}", committed.status());
        self.notify(&transition.notification);
        Ok(committed)
    }
}

// =============================================================================
// Users and settings
// =============================================================================

impl<L: Ledger> ExchangeDesk<L> {
    /// Record a sign-up. The user starts unverified until an admin verifies them.
    pub fn register_user(&self, registration: Registration) -> Result<User, DeskError> {
        self.admit(User::register(registration))
    }

    /// Carry a user over from a roster, keeping its verification flag.
    pub(crate) fn seed_user(&self, registration: Registration) -> Result<User, DeskError> {
        self.admit(User::seed(registration))
    }

    fn admit(&self, user: User) -> Result<User, DeskError> {
        self.ledger.insert_user(user.clone())??;
        log::debug!("[register] user={} verified={}", user.id(), user.is_verified());

        self.notify(&Notification::about_user(
            Recipient::Admins,
            NotificationKind::UserRegistered,
            user.id(),
        ));
        Ok(user)
    }

    pub fn user(&self, user: UserId) -> Result<User, DeskError> {
        self.ledger.user(user)?.ok_or(DeskError::UserNotFound { user })
    }

    pub fn verify_user(&self, admin: UserId, user: UserId) -> Result<User, DeskError> {
        self.change_user(admin, user, User::verify, NotificationKind::UserVerified)
    }

    /// Removed users can no longer trade and can never be changed again.
    pub fn remove_user(&self, admin: UserId, user: UserId) -> Result<User, DeskError> {
        self.change_user(admin, user, User::remove, NotificationKind::UserRemoved)
    }

    fn change_user(
        &self,
        admin: UserId,
        user: UserId,
        mut change: impl FnMut(&mut User) -> Result<(), ValidationError>,
        kind: NotificationKind,
    ) -> Result<User, DeskError> {
        self.config.admins.authorize(admin)?;
        let updated = self
            .ledger
            .update_user(user, &mut change)
            .map_err(|e| match e {
                LedgerError::MissingUser { user } => DeskError::UserNotFound { user },
                other => DeskError::Storage(other),
            })??;

        log::debug!("[user] {user} {kind:?} by admin {admin}");
        self.notify(&Notification::about_user(Recipient::User(user), kind, user));
        Ok(updated)
    }

    /// One consistent snapshot of the settings.
    pub fn settings(&self) -> Result<Settings, DeskError> {
        Ok(self.ledger.settings()?)
    }

    /// Open transactions keep the rate they were priced at.
    pub fn set_rate(&self, admin: UserId, direction: Direction, rate: Decimal) -> Result<Settings, DeskError> {
        self.config.admins.authorize(admin)?;
        if rate <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount { amount: rate }.into());
        }
        let settings = self.ledger.update_settings(&mut |s| s.set_rate(direction, rate))?;
        log::info!("{direction} rate set to {rate} by admin {admin}");
        Ok(settings)
    }

    /// Flip whether a direction is accepted. Returns the new flag.
    pub fn toggle_direction(&self, admin: UserId, direction: Direction) -> Result<bool, DeskError> {
        self.config.admins.authorize(admin)?;
        let mut enabled = false;
        self.ledger.update_settings(&mut |s| enabled = s.toggle(direction))?;
        log::info!(
            "{direction} {} by admin {admin}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(enabled)
    }

    pub fn set_bank_destination(
        &self,
        admin: UserId,
        country: Country,
        destination: String,
    ) -> Result<Settings, DeskError> {
        self.config.admins.authorize(admin)?;
        let settings = self
            .ledger
            .update_settings(&mut |s| s.set_bank_destination(country, destination.clone()))?;
        log::info!("{country} bank destination updated by admin {admin}");
        Ok(settings)
    }
}

// =============================================================================
// Batch surface
// =============================================================================

impl<L: Ledger> ExchangeDesk<L> {
    /// Load users from a CSV roster: `id,name,family_name,country,phone,verified,id_document`.
    pub fn load_users<R: Read>(&self, reader: R) -> Result<usize, Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut loaded = 0;
        for result in csv_reader.deserialize() {
            let registration: Registration = result?;
            self.seed_user(registration)?;
            loaded += 1;
        }
        log::info!("Loaded {loaded} users");
        Ok(loaded)
    }

    /// Replay a CSV script of desk events.
    ///
    /// Malformed rows abort the replay. Rejected events are logged and skipped,
    /// the way a live desk answers the user and carries on.
    pub fn process_events<R: Read>(&self, reader: R) -> Result<(), Error> {
        log::info!("Starting event replay");

        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut applied = 0u64;
        let mut rejected = 0u64;

        for result in csv_reader.deserialize() {
            let record: EventRecord = result?;
            let row_num = applied + rejected + 1;
            log::trace!("[row {row_num}] Parsing: {record}");

            let command = Command::try_from(record)?;

            if let Err(e) = self.execute(command) {
                log::warn!("[row {row_num}] - Rejected: {e}");
                rejected += 1;
            } else {
                applied += 1;
            }
        }

        log::info!("Replay complete: {applied} applied, {rejected} rejected");
        Ok(())
    }

    pub fn execute(&self, command: Command) -> Result<(), DeskError> {
        match command {
            Command::Request {
                user,
                direction,
                amount,
                unit,
            } => self.request_transaction(user, direction, amount, unit).map(drop),
            Command::Advance { admin, tx, action } => self.advance_by_admin(tx, admin, action).map(drop),
            Command::UserProof { user, tx, proof } => self.submit_user_proof(tx, user, proof).map(drop),
            Command::AdminProof { admin, tx, proof } => self.submit_admin_proof(tx, admin, proof).map(drop),
            Command::Cancel { actor, tx } => self.cancel(tx, actor).map(drop),
            Command::VerifyUser { admin, user } => self.verify_user(admin, user).map(drop),
            Command::RemoveUser { admin, user } => self.remove_user(admin, user).map(drop),
            Command::SetRate {
                admin,
                direction,
                rate,
            } => self.set_rate(admin, direction, rate).map(drop),
            Command::Toggle { admin, direction } => self.toggle_direction(admin, direction).map(drop),
            Command::SetBank {
                admin,
                country,
                destination,
            } => self.set_bank_destination(admin, country, destination).map(drop),
        }
    }

    /// Write every transaction as CSV, oldest first.
    pub fn export_transactions<W: Write>(&self, writer: W) -> Result<(), Error> {
        let mut txs = self.ledger.all_transactions().map_err(DeskError::from)?;
        txs.reverse();
        log::info!("Exporting {} transactions", txs.len());

        let mut csv_writer = csv::Writer::from_writer(writer);
        for tx in &txs {
            csv_writer.serialize(TransactionRow::from(tx))?;
        }
        csv_writer.flush()?;

        log::trace!("Export complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desk::transaction::{TransactionStatus, TransactionUpdate};
    use crate::desk::DeliveryError;
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    const ADMIN: UserId = 1;
    const ALICE: UserId = 100;

    /// In-memory ledger whose commits fail as if the lock were poisoned.
    #[derive(Debug, Default)]
    struct BrokenLedger(InMemoryLedger);

    impl Ledger for BrokenLedger {
        fn user(&self, id: UserId) -> Result<Option<User>, LedgerError> {
            self.0.user(id)
        }

        fn insert_user(&self, user: User) -> Result<Result<(), ValidationError>, LedgerError> {
            self.0.insert_user(user)
        }

        fn update_user(
            &self,
            id: UserId,
            change: &mut dyn FnMut(&mut User) -> Result<(), ValidationError>,
        ) -> Result<Result<User, ValidationError>, LedgerError> {
            self.0.update_user(id, change)
        }

        fn settings(&self) -> Result<Settings, LedgerError> {
            self.0.settings()
        }

        fn update_settings(&self, change: &mut dyn FnMut(&mut Settings)) -> Result<Settings, LedgerError> {
            self.0.update_settings(change)
        }

        fn create_transaction(&self, new: NewTransaction) -> Result<Transaction, LedgerError> {
            self.0.create_transaction(new)
        }

        fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
            self.0.transaction(id)
        }

        fn compare_and_swap(
            &self,
            _id: TransactionId,
            _expected: TransactionStatus,
            _update: TransactionUpdate,
        ) -> Result<Transaction, LedgerError> {
            Err(LedgerError::Poisoned)
        }

        fn transactions_for_user(&self, id: UserId) -> Result<Vec<Transaction>, LedgerError> {
            self.0.transactions_for_user(id)
        }

        fn all_transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
            self.0.all_transactions()
        }
    }

    #[derive(Default, Clone)]
    struct Outbox(Arc<Mutex<Vec<(UserId, NotificationKind)>>>);

    impl NotificationSink for Outbox {
        fn deliver(&self, recipient: UserId, n: &Notification) -> Result<(), DeliveryError> {
            self.0.lock().unwrap().push((recipient, n.kind.clone()));
            Ok(())
        }
    }

    fn make_registration(id: UserId, verified: bool) -> Registration {
        Registration {
            id,
            name: "Alice".to_owned(),
            family_name: "Moradi".to_owned(),
            country: Country::Iran,
            phone: "+98".to_owned(),
            verified,
            id_document: None,
        }
    }

    fn make_desk() -> (ExchangeDesk, Outbox) {
        make_desk_over(InMemoryLedger::new())
    }

    fn make_desk_over<L: Ledger>(ledger: L) -> (ExchangeDesk<L>, Outbox) {
        let outbox = Outbox::default();
        let desk = ExchangeDesk::with_parts(
            DeskConfig::new(AdminGate::new([ADMIN])),
            ledger,
            Box::new(outbox.clone()),
        );
        desk.register_user(make_registration(ALICE, false)).unwrap();
        desk.verify_user(ADMIN, ALICE).unwrap();
        desk.set_rate(ADMIN, Direction::Buy, dec!(30)).unwrap();
        outbox.0.lock().unwrap().clear();
        (desk, outbox)
    }

    #[test]
    fn test_request_notifies_admins() {
        let (desk, outbox) = make_desk();
        let tx = desk
            .request_transaction(ALICE, Direction::Buy, dec!(100), Unit::Foreign)
            .unwrap();

        assert_eq!(tx.status(), TransactionStatus::Created);
        assert_eq!(tx.total_price(), dec!(3000.00));
        assert_eq!(
            *outbox.0.lock().unwrap(),
            vec![(ADMIN, NotificationKind::TransactionRequested)]
        );
    }

    #[test]
    fn test_unknown_and_unverified_users_cannot_request() {
        let (desk, _) = make_desk();
        assert!(matches!(
            desk.request_transaction(7, Direction::Buy, dec!(100), Unit::Foreign),
            Err(DeskError::UserNotFound { user: 7 })
        ));

        desk.remove_user(ADMIN, ALICE).unwrap();
        assert!(matches!(
            desk.request_transaction(ALICE, Direction::Buy, dec!(100), Unit::Foreign),
            Err(DeskError::UserNotVerified { user: ALICE })
        ));
    }

    #[test]
    fn test_instruct_carries_bank_destination() {
        let (desk, outbox) = make_desk();
        desk.set_bank_destination(ADMIN, Country::Iran, "IR-SHEBA".to_owned())
            .unwrap();
        let tx = desk
            .request_transaction(ALICE, Direction::Buy, dec!(100), Unit::Foreign)
            .unwrap();
        desk.advance_by_admin(tx.id(), ADMIN, AdminAction::InstructPayment)
            .unwrap();

        let sent = outbox.0.lock().unwrap();
        assert_eq!(
            sent.last(),
            Some(&(
                ALICE,
                NotificationKind::PaymentInstructions {
                    destination: "IR-SHEBA".to_owned()
                }
            ))
        );
    }

    #[test]
    fn test_rejected_transition_emits_nothing() {
        let (desk, outbox) = make_desk();
        let tx = desk
            .request_transaction(ALICE, Direction::Buy, dec!(100), Unit::Foreign)
            .unwrap();
        outbox.0.lock().unwrap().clear();

        assert!(desk.advance_by_admin(tx.id(), ADMIN, AdminAction::Approve).is_err());
        assert!(outbox.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_rate_change_does_not_touch_open_transactions() {
        let (desk, _) = make_desk();
        let tx = desk
            .request_transaction(ALICE, Direction::Buy, dec!(100), Unit::Foreign)
            .unwrap();
        desk.set_rate(ADMIN, Direction::Buy, dec!(35)).unwrap();

        let stored = desk.transaction(tx.id()).unwrap();
        assert_eq!(stored.total_price(), dec!(3000));
        assert_eq!(stored.rate(), dec!(30));
    }

    #[test]
    fn test_settings_changes_are_admin_only() {
        let (desk, _) = make_desk();
        assert!(matches!(
            desk.set_rate(ALICE, Direction::Buy, dec!(1)),
            Err(DeskError::Unauthorized { actor: ALICE })
        ));
        assert!(matches!(
            desk.toggle_direction(ALICE, Direction::Sell),
            Err(DeskError::Unauthorized { .. })
        ));
        assert!(matches!(
            desk.list_all_transactions(ALICE),
            Err(DeskError::Unauthorized { .. })
        ));
        assert!(matches!(
            desk.set_rate(ADMIN, Direction::Buy, dec!(0)),
            Err(DeskError::Validation(ValidationError::NonPositiveAmount { .. }))
        ));
    }

    #[test]
    fn test_toggle_disables_requests() {
        let (desk, _) = make_desk();
        assert!(!desk.toggle_direction(ADMIN, Direction::Buy).unwrap());
        assert!(matches!(
            desk.request_transaction(ALICE, Direction::Buy, dec!(100), Unit::Foreign),
            Err(DeskError::DirectionDisabled {
                direction: Direction::Buy
            })
        ));
        assert!(desk.toggle_direction(ADMIN, Direction::Buy).unwrap());
    }

    #[test]
    fn test_verify_unknown_user() {
        let (desk, _) = make_desk();
        assert!(matches!(
            desk.verify_user(ADMIN, 404),
            Err(DeskError::UserNotFound { user: 404 })
        ));
    }

    #[test]
    fn test_removed_user_cannot_be_verified() {
        let (desk, outbox) = make_desk();
        desk.remove_user(ADMIN, ALICE).unwrap();
        assert!(matches!(
            desk.verify_user(ADMIN, ALICE),
            Err(DeskError::Validation(ValidationError::UserRemoved { user: ALICE }))
        ));
        assert_eq!(
            *outbox.0.lock().unwrap(),
            vec![(ALICE, NotificationKind::UserRemoved)]
        );
    }

    #[test]
    fn test_sign_up_starts_unverified() {
        let (desk, outbox) = make_desk();
        let user = desk.register_user(make_registration(200, true)).unwrap();

        assert!(!user.is_verified());
        assert!(!desk.user(200).unwrap().is_verified());
        assert!(matches!(
            desk.request_transaction(200, Direction::Buy, dec!(100), Unit::Foreign),
            Err(DeskError::UserNotVerified { user: 200 })
        ));
        assert_eq!(
            *outbox.0.lock().unwrap(),
            vec![(ADMIN, NotificationKind::UserRegistered)]
        );
    }

    #[test]
    fn test_roster_keeps_verification() {
        let (desk, _) = make_desk();
        let roster = "id,name,family_name,country,phone,verified,id_document
200,Emre,Demir,Turkey,+90,true,ids/200.jpg
300,Deniz,Kaya,Turkey,+90,false,
";
        assert_eq!(desk.load_users(roster.as_bytes()).unwrap(), 2);

        let emre = desk.user(200).unwrap();
        assert!(emre.can_trade());
        assert_eq!(emre.id_document(), Some("ids/200.jpg"));
        assert!(!desk.user(300).unwrap().is_verified());
    }

    #[test]
    fn test_storage_failure_is_reported_without_notifying() {
        let (desk, outbox) = make_desk_over(BrokenLedger::default());
        let tx = desk
            .request_transaction(ALICE, Direction::Buy, dec!(100), Unit::Foreign)
            .unwrap();
        outbox.0.lock().unwrap().clear();

        assert!(matches!(
            desk.advance_by_admin(tx.id(), ADMIN, AdminAction::InstructPayment),
            Err(DeskError::Storage(LedgerError::Poisoned))
        ));
        assert!(matches!(
            desk.cancel(tx.id(), ALICE),
            Err(DeskError::Storage(LedgerError::Poisoned))
        ));
        assert!(outbox.0.lock().unwrap().is_empty());
        assert_eq!(desk.transaction(tx.id()).unwrap().status(), TransactionStatus::Created);
    }

    #[test]
    fn test_export_oldest_first() {
        let (desk, _) = make_desk();
        desk.request_transaction(ALICE, Direction::Buy, dec!(10), Unit::Foreign)
            .unwrap();
        desk.request_transaction(ALICE, Direction::Buy, dec!(20), Unit::Foreign)
            .unwrap();

        let mut out = Vec::new();
        desk.export_transactions(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,user,direction,amount,total_price,rate,status"));
        assert!(lines[1].starts_with("1,100,buy,10.00,300.00,30,created"));
        assert!(lines[2].starts_with("2,100,buy,20.00,600.00,30,created"));
    }
}
