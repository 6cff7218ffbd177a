use parkmate_core::{Clock, ConfirmationPort, Notice, NotificationSink};
use parkmate_shared::{LotConfigChanged, MAX_SLOT_COUNT, PaymentMethod, ReleaseReason, Slot, SlotEvent, VehicleType};
use parkmate_store::{LotConfigRepository, SlotRepository};
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::scheduler::ExpiryScheduler;
use crate::{SlotError, SlotResult};

const EVENT_CAPACITY: usize = 256;
const ONE_HOUR: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct SimulatorSettings {
    /// Slot count used by a full reset
    pub default_slot_count: usize,
    /// How long a booking holds its slot
    pub hold: Duration,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            default_slot_count: parkmate_store::lot_repo::DEFAULT_SLOT_COUNT,
            hold: ONE_HOUR,
        }
    }
}

/// Collaborators injected into a simulator
#[derive(Clone)]
pub struct SimulatorPorts {
    pub lots: LotConfigRepository,
    pub slots: SlotRepository,
    pub confirm: Arc<dyn ConfirmationPort>,
    pub sink: Arc<dyn NotificationSink>,
    pub clock: Arc<dyn Clock>,
}

/// Vehicle type and payment method applied to the next booking
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookingChoice {
    pub vehicle_type: VehicleType,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    Booked(Slot),
    Declined,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    #[serde(flatten)]
    pub slot: Slot,
    pub status: parkmate_shared::SlotStatus,
    pub remaining_ms: Option<i64>,
    pub mine: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotSnapshot {
    pub lot_id: String,
    pub slots: Vec<SlotView>,
    pub selected: Option<u32>,
    pub choice: BookingChoice,
}

struct LotState {
    slots: Vec<Slot>,
    selected: Option<u32>,
    choice: BookingChoice,
    timers: ExpiryScheduler,
}

impl LotState {
    fn slot_mut(&mut self, slot_id: u32) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.id() == slot_id)
    }

    fn slot(&self, slot_id: u32) -> Option<&Slot> {
        self.slots.iter().find(|s| s.id() == slot_id)
    }

    /// Replace the whole collection, dropping any selection
    fn replace(&mut self, slots: Vec<Slot>) {
        self.slots = slots;
        self.selected = None;
    }
}

struct Inner {
    lot_id: String,
    client_id: String,
    settings: SimulatorSettings,
    ports: SimulatorPorts,
    state: Mutex<LotState>,
    events: broadcast::Sender<SlotEvent>,
}

/// Per-lot slot grid with timed auto-release.
///
/// All mutations, including expiry callbacks, go through one async mutex.
/// After every change the expiry timers are torn down and rebuilt from the
/// recorded `booked_at` values, so a timer never outlives the booking it
/// was created for.
#[derive(Clone)]
pub struct SlotSimulator {
    inner: Arc<Inner>,
}

impl SlotSimulator {
    /// Build the simulator for `lot_id`.
    ///
    /// Slot count comes from the lot configuration. A persisted array of the
    /// same length is restored, anything else starts fresh.
    pub async fn initialize(
        lot_id: impl Into<String>,
        client_id: impl Into<String>,
        ports: SimulatorPorts,
        settings: SimulatorSettings,
    ) -> Self {
        let lot_id = lot_id.into();
        let count = ports.lots.slot_count(&lot_id).await;

        let slots = match ports.slots.load(&lot_id).await {
            Some(saved) if saved.len() == count => {
                debug!("Restored {} slots for lot {}", count, lot_id);
                saved
            }
            Some(saved) => {
                info!(
                    "Lot {} now has {} slots, dropping {} persisted",
                    lot_id,
                    count,
                    saved.len()
                );
                Slot::fresh_lot(count)
            }
            None => Slot::fresh_lot(count),
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let inner = Arc::new(Inner {
            lot_id,
            client_id: client_id.into(),
            settings,
            ports,
            state: Mutex::new(LotState {
                slots,
                selected: None,
                choice: BookingChoice::default(),
                timers: ExpiryScheduler::new(),
            }),
            events,
        });

        {
            let mut state = inner.state.lock().await;
            inner.refresh(&mut state);
            inner.persist(&state.slots).await;
        }
        info!("Slot simulator ready for lot {}", inner.lot_id);

        Self { inner }
    }

    pub fn lot_id(&self) -> &str {
        &self.inner.lot_id
    }

    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    pub fn hold(&self) -> Duration {
        self.inner.settings.hold
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SlotEvent> {
        self.inner.events.subscribe()
    }

    pub async fn snapshot(&self) -> LotSnapshot {
        let state = self.inner.state.lock().await;
        let now = self.inner.ports.clock.now_ms();
        let hold_ms = self.inner.hold_ms();

        let slots = state
            .slots
            .iter()
            .map(|slot| SlotView {
                slot: slot.clone(),
                status: slot.status(),
                remaining_ms: slot.remaining_ms(hold_ms, now).map(|r| r.max(0)),
                mine: slot.booked_by() == Some(self.inner.client_id.as_str()),
            })
            .collect();

        LotSnapshot {
            lot_id: self.inner.lot_id.clone(),
            slots,
            selected: state.selected,
            choice: state.choice,
        }
    }

    pub async fn slots(&self) -> Vec<Slot> {
        self.inner.state.lock().await.slots.clone()
    }

    pub async fn selected(&self) -> Option<u32> {
        self.inner.state.lock().await.selected
    }

    /// Move the selection cursor. Booked or unknown slots are ignored.
    pub async fn select(&self, slot_id: u32) -> bool {
        let mut state = self.inner.state.lock().await;
        let selectable = state.slot(slot_id).is_some_and(|s| !s.is_booked());
        if selectable {
            state.selected = Some(slot_id);
        }
        selectable
    }

    pub async fn set_vehicle_type(&self, vehicle_type: VehicleType) {
        self.inner.state.lock().await.choice.vehicle_type = vehicle_type;
    }

    pub async fn set_payment_method(&self, payment_method: PaymentMethod) {
        self.inner.state.lock().await.choice.payment_method = payment_method;
    }

    pub async fn choice(&self) -> BookingChoice {
        self.inner.state.lock().await.choice
    }

    /// Book the selected slot for this client.
    pub async fn book(&self) -> SlotResult<BookingOutcome> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;
        inner.adopt_stored(&mut state).await;

        let slot_id = state.selected.ok_or(SlotError::NoSelection)?;
        let slot = state.slot(slot_id).ok_or(SlotError::NotFound(slot_id))?;
        if slot.is_booked() {
            inner.ports.sink.notify(Notice::error(format!(
                "Slot {} was just booked by someone else. Please pick another slot.",
                slot_id
            )));
            return Err(SlotError::SlotUnavailable(slot_id));
        }

        let choice = state.choice;
        let prompt = format!(
            "Book slot {} for your {} and pay by {}?",
            slot_id, choice.vehicle_type, choice.payment_method
        );
        if !inner.ports.confirm.confirm(&prompt) {
            debug!("Booking of slot {} declined", slot_id);
            return Ok(BookingOutcome::Declined);
        }

        let now = inner.ports.clock.now_ms();
        let booked = {
            let slot = state.slot_mut(slot_id).ok_or(SlotError::NotFound(slot_id))?;
            slot.book(now, inner.client_id.clone(), choice.vehicle_type);
            slot.clone()
        };
        state.selected = None;

        inner.refresh(&mut state);
        inner.persist(&state.slots).await;

        info!("Slot {} in lot {} booked by {}", slot_id, inner.lot_id, inner.client_id);
        inner.ports.sink.notify(Notice::success(format!(
            "Slot {} booked for {}. Payment by {} confirmed.",
            slot_id,
            describe_hold(inner.settings.hold),
            choice.payment_method
        )));
        inner.publish(SlotEvent::Booked {
            lot_id: inner.lot_id.clone(),
            slot_id,
            booked_by: inner.client_id.clone(),
            vehicle_type: choice.vehicle_type,
            booked_at: now,
        });

        Ok(BookingOutcome::Booked(booked))
    }

    /// Release a slot ahead of its expiry. Returns false if it was already free.
    pub async fn release(&self, slot_id: u32) -> SlotResult<bool> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        let slot = state.slot_mut(slot_id).ok_or(SlotError::NotFound(slot_id))?;
        if !slot.is_booked() {
            return Ok(false);
        }
        slot.release();

        inner.refresh(&mut state);
        inner.persist(&state.slots).await;
        inner.publish_release(slot_id, ReleaseReason::Manual);
        Ok(true)
    }

    /// Wipe every booking and go back to the default slot count.
    /// Returns false if the user declined.
    pub async fn reset_all(&self) -> bool {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        if !inner
            .ports
            .confirm
            .confirm("Reset all slots? Every current booking will be cancelled.")
        {
            return false;
        }

        let count = inner.settings.default_slot_count.clamp(1, MAX_SLOT_COUNT);
        state.replace(Slot::fresh_lot(count));
        inner.refresh(&mut state);
        inner.persist(&state.slots).await;

        info!("Lot {} reset to {} slots", inner.lot_id, count);
        inner.publish(SlotEvent::Reset {
            lot_id: inner.lot_id.clone(),
            slot_count: count,
        });
        true
    }

    /// Re-read the lot configuration and rebuild the slots, discarding bookings
    pub async fn reload(&self) -> usize {
        let inner = &self.inner;
        let count = inner.ports.lots.slot_count(&inner.lot_id).await;

        let mut state = inner.state.lock().await;
        state.replace(Slot::fresh_lot(count));
        inner.refresh(&mut state);
        inner.persist(&state.slots).await;

        info!("Lot {} reloaded with {} slots", inner.lot_id, count);
        inner.publish(SlotEvent::Reloaded {
            lot_id: inner.lot_id.clone(),
            slot_count: count,
        });
        count
    }

    /// Adopt whatever another instance last wrote to the shared store.
    ///
    /// Keeps the selection so a booking attempt on a slot taken in the
    /// meantime is caught by [`SlotSimulator::book`]. Returns false when the
    /// stored array is missing or does not fit the current grid.
    pub async fn sync_from_store(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        self.inner.adopt_stored(&mut state).await
    }

    /// Time left on a slot's hold, `None` when it is free
    pub async fn remaining(&self, slot_id: u32) -> SlotResult<Option<Duration>> {
        let state = self.inner.state.lock().await;
        let slot = state.slot(slot_id).ok_or(SlotError::NotFound(slot_id))?;
        let now = self.inner.ports.clock.now_ms();
        Ok(slot
            .remaining_ms(self.inner.hold_ms(), now)
            .map(|ms| Duration::from_millis(ms.max(0) as u64)))
    }

    pub async fn pending_timers(&self) -> usize {
        self.inner.state.lock().await.timers.pending()
    }

    /// Reload whenever the configuration-changed signal names this lot.
    ///
    /// The task ends when the signal closes or the simulator is dropped.
    pub fn watch_config(&self, mut rx: broadcast::Receiver<LotConfigChanged>) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                let relevant = match rx.recv().await {
                    Ok(change) => {
                        let Some(inner) = weak.upgrade() else { break };
                        change.lot_id == inner.lot_id
                    }
                    // Missed messages may have named this lot
                    Err(broadcast::error::RecvError::Lagged(_)) => true,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if !relevant {
                    continue;
                }
                match weak.upgrade() {
                    Some(inner) => {
                        SlotSimulator { inner }.reload().await;
                    }
                    None => break,
                }
            }
        })
    }

    /// Cancel all pending expiry timers
    pub async fn shutdown(&self) {
        let cancelled = self.inner.state.lock().await.timers.cancel_all();
        debug!("Lot {} shut down, {} timers cancelled", self.inner.lot_id, cancelled);
    }
}

impl Inner {
    fn hold_ms(&self) -> i64 {
        self.settings.hold.as_millis() as i64
    }

    /// Tear down every timer, release holds that already ran out and
    /// schedule the rest
    fn refresh(self: &Arc<Self>, state: &mut LotState) {
        state.timers.cancel_all();

        let now = self.ports.clock.now_ms();
        let hold_ms = self.hold_ms();
        let mut expired = Vec::new();

        for slot in state.slots.iter_mut() {
            let (Some(booked_at), Some(remaining)) =
                (slot.booked_at(), slot.remaining_ms(hold_ms, now))
            else {
                continue;
            };

            if remaining <= 0 {
                slot.release();
                expired.push(slot.id());
                continue;
            }

            let weak = Arc::downgrade(self);
            let slot_id = slot.id();
            state.timers.schedule(
                slot_id,
                Duration::from_millis(remaining as u64),
                expire(weak, slot_id, booked_at),
            );
        }

        for slot_id in expired {
            if state.selected == Some(slot_id) {
                state.selected = None;
            }
            self.publish_release(slot_id, ReleaseReason::Expired);
        }
    }

    /// Replace the slots with the stored array when it fits the grid
    async fn adopt_stored(self: &Arc<Self>, state: &mut LotState) -> bool {
        let Some(saved) = self.ports.slots.load(&self.lot_id).await else {
            return false;
        };
        if saved.len() != state.slots.len() {
            debug!("Ignoring stored grid of {} slots for lot {}", saved.len(), self.lot_id);
            return false;
        }
        if saved != state.slots {
            state.slots = saved;
            self.refresh(state);
        }
        true
    }

    async fn persist(&self, slots: &[Slot]) {
        if let Err(e) = self.ports.slots.save(&self.lot_id, slots).await {
            warn!("Failed to persist slots for lot {}: {}", self.lot_id, e);
        }
    }

    fn publish(&self, event: SlotEvent) {
        let _ = self.events.send(event);
    }

    fn publish_release(&self, slot_id: u32, reason: ReleaseReason) {
        info!("Slot {} in lot {} released ({:?})", slot_id, self.lot_id, reason);
        self.publish(SlotEvent::Released {
            lot_id: self.lot_id.clone(),
            slot_id,
            reason,
        });
    }
}

/// Timer callback. Only releases the slot if it still holds the booking the
/// timer was scheduled for.
async fn expire(weak: Weak<Inner>, slot_id: u32, booked_at: i64) {
    let Some(inner) = weak.upgrade() else { return };
    let mut state = inner.state.lock().await;

    let still_held = state
        .slot(slot_id)
        .map(|s| s.booked_at() == Some(booked_at))
        .unwrap_or(false);
    if !still_held {
        debug!("Stale expiry for slot {} ignored", slot_id);
        return;
    }

    if let Some(slot) = state.slot_mut(slot_id) {
        slot.release();
    }
    if state.selected == Some(slot_id) {
        state.selected = None;
    }
    inner.refresh(&mut state);
    inner.persist(&state.slots).await;
    inner.publish_release(slot_id, ReleaseReason::Expired);
}

fn describe_hold(hold: Duration) -> String {
    let minutes = hold.as_secs() / 60;
    match minutes {
        0 => format!("{} seconds", hold.as_secs()),
        60 => "1 hour".to_string(),
        m if m % 60 == 0 => format!("{} hours", m / 60),
        1 => "1 minute".to_string(),
        m => format!("{} minutes", m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkmate_core::dialog::{FixedAnswer, RecordingSink, ScriptedConfirm};
    use parkmate_core::{ConfigSignal, InMemoryStore, KeyValueStore, Level, ManualClock};
    use parkmate_shared::SlotStatus;
    use parkmate_store::lot_repo::lot_config_key;

    const T0: i64 = 1_700_000_000_000;

    struct Harness {
        store: Arc<InMemoryStore>,
        signal: ConfigSignal,
        clock: Arc<ManualClock>,
        sink: Arc<RecordingSink>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(InMemoryStore::new()),
                signal: ConfigSignal::new(),
                clock: Arc::new(ManualClock::new(T0)),
                sink: Arc::new(RecordingSink::new()),
            }
        }

        async fn configure(&self, lot_id: &str, raw: &str) {
            self.store.set(&lot_config_key(lot_id), raw).await.unwrap();
        }

        fn lots(&self) -> LotConfigRepository {
            LotConfigRepository::new(self.store.clone(), self.signal.clone())
        }

        fn ports(&self, confirm: Arc<dyn ConfirmationPort>) -> SimulatorPorts {
            SimulatorPorts {
                lots: self.lots(),
                slots: SlotRepository::new(self.store.clone()),
                confirm,
                sink: self.sink.clone(),
                clock: self.clock.clone(),
            }
        }

        async fn simulator(&self, lot_id: &str, confirm: Arc<dyn ConfirmationPort>) -> SlotSimulator {
            self.simulator_as(lot_id, "client_me", confirm).await
        }

        async fn simulator_as(
            &self,
            lot_id: &str,
            client_id: &str,
            confirm: Arc<dyn ConfirmationPort>,
        ) -> SlotSimulator {
            SlotSimulator::initialize(lot_id, client_id, self.ports(confirm), SimulatorSettings::default())
                .await
        }
    }

    fn assert_invariants(slots: &[Slot]) {
        for slot in slots {
            assert!(slot.is_consistent(), "slot {} half booked", slot.id());
            assert_eq!(slot.status() == SlotStatus::Booked, slot.booked_at().is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_booking_auto_releases_after_hold() {
        let h = Harness::new();
        h.configure("lot-a", r#"{"totalSlots":3}"#).await;
        let sim = h.simulator("lot-a", Arc::new(FixedAnswer(true))).await;

        let ids: Vec<u32> = sim.slots().await.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(sim.slots().await.iter().all(|s| !s.is_booked()));

        let mut events = sim.subscribe();
        assert!(sim.select(2).await);
        let outcome = sim.book().await.unwrap();
        let BookingOutcome::Booked(slot) = outcome else { panic!("booking declined") };
        assert_eq!(slot.id(), 2);
        assert_eq!(slot.booked_at(), Some(T0));
        assert_eq!(slot.booked_by(), Some("client_me"));
        assert_eq!(sim.selected().await, None);
        assert_eq!(sim.pending_timers().await, 1);
        assert_eq!(h.sink.last().unwrap().level, Level::Success);
        assert!(matches!(events.recv().await.unwrap(), SlotEvent::Booked { slot_id: 2, .. }));
        // let the timer task start its countdown
        tokio::task::yield_now().await;

        tokio::time::advance(ONE_HOUR - Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        assert!(sim.slots().await[1].is_booked());

        h.clock.advance(ONE_HOUR.as_millis() as i64 + 1);
        tokio::time::advance(Duration::from_millis(2)).await;
        let released = events.recv().await.unwrap();
        assert_eq!(
            released,
            SlotEvent::Released {
                lot_id: "lot-a".into(),
                slot_id: 2,
                reason: ReleaseReason::Expired
            }
        );

        let slots = sim.slots().await;
        assert!(slots.iter().all(|s| !s.is_booked()));
        assert_eq!(slots[1].booked_at(), None);
        assert_eq!(sim.pending_timers().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_config_yields_default_grid() {
        let h = Harness::new();
        h.configure("lot-b", r#"{"totalSlots":"lots"}"#).await;
        let sim = h.simulator("lot-b", Arc::new(FixedAnswer(true))).await;

        let slots = sim.slots().await;
        assert_eq!(slots.len(), 10);
        assert!(slots.iter().all(|s| s.status() == SlotStatus::Available));
    }

    #[tokio::test]
    async fn test_select_ignores_booked_and_unknown_slots() {
        let h = Harness::new();
        h.configure("lot-c", r#"{"totalSlots":2}"#).await;
        let sim = h.simulator("lot-c", Arc::new(FixedAnswer(true))).await;

        assert!(!sim.select(7).await);
        assert!(sim.select(1).await);
        sim.book().await.unwrap();

        assert!(!sim.select(1).await);
        assert_eq!(sim.selected().await, None);
        assert!(sim.select(2).await);
        assert_eq!(sim.selected().await, Some(2));
    }

    #[tokio::test]
    async fn test_book_requires_selection() {
        let h = Harness::new();
        let sim = h.simulator("lot-d", Arc::new(FixedAnswer(true))).await;
        assert_eq!(sim.book().await, Err(SlotError::NoSelection));
    }

    #[tokio::test]
    async fn test_declined_booking_changes_nothing() {
        let h = Harness::new();
        let confirm = Arc::new(ScriptedConfirm::new([false]));
        let sim = h.simulator("lot-e", confirm.clone()).await;
        sim.set_vehicle_type(VehicleType::Bike).await;
        sim.set_payment_method(PaymentMethod::Upi).await;

        let before = sim.slots().await;
        assert!(sim.select(4).await);
        assert_eq!(sim.book().await.unwrap(), BookingOutcome::Declined);

        assert_eq!(sim.slots().await, before);
        assert_eq!(sim.selected().await, Some(4));
        assert_eq!(sim.pending_timers().await, 0);
        assert_eq!(confirm.prompts(), vec!["Book slot 4 for your bike and pay by UPI?"]);
    }

    #[tokio::test]
    async fn test_booking_touches_only_the_selected_slot() {
        let h = Harness::new();
        let sim = h.simulator("lot-f", Arc::new(FixedAnswer(true))).await;
        sim.set_vehicle_type(VehicleType::Truck).await;

        let before = sim.slots().await;
        sim.select(6).await;
        sim.book().await.unwrap();
        let after = sim.slots().await;

        let changed: Vec<u32> = before
            .iter()
            .zip(after.iter())
            .filter(|(b, a)| b != a)
            .map(|(_, a)| a.id())
            .collect();
        assert_eq!(changed, vec![6]);
        assert_eq!(after[5].vehicle_type(), Some(VehicleType::Truck));
        assert_invariants(&after);
    }

    #[tokio::test]
    async fn test_stale_selection_is_rejected() {
        let h = Harness::new();
        h.configure("lot-g", r#"{"totalSlots":4}"#).await;
        let mine = h.simulator_as("lot-g", "client_a", Arc::new(FixedAnswer(true))).await;
        let theirs = h.simulator_as("lot-g", "client_b", Arc::new(FixedAnswer(true))).await;

        assert!(mine.select(1).await);
        assert!(theirs.select(1).await);
        theirs.book().await.unwrap();

        // book picks up the other client's write before checking the slot
        assert_eq!(mine.book().await, Err(SlotError::SlotUnavailable(1)));
        let slots = mine.slots().await;
        assert_eq!(slots[0].booked_by(), Some("client_b"));
        assert!(slots[1..].iter().all(|s| !s.is_booked()));
        assert_eq!(mine.pending_timers().await, 1);

        let alert = h.sink.last().unwrap();
        assert_eq!(alert.level, Level::Error);
        assert!(alert.message.contains("Slot 1"));

        let snapshot = mine.snapshot().await;
        assert!(!snapshot.slots[0].mine);
    }

    #[tokio::test]
    async fn test_sync_ignores_mismatched_grid() {
        let h = Harness::new();
        h.configure("lot-g2", r#"{"totalSlots":4}"#).await;
        let sim = h.simulator("lot-g2", Arc::new(FixedAnswer(true))).await;
        assert!(sim.sync_from_store().await);

        let other = SlotRepository::new(h.store.clone());
        other.save("lot-g2", &Slot::fresh_lot(6)).await.unwrap();
        assert!(!sim.sync_from_store().await);
        assert_eq!(sim.slots().await.len(), 4);

        sim.select(2).await;
        assert!(matches!(sim.book().await, Ok(BookingOutcome::Booked(_))));
    }

    #[tokio::test]
    async fn test_oversized_config_falls_back_to_default_grid() {
        let h = Harness::new();
        h.configure("lot-big", r#"{"totalSlots":4294967297}"#).await;
        let sim = h.simulator("lot-big", Arc::new(FixedAnswer(true))).await;

        let count = sim.reload().await;
        let slots = sim.slots().await;
        assert_eq!(count, 10);
        assert_eq!(slots.len(), count);
        assert_eq!(slots.last().map(Slot::id), Some(10));
    }

    #[tokio::test]
    async fn test_release_then_rebook() {
        let h = Harness::new();
        let sim = h.simulator("lot-h", Arc::new(FixedAnswer(true))).await;

        sim.select(3).await;
        sim.book().await.unwrap();
        assert_eq!(sim.release(3).await, Ok(true));
        assert_eq!(sim.release(3).await, Ok(false));
        assert_eq!(sim.release(99).await, Err(SlotError::NotFound(99)));
        assert_eq!(sim.pending_timers().await, 0);

        assert!(sim.select(3).await);
        assert!(matches!(sim.book().await, Ok(BookingOutcome::Booked(_))));
        assert_eq!(sim.pending_timers().await, 1);
    }

    #[tokio::test]
    async fn test_reset_all_returns_to_default_grid() {
        let h = Harness::new();
        h.configure("lot-i", r#"{"totalSlots":3}"#).await;
        let confirm = Arc::new(ScriptedConfirm::new([true, true, false, true]));
        let sim = h.simulator("lot-i", confirm.clone()).await;

        for id in [1, 3] {
            sim.select(id).await;
            sim.book().await.unwrap();
        }
        assert_eq!(sim.pending_timers().await, 2);

        assert!(!sim.reset_all().await);
        assert_eq!(sim.slots().await.iter().filter(|s| s.is_booked()).count(), 2);

        assert!(sim.reset_all().await);
        let slots = sim.slots().await;
        assert_eq!(slots.len(), 10);
        assert!(slots.iter().all(|s| !s.is_booked()));
        assert_eq!(sim.pending_timers().await, 0);
    }

    #[tokio::test]
    async fn test_reset_all_keeps_at_least_one_slot() {
        let h = Harness::new();
        let settings = SimulatorSettings {
            default_slot_count: 0,
            ..SimulatorSettings::default()
        };
        let sim = SlotSimulator::initialize(
            "lot-zero",
            "client_me",
            h.ports(Arc::new(FixedAnswer(true))),
            settings,
        )
        .await;

        assert!(sim.reset_all().await);
        let slots = sim.slots().await;
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].id(), 1);
    }

    #[tokio::test]
    async fn test_reload_follows_config_signal() {
        let h = Harness::new();
        h.configure("lot-j", r#"{"totalSlots":3}"#).await;
        let sim = h.simulator("lot-j", Arc::new(FixedAnswer(true))).await;
        let mut events = sim.subscribe();
        let watcher = sim.watch_config(h.signal.subscribe());

        sim.select(1).await;
        sim.book().await.unwrap();
        events.recv().await.unwrap();

        // Changes to other lots are ignored
        h.lots().save_slot_count("lot-other", 8).await.unwrap();
        h.lots().save_slot_count("lot-j", 5).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            SlotEvent::Reloaded { lot_id: "lot-j".into(), slot_count: 5 }
        );
        let slots = sim.slots().await;
        assert_eq!(slots.len(), 5);
        assert!(slots.iter().all(|s| !s.is_booked()));
        assert_eq!(sim.pending_timers().await, 0);

        h.configure("lot-j", "garbage").await;
        assert_eq!(sim.reload().await, 10);
        watcher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_restores_persisted_bookings() {
        let h = Harness::new();
        h.configure("lot-k", r#"{"totalSlots":3}"#).await;

        let mut saved = Slot::fresh_lot(3);
        saved[0].book(T0 - ONE_HOUR.as_millis() as i64 - 5_000, "client_old", VehicleType::Car);
        saved[2].book(T0 - 60_000, "client_me", VehicleType::Ev);
        SlotRepository::new(h.store.clone()).save("lot-k", &saved).await.unwrap();

        let sim = h.simulator("lot-k", Arc::new(FixedAnswer(true))).await;
        let slots = sim.slots().await;
        assert!(!slots[0].is_booked(), "overdue hold released on load");
        assert!(slots[2].is_booked());
        assert_eq!(sim.pending_timers().await, 1);

        let stored = SlotRepository::new(h.store.clone()).load("lot-k").await.unwrap();
        assert_eq!(stored, slots);

        let snapshot = sim.snapshot().await;
        assert!(snapshot.slots[2].mine);
        assert_eq!(snapshot.slots[2].remaining_ms, Some(ONE_HOUR.as_millis() as i64 - 60_000));
    }

    #[tokio::test]
    async fn test_remaining_time_counts_down() {
        let h = Harness::new();
        let sim = h.simulator("lot-l", Arc::new(FixedAnswer(true))).await;
        assert_eq!(sim.remaining(1).await, Ok(None));

        sim.select(1).await;
        sim.book().await.unwrap();
        let first = sim.remaining(1).await.unwrap().unwrap();
        assert_eq!(first, ONE_HOUR);

        h.clock.advance(1_500);
        let second = sim.remaining(1).await.unwrap().unwrap();
        assert!(second < first);
        assert_eq!(first - second, Duration::from_millis(1_500));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_timers() {
        let h = Harness::new();
        let sim = h.simulator("lot-m", Arc::new(FixedAnswer(true))).await;
        sim.select(2).await;
        sim.book().await.unwrap();
        assert_eq!(sim.pending_timers().await, 1);

        sim.shutdown().await;
        assert_eq!(sim.pending_timers().await, 0);
    }

    #[test]
    fn test_describe_hold() {
        assert_eq!(describe_hold(ONE_HOUR), "1 hour");
        assert_eq!(describe_hold(Duration::from_secs(7200)), "2 hours");
        assert_eq!(describe_hold(Duration::from_secs(900)), "15 minutes");
        assert_eq!(describe_hold(Duration::from_secs(30)), "30 seconds");
    }
}
