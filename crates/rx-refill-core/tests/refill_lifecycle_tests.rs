//! End-to-end lifecycle tests through the public `RefillCore` facade.

use std::sync::{Arc, Mutex};

use chrono::{Days, NaiveDate, Utc};
use rx_refill_core::{
    Actor, DeliveryAddress, FillItemInput, InventoryItem, Notice, Notifier, NotifyError,
    PrescriptionStatus, RefillCore, RefillError, RefillStatus, TrackingEvent, TrackingPublisher,
    TrackingStatus,
};

#[derive(Default)]
struct Recorder {
    notices: Mutex<Vec<Notice>>,
    events: Mutex<Vec<TrackingEvent>>,
}

impl Notifier for Recorder {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

impl TrackingPublisher for Recorder {
    fn publish(&self, event: &TrackingEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

struct Harness {
    core: RefillCore,
    recorder: Arc<Recorder>,
    patient: Actor,
    pharmacist: Actor,
}

impl Harness {
    fn new() -> Self {
        let recorder = Arc::new(Recorder::default());
        let core = RefillCore::open_in_memory()
            .unwrap()
            .with_notifier(recorder.clone())
            .with_publisher(recorder.clone());
        let pharmacist = Actor::pharmacist("pharm-1");

        core.upsert_inventory(
            &pharmacist,
            &InventoryItem::new("MED-1".into(), "Metformin 500mg".into(), 200),
        )
        .unwrap();
        core.upsert_inventory(
            &pharmacist,
            &InventoryItem::new("MED-2".into(), "Atorvastatin 10mg".into(), 6),
        )
        .unwrap();

        Self {
            core,
            recorder,
            patient: Actor::patient("patient-1"),
            pharmacist,
        }
    }

    fn approved_prescription(&self) -> String {
        let prescription = self.core.register_prescription(&self.patient, None).unwrap();
        self.core
            .review_prescription(&self.pharmacist, &prescription.id, PrescriptionStatus::Approved, None)
            .unwrap();
        prescription.id
    }

    fn approved_request(&self) -> (String, String) {
        let rx = self.approved_prescription();
        let request = self
            .core
            .create_refill_request(&self.patient, &rx, &address())
            .unwrap();
        self.core.approve(&self.pharmacist, &request.id).unwrap();
        (rx, request.id)
    }
}

fn address() -> DeliveryAddress {
    DeliveryAddress {
        line1: "12 MG Road".into(),
        line2: Some("Flat 4".into()),
        city: "Bengaluru".into(),
        state: "Karnataka".into(),
        pincode: "560001".into(),
        phone: "9876543210".into(),
    }
}

#[test]
fn second_request_is_always_a_duplicate() {
    for first_outcome in ["pending", "approved", "rejected"] {
        let h = Harness::new();
        let rx = h.approved_prescription();
        let first = h.core.create_refill_request(&h.patient, &rx, &address()).unwrap();

        match first_outcome {
            "approved" => {
                h.core.approve(&h.pharmacist, &first.id).unwrap();
            }
            "rejected" => {
                h.core.reject(&h.pharmacist, &first.id, Some("not due yet")).unwrap();
            }
            _ => {}
        }

        let second = h.core.create_refill_request(&h.patient, &rx, &address());
        assert!(
            matches!(second, Err(RefillError::DuplicateRequest(_))),
            "after {} request: {:?}",
            first_outcome,
            second
        );
    }
}

#[test]
fn address_validation() {
    let h = Harness::new();
    let rx = h.approved_prescription();

    let mut bad = address();
    bad.pincode = "1234".into();
    assert!(matches!(
        h.core.create_refill_request(&h.patient, &rx, &bad),
        Err(RefillError::Validation(_))
    ));

    let mut bad = address();
    bad.phone = "12345".into();
    assert!(matches!(
        h.core.create_refill_request(&h.patient, &rx, &bad),
        Err(RefillError::Validation(_))
    ));

    let request = h.core.create_refill_request(&h.patient, &rx, &address()).unwrap();
    assert_eq!(request.address.pincode, "560001");
    assert_eq!(request.address.phone, "9876543210");
}

#[test]
fn fill_computes_quantities() {
    let h = Harness::new();
    let (_, request_id) = h.approved_request();

    let outcome = h
        .core
        .fill(
            &h.pharmacist,
            &request_id,
            &[FillItemInput::new("MED-1", true, false, true, 5)],
            false,
        )
        .unwrap();

    assert_eq!(outcome.history.medicines.len(), 1);
    assert_eq!(outcome.history.medicines[0].total_needed, 10);
    assert_eq!(outcome.history.medicine_summary(), "- Metformin 500mg (x10)");
    assert_eq!(outcome.refill_reminder_date, None);
}

#[test]
fn all_false_item_is_nothing_to_fill() {
    let h = Harness::new();
    let (_, request_id) = h.approved_request();

    let result = h.core.fill(
        &h.pharmacist,
        &request_id,
        &[FillItemInput::new("MED-1", false, false, false, 5)],
        true,
    );
    assert!(matches!(result, Err(RefillError::NothingToFill)));

    // The request stays fillable
    let request = h.core.get_refill_request(&h.pharmacist, &request_id).unwrap();
    assert_eq!(request.status, RefillStatus::Approved);
}

#[test]
fn all_false_item_is_excluded_alongside_others() {
    let h = Harness::new();
    let (_, request_id) = h.approved_request();

    let outcome = h
        .core
        .fill(
            &h.pharmacist,
            &request_id,
            &[
                FillItemInput::new("MED-2", false, false, false, 5),
                FillItemInput::new("MED-1", true, true, true, 2),
            ],
            false,
        )
        .unwrap();
    assert_eq!(outcome.history.medicines.len(), 1);
    assert_eq!(outcome.history.medicines[0].medicine_id, "MED-1");
}

#[test]
fn reminder_scheduling() {
    let h = Harness::new();
    let (_, ten_day) = h.approved_request();
    let outcome = h
        .core
        .fill(
            &h.pharmacist,
            &ten_day,
            &[FillItemInput::new("MED-1", true, false, false, 10)],
            true,
        )
        .unwrap();
    let expected = outcome.history.fill_date.date_naive() + Days::new(7);
    assert_eq!(outcome.refill_reminder_date, Some(expected));
    assert_eq!(outcome.history.refill_reminder_date, Some(expected));

    let (_, three_day) = h.approved_request();
    let outcome = h
        .core
        .fill(
            &h.pharmacist,
            &three_day,
            &[FillItemInput::new("MED-1", true, false, false, 3)],
            true,
        )
        .unwrap();
    assert_eq!(outcome.refill_reminder_date, None);
}

#[test]
fn low_stock_is_reported_not_refused() {
    let h = Harness::new();
    let (_, request_id) = h.approved_request();

    let outcome = h
        .core
        .fill(
            &h.pharmacist,
            &request_id,
            &[FillItemInput::new("MED-2", true, true, false, 5)],
            false,
        )
        .unwrap();
    assert_eq!(outcome.low_stock_alerts, vec!["Atorvastatin 10mg".to_string()]);
    assert!(outcome.history.medicines[0].low_stock);

    let stock = h.core.list_inventory(&h.pharmacist).unwrap();
    let atorvastatin = stock.iter().find(|i| i.medicine_id == "MED-2").unwrap();
    assert_eq!(atorvastatin.stock_quantity, 0);
}

#[test]
fn illegal_transitions() {
    let h = Harness::new();
    let rx = h.approved_prescription();
    let request = h.core.create_refill_request(&h.patient, &rx, &address()).unwrap();

    // Dispatch before fill
    assert!(matches!(
        h.core.dispatch(&h.pharmacist, &request.id),
        Err(RefillError::InvalidTransition(_))
    ));

    h.core.approve(&h.pharmacist, &request.id).unwrap();
    assert!(matches!(
        h.core.approve(&h.pharmacist, &request.id),
        Err(RefillError::InvalidTransition(_))
    ));
    assert!(matches!(
        h.core.reject(&h.pharmacist, &request.id, None),
        Err(RefillError::InvalidTransition(_))
    ));
    assert!(matches!(
        h.core.dispatch(&h.pharmacist, &request.id),
        Err(RefillError::InvalidTransition(_))
    ));
}

#[test]
fn full_lifecycle_and_delivery() {
    let h = Harness::new();
    let (rx, request_id) = h.approved_request();

    assert!(matches!(
        h.core.mark_delivered(&h.patient, &rx),
        Err(RefillError::InvalidState(_))
    ));

    h.core
        .fill(
            &h.pharmacist,
            &request_id,
            &[FillItemInput::new("MED-1", true, false, true, 14)],
            true,
        )
        .unwrap();
    let dispatched = h.core.dispatch(&h.pharmacist, &request_id).unwrap();
    assert_eq!(dispatched.status, RefillStatus::Dispatched);

    let progress = h.core.tracking_progress(&h.patient, &rx).unwrap();
    assert!(progress.can_mark_delivered);

    let first = h.core.mark_delivered(&h.patient, &rx).unwrap();
    assert!(first.newly_delivered);
    let second = h.core.mark_delivered(&h.patient, &rx).unwrap();
    assert!(!second.newly_delivered);
    assert_eq!(first.events.len(), second.events.len());

    let statuses: Vec<_> = h
        .core
        .tracking_history(&h.patient, &rx)
        .unwrap()
        .iter()
        .map(|e| e.status)
        .collect();
    assert_eq!(statuses, TrackingStatus::ALL.to_vec());
    assert_eq!(h.recorder.events.lock().unwrap().len(), 8);

    let progress = h.core.tracking_progress(&h.patient, &rx).unwrap();
    assert_eq!(progress.active_index, 7);
    assert!(!progress.can_mark_delivered);

    let notices = h.recorder.notices.lock().unwrap();
    assert!(matches!(notices[0], Notice::MedicinesFilled { .. }));
    assert!(matches!(notices[1], Notice::MedicinesDispatched { .. }));
}

#[test]
fn reminder_sweep_sends_refill_due_notice() {
    let h = Harness::new();
    let (rx, request_id) = h.approved_request();
    let outcome = h
        .core
        .fill(
            &h.pharmacist,
            &request_id,
            &[FillItemInput::new("MED-1", true, false, false, 30)],
            true,
        )
        .unwrap();
    let due: NaiveDate = outcome.refill_reminder_date.unwrap();

    let before = h.core.run_reminder_sweep(due - Days::new(1)).unwrap();
    assert_eq!(before.checked, 0);

    let summary = h.core.run_reminder_sweep(due).unwrap();
    assert_eq!(summary.sent, 1);

    let notices = h.recorder.notices.lock().unwrap();
    match notices.last().unwrap() {
        Notice::RefillDue {
            prescription_id,
            medicine_summary,
            due_date,
            ..
        } => {
            assert_eq!(prescription_id, &rx);
            assert_eq!(medicine_summary, "- Metformin 500mg (x30)");
            assert_eq!(*due_date, due + Days::new(3));
        }
        other => panic!("unexpected notice {:?}", other),
    }
}

#[test]
fn patient_can_switch_off_reminders() {
    let h = Harness::new();
    let (_, request_id) = h.approved_request();
    let outcome = h
        .core
        .fill(
            &h.pharmacist,
            &request_id,
            &[FillItemInput::new("MED-1", true, false, false, 30)],
            true,
        )
        .unwrap();
    let due = outcome.refill_reminder_date.unwrap();

    let settings = h
        .core
        .set_reminders_enabled(&h.patient, "patient-1", false)
        .unwrap();
    assert!(!settings.enabled);
    assert_eq!(settings.reminders_updated, 1);

    let admin = Actor::admin("admin-1");
    let summary = h.core.trigger_reminder_sweep(&admin, due).unwrap();
    assert_eq!(summary.checked, 0);
    assert!(h.recorder.notices.lock().unwrap().iter().all(|n| !matches!(n, Notice::RefillDue { .. })));

    let stats = h.core.reminder_stats(&admin, due).unwrap();
    assert_eq!(stats.total_reminders, 1);
    assert_eq!(stats.enabled_reminders, 0);
    assert_eq!(stats.due_today, 0);

    assert!(matches!(
        h.core.trigger_reminder_sweep(&h.patient, due),
        Err(RefillError::Forbidden(_))
    ));
}

#[test]
fn concurrent_approvals_have_one_winner() {
    let h = Harness::new();
    let rx = h.approved_prescription();
    let request = h.core.create_refill_request(&h.patient, &rx, &address()).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let core = h.core.clone();
            let id = request.id.clone();
            std::thread::spawn(move || core.approve(&Actor::pharmacist(format!("pharm-{}", i)), &id))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, RefillError::InvalidTransition(_))));
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rx-refill.db");
    let patient = Actor::patient("patient-1");
    let pharmacist = Actor::pharmacist("pharm-1");

    let (rx, request_id) = {
        let core = RefillCore::open(&path).unwrap();
        let prescription = core.register_prescription(&patient, None).unwrap();
        core.review_prescription(&pharmacist, &prescription.id, PrescriptionStatus::Approved, None)
            .unwrap();
        let request = core
            .create_refill_request(&patient, &prescription.id, &address())
            .unwrap();
        (prescription.id, request.id)
    };

    let core = RefillCore::open(&path).unwrap();
    let request = core.get_refill_request(&patient, &request_id).unwrap();
    assert_eq!(request.status, RefillStatus::Pending);
    assert!(request.requested_at <= Utc::now());
    assert!(matches!(
        core.create_refill_request(&patient, &rx, &address()),
        Err(RefillError::DuplicateRequest(_))
    ));
}
