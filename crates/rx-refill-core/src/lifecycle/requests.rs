//! Refill request transitions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::{require_pharmacist, require_staff, RefillError, RefillManager, RefillResult};
use crate::db::RefillTransition;
use crate::fill::plan_fill;
use crate::models::{
    Actor, DeliveryAddress, FillHistoryEntry, FillHistoryStatus, FillItemInput,
    PrescriptionStatus, RefillReminder, RefillRequest, RefillStatus, Role, TrackingEvent,
    TrackingStatus,
};
use crate::notify::{deliver, Notice};
use crate::reminders::reminder_date;

/// Result of a successful fill.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillOutcome {
    pub request: RefillRequest,
    pub history: FillHistoryEntry,
    /// Medicines that needed more than was in stock
    pub low_stock_alerts: Vec<String>,
    pub refill_reminder_date: Option<NaiveDate>,
}

impl<'a> RefillManager<'a> {
    /// Request a refill of an approved prescription.
    ///
    /// A prescription gets at most one request, ever: a rejected request
    /// still blocks a second one.
    pub fn create_refill_request(
        &self,
        actor: &Actor,
        prescription_id: &str,
        address: &DeliveryAddress,
    ) -> RefillResult<RefillRequest> {
        let prescription = self.require_prescription(prescription_id)?;

        if actor.role != Role::Patient || prescription.patient_id != actor.user_id {
            return Err(super::forbidden(actor, "request a refill of this prescription"));
        }
        if prescription.status != PrescriptionStatus::Approved {
            return Err(RefillError::InvalidState(format!(
                "Prescription {} is not approved",
                prescription_id
            )));
        }
        if self.db.refill_request_exists(prescription_id)? {
            return Err(RefillError::DuplicateRequest(format!(
                "refill request for prescription {}",
                prescription_id
            )));
        }

        let address = address.normalized();
        address.validate().map_err(RefillError::Validation)?;

        let request = RefillRequest::new(prescription_id.to_string(), actor.user_id.clone(), address);
        let events = vec![TrackingEvent::new(prescription_id, TrackingStatus::RefillRequested, None)];

        self.db.with_transaction(|db| -> RefillResult<()> {
            db.insert_refill_request(&request)?;
            self.record_events(&events)
        })?;
        self.publish(&events);

        tracing::info!(
            request_id = %request.id,
            prescription_id,
            patient_id = %actor.user_id,
            "refill requested"
        );
        Ok(request)
    }

    /// PENDING → APPROVED.
    pub fn approve(&self, actor: &Actor, request_id: &str) -> RefillResult<RefillRequest> {
        require_pharmacist(actor, "approve refill requests")?;
        let request = self.require_request(request_id)?;
        Self::check_transition(&request, RefillStatus::Approved)?;

        let mut transition = RefillTransition::new(RefillStatus::Pending, RefillStatus::Approved);
        transition.pharmacist_id = Some(actor.user_id.as_str());
        transition.actioned_at = Some(Utc::now());

        let events = vec![TrackingEvent::new(
            &request.prescription_id,
            TrackingStatus::RefillApproved,
            None,
        )];

        let updated = self.db.with_transaction(|_| {
            let updated = self.apply_transition(request_id, &transition)?;
            self.record_events(&events)?;
            Ok::<_, RefillError>(updated)
        })?;
        self.publish(&events);

        tracing::info!(request_id, pharmacist_id = %actor.user_id, "refill approved");
        Ok(updated)
    }

    /// PENDING → REJECTED. The reason is optional.
    pub fn reject(
        &self,
        actor: &Actor,
        request_id: &str,
        reason: Option<&str>,
    ) -> RefillResult<RefillRequest> {
        require_pharmacist(actor, "reject refill requests")?;
        let request = self.require_request(request_id)?;
        Self::check_transition(&request, RefillStatus::Rejected)?;

        let reason = reason.map(str::trim).filter(|r| !r.is_empty());

        let mut transition = RefillTransition::new(RefillStatus::Pending, RefillStatus::Rejected);
        transition.pharmacist_id = Some(actor.user_id.as_str());
        transition.actioned_at = Some(Utc::now());
        transition.rejection_reason = reason;

        let updated = self
            .db
            .with_transaction(|_| self.apply_transition(request_id, &transition))?;

        tracing::info!(
            request_id,
            pharmacist_id = %actor.user_id,
            reason = reason.unwrap_or(""),
            "refill rejected"
        );
        Ok(updated)
    }

    /// APPROVED → FILLED.
    ///
    /// Computes quantities, draws down stock (never below zero), records the
    /// fill and, when asked and the supply is at least a week, schedules a
    /// refill reminder. Low stock is reported, not refused.
    pub fn fill(
        &self,
        actor: &Actor,
        request_id: &str,
        items: &[FillItemInput],
        enable_reminders: bool,
    ) -> RefillResult<FillOutcome> {
        require_staff(actor, "fill refill requests")?;
        let request = self.require_request(request_id)?;
        Self::check_transition(&request, RefillStatus::Filled)?;

        let fill_date = Utc::now();

        let (outcome, events) = self.db.with_transaction(|db| {
            let plan = plan_fill(db, items)?;

            let mut transition = RefillTransition::new(RefillStatus::Approved, RefillStatus::Filled);
            transition.actioned_at = Some(fill_date);
            let updated = self.apply_transition(request_id, &transition)?;

            for (medicine_id, quantity) in plan.stock_updates() {
                db.set_stock_quantity(medicine_id, quantity)?;
            }

            let max_days = plan.max_days();
            let reminder_on = reminder_date(fill_date.date_naive(), max_days, enable_reminders);
            let history = self.fill_history_entry(actor, &updated, &plan.lines, fill_date, reminder_on);
            db.insert_fill_history(&history)?;

            if let Some(date) = reminder_on {
                let mut reminder = RefillReminder::new(
                    updated.prescription_id.clone(),
                    updated.patient_id.clone(),
                    max_days,
                    date,
                );
                // Scheduled either way so the patient can turn it back on
                reminder.enabled = db.patient_reminders_enabled(&updated.patient_id)?;
                db.insert_reminder(&reminder)?;
            }

            let events = vec![
                TrackingEvent::new(&updated.prescription_id, TrackingStatus::Filling, None),
                TrackingEvent::new(&updated.prescription_id, TrackingStatus::Filled, None),
            ];
            self.record_events(&events)?;

            let outcome = FillOutcome {
                request: updated,
                history,
                low_stock_alerts: plan.low_stock_alerts,
                refill_reminder_date: reminder_on,
            };
            Ok::<_, RefillError>((outcome, events))
        })?;
        self.publish(&events);

        if !outcome.low_stock_alerts.is_empty() {
            tracing::warn!(
                request_id,
                medicines = ?outcome.low_stock_alerts,
                "filled with insufficient stock"
            );
        }
        tracing::info!(
            request_id,
            pharmacist_id = %actor.user_id,
            medicines = outcome.history.medicines.len(),
            reminder = ?outcome.refill_reminder_date,
            "refill filled"
        );

        deliver(
            self.notifier,
            &Notice::MedicinesFilled {
                patient_id: outcome.request.patient_id.clone(),
                prescription_id: outcome.request.prescription_id.clone(),
                medicine_summary: outcome.history.medicine_summary(),
                refill_reminder_date: outcome.refill_reminder_date,
            },
        );

        Ok(outcome)
    }

    /// FILLED → DISPATCHED.
    pub fn dispatch(&self, actor: &Actor, request_id: &str) -> RefillResult<RefillRequest> {
        require_staff(actor, "dispatch refill requests")?;
        let request = self.require_request(request_id)?;
        Self::check_transition(&request, RefillStatus::Dispatched)?;

        let mut transition = RefillTransition::new(RefillStatus::Filled, RefillStatus::Dispatched);
        transition.actioned_at = Some(Utc::now());

        let events = vec![TrackingEvent::new(
            &request.prescription_id,
            TrackingStatus::Dispatched,
            None,
        )];

        let updated = self.db.with_transaction(|db| {
            let updated = self.apply_transition(request_id, &transition)?;
            db.mark_fill_history_dispatched(&updated.prescription_id)?;
            self.record_events(&events)?;
            Ok::<_, RefillError>(updated)
        })?;
        self.publish(&events);

        tracing::info!(request_id, pharmacist_id = %actor.user_id, "refill dispatched");

        deliver(
            self.notifier,
            &Notice::MedicinesDispatched {
                patient_id: updated.patient_id.clone(),
                prescription_id: updated.prescription_id.clone(),
            },
        );

        Ok(updated)
    }

    fn fill_history_entry(
        &self,
        actor: &Actor,
        request: &RefillRequest,
        lines: &[crate::models::FilledMedicine],
        fill_date: DateTime<Utc>,
        refill_reminder_date: Option<NaiveDate>,
    ) -> FillHistoryEntry {
        FillHistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            refill_request_id: request.id.clone(),
            prescription_id: request.prescription_id.clone(),
            patient_id: request.patient_id.clone(),
            pharmacist_id: actor.user_id.clone(),
            medicines: lines.to_vec(),
            status: FillHistoryStatus::Filled,
            fill_date,
            refill_reminder_date,
        }
    }
}
