//! Prescription upload and pharmacist review.

use chrono::Utc;

use super::{require_staff, RefillError, RefillManager, RefillResult};
use crate::models::{
    Actor, FieldError, Prescription, PrescriptionStatus, Role, TrackingEvent, TrackingStatus,
};

impl<'a> RefillManager<'a> {
    /// Record a newly uploaded prescription for the calling patient.
    pub fn register_prescription(
        &self,
        actor: &Actor,
        image_url: Option<String>,
    ) -> RefillResult<Prescription> {
        if actor.role != Role::Patient {
            return Err(super::forbidden(actor, "upload prescriptions"));
        }

        let prescription = Prescription::new(actor.user_id.clone(), image_url);
        let mut uploaded = TrackingEvent::new(&prescription.id, TrackingStatus::Uploaded, None);
        uploaded.timestamp = prescription.uploaded_at;
        let events = vec![uploaded];

        self.db.with_transaction(|db| {
            db.insert_prescription(&prescription)?;
            self.record_events(&events)
        })?;
        self.publish(&events);

        tracing::info!(prescription_id = %prescription.id, patient_id = %actor.user_id, "prescription uploaded");
        Ok(prescription)
    }

    /// Set the review outcome of a prescription still awaiting one.
    pub fn review_prescription(
        &self,
        actor: &Actor,
        prescription_id: &str,
        status: PrescriptionStatus,
        notes: Option<&str>,
    ) -> RefillResult<Prescription> {
        require_staff(actor, "review prescriptions")?;

        if status == PrescriptionStatus::Pending {
            return Err(RefillError::Validation(vec![FieldError::new(
                "status",
                "Review status cannot be PENDING",
            )]));
        }

        let prescription = self.require_prescription(prescription_id)?;
        if !prescription.status.is_reviewable() {
            return Err(RefillError::InvalidState(format!(
                "Prescription {} has already been reviewed",
                prescription_id
            )));
        }

        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        let reviewed_at = Utc::now();
        let events = if status == PrescriptionStatus::Approved {
            vec![TrackingEvent::new(prescription_id, TrackingStatus::Approved, None)]
        } else {
            Vec::new()
        };

        let updated = self.db.with_transaction(|db| {
            let changed = db.update_prescription_review(
                prescription_id,
                &prescription.status,
                &status,
                notes,
                &reviewed_at,
            )?;
            if !changed {
                return Err(RefillError::InvalidState(format!(
                    "Prescription {} was reviewed concurrently",
                    prescription_id
                )));
            }
            self.record_events(&events)?;
            self.require_prescription(prescription_id)
        })?;
        self.publish(&events);

        tracing::info!(
            prescription_id,
            reviewer_id = %actor.user_id,
            status = ?status,
            "prescription reviewed"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_register_and_approve() {
        let db = Database::open_in_memory().unwrap();
        let rec = Recorder::default();
        let m = RefillManager::new(&db, &rec, &rec);

        let prescription = m.register_prescription(&patient(), Some("rx.pdf".into())).unwrap();
        assert_eq!(prescription.status, PrescriptionStatus::Pending);

        let approved = m
            .review_prescription(&pharmacist(), &prescription.id, PrescriptionStatus::Approved, Some(" ok "))
            .unwrap();
        assert_eq!(approved.status, PrescriptionStatus::Approved);
        assert_eq!(approved.review_notes.as_deref(), Some("ok"));

        let statuses: Vec<_> = db
            .list_tracking_events(&prescription.id)
            .unwrap()
            .iter()
            .map(|e| e.status)
            .collect();
        assert_eq!(statuses, vec![TrackingStatus::Uploaded, TrackingStatus::Approved]);
        assert_eq!(rec.events.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_clarification_can_be_reviewed_again() {
        let db = Database::open_in_memory().unwrap();
        let rec = Recorder::default();
        let m = RefillManager::new(&db, &rec, &rec);
        let prescription = m.register_prescription(&patient(), None).unwrap();

        m.review_prescription(
            &pharmacist(),
            &prescription.id,
            PrescriptionStatus::RequiresClarification,
            Some("dose unreadable"),
        )
        .unwrap();
        let approved = m
            .review_prescription(&pharmacist(), &prescription.id, PrescriptionStatus::Approved, None)
            .unwrap();
        assert_eq!(approved.status, PrescriptionStatus::Approved);
    }

    #[test]
    fn test_rejected_is_final() {
        let db = Database::open_in_memory().unwrap();
        let rec = Recorder::default();
        let m = RefillManager::new(&db, &rec, &rec);
        let prescription = m.register_prescription(&patient(), None).unwrap();

        m.review_prescription(&pharmacist(), &prescription.id, PrescriptionStatus::Rejected, None)
            .unwrap();
        let result =
            m.review_prescription(&pharmacist(), &prescription.id, PrescriptionStatus::Approved, None);
        assert!(matches!(result, Err(RefillError::InvalidState(_))));
    }

    #[test]
    fn test_review_rules() {
        let db = Database::open_in_memory().unwrap();
        let rec = Recorder::default();
        let m = RefillManager::new(&db, &rec, &rec);
        let prescription = m.register_prescription(&patient(), None).unwrap();

        assert!(matches!(
            m.review_prescription(&patient(), &prescription.id, PrescriptionStatus::Approved, None),
            Err(RefillError::Forbidden(_))
        ));
        assert!(matches!(
            m.review_prescription(&pharmacist(), &prescription.id, PrescriptionStatus::Pending, None),
            Err(RefillError::Validation(_))
        ));
        assert!(matches!(
            m.register_prescription(&pharmacist(), None),
            Err(RefillError::Forbidden(_))
        ));
    }
}
