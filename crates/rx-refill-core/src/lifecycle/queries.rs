//! Read-side queries for patients and pharmacists.

use serde::Serialize;

use super::{require_staff, require_viewer, RefillError, RefillManager, RefillResult};
use crate::models::{
    Actor, FillHistoryEntry, InventoryItem, Prescription, RefillRequest, RefillStatus, Role,
};

/// Everything a pharmacist needs to fill a request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefillDetail {
    pub request: RefillRequest,
    pub prescription: Prescription,
    /// Medicines available to dispense, with current stock
    pub inventory: Vec<InventoryItem>,
}

impl<'a> RefillManager<'a> {
    /// Get a single refill request.
    pub fn get_refill_request(&self, actor: &Actor, request_id: &str) -> RefillResult<RefillRequest> {
        let request = self.require_request(request_id)?;
        if actor.role == Role::Patient && request.patient_id != actor.user_id {
            return Err(super::forbidden(actor, "view another patient's refill request"));
        }
        Ok(request)
    }

    /// Patients see their own requests; staff see requests by status
    /// (PENDING unless asked otherwise). Newest first.
    pub fn list_refill_requests(
        &self,
        actor: &Actor,
        status: Option<RefillStatus>,
    ) -> RefillResult<Vec<RefillRequest>> {
        if actor.role == Role::Patient {
            let mut requests = self.db.list_refill_requests_for_patient(&actor.user_id)?;
            if let Some(status) = status {
                requests.retain(|r| r.status == status);
            }
            return Ok(requests);
        }

        let status = status.unwrap_or(RefillStatus::Pending);
        Ok(self.db.list_refill_requests_by_status(&status)?)
    }

    /// Request, prescription and stock for the fill form.
    pub fn refill_detail(&self, actor: &Actor, request_id: &str) -> RefillResult<RefillDetail> {
        require_staff(actor, "open the fill form")?;
        let request = self.require_request(request_id)?;
        let prescription = self.require_prescription(&request.prescription_id)?;
        let inventory = self.db.list_inventory()?;

        Ok(RefillDetail {
            request,
            prescription,
            inventory,
        })
    }

    /// Fill history for a prescription, newest first.
    pub fn fill_history(&self, actor: &Actor, prescription_id: &str) -> RefillResult<Vec<FillHistoryEntry>> {
        let prescription = self.require_prescription(prescription_id)?;
        require_viewer(actor, &prescription)?;
        Ok(self.db.list_fill_history(prescription_id)?)
    }

    /// Add or update a stocked medicine.
    pub fn upsert_inventory(&self, actor: &Actor, item: &InventoryItem) -> RefillResult<()> {
        require_staff(actor, "manage inventory")?;
        item.validate().map_err(RefillError::Validation)?;
        self.db.upsert_inventory_item(item)?;
        tracing::info!(
            medicine_id = %item.medicine_id,
            stock = item.stock_quantity,
            "inventory updated"
        );
        Ok(())
    }

    /// All stocked medicines.
    pub fn list_inventory(&self, actor: &Actor) -> RefillResult<Vec<InventoryItem>> {
        require_staff(actor, "view inventory")?;
        Ok(self.db.list_inventory()?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::RefillError;
    use super::*;

    #[test]
    fn test_patient_sees_own_requests() {
        let (db, rx) = seeded();
        let rec = Recorder::default();
        let m = RefillManager::new(&db, &rec, &rec);
        let request = m.create_refill_request(&patient(), &rx, &address()).unwrap();

        let mine = m.list_refill_requests(&patient(), None).unwrap();
        assert_eq!(mine.len(), 1);
        assert!(m
            .list_refill_requests(&Actor::patient("patient-2"), None)
            .unwrap()
            .is_empty());
        assert!(matches!(
            m.get_refill_request(&Actor::patient("patient-2"), &request.id),
            Err(RefillError::Forbidden(_))
        ));
    }

    #[test]
    fn test_staff_default_to_pending() {
        let (db, rx) = seeded();
        let rec = Recorder::default();
        let m = RefillManager::new(&db, &rec, &rec);
        let request = m.create_refill_request(&patient(), &rx, &address()).unwrap();

        assert_eq!(m.list_refill_requests(&pharmacist(), None).unwrap().len(), 1);
        m.approve(&pharmacist(), &request.id).unwrap();
        assert!(m.list_refill_requests(&pharmacist(), None).unwrap().is_empty());
        assert_eq!(
            m.list_refill_requests(&pharmacist(), Some(RefillStatus::Approved))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_refill_detail() {
        let (db, rx) = seeded();
        let rec = Recorder::default();
        let m = RefillManager::new(&db, &rec, &rec);
        let request = m.create_refill_request(&patient(), &rx, &address()).unwrap();

        let detail = m.refill_detail(&pharmacist(), &request.id).unwrap();
        assert_eq!(detail.prescription.id, rx);
        assert_eq!(detail.inventory.len(), 2);
        assert!(matches!(
            m.refill_detail(&patient(), &request.id),
            Err(RefillError::Forbidden(_))
        ));
    }

    #[test]
    fn test_inventory_is_staff_only() {
        let (db, _) = seeded();
        let rec = Recorder::default();
        let m = RefillManager::new(&db, &rec, &rec);
        let item = InventoryItem::new("MED-3".into(), "Losartan 50mg".into(), 60);

        assert!(matches!(
            m.upsert_inventory(&patient(), &item),
            Err(RefillError::Forbidden(_))
        ));
        m.upsert_inventory(&pharmacist(), &item).unwrap();
        assert_eq!(m.list_inventory(&pharmacist()).unwrap().len(), 3);
    }

    #[test]
    fn test_negative_stock_is_a_validation_error() {
        let (db, _) = seeded();
        let rec = Recorder::default();
        let m = RefillManager::new(&db, &rec, &rec);
        let item = InventoryItem::new("MED-1".into(), "Amoxicillin 250mg".into(), -3);

        match m.upsert_inventory(&pharmacist(), &item) {
            Err(RefillError::Validation(fields)) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "stockQuantity");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        // Stored stock is untouched
        assert_eq!(db.get_inventory_item("MED-1").unwrap().unwrap().stock_quantity, 100);
    }
}
