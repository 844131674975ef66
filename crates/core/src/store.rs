use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::catalog::{DatasetId, VendorId};
use crate::domain::inquiry::{Inquiry, InquiryId, InquiryStatus};
use crate::errors::ApplicationError;

/// Persistence seam for inquiry records.
///
/// `compare_and_swap` is the only way to change a stored inquiry: it must replace the record
/// atomically and only when the stored status and version still match the expectation.
#[async_trait]
pub trait InquiryStore: Send + Sync {
    async fn insert(&self, inquiry: &Inquiry) -> Result<(), ApplicationError>;

    async fn find_by_id(&self, id: &InquiryId) -> Result<Option<Inquiry>, ApplicationError>;

    async fn compare_and_swap(
        &self,
        expected_status: InquiryStatus,
        expected_version: u32,
        next: &Inquiry,
    ) -> Result<bool, ApplicationError>;

    /// Owning vendor of a public, active dataset; `None` when it is unknown or not visible.
    async fn visible_dataset_vendor(
        &self,
        dataset_id: &DatasetId,
    ) -> Result<Option<VendorId>, ApplicationError>;
}

#[derive(Clone, Default)]
pub struct InMemoryInquiryStore {
    inquiries: Arc<Mutex<HashMap<InquiryId, Inquiry>>>,
    datasets: Arc<Mutex<HashMap<DatasetId, VendorId>>>,
}

impl InMemoryInquiryStore {
    pub fn with_dataset(self, dataset_id: &str, vendor_id: &str) -> Self {
        lock(&self.datasets)
            .insert(DatasetId(dataset_id.to_owned()), VendorId(vendor_id.to_owned()));
        self
    }

    pub fn len(&self) -> usize {
        lock(&self.inquiries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl InquiryStore for InMemoryInquiryStore {
    async fn insert(&self, inquiry: &Inquiry) -> Result<(), ApplicationError> {
        let mut inquiries = lock(&self.inquiries);
        if inquiries.contains_key(&inquiry.id) {
            return Err(ApplicationError::Persistence(format!(
                "inquiry `{}` already exists",
                inquiry.id.0
            )));
        }
        inquiries.insert(inquiry.id.clone(), inquiry.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &InquiryId) -> Result<Option<Inquiry>, ApplicationError> {
        Ok(lock(&self.inquiries).get(id).cloned())
    }

    async fn compare_and_swap(
        &self,
        expected_status: InquiryStatus,
        expected_version: u32,
        next: &Inquiry,
    ) -> Result<bool, ApplicationError> {
        let mut inquiries = lock(&self.inquiries);
        match inquiries.get_mut(&next.id) {
            Some(current)
                if current.status == expected_status
                    && current.state_version == expected_version =>
            {
                *current = next.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn visible_dataset_vendor(
        &self,
        dataset_id: &DatasetId,
    ) -> Result<Option<VendorId>, ApplicationError> {
        Ok(lock(&self.datasets).get(dataset_id).cloned())
    }
}
