//! In-memory document store.
//!
//! Stands in for the document database the CRM was deployed against. Each
//! collection is independently locked; see [`Collection`].

pub mod collection;

pub use collection::Collection;

use crate::model::{Campaign, CommunicationLog, Customer, Order, Segment};

/// All collections used by the service.
#[derive(Clone)]
pub struct Store {
    pub customers: Collection<Customer>,
    pub orders: Collection<Order>,
    pub segments: Collection<Segment>,
    pub campaigns: Collection<Campaign>,
    pub communication_logs: Collection<CommunicationLog>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            customers: Collection::new("customers"),
            orders: Collection::new("orders"),
            segments: Collection::new("segments"),
            campaigns: Collection::new("campaigns"),
            communication_logs: Collection::new("communicationlogs"),
        }
    }

    /// Close every collection. In-flight dispatches fail on their next write.
    pub fn close(&self) {
        self.customers.close();
        self.orders.close();
        self.segments.close();
        self.campaigns.close();
        self.communication_logs.close();
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
