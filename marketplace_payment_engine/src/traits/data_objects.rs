use crate::db_types::Order;

/// Which columns to write when materializing orders.
///
/// The first attempt writes the full row. If the store reports a schema-shape problem (a deployment whose
/// orders table predates the optional delivery columns), the materializer retries once with only the
/// mandatory fields before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFieldSet {
    Full,
    Mandatory,
}

/// Result of materializing orders for a reference.
#[derive(Debug, Clone)]
pub struct MaterializedOrders {
    pub orders: Vec<Order>,
    /// True when a previous (or concurrent) invocation already created the rows and this call wrote nothing.
    pub already_existed: bool,
}

/// Result of settling a service-request payment.
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettlement {
    pub service_request_id: i64,
    /// True when the request was already `paid` and this call changed nothing.
    pub already_paid: bool,
}
