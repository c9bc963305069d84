//! Order placement and listing on top of the order and product facades

use super::model::{
    NewLineItem, NewOrder, Order, OrderStatus, OrderUpdate, PlaceOrder, TransferSlip,
};
use crate::products::{NewProduct, Product, ProductUpdate};
use crate::query::FilterCriteria;
use crate::repository::{Page, Repository, RepositoryError, RepositoryOperation, RepositoryResult};

/// Order usecases
///
/// Generic over the facades so it runs against [`OrderRepository`](super::OrderRepository)
/// and [`ProductRepository`](crate::products::ProductRepository) in production and
/// against in-memory fakes in tests.
#[derive(Debug, Clone)]
pub struct OrderService<O, P> {
    orders: O,
    products: P,
    default_page_size: u64,
}

impl<O, P> OrderService<O, P>
where
    O: Repository<Order, NewOrder, OrderUpdate>,
    P: Repository<Product, NewProduct, ProductUpdate>,
{
    pub fn new(orders: O, products: P, default_page_size: u64) -> Self {
        Self {
            orders,
            products,
            default_page_size,
        }
    }

    /// Snapshot each referenced product, insert the order, and return it as stored
    ///
    /// Fails with `NotFound` if any product does not exist; nothing is written
    /// in that case.
    pub async fn place_order(&self, request: PlaceOrder) -> RepositoryResult<Order> {
        request.validate()?;

        let mut items = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let product = self
                .products
                .find_one(&item.product_id)
                .await
                .map_err(|e| e.with_operation(RepositoryOperation::Insert))?;
            items.push(NewLineItem {
                qty: item.qty,
                product,
            });
        }

        let order = NewOrder {
            user_id: request.user_id,
            address: request.address,
            contact: request.contact,
            transfer_slip: request.transfer_slip,
            status: OrderStatus::Waiting,
            items,
        };
        let expected_total = order.total_paid();

        let created = self.orders.insert(order).await?;
        if (created.total_paid - expected_total).abs() > 1e-6 {
            tracing::warn!(
                order_id = %created.id,
                expected_total,
                stored_total = created.total_paid,
                "stored order total differs from snapshot total"
            );
        }
        tracing::info!(order_id = %created.id, total_paid = created.total_paid, "order placed");
        Ok(created)
    }

    pub async fn get_order(&self, id: &str) -> RepositoryResult<Order> {
        self.orders.find_one(id).await
    }

    /// One page of orders with `total_page = ceil(total / limit)`
    ///
    /// Page and page size are normalized first: page 0 becomes 1, and a page
    /// size below the configured default becomes the default.
    pub async fn list_orders(&self, criteria: FilterCriteria) -> RepositoryResult<Page<Order>> {
        let criteria = criteria.normalize(self.default_page_size);
        let (data, total) = self.orders.find_many(&criteria).await?;
        Ok(Page::new(data, criteria.page, criteria.limit, total))
    }

    /// Change an order's status and/or transfer slip
    ///
    /// `status` is parsed case-insensitively; an unknown status is rejected
    /// before the store is touched.
    pub async fn update_order(
        &self,
        id: &str,
        status: Option<&str>,
        transfer_slip: Option<TransferSlip>,
    ) -> RepositoryResult<Order> {
        let status = status
            .map(str::parse::<OrderStatus>)
            .transpose()
            .map_err(|message| {
                RepositoryError::validation_failed(RepositoryOperation::Update, message)
                    .with_entity("Order", id)
            })?;

        self.orders
            .update(
                id,
                OrderUpdate {
                    status,
                    transfer_slip,
                },
            )
            .await
    }

    pub async fn delete_order(&self, id: &str) -> RepositoryResult<()> {
        self.orders.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::{LineItem, OrderItem};
    use crate::repository::RepositoryErrorKind;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn product(id: &str, price: f64) -> Product {
        Product {
            id: id.to_string(),
            title: format!("product {id}"),
            description: String::new(),
            price,
            category: None,
            images: vec![],
            created_at: timestamp(),
            updated_at: timestamp(),
        }
    }

    struct FakeProducts(HashMap<String, Product>);

    impl Repository<Product, NewProduct, ProductUpdate> for FakeProducts {
        async fn find_one(&self, id: &str) -> RepositoryResult<Product> {
            self.0
                .get(id)
                .cloned()
                .ok_or_else(|| RepositoryError::not_found("Product", id))
        }

        async fn find_many(
            &self,
            _criteria: &FilterCriteria,
        ) -> RepositoryResult<(Vec<Product>, u64)> {
            Ok((self.0.values().cloned().collect(), self.0.len() as u64))
        }

        async fn insert(&self, _data: NewProduct) -> RepositoryResult<Product> {
            unimplemented!()
        }

        async fn update(&self, _id: &str, _patch: ProductUpdate) -> RepositoryResult<Product> {
            unimplemented!()
        }

        async fn delete(&self, _id: &str) -> RepositoryResult<()> {
            unimplemented!()
        }
    }

    #[derive(Default)]
    struct FakeOrders {
        stored: Mutex<Vec<Order>>,
        criteria: Mutex<Option<FilterCriteria>>,
    }

    impl Repository<Order, NewOrder, OrderUpdate> for FakeOrders {
        async fn find_one(&self, id: &str) -> RepositoryResult<Order> {
            self.stored
                .lock()
                .unwrap()
                .iter()
                .find(|o| o.id == id)
                .cloned()
                .ok_or_else(|| RepositoryError::not_found("Order", id))
        }

        async fn find_many(
            &self,
            criteria: &FilterCriteria,
        ) -> RepositoryResult<(Vec<Order>, u64)> {
            *self.criteria.lock().unwrap() = Some(criteria.clone());
            let stored = self.stored.lock().unwrap();
            let start = ((criteria.page - 1) * criteria.limit) as usize;
            let page = stored
                .iter()
                .skip(start)
                .take(criteria.limit as usize)
                .cloned()
                .collect();
            Ok((page, stored.len() as u64))
        }

        async fn insert(&self, data: NewOrder) -> RepositoryResult<Order> {
            let mut stored = self.stored.lock().unwrap();
            let order = Order {
                id: format!("O{:06}", stored.len() + 1),
                user_id: data.user_id.clone(),
                address: data.address.clone(),
                contact: data.contact.clone(),
                transfer_slip: data.transfer_slip.clone(),
                status: data.status,
                total_paid: data.total_paid(),
                items: data
                    .items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| LineItem {
                        id: format!("PO{:06}", i + 1),
                        qty: item.qty,
                        product: item.product,
                    })
                    .collect(),
                created_at: timestamp(),
                updated_at: timestamp(),
            };
            stored.push(order.clone());
            Ok(order)
        }

        async fn update(&self, id: &str, patch: OrderUpdate) -> RepositoryResult<Order> {
            let mut stored = self.stored.lock().unwrap();
            let order = stored
                .iter_mut()
                .find(|o| o.id == id)
                .ok_or_else(|| RepositoryError::not_found("Order", id))?;
            if let Some(status) = patch.status {
                order.status = status;
            }
            if let Some(slip) = patch.transfer_slip {
                order.transfer_slip = Some(slip);
            }
            Ok(order.clone())
        }

        async fn delete(&self, id: &str) -> RepositoryResult<()> {
            let mut stored = self.stored.lock().unwrap();
            let before = stored.len();
            stored.retain(|o| o.id != id);
            if stored.len() == before {
                return Err(RepositoryError::not_found("Order", id));
            }
            Ok(())
        }
    }

    fn service() -> OrderService<FakeOrders, FakeProducts> {
        let products = FakeProducts(HashMap::from([
            ("P000001".to_string(), product("P000001", 100.0)),
            ("P000002".to_string(), product("P000002", 35.5)),
        ]));
        OrderService::new(FakeOrders::default(), products, 5)
    }

    fn request(items: Vec<(&str, i64)>) -> PlaceOrder {
        PlaceOrder {
            user_id: "U000001".into(),
            address: "Bangkok".into(),
            contact: "081".into(),
            transfer_slip: None,
            items: items
                .into_iter()
                .map(|(product_id, qty)| OrderItem {
                    product_id: product_id.into(),
                    qty,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_place_order_snapshots_products_and_totals() {
        let service = service();
        let order = service
            .place_order(request(vec![("P000001", 2), ("P000002", 2)]))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Waiting);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].product.price, 100.0);
        assert_eq!(order.total_paid, 271.0);
    }

    #[tokio::test]
    async fn test_place_order_rejects_empty_and_non_positive_items() {
        let service = service();

        let empty = service.place_order(request(vec![])).await.unwrap_err();
        assert_eq!(empty.kind, RepositoryErrorKind::ValidationFailed);

        let negative = service
            .place_order(request(vec![("P000001", -1)]))
            .await
            .unwrap_err();
        assert_eq!(negative.kind, RepositoryErrorKind::ValidationFailed);
        assert!(service.orders.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_place_order_with_unknown_product_writes_nothing() {
        let service = service();
        let error = service
            .place_order(request(vec![("P000001", 1), ("P999999", 1)]))
            .await
            .unwrap_err();

        assert_eq!(error.kind, RepositoryErrorKind::NotFound);
        assert_eq!(error.operation, RepositoryOperation::Insert);
        assert!(service.orders.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_orders_pages_twelve_orders_by_five() {
        let service = service();
        for _ in 0..12 {
            service
                .place_order(request(vec![("P000001", 1)]))
                .await
                .unwrap();
        }

        let first = service.list_orders(FilterCriteria::new(1, 5)).await.unwrap();
        assert_eq!((first.data.len(), first.total_item, first.total_page), (5, 12, 3));

        let third = service.list_orders(FilterCriteria::new(3, 5)).await.unwrap();
        assert_eq!(third.data.len(), 2);

        let fourth = service.list_orders(FilterCriteria::new(4, 5)).await.unwrap();
        assert!(fourth.data.is_empty());
        assert_eq!(fourth.total_page, 3);
    }

    #[tokio::test]
    async fn test_list_orders_normalizes_page_and_limit() {
        let service = service();
        let page = service.list_orders(FilterCriteria::new(0, 1)).await.unwrap();
        assert_eq!((page.page, page.limit), (1, 5));

        let seen = service.orders.criteria.lock().unwrap().clone().unwrap();
        assert_eq!((seen.page, seen.limit), (1, 5));
    }

    #[tokio::test]
    async fn test_update_order_validates_status() {
        let service = service();
        let order = service
            .place_order(request(vec![("P000001", 1)]))
            .await
            .unwrap();

        let error = service
            .update_order(&order.id, Some("refunded"), None)
            .await
            .unwrap_err();
        assert_eq!(error.kind, RepositoryErrorKind::ValidationFailed);

        let updated = service
            .update_order(&order.id, Some("PAID"), None)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let service = service();
        let order = service
            .place_order(request(vec![("P000002", 3)]))
            .await
            .unwrap();

        service.delete_order(&order.id).await.unwrap();
        let error = service.get_order(&order.id).await.unwrap_err();
        assert_eq!(error.kind, RepositoryErrorKind::NotFound);
    }
}
