//! Shared fixtures: an order / order item / product model and an in-memory
//! query source with call counting and failure injection.

#![allow(dead_code)]

use keypath_core::{
    Container, Domain, Entity, Key, ListenMode, QueryError, QuerySource, Reference, Registry, RegistryBuilder,
    StorageKind, validator,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

// =============================================================================
// ORDER
// =============================================================================

pub struct Order {
    attrs: Container<Order>,
}

impl Domain for Order {
    fn container(&self) -> &Container<Self> {
        &self.attrs
    }
    fn container_mut(&mut self) -> &mut Container<Self> {
        &mut self.attrs
    }
}

impl Entity for Order {
    type Id = i64;
}

pub struct OrderModel {
    pub registry: Arc<Registry<Order>>,
    pub id: Key<Order, i64>,
    pub note: Key<Order, String>,
    pub customer: Key<Order, String>,
    pub parent: Key<Order, Reference<Order>>,
}

pub static ORDER: LazyLock<OrderModel> = LazyLock::new(|| {
    let mut builder = RegistryBuilder::<Order>::new("Order");
    let id = builder.new_key::<i64>("id").expect("id");
    let note = builder
        .key::<String>("note")
        .validator(validator::length(0, 64))
        .build()
        .expect("note");
    let customer = builder
        .key::<String>("customer")
        .default_value("anonymous".to_string())
        .build()
        .expect("customer");
    let parent = builder.new_key::<Reference<Order>>("parent").expect("parent");
    OrderModel {
        registry: builder.lock().expect("lock"),
        id,
        note,
        customer,
        parent,
    }
});

impl Order {
    pub fn new(kind: StorageKind) -> Self {
        Self {
            attrs: Container::with_kind(&ORDER.registry, kind).expect("order container"),
        }
    }

    /// Map-backed order with a change notifier wired in.
    pub fn with_notifier(mode: ListenMode) -> Self {
        Self {
            attrs: Container::map(&ORDER.registry).with_notifier(mode),
        }
    }

    pub fn with_id(id: i64) -> Self {
        let mut order = Self::new(StorageKind::Map);
        ORDER.id.put(&mut order, id).expect("order id");
        order
    }
}

// =============================================================================
// ORDER ITEM
// =============================================================================

pub struct OrderItem {
    attrs: Container<OrderItem>,
}

impl Domain for OrderItem {
    fn container(&self) -> &Container<Self> {
        &self.attrs
    }
    fn container_mut(&mut self) -> &mut Container<Self> {
        &mut self.attrs
    }
}

pub struct ItemModel {
    pub registry: Arc<Registry<OrderItem>>,
    pub id: Key<OrderItem, i64>,
    pub quantity: Key<OrderItem, i32>,
    pub price: Key<OrderItem, i64>,
    pub description: Key<OrderItem, String>,
    pub order: Key<OrderItem, Reference<Order>>,
}

pub static ITEM: LazyLock<ItemModel> = LazyLock::new(|| {
    let mut builder = RegistryBuilder::<OrderItem>::new("OrderItem");
    let id = builder.new_key::<i64>("id").expect("id");
    let quantity = builder
        .key::<i32>("quantity")
        .default_value(1)
        .validator(validator::between(1, 1000))
        .build()
        .expect("quantity");
    let price = builder
        .key::<i64>("price")
        .validator(validator::min(0))
        .build()
        .expect("price");
    let description = builder.new_key::<String>("description").expect("description");
    let order = builder.new_key::<Reference<Order>>("order").expect("order");
    ItemModel {
        registry: builder.lock().expect("lock"),
        id,
        quantity,
        price,
        description,
        order,
    }
});

impl OrderItem {
    pub fn new(kind: StorageKind) -> Self {
        Self {
            attrs: Container::with_kind(&ITEM.registry, kind).expect("item container"),
        }
    }

    /// Item `id` holding the raw foreign key `order`, loaded as persisted.
    pub fn referencing(id: i64, order: Option<i64>) -> Self {
        let mut item = Self::new(StorageKind::Map);
        ITEM.id.put(&mut item, id).expect("item id");
        ITEM.order
            .load(&mut item, order.map(Reference::Unresolved))
            .expect("item order");
        item
    }

    /// Id of the order the item leads to; `None` until resolved.
    pub fn order_id(&self) -> Option<i64> {
        ITEM.order.join(&ORDER.id).get(self).expect("order id")
    }

    /// Raw foreign key of an unresolved reference.
    pub fn raw_order_id(&self) -> Option<i64> {
        ITEM.order
            .get(self)
            .expect("order")
            .and_then(|reference| reference.raw_id().copied())
    }

    pub fn order_resolved(&self) -> bool {
        ITEM.order
            .get(self)
            .expect("order")
            .is_some_and(|reference| reference.is_resolved())
    }
}

// =============================================================================
// PRODUCT (field storage)
// =============================================================================

pub struct Product {
    attrs: Container<Product>,
    pub code: Option<String>,
    pub stock: Option<u32>,
}

impl Domain for Product {
    fn container(&self) -> &Container<Self> {
        &self.attrs
    }
    fn container_mut(&mut self) -> &mut Container<Self> {
        &mut self.attrs
    }
}

pub struct ProductModel {
    pub registry: Arc<Registry<Product>>,
    pub code: Key<Product, String>,
    pub stock: Key<Product, u32>,
}

pub static PRODUCT: LazyLock<ProductModel> = LazyLock::new(|| {
    let mut builder = RegistryBuilder::<Product>::new("Product");
    let code = builder
        .key::<String>("code")
        .field(|p: &Product| p.code.clone(), |p: &mut Product, v| p.code = v)
        .build()
        .expect("code");
    let stock = builder
        .key::<u32>("stock")
        .default_value(0)
        .field(|p: &Product| p.stock, |p: &mut Product, v| p.stock = v)
        .build()
        .expect("stock");
    ProductModel {
        registry: builder.lock().expect("lock"),
        code,
        stock,
    }
});

impl Product {
    pub fn new() -> Self {
        Self {
            attrs: Container::fields(&PRODUCT.registry).expect("product container"),
            code: None,
            stock: None,
        }
    }
}

// =============================================================================
// QUERY SOURCE
// =============================================================================

/// In-memory order table.
///
/// Answers every id in `known`; counts calls; fails the `fail_on`-th call
/// (1-based) when set.
pub struct OrderSource {
    known: Vec<i64>,
    fail_on: Option<usize>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<i64>>>,
}

impl OrderSource {
    pub fn new(known: impl IntoIterator<Item = i64>) -> Self {
        Self {
            known: known.into_iter().collect(),
            fail_on: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on = Some(call);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Id lists received, one per call.
    pub fn requests(&self) -> Vec<Vec<i64>> {
        self.requests.lock().expect("requests").clone()
    }
}

impl QuerySource<Order> for OrderSource {
    type Rows = Vec<Order>;

    fn where_in(&self, column: &Key<Order, i64>, values: &[i64]) -> Result<Vec<Order>, QueryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests
            .lock()
            .map_err(|_| QueryError::new("request log poisoned"))?
            .push(values.to_vec());
        if self.fail_on == Some(call) {
            return Err(QueryError::new(format!("connection lost on query {call}")));
        }
        assert_eq!(column, &ORDER.id, "orders are joined on their id");
        Ok(values
            .iter()
            .filter(|id| self.known.contains(*id))
            .map(|&id| Order::with_id(id))
            .collect())
    }
}
