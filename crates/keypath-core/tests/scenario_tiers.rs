//! # Scenario Tier Tests (T0-T4)
//!
//! End-to-end behaviour of the object model and the batch resolver.
//!
//! ## Tiers
//! - T0: Registry and key lifecycle
//! - T1: Storage strategy equivalence
//! - T2: Change notification
//! - T3: Batch resolution
//! - T4: Failure semantics

mod common;

use common::{ITEM, ORDER, Order, OrderItem, OrderSource, PRODUCT, Product};
use keypath_core::{
    BatchResolver, ChangePhase, Container, Domain, ForeignKeyColumn, KeypathError, ListenMode,
    Reference, RegistryBuilder, ResolverConfig, StorageKind, TableModel, ValueColumn,
};
use std::sync::{Arc, Mutex};

fn resolver(max_in_items: usize) -> BatchResolver {
    BatchResolver::new(&ResolverConfig { max_in_items }).expect("resolver config")
}

// =============================================================================
// TIER T0: REGISTRY AND KEY LIFECYCLE
// =============================================================================

mod t0_lifecycle {
    use super::*;

    /// T0.1: Indices follow declaration order.
    #[test]
    fn indices_are_dense_and_ordered() {
        let indices: Vec<usize> = ITEM.registry.iter().map(|info| info.index()).collect();
        assert_eq!(indices, (0..ITEM.registry.len()).collect::<Vec<_>>());
        assert_eq!(ITEM.order.index(), 4);
        assert!(ITEM.registry.is_dense());
    }

    /// T0.2: A locked registry takes no new keys.
    #[test]
    fn no_keys_after_lock() {
        let mut builder = RegistryBuilder::<Order>::new("Order");
        builder.new_key::<i64>("id").expect("id");
        builder.lock().expect("lock");
        let late = builder.new_key::<String>("late");
        assert!(matches!(late, Err(KeypathError::IllegalState(_))));
    }

    /// T0.3: Unwritten keys read as their default.
    #[test]
    fn defaults_apply_until_written() {
        let item = OrderItem::new(StorageKind::Map);
        assert_eq!(ITEM.quantity.get(&item).expect("read"), Some(1));
        assert_eq!(ITEM.description.get(&item).expect("read"), None);
        assert!(ITEM.quantity.is_default(&item).expect("read"));
    }

    /// T0.4: Validation is check-then-apply.
    #[test]
    fn rejected_write_leaves_value() {
        let mut item = OrderItem::new(StorageKind::Array);
        ITEM.quantity.put(&mut item, 10).expect("valid");
        let rejected = ITEM.quantity.put(&mut item, 0);
        assert!(matches!(rejected, Err(KeypathError::Validation(_))));
        assert_eq!(ITEM.quantity.get(&item).expect("read"), Some(10));
    }
}

// =============================================================================
// TIER T1: STORAGE STRATEGY EQUIVALENCE
// =============================================================================

mod t1_storage {
    use super::*;

    struct RushOrder {
        attrs: Container<RushOrder>,
    }

    impl Domain for RushOrder {
        fn container(&self) -> &Container<Self> {
            &self.attrs
        }
        fn container_mut(&mut self) -> &mut Container<Self> {
            &mut self.attrs
        }
    }

    /// T1.1 (Scenario C): Map and array containers agree on every key.
    #[test]
    fn map_and_array_read_back_identically() {
        let mut map = OrderItem::new(StorageKind::Map);
        let mut array = OrderItem::new(StorageKind::Array);

        for item in [&mut map, &mut array] {
            ITEM.id.put(item, 7).expect("id");
            ITEM.quantity.put(item, 3).expect("quantity");
            ITEM.price.put(item, 1250).expect("price");
            ITEM.description.put(item, "bolts".to_string()).expect("description");
            ITEM.order.load(item, Some(Reference::Unresolved(99))).expect("order");
        }

        assert_eq!(ITEM.id.get(&map).expect("map"), ITEM.id.get(&array).expect("array"));
        assert_eq!(
            ITEM.quantity.get(&map).expect("map"),
            ITEM.quantity.get(&array).expect("array")
        );
        assert_eq!(
            ITEM.price.get(&map).expect("map"),
            ITEM.price.get(&array).expect("array")
        );
        assert_eq!(
            ITEM.description.get(&map).expect("map"),
            ITEM.description.get(&array).expect("array")
        );
        assert_eq!(map.raw_order_id(), array.raw_order_id());
        assert_eq!(map.raw_order_id(), Some(99));
    }

    /// T1.2: Field storage reads and writes the struct fields.
    #[test]
    fn field_storage_uses_struct_fields() {
        let mut product = Product::new();
        assert_eq!(PRODUCT.stock.get(&product).expect("read"), Some(0));

        PRODUCT.code.put(&mut product, "P-100".to_string()).expect("code");
        PRODUCT.stock.put(&mut product, 12).expect("stock");

        assert_eq!(product.code.as_deref(), Some("P-100"));
        assert_eq!(product.stock, Some(12));
        assert_eq!(product.container().kind(), StorageKind::Field);
    }

    /// T1.3: An array container of a child registry holds the parent's keys
    /// and continues their index range.
    #[test]
    fn array_storage_continues_parent_indices() {
        let mut builder = RegistryBuilder::<RushOrder>::extending("RushOrder", &ORDER.registry);
        let customer = builder.inherit(&ORDER.customer).expect("customer");
        let note = builder.inherit(&ORDER.note).expect("note");
        let deadline = builder.new_key::<u32>("deadline_hours").expect("deadline");
        let registry = builder.lock().expect("lock");

        assert_eq!(deadline.index(), ORDER.registry.len());
        assert_eq!(customer.index(), ORDER.customer.index());
        assert_eq!(registry.inherited(), ORDER.registry.len());
        assert!(registry.is_dense());

        let mut rush = RushOrder {
            attrs: Container::array(&registry).expect("array"),
        };
        assert_eq!(
            customer.get(&rush).expect("read"),
            Some("anonymous".to_string())
        );

        customer.put(&mut rush, "acme".to_string()).expect("customer");
        note.put(&mut rush, "by noon".to_string()).expect("note");
        deadline.put(&mut rush, 4).expect("deadline");

        assert_eq!(customer.get(&rush).expect("read"), Some("acme".to_string()));
        assert_eq!(note.get(&rush).expect("read"), Some("by noon".to_string()));
        assert_eq!(deadline.get(&rush).expect("read"), Some(4));

        let too_long = note.put(&mut rush, "x".repeat(65));
        assert!(matches!(too_long, Err(KeypathError::Validation(_))));
        assert_eq!(note.get(&rush).expect("read"), Some("by noon".to_string()));
    }

    /// T1.4: Keys of another registry for the same type are not recognised.
    #[test]
    fn foreign_registry_keys_are_rejected() {
        let mut shadow = RegistryBuilder::<Order>::new("Order");
        let alias = shadow
            .key::<i64>("alias")
            .default_value(-1)
            .build()
            .expect("alias");
        shadow.lock().expect("lock");

        let mut order = Order::with_id(42);
        assert_eq!(alias.index(), ORDER.id.index());
        assert_eq!(alias.get(&order).expect("read"), Some(-1));
        assert!(matches!(
            alias.put(&mut order, 7),
            Err(KeypathError::IllegalState(_))
        ));
        assert_eq!(ORDER.id.get(&order).expect("read"), Some(42));

        let array = Order::new(StorageKind::Array);
        assert!(matches!(alias.get(&array), Err(KeypathError::IllegalState(_))));
    }

    /// T1.5: A null write clears the slot back to the default.
    #[test]
    fn null_write_restores_default() {
        let mut order = Order::new(StorageKind::Array);
        ORDER.customer.put(&mut order, "acme".to_string()).expect("write");
        ORDER.customer.set(&mut order, None).expect("clear");
        assert_eq!(
            ORDER.customer.get(&order).expect("read"),
            Some("anonymous".to_string())
        );
    }
}

// =============================================================================
// TIER T2: CHANGE NOTIFICATION
// =============================================================================

mod t2_notification {
    use super::*;

    type Log = Arc<Mutex<Vec<(ChangePhase, Option<String>, Option<String>)>>>;

    fn watched_order(mode: ListenMode) -> (Order, Log) {
        let mut order = Order::with_notifier(mode);
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        order
            .container_mut()
            .notifier_mut()
            .expect("notifier")
            .add_listener(&ORDER.note, mode, move |event| {
                if let Ok(mut log) = sink.lock() {
                    log.push((event.phase, event.old.cloned(), event.new.cloned()));
                }
                Ok(())
            })
            .expect("listen");
        (order, log)
    }

    /// T2.1 (Scenario D): A BOTH listener sees the write twice.
    #[test]
    fn both_listener_fires_before_then_after() {
        let (mut order, log) = watched_order(ListenMode::Both);
        ORDER.note.put(&mut order, "first".to_string()).expect("write");
        ORDER.note.put(&mut order, "second".to_string()).expect("write");

        let log = log.lock().expect("log").clone();
        assert_eq!(
            log,
            vec![
                (ChangePhase::Before, None, Some("first".to_string())),
                (ChangePhase::After, None, Some("first".to_string())),
                (
                    ChangePhase::Before,
                    Some("first".to_string()),
                    Some("second".to_string())
                ),
                (
                    ChangePhase::After,
                    Some("first".to_string()),
                    Some("second".to_string())
                ),
            ]
        );
    }

    /// T2.2: Rejected writes raise no event.
    #[test]
    fn validation_failure_is_silent() {
        let (mut order, log) = watched_order(ListenMode::Both);
        let result = ORDER.note.put(&mut order, "x".repeat(65));
        assert!(matches!(result, Err(KeypathError::Validation(_))));
        assert!(log.lock().expect("log").is_empty());
    }

    /// T2.3: An AFTER-only notifier refuses BEFORE listeners.
    #[test]
    fn direction_must_match_mode() {
        let mut order = Order::with_notifier(ListenMode::After);
        let result = order
            .container_mut()
            .notifier_mut()
            .expect("notifier")
            .add_listener(&ORDER.note, ListenMode::Before, |_| Ok(()));
        assert!(matches!(result, Err(KeypathError::UnsupportedOperation(_))));
    }

    /// T2.4: A vetoing BEFORE listener stops the write.
    #[test]
    fn before_listener_error_aborts_write() {
        let mut order = Order::with_notifier(ListenMode::Before);
        order
            .container_mut()
            .notifier_mut()
            .expect("notifier")
            .add_listener(&ORDER.note, ListenMode::Before, |event| {
                match event.new {
                    Some(text) if text.contains("forbidden") => Err(KeypathError::IllegalState(
                        "vetoed".to_string(),
                    )),
                    _ => Ok(()),
                }
            })
            .expect("listen");

        let result = ORDER.note.put(&mut order, "forbidden word".to_string());
        assert!(matches!(result, Err(KeypathError::IllegalState(_))));
        assert_eq!(ORDER.note.get(&order).expect("read"), None);
    }

    /// T2.5: `load` raises no event.
    #[test]
    fn load_is_silent() {
        let (mut order, log) = watched_order(ListenMode::After);
        ORDER.note.load(&mut order, Some("persisted".to_string())).expect("load");
        assert!(log.lock().expect("log").is_empty());
        assert_eq!(
            ORDER.note.get(&order).expect("read"),
            Some("persisted".to_string())
        );
    }
}

// =============================================================================
// TIER T3: BATCH RESOLUTION
// =============================================================================

mod t3_resolution {
    use super::*;

    fn scenario_a_items() -> Vec<OrderItem> {
        (0..250)
            .map(|i| {
                let order = (i % 25 != 0).then_some(i % 40 + 1);
                OrderItem::referencing(i, order)
            })
            .collect()
    }

    /// T3.1 (Scenario A): 250 items, 40 orders, chunk 20: two queries.
    #[test]
    fn two_queries_for_forty_orders() {
        let mut items = scenario_a_items();
        let expected: Vec<Option<i64>> = items.iter().map(OrderItem::raw_order_id).collect();
        let source = OrderSource::new(1..=40);

        let report = resolver(20)
            .resolve(&mut items, &ITEM.order, &ORDER.id, &source)
            .expect("resolve");

        assert_eq!(source.calls(), 2);
        assert_eq!(report.queries, 2);
        assert_eq!(report.distinct_keys, 40);
        assert_eq!(report.entities, 250);
        assert_eq!(report.resolved, 240);
        assert_eq!(report.missing, 0);
        assert!(source.requests().iter().all(|ids| ids.len() <= 20));

        assert_eq!(items.len(), 250);
        for (position, (item, expected)) in items.iter().zip(expected).enumerate() {
            assert_eq!(
                ITEM.id.get(item).expect("id"),
                Some(i64::try_from(position).expect("position")),
                "order of items is preserved"
            );
            assert_eq!(item.order_id(), expected);
            assert_eq!(item.order_resolved(), expected.is_some());
        }
    }

    /// T3.2 (Scenario B): No entities, no query.
    #[test]
    fn empty_input_is_free() {
        let source = OrderSource::new(1..=40);
        let items = resolver(20)
            .load_batch(Vec::<OrderItem>::new(), &ITEM.order, &ORDER.id, &source)
            .expect("resolve");
        assert!(items.is_empty());
        assert_eq!(source.calls(), 0);
    }

    /// T3.3: Only null foreign keys, no query.
    #[test]
    fn null_keys_only_is_free() {
        let source = OrderSource::new(1..=40);
        let mut items = vec![OrderItem::referencing(1, None), OrderItem::referencing(2, None)];
        let report = resolver(20)
            .resolve(&mut items, &ITEM.order, &ORDER.id, &source)
            .expect("resolve");
        assert_eq!(report.queries, 0);
        assert_eq!(source.calls(), 0);
    }

    /// T3.4: A composite key resolves through its root segment.
    #[test]
    fn composite_key_resolves_root() {
        let source = OrderSource::new([5, 6]);
        let path = ITEM.order.join(&ORDER.customer);
        let items = resolver(10)
            .load_batch(
                [OrderItem::referencing(1, Some(5)), OrderItem::referencing(2, Some(6))],
                &path,
                &ORDER.id,
                &source,
            )
            .expect("resolve");

        assert_eq!(source.requests(), vec![vec![5, 6]]);
        for item in &items {
            assert_eq!(path.get(item).expect("read"), Some("anonymous".to_string()));
        }
    }

    /// T3.5: Resolved references are not fetched again.
    #[test]
    fn second_pass_issues_no_query() {
        let source = OrderSource::new(1..=3);
        let mut items: Vec<OrderItem> = (1..=3).map(|i| OrderItem::referencing(i, Some(i))).collect();
        let r = resolver(2);
        r.resolve(&mut items, &ITEM.order, &ORDER.id, &source)
            .expect("first");
        let again = r
            .resolve(&mut items, &ITEM.order, &ORDER.id, &source)
            .expect("second");
        assert_eq!(again.queries, 0);
        assert_eq!(source.calls(), 2);
    }

    /// T3.6: Resolve-all walks every foreign-key column of the table.
    #[test]
    fn resolve_all_uses_table_model() {
        let source = OrderSource::new(1..=4);
        let table = TableModel::<OrderItem, OrderSource>::new("order_item")
            .column(ValueColumn::new(&ITEM.id))
            .column(ValueColumn::new(&ITEM.quantity))
            .column(ForeignKeyColumn::new(&ITEM.order, &ORDER.id));
        let mut items: Vec<OrderItem> = (1..=4).map(|i| OrderItem::referencing(i, Some(i))).collect();

        let reports = resolver(500)
            .resolve_all(&mut items, &table, &source)
            .expect("resolve");

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].resolved, 4);
        assert!(items.iter().all(OrderItem::order_resolved));
    }

    /// T3.7: A foreign key with no matching row is cleared.
    #[test]
    fn unmatched_foreign_keys_are_cleared() {
        let source = OrderSource::new([1, 2]);
        let mut items = vec![
            OrderItem::referencing(1, Some(1)),
            OrderItem::referencing(2, Some(77)),
            OrderItem::referencing(3, Some(2)),
            OrderItem::referencing(4, Some(77)),
        ];

        let report = resolver(10)
            .resolve(&mut items, &ITEM.order, &ORDER.id, &source)
            .expect("resolve");

        assert_eq!(report.resolved, 2);
        assert_eq!(report.missing, 2);
        let orders: Vec<Option<i64>> = items.iter().map(OrderItem::order_id).collect();
        assert_eq!(orders, vec![Some(1), None, Some(2), None]);
        assert!(ITEM.order.get(&items[1]).expect("read").is_none());
    }

    /// T3.8: Self references resolve like any other.
    #[test]
    fn parent_orders_resolve() {
        let source = OrderSource::new([1]);
        let mut child = Order::with_id(2);
        ORDER.parent.load(&mut child, Some(Reference::Unresolved(1))).expect("parent");
        let mut orders = vec![child];

        resolver(10)
            .resolve(&mut orders, &ORDER.parent, &ORDER.id, &source)
            .expect("resolve");

        let grandparent = ORDER.parent.join(&ORDER.parent).join(&ORDER.id);
        let parent_id = ORDER.parent.join(&ORDER.id);
        assert_eq!(parent_id.get(&orders[0]).expect("read"), Some(1));
        assert_eq!(grandparent.get(&orders[0]).expect("read"), None);
    }
}

// =============================================================================
// TIER T4: FAILURE SEMANTICS
// =============================================================================

mod t4_failure {
    use super::*;

    /// T4.1 (Scenario E): Second of three chunks fails; chunk one stays resolved.
    #[test]
    fn failed_chunk_aborts_without_rollback() {
        let source = OrderSource::new(1..=30).failing_on(2);
        let mut items: Vec<OrderItem> = (1..=30).map(|i| OrderItem::referencing(i, Some(i))).collect();

        let result = resolver(10).resolve(&mut items, &ITEM.order, &ORDER.id, &source);

        assert!(matches!(result, Err(KeypathError::Query(_))));
        assert_eq!(source.calls(), 2);
        for item in &items {
            let id = ITEM.id.get(item).expect("id").expect("id set");
            assert_eq!(item.order_resolved(), id <= 10, "item {id}");
        }
        assert_eq!(items[20].raw_order_id(), Some(21));
    }

    /// T4.2: Retrying the whole call finishes the job.
    #[test]
    fn retry_completes_resolution() {
        let failing = OrderSource::new(1..=30).failing_on(2);
        let mut items: Vec<OrderItem> = (1..=30).map(|i| OrderItem::referencing(i, Some(i))).collect();
        let r = resolver(10);
        assert!(r.resolve(&mut items, &ITEM.order, &ORDER.id, &failing).is_err());

        let healthy = OrderSource::new(1..=25);
        let report = r
            .resolve(&mut items, &ITEM.order, &ORDER.id, &healthy)
            .expect("retry");
        assert_eq!(report.distinct_keys, 20);
        assert_eq!(report.resolved, 15);
        assert_eq!(report.missing, 5);
        assert_eq!(healthy.calls(), 2);
        for (item, id) in items.iter().zip(1i64..) {
            assert_eq!(item.order_resolved(), id <= 25, "item {id}");
            assert_eq!(item.order_id(), (id <= 25).then_some(id), "item {id}");
        }

        let settled = r
            .resolve(&mut items, &ITEM.order, &ORDER.id, &healthy)
            .expect("settled");
        assert_eq!(settled.queries, 0);
    }

    /// T4.3: Zero chunk size is refused at configuration time.
    #[test]
    fn zero_chunk_is_a_config_error() {
        let result = BatchResolver::new(&ResolverConfig { max_in_items: 0 });
        assert!(matches!(result, Err(KeypathError::Config(_))));
        let result = ResolverConfig::from_toml_str("max_in_items = 0");
        assert!(matches!(result, Err(KeypathError::Config(_))));
    }
}
