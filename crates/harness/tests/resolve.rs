use atelier_core::{FinancialState, RawOrderRecord, SourceKind};
use atelier_engine::EngineError;
use atelier_harness::{RecordBuilder, TestEngine, day};
use atelier_storage::Store;

#[test]
fn commerce_and_manual_rows_converge_on_one_order() -> Result<(), EngineError> {
    let mut env = TestEngine::new()?;
    let product = env.add_product("Meridian Print", Some(50))?;

    // The commerce feed dropped the email; the manually entered copy of the
    // same sale carries it.
    let manual = RecordBuilder::manual("pos-77", "#1501")
        .email("ada@example.com")
        .name("Ada Byron")
        .purchased(day(1))
        .build();
    let commerce = RecordBuilder::commerce("c-900", "1501")
        .purchased(day(1))
        .line("c-900-1", product)
        .build();

    let report = env.engine.reconcile(&[manual, commerce])?;
    assert!(report.outcome.ambiguous.is_empty());

    let orders = env.engine.store().all_orders()?;
    assert_eq!(orders.len(), 1);
    let order = &orders[0];

    // Commerce outranks manual for the canonical ref; contact fields come
    // from whichever origin supplied them.
    assert_eq!(order.canonical_ref.kind, SourceKind::Commerce);
    assert_eq!(order.match_key.as_deref(), Some("1501"));
    assert_eq!(order.contact.email.as_deref(), Some("ada@example.com"));
    assert_eq!(order.contact.name.as_deref(), Some("Ada Byron"));

    assert_eq!(env.engine.store().get_sources(order.id)?.len(), 2);
    Ok(())
}

#[test]
fn arrival_order_does_not_change_the_result() -> Result<(), EngineError> {
    let permutations: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    for permutation in permutations {
        let mut env = TestEngine::new()?;
        let product = env.add_product("Meridian Print", None)?;

        let records = [
            RecordBuilder::commerce("c-1", "1501")
                .email("ada@example.com")
                .line("c-1-1", product)
                .build(),
            RecordBuilder::warehouse("w-1", "#001501")
                .name("Ada Byron")
                .build(),
            RecordBuilder::manual("m-1", "#1501")
                .phone("555-0100")
                .build(),
        ];
        let feed: Vec<RawOrderRecord> =
            permutation.iter().map(|i| records[*i].clone()).collect();

        env.engine.reconcile(&feed)?;

        let orders = env.engine.store().all_orders()?;
        assert_eq!(orders.len(), 1, "permutation {permutation:?}");
        let order = &orders[0];
        assert_eq!(order.canonical_ref.kind, SourceKind::Commerce);
        assert_eq!(order.display_number, "1501");
        assert_eq!(order.contact.email.as_deref(), Some("ada@example.com"));
        assert_eq!(order.contact.name.as_deref(), Some("Ada Byron"));
        assert_eq!(order.contact.phone.as_deref(), Some("555-0100"));
        assert_eq!(env.engine.store().get_sources(order.id)?.len(), 3);
    }
    Ok(())
}

#[test]
fn late_commerce_record_takes_over_a_manual_order() -> Result<(), EngineError> {
    let mut env = TestEngine::new()?;
    let product = env.add_product("Meridian Print", None)?;

    let manual = RecordBuilder::manual("pos-3", "#2040")
        .financial(FinancialState::Pending)
        .line("pos-3-1", product)
        .build();
    env.engine.reconcile(&[manual])?;

    let provisional = &env.engine.store().all_orders()?[0];
    assert_eq!(provisional.canonical_ref.kind, SourceKind::Manual);
    assert_eq!(provisional.financial_state, FinancialState::Pending);

    let commerce = RecordBuilder::commerce("c-88", "#2040")
        .financial(FinancialState::Paid)
        .build();
    env.engine.reconcile(&[commerce])?;

    let orders = env.engine.store().all_orders()?;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].canonical_ref.kind, SourceKind::Commerce);
    assert_eq!(orders[0].financial_state, FinancialState::Paid);
    Ok(())
}

#[test]
fn email_window_links_records_without_a_usable_number() -> Result<(), EngineError> {
    let mut env = TestEngine::new()?;

    let manual = RecordBuilder::manual("pos-9", "draft")
        .email("grace@example.com")
        .purchased(day(5))
        .build();
    env.engine.reconcile(&[manual])?;

    let warehouse = RecordBuilder::warehouse("w-9", "PICKUP")
        .email("grace@example.com")
        .purchased(day(5))
        .build();
    env.engine.reconcile(&[warehouse])?;

    assert_eq!(env.engine.store().all_orders()?.len(), 1);
    Ok(())
}

#[test]
fn email_fallback_never_bridges_differing_numbers() -> Result<(), EngineError> {
    let mut env = TestEngine::new()?;

    let first = RecordBuilder::commerce("c-1", "#3001")
        .email("grace@example.com")
        .purchased(day(5))
        .build();
    let second = RecordBuilder::manual("m-1", "#3002")
        .email("grace@example.com")
        .purchased(day(5))
        .build();
    env.engine.reconcile(&[first, second])?;

    // Same customer, same day, different order numbers: two purchases.
    assert_eq!(env.engine.store().all_orders()?.len(), 2);
    Ok(())
}

#[test]
fn ambiguous_email_match_is_left_unmerged() -> Result<(), EngineError> {
    let mut env = TestEngine::new()?;

    // Two distinct purchases by the same customer on the same day.
    let first = RecordBuilder::commerce("c-1", "#3001")
        .email("grace@example.com")
        .purchased(day(5))
        .build();
    let second = RecordBuilder::commerce("c-2", "#3002")
        .email("grace@example.com")
        .purchased(day(5))
        .build();
    env.engine.reconcile(&[first, second])?;
    assert_eq!(env.engine.store().all_orders()?.len(), 2);

    let third = RecordBuilder::warehouse("w-1", "pickup")
        .email("grace@example.com")
        .purchased(day(5))
        .build();
    let report = env.engine.reconcile(&[third])?;

    assert_eq!(report.outcome.ambiguous.len(), 1);
    assert_eq!(report.outcome.ambiguous[0].candidates.len(), 2);
    // Nothing new was created and nothing was guessed.
    assert_eq!(env.engine.store().all_orders()?.len(), 2);
    Ok(())
}

#[test]
fn replaying_a_feed_is_idempotent() -> Result<(), EngineError> {
    let mut env = TestEngine::new()?;
    let product = env.add_product("Meridian Print", Some(10))?;

    let feed = vec![
        RecordBuilder::commerce("c-1", "#4001")
            .email("ada@example.com")
            .line("c-1-1", product)
            .build(),
        RecordBuilder::commerce("c-2", "#4002")
            .purchased(day(2))
            .line("c-2-1", product)
            .build(),
    ];

    env.engine.reconcile(&feed)?;
    env.engine.reconcile(&feed)?;

    let orders = env.engine.store().all_orders()?;
    assert_eq!(orders.len(), 2);
    for order in &orders {
        assert_eq!(env.engine.store().get_items_for_order(order.id)?.len(), 1);
    }
    let result = env.engine.assign(product)?;
    assert_eq!(result.numbers_changed, 0);
    Ok(())
}

#[test]
fn corrected_number_absorbs_the_duplicate_row() -> Result<(), EngineError> {
    let mut env = TestEngine::new()?;
    let product = env.add_product("Meridian Print", None)?;

    // The warehouse export initially carries an unusable reference, so it
    // lands as its own order next to the commerce one.
    let warehouse_draft = RecordBuilder::warehouse("w-5", "SO-1501").build();
    let commerce = RecordBuilder::commerce("c-5", "#1501")
        .line("c-5-1", product)
        .build();
    env.engine.reconcile(&[warehouse_draft, commerce])?;
    assert_eq!(env.engine.store().all_orders()?.len(), 2);

    // A later export fixes the reference; the duplicate collapses into the
    // commerce order.
    let warehouse_fixed = RecordBuilder::warehouse("w-5", "#1501").build();
    env.engine.reconcile(&[warehouse_fixed])?;

    let orders = env.engine.store().all_orders()?;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].canonical_ref.kind, SourceKind::Commerce);
    assert_eq!(env.engine.store().get_sources(orders[0].id)?.len(), 2);
    Ok(())
}

#[test]
fn state_survives_reopen_on_disk() -> Result<(), Box<dyn std::error::Error>> {
    use atelier_engine::Engine;
    use atelier_storage::Product;

    atelier_harness::init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("atelier.db");
    let path = path.to_str().ok_or("non-utf8 temp path")?;

    let product = {
        let mut engine = Engine::open(path)?;
        let product = Product {
            id: atelier_core::ProductId::new(),
            title: "Meridian Print".to_string(),
            edition_total: Some(10),
        };
        engine.upsert_product(&product)?;
        let record = RecordBuilder::commerce("c-1", "#101")
            .email("ada@example.com")
            .line("c-1-1", product.id)
            .build();
        engine.reconcile(&[record])?;
        product.id
    };

    let engine = Engine::open(path)?;
    let orders = engine.store().all_orders()?;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].contact.email.as_deref(), Some("ada@example.com"));
    let items = engine.store().get_items_for_product(product)?;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].edition_number, Some(1));
    Ok(())
}

#[test]
fn raw_records_deserialize_from_feed_json() -> Result<(), Box<dyn std::error::Error>> {
    let mut env = TestEngine::new()?;
    let product = env.add_product("Meridian Print", Some(10))?;

    let payload = format!(
        r##"{{
            "source": {{"kind": "commerce", "id": "c-41"}},
            "display_number": "#5001",
            "financial_state": "paid",
            "fulfillment_state": "unfulfilled",
            "cancelled_at": null,
            "purchase_time": "2024-03-01T12:00:00Z",
            "contact": {{
                "email": "ada@example.com",
                "name": null,
                "phone": null,
                "shipping_address": null
            }},
            "line_items": [{{
                "source_line_id": "c-41-1",
                "product_id": "{product}",
                "quantity": 1,
                "unit_price": "150.00",
                "refund_state": "none",
                "restocked": false
            }}]
        }}"##
    );
    let record: RawOrderRecord = serde_json::from_str(&payload)?;
    assert_eq!(record.purchase_time, day(1));

    env.engine.reconcile(&[record])?;
    let orders = env.engine.store().all_orders()?;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].match_key.as_deref(), Some("5001"));
    Ok(())
}
