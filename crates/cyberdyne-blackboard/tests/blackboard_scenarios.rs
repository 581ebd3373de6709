//! End-to-end behavior of registry-backed boards.
//!
//! 1. Initial source and derived values.
//! 2. A source write refreshes the whole chain before returning.
//! 3. Wrappers keep their identity across writes.
//! 4. Derived attributes reject writes and keep their value.
//! 5. Instances of one type are isolated from each other.
//! 6. Forward name references are ordered by the dependency graph.
//! 7. Cycles are rejected when the type is first used.
//! 8. A failing compute stops the pass without undoing earlier updates.
//! 9. Diamond dependents recompute exactly once per write.
//! 10. Awaiting a derived value resumes after a source write.
//! 11. Observers of a write only ever see fully propagated values.
//! 12. Handles are read-only; the board's write path is the only way in.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cyberdyne_blackboard::{
    Attr, BlackboardError, BlackboardType, Board, BoardConfig, DefinitionError, Materialize,
    ObservableView, SchemaBuilder,
};
use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;

// ============================================================================
// Container types
// ============================================================================

struct Example;

struct ExampleKeys {
    a: Attr<i32>,
    b: Attr<i32>,
    c: Attr<i32>,
    d: Attr<i32>,
}

impl BlackboardType for Example {
    type Keys = ExampleKeys;

    fn declare(s: &mut SchemaBuilder) -> Result<ExampleKeys, DefinitionError> {
        let a = s.source("a", 1)?;
        let b = s.source("b", 2)?;
        let c = s.derive2("c", &a, &b, |a, b| a + b)?;
        let d = s.derive1("d", &c, |c| 2 * c)?;
        Ok(ExampleKeys { a, b, c, d })
    }
}

/// Derived attributes declared before the attributes they read.
struct Invoice;

struct InvoiceKeys {
    price: Attr<i64>,
    qty: Attr<i64>,
    rate: Attr<i64>,
    total: Attr<i64>,
}

impl BlackboardType for Invoice {
    type Keys = InvoiceKeys;

    fn declare(s: &mut SchemaBuilder) -> Result<InvoiceKeys, DefinitionError> {
        let total = s.derive("total", ["subtotal", "tax"], |i| {
            Ok(i.named::<i64>("subtotal")? + i.named::<i64>("tax")?)
        })?;
        s.derive("tax", ["subtotal", "rate"], |i| {
            Ok(i.named::<i64>("subtotal")? * i.named::<i64>("rate")? / 100)
        })?;
        s.derive("subtotal", ["price", "qty"], |i| {
            Ok(i.at::<i64>(0)? * i.at::<i64>(1)?)
        })?;
        let price = s.source("price", 100i64)?;
        let qty = s.source("qty", 1i64)?;
        let rate = s.source("rate", 20i64)?;
        Ok(InvoiceKeys {
            price,
            qty,
            rate,
            total,
        })
    }
}

struct Cyclic;

impl BlackboardType for Cyclic {
    type Keys = ();

    fn declare(s: &mut SchemaBuilder) -> Result<(), DefinitionError> {
        s.source("seed", 0u8)?;
        s.derive("left", ["seed", "right"], |i| Ok(*i.at::<u8>(0)?))?;
        s.derive("right", ["left"], |i| Ok(*i.at::<u8>(0)?))?;
        Ok(())
    }
}

struct Ratio;

struct RatioKeys {
    num: Attr<i64>,
    den: Attr<i64>,
    doubled: Attr<i64>,
    ratio: Attr<i64>,
    shifted: Attr<i64>,
}

impl BlackboardType for Ratio {
    type Keys = RatioKeys;

    fn declare(s: &mut SchemaBuilder) -> Result<RatioKeys, DefinitionError> {
        let num = s.source("num", 10i64)?;
        let den = s.source("den", 2i64)?;
        let doubled = s.derive1("doubled", &den, |d| d * 2)?;
        let ratio = s.derive("ratio", [&num, &den], move |i| {
            let den = *i.get(&den)?;
            if den == 0 {
                return Err("division by zero".into());
            }
            Ok(*i.get(&num)? / den)
        })?;
        let shifted = s.derive1("shifted", &ratio, |r| r + 1)?;
        Ok(RatioKeys {
            num,
            den,
            doubled,
            ratio,
            shifted,
        })
    }
}

static LEFT: AtomicUsize = AtomicUsize::new(0);
static RIGHT: AtomicUsize = AtomicUsize::new(0);
static JOIN: AtomicUsize = AtomicUsize::new(0);

struct Diamond;

struct DiamondKeys {
    top: Attr<u64>,
    join: Attr<u64>,
}

impl BlackboardType for Diamond {
    type Keys = DiamondKeys;

    fn declare(s: &mut SchemaBuilder) -> Result<DiamondKeys, DefinitionError> {
        let top = s.source("top", 1u64)?;
        let left = s.derive1("left", &top, |t| {
            LEFT.fetch_add(1, Ordering::SeqCst);
            t + 1
        })?;
        let right = s.derive1("right", &top, |t| {
            RIGHT.fetch_add(1, Ordering::SeqCst);
            t * 10
        })?;
        let join = s.derive2("join", &left, &right, |l, r| {
            JOIN.fetch_add(1, Ordering::SeqCst);
            l + r
        })?;
        Ok(DiamondKeys { top, join })
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn concrete_scenario() {
    let board = Board::<Example>::new().expect("board");
    let k = board.keys();

    let a = board.get(&k.a).expect("a");
    let c = board.get(&k.c).expect("c");
    assert_eq!(a.get(), 1);
    assert_eq!(c.get(), 3);

    board.set(&k.a, 2).expect("set a");
    assert_eq!(board.value(&k.c).expect("c"), 4);
    assert_eq!(board.value(&k.d).expect("d"), 8);
    assert!(a.ptr_eq(&board.get(&k.a).expect("a")));
    assert!(c.ptr_eq(&board.get(&k.c).expect("c")));
}

#[test]
fn initial_values_come_from_declarations() {
    let board = Board::<Example>::new().expect("board");
    let k = board.keys();
    assert_eq!(board.value(&k.b).expect("b"), 2);
    assert_eq!(board.value(&k.d).expect("d"), 6);
}

#[test]
fn derived_wrappers_see_writes_without_rereading() {
    let board = Board::<Example>::new().expect("board");
    let k = board.keys();
    let d = board.get(&k.d).expect("d");
    board.set(&k.b, 10).expect("set b");
    assert_eq!(d.get(), 22);
    assert_eq!(d.version(), 1);
}

#[test]
fn immutable_write_leaves_value_unchanged() {
    let board = Board::<Example>::new().expect("board");
    let k = board.keys();
    board.set(&k.a, 5).expect("set a");

    let err = board.set(&k.d, 0).expect_err("derived");
    assert!(matches!(err, BlackboardError::ImmutableField { .. }));
    assert_eq!(err.field(), Some("d"));
    assert_eq!(err.to_string(), "cannot assign derived field `d`");
    assert_eq!(board.value(&k.d).expect("d"), 14);
}

#[test]
fn instances_are_isolated() {
    let first = Board::<Example>::new().expect("first");
    let second = Board::<Example>::new().expect("second");
    let k = first.keys();

    let second_c = second.get(&k.c).expect("c");
    first.set(&k.a, 40).expect("set a");

    assert_eq!(first.value(&k.c).expect("c"), 42);
    assert_eq!(second_c.get(), 3);
    assert_eq!(second_c.version(), 0);
    assert!(!second_c.ptr_eq(&first.get(&k.c).expect("c")));
    assert!(std::sync::Arc::ptr_eq(first.schema(), second.schema()));
}

#[test]
fn forward_references_are_ordered_by_graph() {
    let board = Board::<Invoice>::new().expect("board");
    let k = board.keys();
    assert_eq!(board.value(&k.total).expect("total"), 120);

    board.set(&k.qty, 3).expect("set qty");
    assert_eq!(board.value(&k.total).expect("total"), 360);

    board.set(&k.rate, 0).expect("set rate");
    assert_eq!(board.value(&k.total).expect("total"), 300);

    let schema = board.schema();
    let names: Vec<_> = schema
        .dependents(k.price.id())
        .iter()
        .filter_map(|id| schema.attr_name(*id))
        .collect();
    assert_eq!(names, ["subtotal", "tax", "total"]);
}

#[test]
fn forward_references_propagate_to_unread_dependents() {
    let board = Board::<Invoice>::new().expect("board");
    let k = board.keys();
    board.set(&k.price, 50).expect("set price");
    assert_eq!(board.value(&k.total).expect("total"), 60);
    assert_eq!(board.get_named::<i64>("tax").expect("tax").get(), 10);
}

#[test]
fn cycle_rejected_on_first_use() {
    let err = Board::<Cyclic>::new().expect_err("cycle");
    match err {
        BlackboardError::Definition(DefinitionError::Cycle { path }) => {
            assert_eq!(path.first(), path.last());
            assert!(path.iter().any(|n| n == "left"));
            assert!(path.iter().any(|n| n == "right"));
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn compute_failure_stops_pass_without_rollback() {
    let board = Board::<Ratio>::new().expect("board");
    let k = board.keys();
    assert_eq!(board.value(&k.shifted).expect("shifted"), 6);
    assert_eq!(board.value(&k.doubled).expect("doubled"), 4);

    let err = board.set(&k.den, 0).expect_err("division by zero");
    assert!(matches!(err, BlackboardError::Compute { .. }));
    assert_eq!(err.field(), Some("ratio"));
    assert!(err.to_string().contains("division by zero"));

    assert_eq!(board.value(&k.den).expect("den"), 0);
    assert_eq!(board.value(&k.doubled).expect("doubled"), 0);
    assert_eq!(board.value(&k.ratio).expect("ratio"), 5);
    assert_eq!(board.value(&k.shifted).expect("shifted"), 6);

    board.set(&k.den, 5).expect("recover");
    assert_eq!(board.value(&k.shifted).expect("shifted"), 3);
    board.set(&k.num, 25).expect("set num");
    assert_eq!(board.value(&k.shifted).expect("shifted"), 6);
}

#[test]
fn diamond_dependents_recompute_once_per_write() {
    let config = BoardConfig::default().with_materialize(Materialize::Eager);
    let board = Board::<Diamond>::with_config(config).expect("board");
    let k = board.keys();
    assert_eq!(board.value(&k.join).expect("join"), 12);

    let before = (
        LEFT.load(Ordering::SeqCst),
        RIGHT.load(Ordering::SeqCst),
        JOIN.load(Ordering::SeqCst),
    );
    board.set(&k.top, 2).expect("set top");
    assert_eq!(LEFT.load(Ordering::SeqCst), before.0 + 1);
    assert_eq!(RIGHT.load(Ordering::SeqCst), before.1 + 1);
    assert_eq!(JOIN.load(Ordering::SeqCst), before.2 + 1);
    assert_eq!(board.value(&k.join).expect("join"), 23);
}

#[test]
fn awaiting_derived_value_resumes_after_write() {
    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    let board = Board::<Example>::new().expect("board");
    let k = board.keys();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let d = board.get(&k.d).expect("d");
    let sink = Rc::clone(&seen);
    spawner
        .spawn_local(async move {
            let value = d.wait_value(|v| *v >= 20).await;
            sink.borrow_mut().push(value);
        })
        .expect("spawn");

    pool.run_until_stalled();
    board.set(&k.a, 3).expect("set a");
    pool.run_until_stalled();
    assert!(seen.borrow().is_empty());

    board.set(&k.a, 8).expect("set a");
    pool.run_until_stalled();
    assert_eq!(*seen.borrow(), vec![20]);
}

#[test]
fn observers_never_see_a_partial_update() {
    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    let board = Rc::new(Board::<Example>::new().expect("board"));
    let k = board.keys();
    board.value(&k.d).expect("materialize");
    let seen = Rc::new(RefCell::new(Vec::new()));

    let mut subs = Vec::new();
    for attr in [k.a, k.b, k.c, k.d] {
        let reader = Rc::clone(&board);
        let sink = Rc::clone(&seen);
        subs.push(board.get(&attr).expect("get").subscribe(move |_| {
            let k = reader.keys();
            let snapshot: Vec<i32> = [k.a, k.b, k.c, k.d]
                .iter()
                .map(|attr| reader.value(attr).unwrap_or(i32::MIN))
                .collect();
            sink.borrow_mut().push(snapshot);
        }));
    }

    let waiter = Rc::clone(&board);
    let woke = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&woke);
    let a = board.get(&k.a).expect("a");
    spawner
        .spawn_local(async move {
            a.wait_value(|v| *v == 2).await;
            let k = waiter.keys();
            *slot.borrow_mut() = Some((
                waiter.value(&k.c).unwrap_or(i32::MIN),
                waiter.value(&k.d).unwrap_or(i32::MIN),
            ));
        })
        .expect("spawn");
    pool.run_until_stalled();

    board.set(&k.a, 2).expect("set a");
    pool.run_until_stalled();
    assert_eq!(*woke.borrow(), Some((4, 8)));
    board.set(&k.b, 5).expect("set b");

    let seen = seen.borrow();
    assert_eq!(seen.len(), 6);
    for snapshot in seen.iter() {
        let [a, b, c, d] = snapshot[..] else {
            panic!("snapshot {snapshot:?}");
        };
        assert_eq!(c, a + b, "snapshot {snapshot:?}");
        assert_eq!(d, 2 * c, "snapshot {snapshot:?}");
    }
}

#[test]
fn handles_cannot_bypass_immutability() {
    let board = Board::<Example>::new().expect("board");
    let k = board.keys();
    let c: ObservableView<i32> = board.get(&k.c).expect("c");
    let named: ObservableView<i32> = board.get_named("c").expect("c");
    assert!(c.ptr_eq(&named));

    let err = board.set(&k.c, 100).expect_err("derived");
    assert!(matches!(err, BlackboardError::ImmutableField { .. }));
    let err = board.set_named("c", 100i32).expect_err("derived");
    assert!(matches!(err, BlackboardError::ImmutableField { .. }));
    assert_eq!(c.get(), 3);
    assert_eq!(c.version(), 0);

    board.set(&k.a, 7).expect("set a");
    assert_eq!(c.get(), 9);
    assert_eq!(named.get(), 9);
    assert_eq!(board.value(&k.d).expect("d"), 18);
}
