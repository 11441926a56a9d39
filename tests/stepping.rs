//! End-to-end stepping through intercepted code under test.

mod common;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use callstep::assertions::yield_turn;
use callstep::{assert_settled, Error, Intercepted, MethodTable, Session};
use common::init_test_logging;

async fn fetch_price(item: &'static str) -> Result<u32, String> {
    Err(format!("no price service for {item}"))
}

async fn basket(price: Intercepted<&'static str, u32, String>) -> Result<u32, String> {
    let first = price.call("bread").await?;
    let (second, third) = futures::try_join!(price.call("milk"), price.call("eggs"))?;
    Ok(first + second + third)
}

#[tokio::test]
async fn test_sequential_then_concurrent_calls() {
    init_test_logging();
    let session = Session::new();
    let price = session.call(fetch_price);

    let out = session
        .with_stub(|ctx| async move {
            let total = ctx.spawn(basket(price));

            assert_eq!(ctx.call_count(), 1);
            assert!(ctx.calls()[0].invocation().matches(&fetch_price, &"bread"));
            ctx.expect_call(0)?.resolve(5u32)?;
            ctx.advance_tick().await;

            assert_eq!(ctx.call_count(), 2);
            assert!(ctx.calls()[0].invocation().matches(&fetch_price, &"milk"));
            assert!(ctx.calls()[1].invocation().matches(&fetch_price, &"eggs"));
            ctx.expect_call(0)?.resolve(10u32)?;
            ctx.expect_call(1)?.resolve(15u32)?;
            ctx.advance_tick().await;

            assert_settled(total).await
        })
        .await;

    assert_eq!(out, Ok(Ok(Ok(30))));
}

#[test]
fn test_calls_land_in_order_without_running() {
    init_test_logging();
    let session = Session::new();
    let price = session.call(fetch_price);

    session.stub().unwrap();
    let pending: Vec<_> = ["a", "bb", "ccc", "dddd"]
        .into_iter()
        .map(|item| price.call(item))
        .collect();

    assert!(pending.iter().all(callstep::CallFuture::is_intercepted));
    let calls = session.calls();
    assert_eq!(calls.len(), 4);
    for (call, item) in calls.iter().zip(["a", "bb", "ccc", "dddd"]) {
        assert_eq!(call.invocation().args::<&'static str>(), Some(&item));
    }
    assert!(calls.windows(2).all(|pair| pair[0].id() < pair[1].id()));
    assert_eq!(session.calls_to(price.fn_ref()).len(), 4);

    session.unstub();
    assert_eq!(session.call_count(), 0);
}

#[test]
fn test_real_function_is_not_run_while_stubbed() {
    static RAN: AtomicUsize = AtomicUsize::new(0);

    async fn side_effect(n: u8) -> Result<u8, ()> {
        RAN.fetch_add(1, Ordering::SeqCst);
        Ok(n)
    }

    let session = Session::new();
    let wrapped = session.call(side_effect);

    session.stub().unwrap();
    let pending = wrapped.call(1);
    drop(pending);
    assert_eq!(RAN.load(Ordering::SeqCst), 0);
    session.unstub();

    assert_eq!(futures::executor::block_on(wrapped.call(2)), Ok(2));
    assert_eq!(RAN.load(Ordering::SeqCst), 1);
}

#[derive(Debug)]
struct Outage {
    region: &'static str,
}

async fn fetch_status(region: &'static str) -> Result<String, Arc<Outage>> {
    Err(Arc::new(Outage { region }))
}

#[tokio::test]
async fn test_rejection_reaches_caller_by_identity() {
    let session = Session::new();
    let status = session.call(fetch_status);
    let outage = Arc::new(Outage { region: "eu-west" });

    let out = session
        .with_stub(|ctx| {
            let outage = Arc::clone(&outage);
            async move {
                let handle = ctx.spawn(async move { status.call("eu-west").await });
                ctx.expect_call(0)?.reject(Arc::clone(&outage))?;
                ctx.advance_tick().await;
                assert_settled(handle).await
            }
        })
        .await;

    let err = out.unwrap().unwrap().unwrap_err();
    assert!(Arc::ptr_eq(&err, &outage));
    assert_eq!(err.region, "eu-west");
}

#[test]
fn test_settling_checks_types_and_settles_once() {
    let session = Session::new();
    let price = session.call(fetch_price);
    session.stub().unwrap();
    let mut fut = price.call("tea");
    let call = session.expect_call(0).unwrap();

    assert!(matches!(
        call.resolve("not a price"),
        Err(Error::TypeMismatch { .. })
    ));
    assert!(!call.is_settled());
    callstep::assert_pending!(fut);

    call.resolve(3u32).unwrap();
    assert_eq!(
        call.reject(String::from("late")),
        Err(Error::AlreadySettled { call: call.id() })
    );
    assert_eq!(callstep::assert_ready!(fut), Ok(3));
}

#[tokio::test]
async fn test_continuation_with_extra_await_needs_another_tick() {
    let session = Session::new();
    let price = session.call(fetch_price);

    let out = session
        .with_stub(|ctx| async move {
            let handle = ctx.spawn(async move {
                let a = price.call("first").await?;
                yield_turn().await;
                let b = price.call("second").await?;
                Ok::<u32, String>(a + b)
            });

            ctx.expect_call(0)?.resolve(1u32)?;
            ctx.advance_tick().await;
            assert_eq!(ctx.call_count(), 0);

            ctx.advance_tick().await;
            assert_eq!(ctx.call_count(), 1);
            ctx.expect_call(0)?.resolve(2u32)?;
            ctx.advance_tick().await;

            assert_settled(handle).await
        })
        .await;

    assert_eq!(out, Ok(Ok(Ok(3))));
}

#[tokio::test]
async fn test_held_request_settles_after_tick() {
    let session = Session::new();
    let price = session.call(fetch_price);

    let out = session
        .with_stub(|ctx| async move {
            let total = ctx.spawn(basket(price));
            ctx.expect_call(0)?.resolve(1u32)?;
            ctx.advance_tick().await;

            let eggs = ctx.expect_call(1)?;
            ctx.expect_call(0)?.resolve(2u32)?;
            ctx.advance_tick().await;
            assert_eq!(ctx.call_count(), 0);
            assert!(!total.is_complete());

            eggs.resolve(3u32)?;
            ctx.advance_tick().await;
            assert_settled(total).await
        })
        .await;

    assert_eq!(out, Ok(Ok(Ok(6))));
}

#[tokio::test]
async fn test_held_request_survives_reset() {
    let session = Session::new();
    let price = session.call(fetch_price);

    let out = session
        .with_stub(|ctx| async move {
            let total = ctx.spawn(basket(price));
            let bread = ctx.expect_call(0)?;

            ctx.session().reset();
            assert!(ctx.session().is_stubbed());
            assert_eq!(ctx.call_count(), 0);
            assert_eq!(ctx.session().pending_tasks(), 1);

            bread.resolve(4u32)?;
            ctx.advance_tick().await;
            assert_eq!(ctx.call_count(), 2);
            ctx.expect_call(0)?.resolve(5u32)?;
            ctx.expect_call(1)?.resolve(6u32)?;
            ctx.advance_tick().await;

            assert_settled(total).await
        })
        .await;

    assert_eq!(out, Ok(Ok(Ok(15))));
}

#[tokio::test]
async fn test_unsettled_work_fails_fast() {
    let session = Session::new();
    let price = session.call(fetch_price);

    let out = session
        .with_stub(|ctx| async move {
            let handle = ctx.spawn(basket(price));
            assert_eq!(ctx.call_count(), 1);
            assert_settled(handle).await
        })
        .await;

    assert_eq!(out, Ok(Err(Error::NotSettled)));
}

#[test]
fn test_panicking_body_still_restores_pass_through() {
    static RAN: AtomicUsize = AtomicUsize::new(0);

    async fn probe(n: u8) -> Result<u8, ()> {
        RAN.fetch_add(1, Ordering::SeqCst);
        Ok(n)
    }

    init_test_logging();
    let session = Session::new();
    let wrapped = session.call(probe);

    let result = catch_unwind(AssertUnwindSafe(|| {
        futures::executor::block_on(session.with_stub(|ctx| {
            let wrapped = wrapped.clone();
            async move {
                let _pending = wrapped.call(1);
                assert_eq!(ctx.call_count(), 1);
                panic!("assertion in test body");
            }
        }))
    }));

    assert!(result.is_err());
    assert!(!session.is_stubbed());
    assert_eq!(session.call_count(), 0);

    assert_eq!(futures::executor::block_on(wrapped.call(9)), Ok(9));
    assert_eq!(RAN.load(Ordering::SeqCst), 1);
}

struct Inventory {
    warehouse: &'static str,
}

impl Inventory {
    async fn stock(self: Arc<Self>, sku: u32) -> Result<u32, String> {
        Err(format!("{} is offline for sku {sku}", self.warehouse))
    }
}

#[test]
fn test_bound_by_name_and_by_reference_record_the_same_call() {
    let session = Session::new();
    let inventory = Arc::new(Inventory { warehouse: "north" });
    let table = MethodTable::new().with("stock", Inventory::stock);

    let by_ref = session.call_bound(Arc::clone(&inventory), Inventory::stock);
    let by_name = session
        .call_method::<_, u32, u32, String>(Arc::clone(&inventory), &table, "stock")
        .unwrap();
    assert_eq!(by_ref.fn_ref(), by_name.fn_ref());

    session.stub().unwrap();
    let _a = by_ref.call(7);
    let _b = by_name.call(7);

    let calls = session.calls();
    for call in &calls {
        let invocation = call.invocation();
        assert!(invocation.is_call_to(&Inventory::stock));
        assert!(invocation.is_bound_to(&inventory));
        assert_eq!(invocation.args::<u32>(), Some(&7));
        assert_eq!(
            invocation.context::<Inventory>().map(|inv| inv.warehouse),
            Some("north")
        );
        assert!(!invocation.matches(&Inventory::stock, &7u32));
    }

    let elsewhere = Arc::new(Inventory { warehouse: "north" });
    assert!(!calls[0].invocation().is_bound_to(&elsewhere));
}

#[test]
fn test_method_lookup_errors() {
    let session = Session::new();
    let inventory = Arc::new(Inventory { warehouse: "south" });
    let table = MethodTable::new().with("stock", Inventory::stock);

    let missing = session.call_method::<_, u32, u32, String>(Arc::clone(&inventory), &table, "price");
    assert_eq!(missing.unwrap_err(), Error::UnknownMethod("price".to_string()));

    let wrong = session.call_method::<_, String, u32, String>(inventory, &table, "stock");
    assert!(matches!(wrong.unwrap_err(), Error::TypeMismatch { .. }));
}

#[test]
fn test_free_functions_drive_thread_session() {
    let price = callstep::call(fetch_price);

    let out = futures::executor::block_on(callstep::with_stub(|_ctx| async move {
        let handle = callstep::spawn(basket(price));
        callstep::expect_call(0)?.resolve(1u32)?;
        callstep::advance_tick().await;
        callstep::expect_call(0)?.resolve(2u32)?;
        callstep::expect_call(1)?.resolve(3u32)?;
        callstep::advance_tick().await;
        assert_settled(handle).await
    }));

    assert_eq!(out, Ok(Ok(Ok(6))));
    assert!(!callstep::is_stubbed());
}
