//! Example: Stepping through a checkout flow
//!
//! This example shows how callstep intercepts the async calls a function
//! makes, lets the test settle each one, and advances the function one
//! tick at a time.

use std::sync::Arc;

use callstep::{assert_settled, Intercepted, MethodTable, Session};

async fn fetch_price(item: &'static str) -> Result<u32, String> {
    Err(format!("price service unreachable for {item}"))
}

struct Billing {
    account: &'static str,
}

impl Billing {
    async fn charge(self: Arc<Self>, amount: u32) -> Result<String, String> {
        Ok(format!("charged {amount} to {}", self.account))
    }
}

async fn checkout(
    price: Intercepted<&'static str, u32, String>,
    charge: Intercepted<u32, String, String>,
) -> Result<String, String> {
    let base = price.call("basket").await?;
    let (tax, shipping) = futures::try_join!(price.call("tax"), price.call("shipping"))?;
    charge.call(base + tax + shipping).await
}

fn main() {
    println!("🪜 callstep - Stepping Examples\n");

    example_happy_path();
    example_rejection();
    example_pass_through();

    println!("\n✅ All stepping examples completed!");
}

/// Walk the checkout flow tick by tick
fn example_happy_path() {
    println!("📌 Example 1: Happy Path - One Tick at a Time\n");

    let session = Session::new();
    let billing = Arc::new(Billing { account: "acme" });
    let price = session.call(fetch_price);
    let methods = MethodTable::new().with("charge", Billing::charge);
    let charge: Intercepted<u32, String, String> =
        match session.call_method(Arc::clone(&billing), &methods, "charge") {
            Ok(charge) => charge,
            Err(err) => {
                println!("   ❌ {err}");
                return;
            }
        };

    let outcome = futures::executor::block_on(session.with_stub(|ctx| async move {
        let receipt = ctx.spawn(checkout(price, charge));

        for call in ctx.calls() {
            println!("   Tick 0: {:?}", call.invocation());
        }
        ctx.expect_call(0)?.resolve(100u32)?;
        ctx.advance_tick().await;

        for call in ctx.calls() {
            println!("   Tick 1: {:?}", call.invocation());
        }
        ctx.expect_call(0)?.resolve(8u32)?;
        ctx.expect_call(1)?.resolve(5u32)?;
        ctx.advance_tick().await;

        let charge = ctx.expect_call(0)?;
        println!("   Tick 2: {:?}", charge.invocation());
        println!(
            "           bound to our billing account: {}",
            charge.invocation().is_bound_to(&billing)
        );
        charge.resolve(String::from("receipt #1"))?;
        ctx.advance_tick().await;

        assert_settled(receipt).await
    }));

    match outcome {
        Ok(Ok(result)) => println!("\n   ✅ Checkout finished: {result:?}"),
        Ok(Err(err)) | Err(err) => println!("\n   ❌ {err}"),
    }
}

/// Reject a call and watch the error reach the caller
fn example_rejection() {
    println!("\n📌 Example 2: Rejection - The Error Passes Through\n");

    let session = Session::new();
    let price = session.call(fetch_price);

    let outcome = futures::executor::block_on(session.with_stub(|ctx| async move {
        let total = ctx.spawn(async move { price.call("basket").await });
        ctx.expect_call(0)?.reject(String::from("out of stock"))?;
        ctx.advance_tick().await;
        assert_settled(total).await
    }));

    match outcome {
        Ok(Ok(result)) => println!("   ✅ Caller saw: {result:?}"),
        Ok(Err(err)) | Err(err) => println!("   ❌ {err}"),
    }
}

/// Outside a stub session the real function runs
fn example_pass_through() {
    println!("\n📌 Example 3: Pass-Through - Real Calls Outside a Session\n");

    let session = Session::new();
    let price = session.call(fetch_price);

    println!("   Stubbed: {}", session.is_stubbed());
    let result = futures::executor::block_on(price.call("basket"));
    println!("   Real call returned: {result:?}");
    println!("   Ledger entries: {}", session.call_count());
}
