//! Basic usage of cached functions and properties.

use cached_result::{backend::InMemoryBackend, error::Result, CacheService};
use serde::Serialize;
use std::time::Duration;

/// Example receiver: an order with a slow total calculation
#[derive(Serialize, Debug)]
struct Order {
    id: u32,
    lines: Vec<u32>,
}

async fn line_total(order: &Order, (quantity,): (u32,)) -> Result<u32> {
    println!("  [DB] Pricing {} units for order {}", quantity, order.id);
    Ok(quantity * order.lines.iter().sum::<u32>())
}

async fn order_total(order: &Order) -> Result<u32> {
    println!("  [DB] Summing order {}", order.id);
    Ok(order.lines.iter().sum())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== Cached Result - Basic Example ===\n");

    // 1. Build the service and the decorators
    println!("1. Initializing in-memory cache backend...");
    let backend = InMemoryBackend::new();
    let service = CacheService::new(backend.clone()).with_default_ttl(Duration::from_secs(300));

    let priced = service
        .builder()
        .key("order_{0.id}_x{1}")
        .name("line_total")
        .function(line_total)?;
    let total = service
        .builder()
        .namespace("demo.Order")
        .name("total")
        .id("{0.id}")
        .property(order_total)?;
    println!("   ✓ Cache ready\n");

    let order = Order {
        id: 7,
        lines: vec![10, 20, 12],
    };

    // 2. First call computes
    println!("2. First call for 4 units:");
    let value = priced.bind(&order).call((4,)).await?;
    println!("   ✓ Computed {} (key {})\n", value, priced.bind(&order).cache_key(&(4u32,))?);

    // 3. Second call is served from the store
    println!("3. Second call for 4 units:");
    let value = priced.bind(&order).call((4,)).await?;
    println!("   ✓ Loaded from cache: {}\n", value);

    // 4. Delete and recompute
    println!("4. Deleting the cached result:");
    priced.bind(&order).delete_cache((4,)).await?;
    let value = priced.bind(&order).call((4,)).await?;
    println!("   ✓ Recomputed {}\n", value);

    // 5. Property: computed once, deleted through the property itself
    println!("5. Cached property:");
    println!("   total = {}", total.get(&order).await?);
    println!("   total = {} (cached)", total.get(&order).await?);
    total.delete_cache(&order).await?;
    println!("   total = {} (after delete)\n", total.get(&order).await?);

    println!("   Entries in store: {}", backend.len());
    println!("=== Example Complete ===\n");

    Ok(())
}
