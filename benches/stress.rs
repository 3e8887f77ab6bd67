use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use ulid::Ulid;

use arisync::catalog::Catalog;
use arisync::engine::{Engine, Remotes};
use arisync::model::*;
use arisync::notify::NotifyHub;
use arisync::persist::MemoryStore;
use arisync::remote::*;

const ROOM_TYPES: usize = 40;
const PLANS_PER_ROOM: usize = 5;
const DAYS: u64 = 90;
const ROUNDS: usize = 5;

/// Accepts everything, instantly.
struct NullChannel;

#[async_trait]
impl AriSource for NullChannel {
    async fn fetch_ari(
        &self,
        _property_id: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<AriSnapshot, RemoteError> {
        Ok(AriSnapshot::default())
    }
}

#[async_trait]
impl MutationSink for NullChannel {
    async fn push_restrictions(
        &self,
        _records: Vec<RestrictionRecord>,
    ) -> Result<PushResponse, RemoteError> {
        Ok(PushResponse::default())
    }

    async fn push_availability(
        &self,
        _records: Vec<AvailabilityRecord>,
    ) -> Result<PushResponse, RemoteError> {
        Ok(PushResponse::default())
    }
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn setup() -> (Catalog, Vec<EntityId>, Vec<EntityId>) {
    let mut room_types = Vec::new();
    let mut rate_plans = Vec::new();
    for r in 0..ROOM_TYPES {
        let room = RoomType {
            id: Ulid::new(),
            external_id: Some(format!("rt_{r}")),
            name: format!("Room {r}"),
            position: r as u32,
        };
        for p in 0..PLANS_PER_ROOM {
            rate_plans.push(RatePlan {
                id: Ulid::new(),
                external_id: Some(format!("rp_{r}_{p}")),
                name: format!("Plan {r}.{p}"),
                room_type_id: room.id,
                position: p as u32,
            });
        }
        room_types.push(room);
    }
    let catalog = Catalog::new(&room_types, &rate_plans);
    println!("  created {} room types, {} rate plans", room_types.len(), rate_plans.len());
    (
        catalog,
        room_types.iter().map(|r| r.id).collect(),
        rate_plans.iter().map(|p| p.id).collect(),
    )
}

#[tokio::main]
async fn main() {
    println!("arisync stress: {ROOM_TYPES}x{PLANS_PER_ROOM} entities over {DAYS} days");
    let (catalog, rooms, plans) = setup();
    let channel = Arc::new(NullChannel);
    let engine = Engine::new(
        "bench",
        Some("prop_bench".into()),
        catalog,
        Remotes {
            source: channel.clone(),
            sink: channel,
        },
        Arc::new(MemoryStore::new()),
        Arc::new(NotifyHub::new()),
    );

    let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let end = start.checked_add_days(Days::new(DAYS - 1)).unwrap();
    engine.activate_range(start, end).await.unwrap();
    let dates = engine.dates().await;

    let mut set_latencies = Vec::new();
    let mut read_latencies = Vec::new();
    let mut persist_latencies = Vec::new();
    let mut save_latencies = Vec::new();

    for round in 0..ROUNDS {
        let price = Decimal::from(100 + round as i64);
        for plan in &plans {
            for date in &dates {
                let t = Instant::now();
                engine
                    .set(*plan, *date, Field::Rate, Value::Rate(price))
                    .await
                    .unwrap();
                set_latencies.push(t.elapsed());
            }
        }
        for room in &rooms {
            for date in &dates {
                engine
                    .set(*room, *date, Field::Availability, Value::Count(round as u32 + 1))
                    .await
                    .unwrap();
            }
        }
        for room in rooms.iter().take(10) {
            for date in &dates {
                let t = Instant::now();
                engine.effective_room_type_availability(*room, *date).await;
                read_latencies.push(t.elapsed());
            }
        }

        let t = Instant::now();
        engine.persist().await;
        persist_latencies.push(t.elapsed());

        let t = Instant::now();
        let report = engine.save().await.unwrap();
        save_latencies.push(t.elapsed());
        println!(
            "  round {round}: sent {} restriction + {} availability records",
            report.restrictions_sent, report.availability_sent
        );
    }

    println!("\nresults:");
    print_latency("set", &mut set_latencies);
    print_latency("effective read", &mut read_latencies);
    print_latency("persist draft", &mut persist_latencies);
    print_latency("save (diff + push + reload)", &mut save_latencies);
}
