//! Repository tests against a live Postgres.
//!
//! Run with `DATABASE_URL` pointing at a scratch database; every test is a
//! no-op when it is unset. Tests share the database, so each one tags its
//! customers with a fresh id and only asserts on rows carrying that tag.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use rust_decimal::Decimal;

use orderdesk_core::OrderId;
use orderdesk_infra::{
    ErrorKind, OrderFilter, OrderRepository, Pagination, PostgresOrderStore, StoreConfig,
};
use orderdesk_sales::{ItemDraft, OrderDraft};

const SCHEMA: &str = include_str!("../schema/orders.sql");
const SCHEMA_LOCK: i64 = 0x6f72_6465_7273;

async fn repository() -> anyhow::Result<Option<OrderRepository<PostgresOrderStore>>> {
    orderdesk_observability::init_test();

    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(_) => {
            eprintln!("DATABASE_URL not set; skipping");
            return Ok(None);
        }
    };
    let store = config.connect().await?;

    let mut tx = store.pool().begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SCHEMA_LOCK)
        .execute(&mut *tx)
        .await?;
    sqlx::raw_sql(SCHEMA).execute(&mut *tx).await?;
    tx.commit().await?;

    Ok(Some(OrderRepository::new(store)))
}

fn tag() -> String {
    OrderId::new().to_string()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(date: NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, 30, 0).unwrap()
}

fn item(name: &str, quantity: i32, price: &str) -> ItemDraft {
    let price = Decimal::from_str(price).unwrap();
    ItemDraft {
        name: name.to_string(),
        quantity,
        price,
        total: price * Decimal::from(quantity),
    }
}

fn draft(number: &str, customer: &str, date: NaiveDateTime, items: Vec<ItemDraft>) -> OrderDraft {
    OrderDraft {
        number: number.to_string(),
        date: Some(date),
        customer: customer.to_string(),
        address: None,
        items,
    }
}

#[tokio::test]
async fn aggregate_survives_create_update_delete() -> anyhow::Result<()> {
    let Some(repo) = repository().await? else {
        return Ok(());
    };
    let customer = format!("Acme {}", tag());

    let created = repo
        .create(draft(
            "SO-1",
            &customer,
            at(day(2024, 1, 5), 9),
            vec![item("Widget", 2, "10.00"), item("Gadget", 1, "0.05"), item("Bolt", 7, "1.10")],
        ))
        .await?
        .expect("order row written");

    let fetched = repo.get_by_id(created.id()).await?;
    assert_eq!(fetched, created);
    assert_eq!(fetched.items[0].total, Decimal::from_str("20.00")?);

    let replaced = repo
        .update(
            created.id(),
            draft("SO-1", &customer, at(day(2024, 1, 6), 9), vec![item("Nut", 4, "0.25")]),
        )
        .await?;
    assert!(replaced);
    let fetched = repo.get_by_id(created.id()).await?;
    assert_eq!(fetched.header.date, at(day(2024, 1, 6), 9));
    assert_eq!(fetched.items.len(), 1);
    assert_eq!(fetched.items[0].name, "Nut");

    assert!(repo.delete(created.id()).await?);
    assert!(!repo.delete(created.id()).await?);
    assert_eq!(repo.get_by_id(created.id()).await.unwrap_err().kind(), ErrorKind::NotFound);
    Ok(())
}

#[tokio::test]
async fn stored_values_read_back_unchanged() -> anyhow::Result<()> {
    let Some(repo) = repository().await? else {
        return Ok(());
    };
    let customer = format!("Acme {}", tag());
    let date = day(2024, 1, 5)
        .and_hms_nano_opt(9, 30, 0, 123_456_789)
        .unwrap();
    let odd = ItemDraft {
        name: "Sample".to_string(),
        quantity: 3,
        price: Decimal::from_str("0.333")?,
        total: Decimal::from_str("0.999")?,
    };

    let created = repo
        .create(draft("SO-1", &customer, date, vec![odd, item("Widget", 2, "10.00")]))
        .await?
        .expect("order row written");
    assert_eq!(created.header.date.nanosecond(), 123_456_000);

    let fetched = repo.get_by_id(created.id()).await?;
    assert_eq!(fetched, created);
    assert_eq!(fetched.items[0].price.to_string(), "0.333");
    assert_eq!(fetched.items[0].total.to_string(), "0.999");

    let listed = repo
        .search_with_items(&OrderFilter::default().with_keyword(&customer), Pagination::new(1, 10)?)
        .await?;
    assert_eq!(listed, vec![created]);
    Ok(())
}

#[tokio::test]
async fn database_failure_mid_items_rolls_back_create() -> anyhow::Result<()> {
    let Some(repo) = repository().await? else {
        return Ok(());
    };
    let customer = format!("Acme {}", tag());

    // Postgres text cannot hold NUL, so the second item insert fails.
    let err = repo
        .create(draft(
            "SO-1",
            &customer,
            at(day(2024, 1, 5), 9),
            vec![item("Widget", 1, "1.00"), item("Wid\0get", 1, "1.00")],
        ))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert_eq!(err.to_string(), "persistence failure");
    let filter = OrderFilter::default().with_keyword(&customer);
    assert_eq!(repo.search_count(&filter).await?, 0);
    Ok(())
}

#[tokio::test]
async fn search_filters_are_independent_and_paged() -> anyhow::Result<()> {
    let Some(repo) = repository().await? else {
        return Ok(());
    };
    let t = tag();
    let acme = format!("Acme {t}");
    let globex = format!("Globex {t}");
    let target = day(2031, 3, 14);

    for (number, customer, date) in [
        ("SO-1", &acme, at(target, 1)),
        ("SO-2", &acme, at(target, 23)),
        ("SO-3", &globex, at(target, 12)),
        ("SO-4", &acme, at(day(2031, 3, 15), 0)),
    ] {
        repo.create(draft(number, customer, date, vec![])).await?;
    }
    let all = Pagination::new(1, 100)?;

    let by_tag = OrderFilter::default().with_keyword(&t);
    let numbers: Vec<_> = repo
        .search(&by_tag, all)
        .await?
        .into_iter()
        .map(|h| h.number)
        .collect();
    assert_eq!(numbers, vec!["SO-4", "SO-2", "SO-3", "SO-1"]);

    let acme_that_day = OrderFilter::default().with_keyword(acme.to_uppercase()).on_date(target);
    let page = repo.search_page(&acme_that_day, Pagination::new(1, 1)?).await?;
    assert_eq!(page.total, 2);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].number, "SO-2");

    let past_end = repo.search(&acme_that_day, Pagination::new(3, 1)?).await?;
    assert!(past_end.is_empty());

    let that_day = repo
        .search(&OrderFilter::default().on_date(target), Pagination::new(1, 1000)?)
        .await?;
    let ours = that_day.iter().filter(|h| h.customer.ends_with(&t)).count();
    assert_eq!(ours, 3);
    Ok(())
}

#[tokio::test]
async fn keyword_wildcards_do_not_widen_the_match() -> anyhow::Result<()> {
    let Some(repo) = repository().await? else {
        return Ok(());
    };
    let t = tag();
    repo.create(draft("SO-1", &format!("100% Cotton {t}"), at(day(2024, 2, 1), 8), vec![]))
        .await?;
    repo.create(draft("SO-2", &format!("1000 Cotton {t}"), at(day(2024, 2, 1), 8), vec![]))
        .await?;

    let filter = OrderFilter::default().with_keyword(format!("100% Cotton {t}"));
    assert_eq!(repo.search_count(&filter).await?, 1);
    Ok(())
}

#[tokio::test]
async fn search_with_items_returns_full_aggregates() -> anyhow::Result<()> {
    let Some(repo) = repository().await? else {
        return Ok(());
    };
    let customer = format!("Acme {}", tag());

    let older = repo
        .create(draft("SO-1", &customer, at(day(2024, 4, 1), 8), vec![]))
        .await?
        .expect("order row written");
    let newer = repo
        .create(draft(
            "SO-2",
            &customer,
            at(day(2024, 4, 2), 8),
            vec![item("Widget", 1, "3.00"), item("Gadget", 2, "4.50")],
        ))
        .await?
        .expect("order row written");

    let orders = repo
        .search_with_items(&OrderFilter::default().with_keyword(&customer), Pagination::new(1, 10)?)
        .await?;
    assert_eq!(orders, vec![newer, older]);
    Ok(())
}
