mod common;

use std::io::{Cursor, Read};

use chrono::{Duration, Utc};
use uuid::Uuid;

use stockroom_db::Ledger;
use stockroom_panel::services::fulfillment_service::{ApprovalOutcome, FulfillmentError};

use common::*;

#[tokio::test]
async fn retention_respects_the_72_hour_boundary() {
    let h = harness();
    let p = product(0);
    h.ledger.insert_product(p.clone()).await;
    let now = Utc::now();
    let buyer = Uuid::new_v4();

    let fresh = h
        .ledger
        .insert_unit(sold(
            file_unit(p.id, "stocks/fresh.zip", now - Duration::days(5)),
            buyer,
            now - Duration::hours(71) - Duration::minutes(59),
        ))
        .await;
    let stale = h
        .ledger
        .insert_unit(sold(
            file_unit(p.id, "stocks/stale.zip", now - Duration::days(5)),
            buyer,
            now - Duration::hours(72) - Duration::minutes(1),
        ))
        .await;
    h.storage.put("stocks/fresh.zip", b"fresh");
    h.storage.put("stocks/stale.zip", b"stale");

    let report = h.state.retention.sweep(now).await.unwrap();

    assert_eq!(report.deleted, 1);
    assert!(report.errors.is_empty());
    assert!(h.ledger.stock_unit(fresh.id).await.unwrap().is_some());
    assert!(h.ledger.stock_unit(stale.id).await.unwrap().is_none());
    assert!(h.storage.contains("stocks/fresh.zip"));
    assert!(!h.storage.contains("stocks/stale.zip"));
}

#[tokio::test]
async fn storage_failure_does_not_block_row_deletion() {
    let h = harness();
    let p = product(0);
    h.ledger.insert_product(p.clone()).await;
    let old = Utc::now() - Duration::hours(80);
    let buyer = Uuid::new_v4();

    let stuck = h
        .ledger
        .insert_unit(sold(file_unit(p.id, "stocks/stuck.zip", old), buyer, old))
        .await;
    let other = h
        .ledger
        .insert_unit(sold(file_unit(p.id, "stocks/other.zip", old), buyer, old))
        .await;
    h.storage.put("stocks/stuck.zip", b"x");
    h.storage.put("stocks/other.zip", b"y");
    h.storage.fail_removal_of("stocks/stuck.zip");

    let report = h.state.retention.sweep(Utc::now()).await.unwrap();

    assert_eq!(report.deleted, 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].id, stuck.id.to_string());
    assert!(h.ledger.stock_unit(stuck.id).await.unwrap().is_none());
    assert!(h.ledger.stock_unit(other.id).await.unwrap().is_none());
    assert!(h.storage.contains("stocks/stuck.zip"));
}

#[tokio::test]
async fn shared_deliverables_and_keys_survive_the_sweep() {
    let h = harness();
    let mut p = product(99999);
    p.file_url = Some(format!(
        "https://storage.test/storage/v1/object/public/{}/shared/all.zip",
        BUCKET
    ));
    h.ledger.insert_product(p.clone()).await;
    h.storage.put("shared/all.zip", b"shared");

    let purchase = pending_purchase(&h.ledger, p.id, "홍길동", None).await;
    h.state.fulfillment.approve(purchase.id).await.unwrap();

    let old = Utc::now() - Duration::days(10);
    let key = h
        .ledger
        .insert_unit(sold(key_unit(p.id, "KEY", "1일", old), Uuid::new_v4(), old))
        .await;

    let later = Utc::now() + Duration::days(30);
    let report = h.state.retention.sweep(later).await.unwrap();

    assert_eq!(report.scanned, 0);
    assert!(h.storage.contains("shared/all.zip"));
    assert!(h.ledger.stock_unit(key.id).await.unwrap().is_some());
    assert_eq!(h.ledger.units().await.len(), 2);
}

#[tokio::test]
async fn license_keys_are_delivered_as_a_built_package() {
    let h = harness();
    let mut p = product(1);
    p.base_path = Some("loaders/base_valor.exe".to_string());
    p.readme_template = Some("{product_name} / {license_key} / {duration} / {order_id} / {unknown}".to_string());
    h.ledger.insert_product(p.clone()).await;
    h.storage.put("loaders/base_valor.exe", b"MZ-loader");
    h.ledger.insert_unit(key_unit(p.id, "ABCD-1234", "30일", Utc::now())).await;

    let purchase = pending_purchase(&h.ledger, p.id, "홍길동", Some("30일")).await;
    let ApprovalOutcome::Completed { unit, .. } = h.state.fulfillment.approve(purchase.id).await.unwrap() else {
        panic!("expected a completed approval");
    };

    let url = h.state.delivery.link_for_stock(purchase.user_id, unit.id).await.unwrap();
    assert!(url.starts_with("memory://product-files/temp/"));
    assert!(url.ends_with("/valor.zip?expires_in=3600"));

    let temp_path = h
        .storage
        .paths()
        .into_iter()
        .find(|p| p.starts_with("temp/"))
        .unwrap();
    let bytes = h.storage.get(&temp_path).unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();

    let mut loader = Vec::new();
    archive.by_name("valor.exe").unwrap().read_to_end(&mut loader).unwrap();
    assert_eq!(loader, b"MZ-loader");

    let mut readme = String::new();
    archive.by_name("readme.txt").unwrap().read_to_string(&mut readme).unwrap();
    assert_eq!(
        readme,
        format!("Valor Loader / ABCD-1234 / 30일 / {} / {{unknown}}", purchase.id)
    );
}

#[tokio::test]
async fn package_without_loader_is_a_configuration_error() {
    let h = harness();
    let p = product(1);
    h.ledger.insert_product(p.clone()).await;
    h.ledger.insert_unit(key_unit(p.id, "KEY", "1일", Utc::now())).await;
    let purchase = pending_purchase(&h.ledger, p.id, "홍길동", Some("1일")).await;
    let ApprovalOutcome::Completed { unit, .. } = h.state.fulfillment.approve(purchase.id).await.unwrap() else {
        panic!("expected a completed approval");
    };

    let err = h.state.delivery.link_for_stock(purchase.user_id, unit.id).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::Configuration(_)));
}

#[tokio::test]
async fn delivery_refuses_units_of_other_buyers() {
    let h = harness();
    let p = product(0);
    h.ledger.insert_product(p.clone()).await;
    let owner = Uuid::new_v4();
    let unit = h
        .ledger
        .insert_unit(sold(file_unit(p.id, "stocks/mine.zip", Utc::now()), owner, Utc::now()))
        .await;

    let err = h.state.delivery.link_for_stock(Uuid::new_v4(), unit.id).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::NotFound));

    let url = h.state.delivery.link_for_stock(owner, unit.id).await.unwrap();
    assert_eq!(url, "memory://product-files/stocks/mine.zip?expires_in=3600");
}

#[tokio::test]
async fn legacy_delivery_requires_a_completed_purchase() {
    let h = harness();
    let p = product(1);
    h.ledger.insert_product(p.clone()).await;
    h.ledger
        .insert_unit(file_unit(p.id, "stocks/legacy.zip", Utc::now()))
        .await;
    let purchase = pending_purchase(&h.ledger, p.id, "홍길동", None).await;

    let err = h
        .state
        .delivery
        .link_for_purchase(purchase.user_id, purchase.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::NotFound));

    h.state.fulfillment.approve(purchase.id).await.unwrap();
    let url = h
        .state
        .delivery
        .link_for_purchase(purchase.user_id, purchase.id)
        .await
        .unwrap();
    assert_eq!(url, "memory://product-files/stocks/legacy.zip?expires_in=60");

    assert!(matches!(
        h.state
            .delivery
            .link_for_purchase(Uuid::new_v4(), purchase.id)
            .await
            .unwrap_err(),
        FulfillmentError::NotFound
    ));
}

#[tokio::test]
async fn signing_outage_is_a_link_generation_error() {
    let h = harness();
    let p = product(0);
    h.ledger.insert_product(p.clone()).await;
    let owner = Uuid::new_v4();
    let unit = h
        .ledger
        .insert_unit(sold(file_unit(p.id, "stocks/a.zip", Utc::now()), owner, Utc::now()))
        .await;
    h.storage.set_signing_down(true);

    let err = h.state.delivery.link_for_stock(owner, unit.id).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::LinkGeneration(_)));
}
