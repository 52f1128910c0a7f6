mod common;

use chrono::Utc;
use uuid::Uuid;

use stockroom_db::Ledger;
use stockroom_panel::bot::handlers::{UNREGISTERED_CHAT, callback, message};
use stockroom_panel::bot::keyboards::{APPROVE_LABEL, approve_data, reply_chat_data};
use stockroom_panel::bot::{BotEvent, dispatch};
use stockroom_panel::services::notification_service::NotificationParseMode;

use common::*;

async fn register(h: &Harness) {
    dispatch(&h.state, BotEvent::from_message(ADMIN_CHAT, "/start", None)).await;
}

#[tokio::test]
async fn start_registers_once() {
    let h = harness();
    register(&h).await;
    register(&h).await;

    let replies = h.notifier.sent_to(ADMIN_CHAT).await;
    assert_eq!(replies[0].text, message::REGISTERED);
    assert_eq!(replies[1].text, message::ALREADY_REGISTERED);
    assert_eq!(h.ledger.admin_targets().await.unwrap().len(), 1);
}

#[tokio::test]
async fn registration_passphrase_is_enforced() {
    let mut config = config();
    config.admin_registration_secret = Some("open-sesame".to_string());
    let h = harness_with(config);

    dispatch(&h.state, BotEvent::from_message(ADMIN_CHAT, "/start guess", None)).await;
    assert!(!h.ledger.is_admin(ADMIN_CHAT).await.unwrap());

    dispatch(&h.state, BotEvent::from_message(ADMIN_CHAT, "/start open-sesame", None)).await;
    assert!(h.ledger.is_admin(ADMIN_CHAT).await.unwrap());

    let replies = h.notifier.sent_to(ADMIN_CHAT).await;
    assert_eq!(replies[0].text, message::WRONG_SECRET);
    assert_eq!(replies[1].text, message::REGISTERED);
}

#[tokio::test]
async fn unregistered_chats_cannot_approve() {
    let h = harness();
    let p = product(1);
    h.ledger.insert_product(p.clone()).await;
    h.ledger.insert_unit(key_unit(p.id, "K", "1일", Utc::now())).await;
    let purchase = pending_purchase(&h.ledger, p.id, "홍길동", Some("1일")).await;

    dispatch(&h.state, BotEvent::from_callback(777, &approve_data(purchase.id))).await;

    assert_eq!(h.notifier.sent_to(777).await[0].text, UNREGISTERED_CHAT);
    assert_eq!(h.ledger.purchase(purchase.id).await.unwrap().unwrap().status, "pending");
}

#[tokio::test]
async fn list_shows_every_pending_order() {
    let h = harness();
    register(&h).await;
    let p = product(5);
    h.ledger.insert_product(p.clone()).await;
    pending_purchase(&h.ledger, p.id, "홍길동", None).await;
    pending_purchase(&h.ledger, p.id, "김철수", None).await;

    dispatch(&h.state, BotEvent::from_message(ADMIN_CHAT, "/전체", None)).await;

    let replies = h.notifier.sent_to(ADMIN_CHAT).await;
    let list = replies.last().unwrap();
    assert_eq!(list.parse_mode, NotificationParseMode::Html);
    assert!(list.text.starts_with("📋 <b>입금 대기 목록</b>"));
    assert!(list.text.contains("1. "));
    assert!(list.text.contains("2. "));
    assert!(list.text.contains("홍길동 (국민은행)"));
    assert!(list.text.contains("💰 7,500원 | Valor Loader"));
}

#[tokio::test]
async fn empty_list_says_so() {
    let h = harness();
    register(&h).await;
    dispatch(&h.state, BotEvent::from_message(ADMIN_CHAT, "/전체", None)).await;
    assert_eq!(h.notifier.sent_to(ADMIN_CHAT).await.last().unwrap().text, message::NO_PENDING);
}

#[tokio::test]
async fn search_matches_depositor_case_insensitively() {
    let h = harness();
    register(&h).await;
    let p = product(5);
    h.ledger.insert_product(p.clone()).await;
    let john = pending_purchase(&h.ledger, p.id, "JohnKim", Some("1일")).await;
    pending_purchase(&h.ledger, p.id, "홍길동", Some("1일")).await;

    dispatch(&h.state, BotEvent::from_message(ADMIN_CHAT, "johnkim 입금했습니다", None)).await;

    let replies = h.notifier.sent_to(ADMIN_CHAT).await;
    let found = replies.last().unwrap();
    assert!(found.text.contains("JohnKim"));
    assert_eq!(found.buttons, vec![(APPROVE_LABEL.to_string(), approve_data(john.id))]);
}

#[tokio::test]
async fn search_ignores_the_bank_segment() {
    let h = harness();
    register(&h).await;
    let p = product(5);
    h.ledger.insert_product(p.clone()).await;
    pending_purchase(&h.ledger, p.id, "홍길동", None).await;

    dispatch(&h.state, BotEvent::from_message(ADMIN_CHAT, "국민은행", None)).await;

    let last = h.notifier.sent_to(ADMIN_CHAT).await.pop().unwrap();
    assert_eq!(last.text, "❌ '국민은행' 님으로 대기 중인 주문이 없습니다.");
    assert!(last.buttons.is_empty());
}

#[tokio::test]
async fn approve_button_completes_the_order() {
    let h = harness();
    register(&h).await;
    let p = product(2);
    h.ledger.insert_product(p.clone()).await;
    h.ledger.insert_unit(key_unit(p.id, "KEY-1", "1일", Utc::now())).await;
    let purchase = pending_purchase(&h.ledger, p.id, "홍길동", Some("1일")).await;

    dispatch(&h.state, BotEvent::from_callback(ADMIN_CHAT, &approve_data(purchase.id))).await;
    let confirmation = h.notifier.sent_to(ADMIN_CHAT).await.pop().unwrap();
    assert!(confirmation.text.contains("승인 완료"));
    assert!(confirmation.text.contains("홍*동"));
    assert!(confirmation.text.contains("🔑 라이선스 키 (1일)"));
    assert!(confirmation.text.contains("7,500원"));
    assert_eq!(h.ledger.purchase(purchase.id).await.unwrap().unwrap().status, "completed");

    dispatch(&h.state, BotEvent::from_callback(ADMIN_CHAT, &approve_data(purchase.id))).await;
    let again = h.notifier.sent_to(ADMIN_CHAT).await.pop().unwrap();
    assert_eq!(again.text, callback::ALREADY_APPROVED);
}

#[tokio::test]
async fn exhausted_stock_is_reported_in_chat() {
    let h = harness();
    register(&h).await;
    let p = product(0);
    h.ledger.insert_product(p.clone()).await;
    let purchase = pending_purchase(&h.ledger, p.id, "홍길동", Some("1일")).await;

    dispatch(&h.state, BotEvent::from_callback(ADMIN_CHAT, &approve_data(purchase.id))).await;

    let reply = h.notifier.sent_to(ADMIN_CHAT).await.pop().unwrap();
    assert!(reply.text.contains("재고가 부족하여 승인할 수 없습니다."));
    assert_eq!(h.ledger.purchase(purchase.id).await.unwrap().unwrap().status, "pending");
}

#[tokio::test]
async fn web_and_bot_approvals_agree_on_duration_filtering() {
    let h = harness();
    register(&h).await;
    let p = product(2);
    h.ledger.insert_product(p.clone()).await;
    h.ledger.insert_unit(key_unit(p.id, "SEVEN", "7일", Utc::now())).await;
    let via_bot = pending_purchase(&h.ledger, p.id, "가나", Some("30일")).await;
    let via_web = pending_purchase(&h.ledger, p.id, "다라", Some("30일")).await;

    dispatch(&h.state, BotEvent::from_callback(ADMIN_CHAT, &approve_data(via_bot.id))).await;
    let web = h.state.fulfillment.approve(via_web.id).await;

    assert!(web.is_err());
    assert_eq!(h.ledger.purchase(via_bot.id).await.unwrap().unwrap().status, "pending");
    assert_eq!(h.ledger.purchase(via_web.id).await.unwrap().unwrap().status, "pending");
}

#[tokio::test]
async fn reply_prompt_round_trip_stores_admin_message() {
    let h = harness();
    register(&h).await;
    let buyer = Uuid::new_v4();

    dispatch(&h.state, BotEvent::from_callback(ADMIN_CHAT, &reply_chat_data(buyer))).await;
    let prompt = h.notifier.sent_to(ADMIN_CHAT).await.pop().unwrap();
    assert!(prompt.force_reply);
    assert!(prompt.text.contains(&format!("[user:{}]", buyer)));

    dispatch(
        &h.state,
        BotEvent::from_message(ADMIN_CHAT, "환불 처리되었습니다", Some(&prompt.text)),
    )
    .await;

    let messages = h.ledger.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].user_id, buyer);
    assert_eq!(messages[0].content, "환불 처리되었습니다");
    assert!(messages[0].is_admin);
}

#[tokio::test]
async fn buyer_inquiries_reach_every_admin_with_a_reply_button() {
    let h = harness();
    h.ledger.register_admin(1).await.unwrap();
    h.ledger.register_admin(2).await.unwrap();
    let buyer = Uuid::new_v4();

    let sent = h.state.chat.forward_to_admins(buyer, "키가 안 돼요", Utc::now()).await.unwrap();

    assert_eq!(sent, 2);
    for chat in [1, 2] {
        let payload = h.notifier.sent_to(chat).await.pop().unwrap();
        assert_eq!(payload.buttons[0].1, reply_chat_data(buyer));
        assert!(payload.text.contains("키가 안 돼요"));
    }
}
