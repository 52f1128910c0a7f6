use tracing::{error, info, warn};
use uuid::Uuid;

use stockroom_db::models::purchase::PendingPurchase;

use crate::AppState;
use crate::bot::keyboards;
use crate::bot::utils::{escape_html, format_won};
use crate::services::notification_service::NotificationPayload;

pub const REGISTERED: &str = "✅ 관리자 알림이 등록되었습니다.";
pub const ALREADY_REGISTERED: &str = "ℹ️ 이미 등록된 관리자 채팅입니다.";
pub const WRONG_SECRET: &str = "⛔ 등록 코드가 올바르지 않습니다.";
pub const NO_PENDING: &str = "현재 대기 중인 입금 내역이 없습니다.";

pub async fn register(state: &AppState, chat_id: i64, secret: Option<&str>) {
    if let Some(expected) = state.config.admin_registration_secret.as_deref() {
        if secret != Some(expected) {
            warn!("Admin registration refused for chat {}", chat_id);
            state.notifications.reply(chat_id, NotificationPayload::plain(WRONG_SECRET)).await;
            return;
        }
    }

    let text = match state.ledger.register_admin(chat_id).await {
        Ok(true) => {
            info!("Registered admin chat {}", chat_id);
            REGISTERED.to_string()
        }
        Ok(false) => ALREADY_REGISTERED.to_string(),
        Err(e) => {
            error!("Failed to register admin chat {}: {}", chat_id, e);
            format!("❌ 등록 실패: {}", e)
        }
    };
    state.notifications.reply(chat_id, NotificationPayload::plain(text)).await;
}

pub async fn list_pending(state: &AppState, chat_id: i64) {
    let pending = match state.ledger.pending_purchases().await {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to list pending purchases: {}", e);
            state
                .notifications
                .reply(chat_id, NotificationPayload::plain(format!("❌ 목록 조회 실패: {}", e)))
                .await;
            return;
        }
    };

    if pending.is_empty() {
        state.notifications.reply(chat_id, NotificationPayload::plain(NO_PENDING)).await;
        return;
    }

    state
        .notifications
        .reply(chat_id, NotificationPayload::html(pending_summary(&pending)))
        .await;
}

pub fn pending_summary(pending: &[PendingPurchase]) -> String {
    let mut text = String::from("📋 <b>입금 대기 목록</b>\n\n");
    for (i, row) in pending.iter().enumerate() {
        let payment = row.purchase.payment();
        let depositor = payment.as_ref().and_then(|p| p.depositor()).unwrap_or("-");
        let bank = payment.as_ref().and_then(|p| p.bank()).unwrap_or("-");
        text.push_str(&format!(
            "{}. {} ({})\n   💰 {}원 | {}\n",
            i + 1,
            escape_html(depositor),
            escape_html(bank),
            format_won(row.purchase.amount),
            escape_html(&row.product_title)
        ));
    }
    text.push_str("\n이름을 입력하면 승인 메뉴가 뜹니다.");
    text
}

pub async fn search(state: &AppState, chat_id: i64, depositor: &str) {
    let matches = match state.ledger.pending_by_depositor(depositor).await {
        Ok(m) => m,
        Err(e) => {
            error!("Depositor search for '{}' failed: {}", depositor, e);
            state
                .notifications
                .reply(chat_id, NotificationPayload::plain(format!("❌ 검색 실패: {}", e)))
                .await;
            return;
        }
    };

    if matches.is_empty() {
        state
            .notifications
            .reply(
                chat_id,
                NotificationPayload::plain(format!("❌ '{}' 님으로 대기 중인 주문이 없습니다.", depositor)),
            )
            .await;
        return;
    }

    for row in &matches {
        let payment = row.purchase.payment();
        let name = payment.as_ref().and_then(|p| p.depositor()).unwrap_or(depositor);
        let bank = payment.as_ref().and_then(|p| p.bank()).unwrap_or("-");
        let text = format!(
            "🔎 <b>입금 확인 요청</b>\n\n👤 {}\n🏦 {}\n💰 {}원\n📦 {}{}",
            escape_html(name),
            escape_html(bank),
            format_won(row.purchase.amount),
            escape_html(&row.product_title),
            row.purchase
                .duration
                .as_deref()
                .map(|d| format!(" ({})", escape_html(d)))
                .unwrap_or_default()
        );
        let payload = NotificationPayload::html(text)
            .with_button(keyboards::APPROVE_LABEL, keyboards::approve_data(row.purchase.id));
        state.notifications.reply(chat_id, payload).await;
    }
}

pub async fn admin_reply(state: &AppState, chat_id: i64, user_id: Uuid, content: &str) {
    let text = match state.chat.admin_reply(user_id, content).await {
        Ok(_) => "✅ 답장을 전송했습니다.".to_string(),
        Err(e) => {
            error!("Failed to store admin reply for {}: {}", user_id, e);
            format!("❌ 답장 저장 실패: {}", e)
        }
    };
    state.notifications.reply(chat_id, NotificationPayload::plain(text)).await;
}
