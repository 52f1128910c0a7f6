use tracing::{error, info};
use uuid::Uuid;

use stockroom_shared::payment::mask_name;

use crate::AppState;
use crate::bot::utils::{describe_unit, escape_html, format_won, user_marker};
use crate::services::fulfillment_service::{ApprovalOutcome, FulfillmentError};
use crate::services::notification_service::NotificationPayload;

pub const ALREADY_APPROVED: &str = "✅ 이미 승인된 주문입니다.";
pub const GONE: &str = "⚠️ 이미 처리되었거나 찾을 수 없는 주문입니다.";

pub async fn approve(state: &AppState, chat_id: i64, raw_id: &str) {
    let Ok(purchase_id) = Uuid::parse_str(raw_id) else {
        state.notifications.reply(chat_id, NotificationPayload::plain(GONE)).await;
        return;
    };

    info!("Bot approval of {} requested by chat {}", purchase_id, chat_id);
    let payload = match state.fulfillment.approve(purchase_id).await {
        Ok(outcome) => NotificationPayload::html(approval_text(&outcome)),
        Err(e) => {
            error!("Bot approval of {} failed: {}", purchase_id, e);
            NotificationPayload::plain(failure_text(&e))
        }
    };
    state.notifications.reply(chat_id, payload).await;
}

pub fn approval_text(outcome: &ApprovalOutcome) -> String {
    match outcome {
        ApprovalOutcome::AlreadyCompleted(_) => ALREADY_APPROVED.to_string(),
        ApprovalOutcome::Completed {
            purchase,
            product,
            unit,
            ..
        } => {
            let depositor = purchase
                .payment()
                .and_then(|p| p.depositor().map(mask_name))
                .unwrap_or_else(|| "-".to_string());
            format!(
                "✅ <b>승인 완료</b>\n\n👤 {}\n📦 {}\n{}\n💰 {}원",
                escape_html(&depositor),
                escape_html(&product.title),
                describe_unit(unit),
                format_won(purchase.amount)
            )
        }
    }
}

/// Operators see the underlying reason; they are the ones who act on it.
pub fn failure_text(err: &FulfillmentError) -> String {
    match err {
        FulfillmentError::NotFound | FulfillmentError::NotPending(_) => GONE.to_string(),
        FulfillmentError::StockExhausted => {
            format!("❌ {}\n재고를 추가한 뒤 다시 승인해 주세요.", err.public_message())
        }
        other => format!("❌ 승인 실패: {}", other),
    }
}

pub async fn reply_prompt(state: &AppState, chat_id: i64, raw_user: &str) {
    let Ok(user_id) = Uuid::parse_str(raw_user) else {
        state
            .notifications
            .reply(chat_id, NotificationPayload::plain("⚠️ 잘못된 사용자입니다."))
            .await;
        return;
    };

    let payload = NotificationPayload::plain(format!(
        "✉️ 이 메시지에 답장으로 내용을 입력하세요.\n{}",
        user_marker(user_id)
    ))
    .force_reply();
    state.notifications.reply(chat_id, payload).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_stock_keeps_the_reason() {
        let text = failure_text(&FulfillmentError::StockExhausted);
        assert!(text.contains("재고가 부족하여 승인할 수 없습니다."));
        assert_eq!(failure_text(&FulfillmentError::NotPending("rejected".into())), GONE);
        assert!(failure_text(&FulfillmentError::Configuration("no base_path".into())).contains("no base_path"));
    }
}
