use uuid::Uuid;

use stockroom_db::models::stock::{StockPayload, StockUnit};

const USER_MARKER_OPEN: &str = "[user:";

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// `149000` -> `149,000`
pub fn format_won(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if amount < 0 {
        out.insert(0, '-');
    }
    out
}

pub fn user_marker(user_id: Uuid) -> String {
    format!("{}{}]", USER_MARKER_OPEN, user_id)
}

/// Finds the buyer id embedded in a reply prompt.
pub fn extract_user_marker(text: &str) -> Option<Uuid> {
    let start = text.find(USER_MARKER_OPEN)? + USER_MARKER_OPEN.len();
    let rest = &text[start..];
    let end = rest.find(']')?;
    Uuid::parse_str(rest[..end].trim()).ok()
}

/// Short operator-facing description of what a sale delivered.
pub fn describe_unit(unit: &StockUnit) -> String {
    match unit.payload() {
        StockPayload::LicenseKey { duration, .. } => match duration {
            Some(d) => format!("🔑 라이선스 키 ({})", escape_html(d)),
            None => "🔑 라이선스 키".to_string(),
        },
        StockPayload::File { filename, .. } => {
            format!("📁 {}", escape_html(filename.unwrap_or("파일")))
        }
        StockPayload::Unlimited { filename, .. } => {
            format!("♾ 공용 파일 {}", escape_html(filename.unwrap_or("download.zip")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn won_amounts_are_grouped() {
        assert_eq!(format_won(0), "0");
        assert_eq!(format_won(7500), "7,500");
        assert_eq!(format_won(149000), "149,000");
        assert_eq!(format_won(1234567), "1,234,567");
    }

    #[test]
    fn user_marker_round_trips_through_prompt_text() {
        let id = Uuid::new_v4();
        let prompt = format!("✉️ 답장할 내용을 입력하세요.\n{}", user_marker(id));
        assert_eq!(extract_user_marker(&prompt), Some(id));
        assert_eq!(extract_user_marker("[user:nope]"), None);
        assert_eq!(extract_user_marker("no marker"), None);
    }
}
