/// Readme shipped when a product has no template of its own.
pub const DEFAULT_TEMPLATE: &str = "구매해 주셔서 감사합니다.

--상품 내역 안내--
귀하의 구매 상품: {product_name}
구매 상품 보유 가능 기간: {duration}
인증키: {license_key}
구매 인증: {order_id}

--상품 사용방법--
1. 동봉된 프로그램을 실행한 뒤 위 \"인증키\"를 입력하십시오.
2. 인증키는 다른 사람과 공유할 수 없으며 한 PC에서만 사용할 수 있습니다.
3. 문제가 발생하면 1:1 문의로 연락 바랍니다.";

/// Order id written into readmes when no completed purchase can be found.
pub const UNKNOWN_ORDER_ID: &str = "UNKNOWN";

#[derive(Debug, Clone)]
pub struct ReadmeFields<'a> {
    pub product_name: &'a str,
    pub license_key: &'a str,
    pub duration: &'a str,
    pub order_id: &'a str,
}

impl ReadmeFields<'_> {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "product_name" => Some(self.product_name),
            "license_key" => Some(self.license_key),
            "duration" => Some(self.duration),
            "order_id" => Some(self.order_id),
            _ => None,
        }
    }
}

/// Substitutes the four known placeholders; anything else stays verbatim.
///
/// Substitution is a single left-to-right pass, so values that themselves
/// contain `{...}` are never expanded a second time.
pub fn render(template: &str, fields: &ReadmeFields<'_>) -> String {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let replaced = tail
            .find('}')
            .and_then(|close| fields.lookup(&tail[1..close]).map(|value| (close, value)));
        match replaced {
            Some((close, value)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Renders `template` or the built-in default when it is missing or blank.
pub fn render_or_default(template: Option<&str>, fields: &ReadmeFields<'_>) -> String {
    let template = template
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(DEFAULT_TEMPLATE);
    render(template, fields)
}
