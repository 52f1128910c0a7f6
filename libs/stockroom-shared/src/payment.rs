use std::fmt;
use std::str::FromStr;

const BANK_TRANSFER_PREFIX: &str = "bank_transfer";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PaymentMethodError {
    #[error("unknown payment method: {0}")]
    Unknown(String),
    #[error("bank transfer requires a bank and a depositor name")]
    MissingDepositor,
    #[error("bank and depositor names must not contain ':'")]
    Delimiter,
}

/// Payment rail recorded on a purchase as a colon-delimited tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    BankTransfer { bank: String, depositor: String },
    Bitcoin,
    Litecoin,
    Tron,
    Coin,
}

impl PaymentMethod {
    pub fn bank_transfer(bank: &str, depositor: &str) -> Result<Self, PaymentMethodError> {
        let bank = bank.trim();
        let depositor = depositor.trim();
        if bank.is_empty() || depositor.is_empty() {
            return Err(PaymentMethodError::MissingDepositor);
        }
        if bank.contains(':') || depositor.contains(':') {
            return Err(PaymentMethodError::Delimiter);
        }
        Ok(Self::BankTransfer {
            bank: bank.to_string(),
            depositor: depositor.to_string(),
        })
    }

    pub fn depositor(&self) -> Option<&str> {
        match self {
            Self::BankTransfer { depositor, .. } => Some(depositor),
            _ => None,
        }
    }

    pub fn bank(&self) -> Option<&str> {
        match self {
            Self::BankTransfer { bank, .. } => Some(bank),
            _ => None,
        }
    }

    /// Rails that need an operator to confirm the payment before fulfillment.
    pub fn needs_manual_approval(&self) -> bool {
        !matches!(self, Self::Coin)
    }

    /// Case-insensitive substring match against the depositor segment.
    pub fn depositor_matches(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return false;
        }
        self.depositor()
            .map(|d| d.to_lowercase().contains(&query.to_lowercase()))
            .unwrap_or(false)
    }
}

impl FromStr for PaymentMethod {
    type Err = PaymentMethodError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "bitcoin" => Ok(Self::Bitcoin),
            "litecoin" => Ok(Self::Litecoin),
            "tron" => Ok(Self::Tron),
            "coin" => Ok(Self::Coin),
            other => {
                let mut parts = other.splitn(3, ':');
                if parts.next() != Some(BANK_TRANSFER_PREFIX) {
                    return Err(PaymentMethodError::Unknown(other.to_string()));
                }
                match (parts.next(), parts.next()) {
                    (Some(bank), Some(depositor)) if !bank.is_empty() && !depositor.is_empty() => {
                        Ok(Self::BankTransfer {
                            bank: bank.to_string(),
                            depositor: depositor.to_string(),
                        })
                    }
                    _ => Err(PaymentMethodError::MissingDepositor),
                }
            }
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BankTransfer { bank, depositor } => {
                write!(f, "{}:{}:{}", BANK_TRANSFER_PREFIX, bank, depositor)
            }
            Self::Bitcoin => f.write_str("bitcoin"),
            Self::Litecoin => f.write_str("litecoin"),
            Self::Tron => f.write_str("tron"),
            Self::Coin => f.write_str("coin"),
        }
    }
}

/// Hides the middle of a name: `홍길동` -> `홍*동`, `김철` -> `김*`.
pub fn mask_name(name: &str) -> String {
    let chars: Vec<char> = name.trim().chars().collect();
    match chars.len() {
        0 => String::new(),
        1 => "*".to_string(),
        2 => format!("{}*", chars[0]),
        n => {
            let mut masked = String::new();
            masked.push(chars[0]);
            masked.push_str(&"*".repeat(n - 2));
            masked.push(chars[n - 1]);
            masked
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bank_transfer_tag() {
        let method: PaymentMethod = "bank_transfer:국민은행:홍길동".parse().unwrap();
        assert_eq!(method.bank(), Some("국민은행"));
        assert_eq!(method.depositor(), Some("홍길동"));
        assert_eq!(method.to_string(), "bank_transfer:국민은행:홍길동");
    }

    #[test]
    fn rejects_unknown_and_incomplete_tags() {
        assert!(matches!(
            "paypal".parse::<PaymentMethod>(),
            Err(PaymentMethodError::Unknown(_))
        ));
        assert_eq!(
            "bank_transfer:국민은행".parse::<PaymentMethod>(),
            Err(PaymentMethodError::MissingDepositor)
        );
    }

    #[test]
    fn constructor_refuses_colons() {
        assert_eq!(
            PaymentMethod::bank_transfer("신한", "a:b"),
            Err(PaymentMethodError::Delimiter)
        );
    }

    #[test]
    fn depositor_match_is_case_insensitive_and_scoped() {
        let method: PaymentMethod = "bank_transfer:KB:JohnDoe".parse().unwrap();
        assert!(method.depositor_matches("johndoe"));
        assert!(method.depositor_matches("DOE"));
        assert!(!method.depositor_matches("KB"));
        assert!(!PaymentMethod::Coin.depositor_matches("coin"));
    }

    #[test]
    fn masks_names_by_length() {
        assert_eq!(mask_name("홍길동"), "홍*동");
        assert_eq!(mask_name("김철"), "김*");
        assert_eq!(mask_name("A"), "*");
        assert_eq!(mask_name("Johnny"), "J****y");
    }
}
