use crate::models::CostCenter;

/// Lower-case, strip accents, collapse whitespace. Used for every header and vocabulary match.
pub fn fold(text: &str) -> String {
    let lowered: String = text.to_lowercase().chars().map(strip_accent).collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Payment method / institution
// ---------------------------------------------------------------------------

pub const CREDIT_CARD: &str = "Credit Card";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentMethod {
    pub method: String,
    pub institution: Option<String>,
}

// (substring, method, institution). Methods first so "nubank debito" is a debit.
const PAYMENT_TABLE: &[(&str, &str, Option<&str>)] = &[
    ("pix", "Pix", None),
    ("debito", "Debit Card", None),
    ("debit", "Debit Card", None),
    ("dinheiro", "Cash", None),
    ("especie", "Cash", None),
    ("cash", "Cash", None),
    ("transferencia", "Transfer", None),
    ("transfer", "Transfer", None),
    ("boleto", "Bank Slip", None),
    ("bank slip", "Bank Slip", None),
    ("mercado pago", CREDIT_CARD, Some("Mercado Pago")),
    ("mercado livre", CREDIT_CARD, Some("Mercado Pago")),
    ("nubank", CREDIT_CARD, Some("Nubank")),
    ("itau", CREDIT_CARD, Some("Itaú")),
    ("bradesco", CREDIT_CARD, Some("Bradesco")),
    ("santander", CREDIT_CARD, Some("Santander")),
    ("banco do brasil", CREDIT_CARD, Some("Banco do Brasil")),
    ("banco inter", CREDIT_CARD, Some("Inter")),
    ("caixa", CREDIT_CARD, Some("Caixa")),
    ("c6", CREDIT_CARD, Some("C6 Bank")),
    ("picpay", CREDIT_CARD, Some("PicPay")),
    ("credito", CREDIT_CARD, None),
    ("credit", CREDIT_CARD, None),
];

const BANK_SHAPED: &[&str] = &["bank", "banco", "cartao", "card"];

pub fn normalize_payment(raw: &str) -> Option<PaymentMethod> {
    let original = raw.trim();
    if original.is_empty() {
        return None;
    }
    let folded = fold(original);

    if let Some((_, method, institution)) = PAYMENT_TABLE
        .iter()
        .find(|(needle, _, _)| folded.contains(needle))
    {
        return Some(PaymentMethod {
            method: method.to_string(),
            institution: institution.map(str::to_string),
        });
    }
    if folded == "inter" || BANK_SHAPED.iter().any(|b| folded.contains(b)) {
        return Some(PaymentMethod {
            method: CREDIT_CARD.to_string(),
            institution: Some(original.to_string()),
        });
    }
    Some(PaymentMethod {
        method: original.to_string(),
        institution: None,
    })
}

const CARD_BRANDS: &[(&str, &str)] = &[
    ("visa", "Visa"),
    ("master", "Mastercard"),
    ("amex", "American Express"),
    ("american express", "American Express"),
    ("hipercard", "Hipercard"),
    ("elo", "Elo"),
];

pub fn detect_card_brand(raw: &str) -> Option<String> {
    let folded = fold(raw);
    let words: Vec<&str> = folded.split(|c: char| !c.is_alphanumeric()).collect();
    CARD_BRANDS
        .iter()
        .find(|(needle, _)| {
            // "elo" is too short for substring matching
            if needle.len() <= 3 {
                words.contains(needle)
            } else {
                folded.contains(needle)
            }
        })
        .map(|(_, brand)| brand.to_string())
}

// ---------------------------------------------------------------------------
// Cost center
// ---------------------------------------------------------------------------

// Order matters: the negated forms contain the bare "essential".
const COST_CENTER_TABLE: &[(&str, CostCenter)] = &[
    ("nao essencial", CostCenter::NonEssential),
    ("nao-essencial", CostCenter::NonEssential),
    ("non-essential", CostCenter::NonEssential),
    ("non essential", CostCenter::NonEssential),
    ("nonessential", CostCenter::NonEssential),
    ("essencial", CostCenter::Essential),
    ("essential", CostCenter::Essential),
    ("gasto fixo", CostCenter::FixedExpense),
    ("fixed", CostCenter::FixedExpense),
    ("fixo", CostCenter::FixedExpense),
    ("fixa", CostCenter::FixedExpense),
];

pub fn normalize_cost_center(raw: &str) -> Option<CostCenter> {
    let folded = fold(raw);
    if folded.is_empty() {
        return None;
    }
    COST_CENTER_TABLE
        .iter()
        .find(|(needle, _)| folded.contains(needle))
        .map(|(_, center)| *center)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold() {
        assert_eq!(fold("  Descrição  "), "descricao");
        assert_eq!(fold("Centro   de CUSTO"), "centro de custo");
        assert_eq!(fold("Não Essencial"), "nao essencial");
    }

    #[test]
    fn test_named_bank_is_credit_card() {
        let p = normalize_payment("Nubank").unwrap();
        assert_eq!(p.method, CREDIT_CARD);
        assert_eq!(p.institution.as_deref(), Some("Nubank"));
        let p = normalize_payment("cartão Itaú").unwrap();
        assert_eq!(p.institution.as_deref(), Some("Itaú"));
    }

    #[test]
    fn test_methods_without_institution() {
        assert_eq!(normalize_payment("PIX").unwrap().method, "Pix");
        assert_eq!(normalize_payment("Débito").unwrap().method, "Debit Card");
        assert_eq!(normalize_payment("dinheiro").unwrap().method, "Cash");
        assert_eq!(normalize_payment("Transferência").unwrap().method, "Transfer");
        assert_eq!(normalize_payment("boleto").unwrap().method, "Bank Slip");
        assert!(normalize_payment("pix").unwrap().institution.is_none());
    }

    #[test]
    fn test_bank_shaped_text_defaults_to_credit_card() {
        let p = normalize_payment("Banco Original").unwrap();
        assert_eq!(p.method, CREDIT_CARD);
        assert_eq!(p.institution.as_deref(), Some("Banco Original"));
    }

    #[test]
    fn test_unknown_payment_passes_through() {
        let p = normalize_payment("Vale Refeição").unwrap();
        assert_eq!(p.method, "Vale Refeição");
        assert!(p.institution.is_none());
        assert!(normalize_payment("   ").is_none());
    }

    #[test]
    fn test_card_brand() {
        assert_eq!(detect_card_brand("Nubank Mastercard").as_deref(), Some("Mastercard"));
        assert_eq!(detect_card_brand("Caixa ELO").as_deref(), Some("Elo"));
        assert_eq!(detect_card_brand("Mercado Livre"), None);
    }

    #[test]
    fn test_non_essential_checked_before_essential() {
        assert_eq!(normalize_cost_center("Não essencial"), Some(CostCenter::NonEssential));
        assert_eq!(normalize_cost_center("Non-essential"), Some(CostCenter::NonEssential));
        assert_eq!(normalize_cost_center("Essencial"), Some(CostCenter::Essential));
        assert_eq!(normalize_cost_center("Gasto Fixo"), Some(CostCenter::FixedExpense));
        assert_eq!(normalize_cost_center("Lazer"), None);
        assert_eq!(normalize_cost_center(""), None);
    }
}
