use super::normalize::fold;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabKind {
    /// One month's expenses and incomes; carries the month number.
    MonthlyLedger(u32),
    Installments,
    Debtors,
    Recurring,
    Summary,
}

// (month, abbreviations, full names) in English and Portuguese
const MONTHS: [(u32, &[&str], &[&str]); 12] = [
    (1, &["jan"], &["january", "janeiro"]),
    (2, &["feb", "fev"], &["february", "fevereiro"]),
    (3, &["mar"], &["march", "marco"]),
    (4, &["apr", "abr"], &["april", "abril"]),
    (5, &["may", "mai"], &["maio"]),
    (6, &["jun"], &["june", "junho"]),
    (7, &["jul"], &["july", "julho"]),
    (8, &["aug", "ago"], &["august", "agosto"]),
    (9, &["sep", "set"], &["september", "setembro"]),
    (10, &["oct", "out"], &["october", "outubro"]),
    (11, &["nov"], &["november", "novembro"]),
    (12, &["dec", "dez"], &["december", "dezembro"]),
];

/// Month number for a folded full month name.
pub fn full_month_number(folded: &str) -> Option<u32> {
    MONTHS
        .iter()
        .find(|(_, _, full)| full.contains(&folded))
        .map(|(n, _, _)| *n)
        .or_else(|| (folded == "may").then_some(5))
}

/// Month number for a folded abbreviation or full name.
pub fn month_number(folded: &str) -> Option<u32> {
    MONTHS
        .iter()
        .find(|(_, abbrevs, _)| abbrevs.contains(&folded))
        .map(|(n, _, _)| *n)
        .or_else(|| full_month_number(folded))
}

/// Route a worksheet by name. `None` means the tab is skipped.
pub fn classify_tab(name: &str) -> Option<TabKind> {
    let folded = fold(name);
    let first_word = folded
        .split(|c: char| !c.is_alphabetic())
        .find(|w| !w.is_empty())
        .unwrap_or("");

    if let Some(month) = month_number(first_word) {
        return Some(TabKind::MonthlyLedger(month));
    }
    if ["installment", "parcel", "plan"].iter().any(|k| folded.contains(k)) {
        return Some(TabKind::Installments);
    }
    if folded.contains("debtor") || folded.contains("devedor") {
        return Some(TabKind::Debtors);
    }
    if ["fixed", "fixo", "fixa"].iter().any(|k| folded.contains(k)) {
        return Some(TabKind::Recurring);
    }
    if matches!(folded.as_str(), "summary" | "geral" | "resumo") {
        return Some(TabKind::Summary);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_tabs() {
        assert_eq!(classify_tab("JAN"), Some(TabKind::MonthlyLedger(1)));
        assert_eq!(classify_tab("Fevereiro"), Some(TabKind::MonthlyLedger(2)));
        assert_eq!(classify_tab("Março"), Some(TabKind::MonthlyLedger(3)));
        assert_eq!(classify_tab("dez 2025"), Some(TabKind::MonthlyLedger(12)));
        assert_eq!(classify_tab("September"), Some(TabKind::MonthlyLedger(9)));
    }

    #[test]
    fn test_other_kinds() {
        assert_eq!(classify_tab("Parcelamentos"), Some(TabKind::Installments));
        assert_eq!(classify_tab("Installment plans"), Some(TabKind::Installments));
        assert_eq!(classify_tab("Devedores"), Some(TabKind::Debtors));
        assert_eq!(classify_tab("Gastos Fixos"), Some(TabKind::Recurring));
        assert_eq!(classify_tab("GERAL"), Some(TabKind::Summary));
        assert_eq!(classify_tab("Summary"), Some(TabKind::Summary));
    }

    #[test]
    fn test_unknown_tabs_are_skipped() {
        assert_eq!(classify_tab("Capa"), None);
        assert_eq!(classify_tab("Summary 2024"), None);
        assert_eq!(classify_tab(""), None);
    }

    #[test]
    fn test_full_month_number() {
        assert_eq!(full_month_number("janeiro"), Some(1));
        assert_eq!(full_month_number("may"), Some(5));
        assert_eq!(full_month_number("jan"), None);
    }
}
