//! Ordered classification tables for general filers.
//!
//! Rules are tried top to bottom; the first whose sections include the
//! line's section (an empty list means any section) and whose pattern
//! matches wins. More specific rules therefore come first.

use crate::chart_of_accounts::Section;
use crate::schema::StatementType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub field: &'static str,
    pub sections: &'static [Section],
    pub pattern: &'static str,
}

impl FieldRule {
    pub fn applies_to(&self, section: Section) -> bool {
        self.sections.is_empty() || self.sections.contains(&section)
    }
}

pub(crate) const fn rule(
    field: &'static str,
    sections: &'static [Section],
    pattern: &'static str,
) -> FieldRule {
    FieldRule {
        field,
        sections,
        pattern,
    }
}

pub(crate) const ANY: &[Section] = &[];
pub(crate) const CA: &[Section] = &[Section::CurrentAssets];
pub(crate) const NCA: &[Section] = &[Section::NonCurrentAssets];
pub(crate) const ASSETS: &[Section] = &[Section::CurrentAssets, Section::NonCurrentAssets];
pub(crate) const CL: &[Section] = &[Section::CurrentLiabilities];
pub(crate) const NCL: &[Section] = &[Section::NonCurrentLiabilities];
pub(crate) const LIABILITIES: &[Section] =
    &[Section::CurrentLiabilities, Section::NonCurrentLiabilities];
pub(crate) const EQUITY: &[Section] = &[Section::StockholdersEquity];
const NCL_OR_EQUITY: &[Section] = &[Section::NonCurrentLiabilities, Section::StockholdersEquity];
const PER_SHARE: &[Section] = &[Section::PerShareItems];
const OPERATING: &[Section] = &[Section::OperatingActivities];
const INVESTING: &[Section] = &[Section::InvestingActivities];
const FINANCING: &[Section] = &[Section::FinancingActivities];
const SUPPLEMENTAL: &[Section] = &[Section::Supplemental];

pub const BALANCE_SHEET: &[FieldRule] = &[
    // current assets
    rule(
        "cash_cash_equivalent_and_restricted_cash",
        CA,
        "[contains 'cash' and contains 'restricted'] not [equals to 'restricted cash']",
    ),
    rule("cash_and_short_term_investments", CA, "[contains 'cash and short term']"),
    rule(
        "cash_and_cash_equivalents",
        CA,
        "[contains 'cash'] not [equals to 'restricted cash' or 'total cash cash equivalents and marketable securities' or 'total cash cash equivalents and short term investments']",
    ),
    rule(
        "short_term_investments",
        CA,
        "[contains 'investment' or (contains 'marketable' and contains 'securities')] not [contains 'total cash']",
    ),
    rule(
        "other_receivables",
        CA,
        "[contains 'other receivable' or 'other account receivable' or 'other accounts receivable']",
    ),
    rule(
        "account_receivables_net",
        CA,
        "[(contains 'trade' or 'account' or 'note') and contains 'receivable'] or [contains 'receivables net'] not [contains 'other' or 'tax']",
    ),
    rule(
        "inventory",
        CA,
        "[contains 'inventory' or 'inventories' or 'materials and supplies']",
    ),
    rule("prepaids", CA, "[contains 'prepaid' or 'prepayment']"),
    // non-current assets
    rule(
        "property_plant_equipment_net",
        NCA,
        "[contains 'property' or 'plant' or 'equipment' or 'fixed assets'] and [contains 'net' or 'less'] not [contains 'gross' or 'cost']",
    ),
    rule(
        "goodwill_and_intangible_assets",
        NCA,
        "[contains 'goodwill' and contains 'intangible']",
    ),
    rule("goodwill", NCA, "[goodwill]"),
    rule("intangible_assets", NCA, "[intangible]"),
    rule(
        "finance_lease_right_of_use_assets",
        NCA,
        "[contains 'finance' or 'capital'] and [contains 'lease' or 'right of use']",
    ),
    rule(
        "operating_lease_right_of_use_assets",
        NCA,
        "[contains 'operating' or 'operation'] and [contains 'lease' or 'right of use']",
    ),
    rule("lease_assets", NCA, "[contains 'lease' or 'right of use']"),
    rule(
        "long_term_investments",
        NCA,
        "[contains 'investment' or 'marketable securities']",
    ),
    rule("deferred_tax_assets", NCA, "[contains 'deferred' and contains 'tax']"),
    // equity
    rule(
        "common_stock",
        EQUITY,
        "[not datatype = shares] and [[contains 'common stock' or 'common share'] and [contains 'cost' or 'par' or 'issued'] not [contains 'treasury' or 'purchase' or 'additional' or 'paid in'] or equals to 'common stock' or 'common stocks' or 'common shares' or 'common share']",
    ),
    rule(
        "preferred_stock",
        EQUITY,
        "[contains 'preferred stock' or 'preferred share'] not [contains 'additional' or 'paid in']",
    ),
    rule(
        "additional_paid_in_capital",
        EQUITY,
        "[contains 'additional' or 'paid in' or 'excess' or 'surplus'] and [contains 'capital' or 'proceeds' or 'fund' or 'amount']",
    ),
    rule(
        "accumulated_other_comprehensive_income_loss",
        EQUITY,
        "[contains 'accumulated' and contains 'other' and contains 'comprehensive']",
    ),
    rule(
        "retained_earnings",
        EQUITY,
        "[contains 'accumulated' or 'retained' or 'employed' or 'reinvest'] and [contains 'earning' or 'deficit' or 'profit']",
    ),
    rule(
        "treasury_stock",
        EQUITY,
        "[(contains 'treasury' or 'purchase') and (contains 'stock' or 'share')] or [contains 'esop']",
    ),
    rule(
        "redeemable_non_controlling_interests",
        ANY,
        "[contains 'redeemable'] and [contains 'noncontrolling' or 'non controlling']",
    ),
    rule(
        "minority_interest",
        EQUITY,
        "[contains 'noncontrolling' or 'non controlling' or 'minority interest']",
    ),
    rule(
        "total_equity",
        EQUITY,
        "[equals to 'total equity' or 'equity total' or 'total deficit' or 'total equity deficit']",
    ),
    rule(
        "total_stockholders_equity",
        EQUITY,
        "[contains 'stockholder' or 'shareholder' or 'owner'] and [contains 'equity' or 'deficit'] not [contains 'liabilit']",
    ),
    rule(
        "commitments_and_contingencies",
        NCL_OR_EQUITY,
        "[contains 'commitments' or 'contingencies']",
    ),
    // current liabilities
    rule(
        "account_payables",
        CL,
        "[contains 'account' or 'trade'] and [contains 'payable']",
    ),
    rule(
        "accrued_payroll",
        CL,
        "[contains 'employ' or 'compensation' or 'wages' or 'salaries' or 'payroll']",
    ),
    rule("accrued_expenses", CL, "[contains 'accrued'] not [contains 'tax']"),
    rule(
        "deferred_revenue",
        CL,
        "[contains 'unearned' or 'unexpired' or 'advance'] or [contains 'deferred' and (contains 'income' or 'revenue')]",
    ),
    rule(
        "short_term_debt",
        CL,
        "[contains 'borrowing' or 'debt' or 'notes' or 'loan' or 'commercial paper'] not [contains 'long term' or 'lease'] or [contains 'current maturities' or 'current portion' or 'current installment' or ((contains 'one year' or 'long term') and contains 'within')] not [contains 'lease']",
    ),
    rule(
        "dividends_payable",
        CL,
        "[contains 'dividend'] and [contains 'payable' or 'liability']",
    ),
    rule(
        "tax_payables",
        CL,
        "[contains 'payable' or 'accrued' or 'liabilit' or 'obligation'] and [contains 'tax'] not [contains 'deferred']",
    ),
    rule(
        "finance_lease_obligations_current",
        CL,
        "[contains 'finance' or 'capital'] and [contains 'lease' or 'right of use']",
    ),
    rule(
        "operating_lease_obligations_current",
        CL,
        "[contains 'operati'] and [contains 'lease']",
    ),
    rule("lease_obligation_current", CL, "[contains 'lease' or 'right of use']"),
    // non-current liabilities
    rule(
        "long_term_debt",
        NCL,
        "[contains 'note payable' or 'notes payable' or 'borrowing' or 'debt' or 'long term obligation'] not [contains 'lease']",
    ),
    rule(
        "pension_and_postretirement_benefits",
        NCL,
        "[contains 'pension' or 'retirement' or 'employ'] and [contains 'liabilit' or 'obligation' or 'benefit']",
    ),
    rule(
        "deferred_revenue_non_current",
        NCL,
        "[contains 'deferred revenue' or 'unearned']",
    ),
    rule(
        "deferred_tax_liabilities_non_current",
        NCL,
        "[contains 'deferred' and contains 'tax']",
    ),
    rule(
        "tax_payables_non_current",
        NCL,
        "[contains 'payable' or 'accrued' or 'liabilit' or 'obligation'] and [contains 'tax']",
    ),
    rule(
        "finance_lease_obligations_non_current",
        NCL,
        "[contains 'finance' or 'capital'] and [contains 'lease']",
    ),
    rule(
        "operating_lease_obligations_non_current",
        NCL,
        "[contains 'operating'] and [contains 'lease']",
    ),
    rule("lease_obligation_non_current", NCL, "[contains 'lease' or 'right of use']"),
];

pub const INCOME_STATEMENT: &[FieldRule] = &[
    rule(
        "cost_of_revenue",
        ANY,
        "[contains 'cost' and (contains 'revenue' or 'sales' or 'sold' or 'sale')] or [contains 'cogs']",
    ),
    rule(
        "revenue",
        ANY,
        "[contains 'revenue' or 'sales'] not [contains 'marketing' or 'admini' or 'general' or 'cost' or 'deferred' or 'unearned']",
    ),
    rule(
        "gross_profit",
        ANY,
        "[contains 'gross profit' or 'gross margin' or 'gross income']",
    ),
    rule(
        "cost_and_expenses",
        ANY,
        "[contains 'total costs and expenses' or 'total cost and expenses' or 'total operating costs']",
    ),
    rule(
        "research_and_development_expenses",
        ANY,
        "[contains 'research' or 'development' or 'r and d' or 'technology']",
    ),
    rule(
        "selling_general_and_administrative_expenses",
        ANY,
        "[contains 'sales' or 'marketing' or 'selling' or 'advertising' or 'promotion'] and [contains 'administrative']",
    ),
    rule(
        "sales_and_marketing_expenses",
        ANY,
        "[contains 'marketing' or 'selling' or 'advertising' or 'promotion']",
    ),
    rule(
        "general_and_administrative_expenses",
        ANY,
        "[contains 'general' and contains 'administrative']",
    ),
    rule(
        "depreciation_and_amortization",
        ANY,
        "[contains 'depreciation' or 'amortization']",
    ),
    rule(
        "operating_expenses",
        ANY,
        "[contains 'total operating expenses' or 'total expenses']",
    ),
    rule(
        "other_expenses",
        ANY,
        "[contains 'other' and (contains 'expense' or 'income')] and [position_before # operating_income]",
    ),
    rule("net_interest_income", ANY, "[contains 'net interest income']"),
    rule(
        "interest_expense",
        ANY,
        "[contains 'interest'] and [contains 'expense']",
    ),
    rule(
        "interest_income",
        ANY,
        "[contains 'interest' and contains 'income']",
    ),
    rule(
        "income_before_tax",
        ANY,
        "[contains 'pretax' or 'pre tax'] or [contains 'before' and contains 'tax']",
    ),
    rule(
        "income_tax_expense",
        ANY,
        "[contains 'tax'] and [contains 'provision' or 'benefit' or 'expense'] not [contains 'before']",
    ),
    rule(
        "net_income_from_discontinued_operations",
        ANY,
        "[contains 'discontinued']",
    ),
    rule(
        "net_income_from_continuing_operations",
        ANY,
        "[contains 'net income' or 'net loss' or 'net earnings' or 'income from continuing'] and [contains 'continuing']",
    ),
    rule(
        "total_other_income_expenses_net",
        ANY,
        "[contains 'other'] and [contains 'income' or 'gain' or 'loss' or 'expense']",
    ),
    rule(
        "non_operating_income",
        ANY,
        "[contains 'non operating' or 'nonoperating'] and [contains 'income' or 'loss' or 'earnings' or 'expense']",
    ),
    rule(
        "net_income_attributed_to_non_controlling_interests",
        ANY,
        "[contains 'net income' or 'net loss' or 'net earnings' or 'net profit'] and [contains 'noncontrolling' or 'non controlling' or 'minority']",
    ),
    rule(
        "net_income_attributable_to_controlling_interests",
        ANY,
        "[contains 'net income' or 'net loss' or 'net earnings' or 'net profit'] and [contains 'attributable to']",
    ),
    rule(
        "net_income",
        ANY,
        "[contains 'net income' or 'net loss' or 'net earnings' or 'net profit'] not [contains 'other' or 'continuing' or 'operating' or 'operation' or 'per share']",
    ),
    rule(
        "operating_income",
        ANY,
        "[contains 'operating' or 'operation'] and [contains 'income' or 'loss' or 'profit' or 'earnings'] not [contains 'before' or 'per share']",
    ),
    rule(
        "eps_diluted",
        PER_SHARE,
        "[datatype = perShare and contains 'diluted']",
    ),
    rule("eps", PER_SHARE, "[datatype = perShare] not [contains 'dividend']"),
    rule(
        "weighted_average_shares_outstanding_diluted",
        PER_SHARE,
        "[datatype = shares and contains 'diluted'] or [contains 'weighted average' and contains 'diluted']",
    ),
    rule(
        "weighted_average_shares_outstanding",
        PER_SHARE,
        "[datatype = shares] or [contains 'weighted average' and contains 'shares']",
    ),
];

pub const CASH_FLOW: &[FieldRule] = &[
    // tax and interest payments may sit anywhere, usually in a supplemental block
    rule(
        "income_taxes_paid",
        ANY,
        "[contains 'income tax'] and [contains 'payment' or 'paid']",
    ),
    rule(
        "interest_paid",
        ANY,
        "[contains 'interest'] and [contains 'payment' or 'paid']",
    ),
    // operating activities
    rule(
        "depreciation_and_amortization",
        OPERATING,
        "[contains 'depreciation' and contains 'amortization']",
    ),
    rule("depreciation", OPERATING, "[depreciation]"),
    rule("amortization", OPERATING, "[amortization]"),
    rule("impairments", OPERATING, "[impairment]"),
    rule(
        "pension_and_postretirement",
        OPERATING,
        "[contains 'pension' or 'postretirement']",
    ),
    rule(
        "stock_based_compensation",
        OPERATING,
        "[contains 'stock based' or 'share based' or 'equity based'] and [contains 'compensation']",
    ),
    rule(
        "non_operating_expense_income",
        OPERATING,
        "[contains 'non operating' or 'nonoperating'] and [contains 'expense' or 'income'] or [contains 'non cash' and contains 'expense']",
    ),
    rule(
        "investment_gains_losses",
        OPERATING,
        "[contains 'gain' or 'loss'] and [contains 'investment']",
    ),
    rule(
        "deferred_income_tax",
        OPERATING,
        "[contains 'deferred' and contains 'tax']",
    ),
    rule("other_adjustments", OPERATING, "[equals to 'other' or 'other net']"),
    rule(
        "change_in_other_working_capital",
        OPERATING,
        "[contains 'other working capital']",
    ),
    rule(
        "vendor_receivables",
        OPERATING,
        "[contains 'vendor' and contains 'receivable']",
    ),
    rule(
        "accounts_receivables",
        OPERATING,
        "[contains 'account' or 'trade'] and [contains 'receivable']",
    ),
    rule("inventory", OPERATING, "[contains 'inventory' or 'inventories']"),
    rule("prepaids", OPERATING, "[contains 'prepaid' or 'prepayment']"),
    rule(
        "accounts_payables",
        OPERATING,
        "[contains 'account' or 'trade'] and [contains 'payable']",
    ),
    rule(
        "income_taxes_payable",
        OPERATING,
        "[contains 'income taxes' or 'income tax'] and [contains 'payable']",
    ),
    rule("accrued_expenses", OPERATING, "[accrued]"),
    rule(
        "unearned_revenue",
        OPERATING,
        "[contains 'unearned' or 'deferred revenue']",
    ),
    rule(
        "income_taxes",
        OPERATING,
        "[contains 'income tax'] not [contains 'payable' or 'deferred' or 'paid']",
    ),
    rule("other_assets", OPERATING, "[contains 'other' and contains 'assets']"),
    rule(
        "other_liabilities",
        OPERATING,
        "[contains 'other' and contains 'liabilities']",
    ),
    // investing activities
    rule(
        "investments_in_property_plant_and_equipment",
        INVESTING,
        "[contains 'expenditure' or 'purchase' or 'acquisition' or 'addition' or 'payments for'] and [contains 'property' or 'plant' or 'equipment' or 'capital' or 'fixed assets']",
    ),
    rule(
        "proceeds_from_sales_of_ppe",
        INVESTING,
        "[contains 'proceeds' or 'sale' or 'disposition'] and [contains 'property' or 'plant' or 'equipment' or 'fixed assets']",
    ),
    rule(
        "acquisitions_of_business_net",
        INVESTING,
        "[contains 'business'] and [contains 'acquisition' or 'acquired']",
    ),
    rule(
        "proceeds_from_divestiture",
        INVESTING,
        "[contains 'divestiture'] or [contains 'business' and (contains 'sale' or 'disposition')]",
    ),
    rule(
        "other_acquisitions_and_investments",
        INVESTING,
        "[contains 'other'] and [contains 'acquisition' or 'investments']",
    ),
    rule(
        "purchases_of_investments",
        INVESTING,
        "[contains 'purchase' or 'acquisition'] and [contains 'investment' or 'securities']",
    ),
    rule(
        "sales_maturities_of_investments",
        INVESTING,
        "[contains 'sale' or 'maturit' or 'proceeds'] and [contains 'investment' or 'securities']",
    ),
    // financing activities
    rule("issuance_costs", FINANCING, "[contains 'issuance costs']"),
    rule(
        "short_term_debt_issuance",
        FINANCING,
        "[contains 'short term'] and [contains 'issuance' or 'proceeds']",
    ),
    rule(
        "short_term_debt_repayment",
        FINANCING,
        "[contains 'short term'] and [contains 'repayment']",
    ),
    rule(
        "change_in_short_term_debt_net",
        FINANCING,
        "[contains 'short term'] and [contains 'change' or 'net']",
    ),
    rule("commercial_paper_net", FINANCING, "[contains 'commercial paper']"),
    rule(
        "long_term_net_debt_issuance",
        FINANCING,
        "[contains 'long term'] and [contains 'issuance' or 'proceeds']",
    ),
    rule(
        "long_term_net_debt_repayment",
        FINANCING,
        "[contains 'long term'] and [contains 'repayment']",
    ),
    rule(
        "change_in_long_term_debt_net",
        FINANCING,
        "[contains 'long term'] and [contains 'change']",
    ),
    rule(
        "finance_lease_repayment",
        FINANCING,
        "[contains 'finance lease' or 'capital lease'] and [contains 'repayment' or 'principal' or 'payment']",
    ),
    rule(
        "financing_obligations_repayment",
        FINANCING,
        "[contains 'financing obligation'] and [contains 'repayment' or 'principal' or 'payment']",
    ),
    rule(
        "term_debt_issuance",
        FINANCING,
        "[contains 'debt' or 'borrowing'] and [contains 'issuance' or 'proceeds']",
    ),
    rule(
        "term_debt_repayment",
        FINANCING,
        "[contains 'debt' or 'borrowing'] and [contains 'repayment']",
    ),
    rule(
        "change_in_term_debt",
        FINANCING,
        "[contains 'debt'] and [contains 'change']",
    ),
    rule(
        "taxes_on_share_settlement",
        FINANCING,
        "[contains 'tax'] and [contains 'share' or 'stock'] and [contains 'settlement' or 'vesting' or 'withh']",
    ),
    rule("net_stock_issuance", FINANCING, "[contains 'net stock issuance']"),
    rule(
        "proceeds_from_issuance_of_treasury_stock",
        FINANCING,
        "[contains 'treasury'] and [contains 'issuance' or 'proceeds' or 'reissu']",
    ),
    rule(
        "common_stock_repurchased",
        FINANCING,
        "[contains 'treasury' or 'share' or 'stock'] and [contains 'purchase' or 'buyback']",
    ),
    rule(
        "net_preferred_stock_issuance",
        FINANCING,
        "[contains 'preferred'] and [contains 'issuance' or 'proceeds'] and [contains 'net']",
    ),
    rule(
        "preferred_stock_issuance",
        FINANCING,
        "[contains 'preferred'] and [contains 'issuance' or 'proceeds']",
    ),
    rule(
        "net_common_stock_issuance",
        FINANCING,
        "[contains 'common stock'] and [contains 'issuance' or 'proceeds'] and [contains 'net']",
    ),
    rule(
        "common_stock_issuance",
        FINANCING,
        "[contains 'common stock' or 'shares' or 'stock'] and [contains 'issuance' or 'issued' or 'proceeds']",
    ),
    rule(
        "common_dividends_paid",
        FINANCING,
        "[contains 'dividend' and contains 'common'] not [contains 'preferred']",
    ),
    rule(
        "preferred_dividends_paid",
        FINANCING,
        "[contains 'dividend' and contains 'preferred'] not [contains 'common']",
    ),
    rule("dividends_paid", FINANCING, "[dividend]"),
    // reconciliation
    rule(
        "effect_of_foreign_exchange_rate_changes_on_cash",
        ANY,
        "[contains 'exchange rate' or 'foreign currency' or 'foreign currencies']",
    ),
    rule(
        "net_change_in_cash",
        SUPPLEMENTAL,
        "[contains 'change' or 'increase' or 'decrease'] and [contains 'cash']",
    ),
];

pub const COMPREHENSIVE_INCOME: &[FieldRule] = &[
    rule(
        "total_other_comprehensive_income",
        ANY,
        "[contains 'other comprehensive'] and [contains 'total' or 'net of tax' or 'net of taxes'] not [contains 'noncontrolling' or 'non controlling']",
    ),
    rule(
        "comprehensive_income_attributable_to_non_controlling_interests",
        ANY,
        "[contains 'comprehensive'] and [contains 'noncontrolling' or 'non controlling']",
    ),
    rule(
        "foreign_currency_translation_adjustment",
        ANY,
        "[contains 'foreign currency' or 'translation']",
    ),
    rule(
        "unrealized_gains_losses_on_securities",
        ANY,
        "[contains 'unrealized'] and [contains 'securities' or 'investments']",
    ),
    rule("cash_flow_hedges", ANY, "[contains 'hedg' or 'derivative']"),
    rule(
        "pension_adjustments",
        ANY,
        "[contains 'pension' or 'postretirement' or 'benefit plan']",
    ),
    rule(
        "other_comprehensive_income_tax",
        ANY,
        "[contains 'tax'] and [contains 'effect' or 'benefit' or 'expense' or 'provision']",
    ),
    rule(
        "comprehensive_income",
        ANY,
        "[contains 'comprehensive income' or 'comprehensive loss'] not [contains 'other']",
    ),
    rule(
        "net_income",
        ANY,
        "[contains 'net income' or 'net loss' or 'net earnings'] not [contains 'comprehensive']",
    ),
];

pub const EQUITY_STATEMENT: &[FieldRule] = &[
    rule(
        "other_comprehensive_income",
        ANY,
        "[contains 'other comprehensive']",
    ),
    rule(
        "net_income",
        ANY,
        "[contains 'net income' or 'net loss' or 'net earnings']",
    ),
    rule("dividends_declared", ANY, "[dividend]"),
    rule(
        "stock_based_compensation",
        ANY,
        "[contains 'stock based' or 'share based' or 'equity based'] and [contains 'compensation']",
    ),
    rule(
        "common_stock_repurchased",
        ANY,
        "[contains 'repurchase' or 'buyback' or 'treasury']",
    ),
    rule(
        "common_stock_issuance",
        ANY,
        "[contains 'issuance' or 'issued' or 'exercise']",
    ),
];

pub fn general_rules(statement: StatementType) -> &'static [FieldRule] {
    match statement {
        StatementType::BalanceSheet => BALANCE_SHEET,
        StatementType::IncomeStatement => INCOME_STATEMENT,
        StatementType::CashFlow => CASH_FLOW,
        StatementType::ComprehensiveIncome => COMPREHENSIVE_INCOME,
        StatementType::Equity => EQUITY_STATEMENT,
    }
}

/// Classification by tag identity, consulted before any label rule.
pub fn tag_hint(statement: StatementType, tag: &str, negating: bool) -> Option<&'static str> {
    if statement != StatementType::BalanceSheet {
        return None;
    }
    let lower = tag.to_ascii_lowercase();
    // a negated common stock line is the treasury deduction
    if negating && (lower.starts_with("commonstock") || lower.starts_with("commonshare")) {
        return Some("treasury_stock");
    }
    if lower == "stockholdersequityincludingportionattributabletononcontrollinginterest" {
        return Some("total_equity");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_of_accounts::ChartOfAccounts;
    use crate::pattern::{EvalContext, Pattern};
    use std::collections::BTreeMap;

    fn first_match(statement: StatementType, section: Section, label: &str) -> Option<&'static str> {
        first_match_with(statement, section, label, &EvalContext::default())
    }

    fn first_match_with(
        statement: StatementType,
        section: Section,
        label: &str,
        ctx: &EvalContext,
    ) -> Option<&'static str> {
        general_rules(statement)
            .iter()
            .filter(|r| r.applies_to(section))
            .find(|r| Pattern::parse(r.pattern).unwrap().evaluate(label, ctx).matched)
            .map(|r| r.field)
    }

    #[test]
    fn test_every_rule_parses_and_names_a_cataloged_field() {
        for statement in StatementType::ALL {
            let chart = ChartOfAccounts::for_statement(statement);
            for rule in general_rules(statement) {
                assert!(Pattern::parse(rule.pattern).is_ok(), "{}", rule.pattern);
                assert!(chart.contains(rule.field), "{} not in {}", rule.field, statement);
                for section in rule.sections {
                    assert!(Section::for_statement(statement).contains(section));
                }
            }
        }
    }

    #[test]
    fn test_current_asset_rules() {
        let bs = StatementType::BalanceSheet;
        assert_eq!(
            first_match(bs, Section::CurrentAssets, "Cash and cash equivalents"),
            Some("cash_and_cash_equivalents")
        );
        assert_eq!(
            first_match(bs, Section::CurrentAssets, "Cash, cash equivalents and restricted cash"),
            Some("cash_cash_equivalent_and_restricted_cash")
        );
        assert_eq!(
            first_match(bs, Section::CurrentAssets, "Accounts receivable, net"),
            Some("account_receivables_net")
        );
        assert_eq!(
            first_match(bs, Section::CurrentAssets, "Other accounts receivable"),
            Some("other_receivables")
        );
        assert_eq!(
            first_match(bs, Section::CurrentAssets, "Marketable securities"),
            Some("short_term_investments")
        );
        assert_eq!(first_match(bs, Section::CurrentAssets, "Deferred costs"), None);
    }

    #[test]
    fn test_section_scoping() {
        let bs = StatementType::BalanceSheet;
        assert_eq!(
            first_match(bs, Section::NonCurrentAssets, "Marketable securities"),
            Some("long_term_investments")
        );
        assert_eq!(
            first_match(bs, Section::CurrentLiabilities, "Commercial paper"),
            Some("short_term_debt")
        );
        assert_eq!(
            first_match(bs, Section::CurrentLiabilities, "Term debt"),
            Some("short_term_debt")
        );
        assert_eq!(
            first_match(bs, Section::NonCurrentLiabilities, "Term debt"),
            Some("long_term_debt")
        );
        assert_eq!(
            first_match(bs, Section::CurrentLiabilities, "Current portion of long-term debt"),
            Some("short_term_debt")
        );
        assert_eq!(
            first_match(bs, Section::CurrentLiabilities, "Operating lease liabilities, current"),
            Some("operating_lease_obligations_current")
        );
    }

    #[test]
    fn test_equity_rules() {
        let bs = StatementType::BalanceSheet;
        let monetary = EvalContext::new().with_datatype(Some("monetary"));
        assert_eq!(
            first_match_with(
                bs,
                Section::StockholdersEquity,
                "Common stock, $0.01 par value",
                &monetary
            ),
            Some("common_stock")
        );
        assert_eq!(
            first_match(
                bs,
                Section::StockholdersEquity,
                "Common stock and additional paid-in capital"
            ),
            Some("additional_paid_in_capital")
        );
        assert_eq!(
            first_match(bs, Section::StockholdersEquity, "Accumulated deficit"),
            Some("retained_earnings")
        );
        assert_eq!(
            first_match(
                bs,
                Section::StockholdersEquity,
                "Accumulated other comprehensive loss"
            ),
            Some("accumulated_other_comprehensive_income_loss")
        );
        assert_eq!(
            first_match(bs, Section::StockholdersEquity, "Treasury stock, at cost"),
            Some("treasury_stock")
        );
        assert_eq!(
            first_match(bs, Section::StockholdersEquity, "Total equity"),
            Some("total_equity")
        );
    }

    #[test]
    fn test_income_statement_rules() {
        let is = StatementType::IncomeStatement;
        let op = Section::OperatingItems;
        assert_eq!(first_match(is, op, "Net sales"), Some("revenue"));
        assert_eq!(first_match(is, op, "Cost of sales"), Some("cost_of_revenue"));
        assert_eq!(first_match(is, op, "Gross margin"), Some("gross_profit"));
        assert_eq!(
            first_match(is, op, "Research and development"),
            Some("research_and_development_expenses")
        );
        assert_eq!(
            first_match(is, op, "Selling, general and administrative"),
            Some("selling_general_and_administrative_expenses")
        );
        assert_eq!(
            first_match(is, Section::NonOperatingItems, "Interest expense"),
            Some("interest_expense")
        );
        assert_eq!(
            first_match(is, Section::NonOperatingItems, "Income before provision for income taxes"),
            Some("income_before_tax")
        );
    }

    #[test]
    fn test_other_expenses_depend_on_operating_income_position() {
        let is = StatementType::IncomeStatement;
        let mut targets = BTreeMap::new();
        targets.insert("operating_income".to_string(), 10);

        let before = EvalContext::new().with_line(6).with_targets(&targets);
        assert_eq!(
            first_match_with(is, Section::OperatingItems, "Other operating expense", &before),
            Some("other_expenses")
        );

        let after = EvalContext::new().with_line(12).with_targets(&targets);
        assert_eq!(
            first_match_with(is, Section::NonOperatingItems, "Other income (expense), net", &after),
            Some("total_other_income_expenses_net")
        );
    }

    #[test]
    fn test_per_share_rules_use_datatype() {
        let is = StatementType::IncomeStatement;
        let per_share = EvalContext::new().with_datatype(Some("perShare"));
        let shares = EvalContext::new().with_datatype(Some("shares"));
        assert_eq!(
            first_match_with(is, Section::PerShareItems, "Diluted", &per_share),
            Some("eps_diluted")
        );
        assert_eq!(
            first_match_with(is, Section::PerShareItems, "Diluted", &shares),
            Some("weighted_average_shares_outstanding_diluted")
        );
        assert_eq!(
            first_match_with(is, Section::PerShareItems, "Basic", &shares),
            Some("weighted_average_shares_outstanding")
        );
    }

    #[test]
    fn test_cash_flow_rules() {
        let cf = StatementType::CashFlow;
        assert_eq!(
            first_match(cf, Section::OperatingActivities, "Depreciation and amortization"),
            Some("depreciation_and_amortization")
        );
        assert_eq!(
            first_match(cf, Section::OperatingActivities, "Share-based compensation expense"),
            Some("stock_based_compensation")
        );
        assert_eq!(
            first_match(cf, Section::InvestingActivities, "Payments for acquisition of property, plant and equipment"),
            Some("investments_in_property_plant_and_equipment")
        );
        assert_eq!(
            first_match(cf, Section::FinancingActivities, "Repurchases of common stock"),
            Some("common_stock_repurchased")
        );
        assert_eq!(
            first_match(cf, Section::FinancingActivities, "Payments for dividends and dividend equivalents"),
            Some("dividends_paid")
        );
        assert_eq!(
            first_match(cf, Section::FinancingActivities, "Payments for taxes related to net share settlement of equity awards"),
            Some("taxes_on_share_settlement")
        );
        assert_eq!(
            first_match(cf, Section::Supplemental, "Cash paid for income taxes, net"),
            Some("income_taxes_paid")
        );
    }

    #[test]
    fn test_tag_hints() {
        assert_eq!(
            tag_hint(StatementType::BalanceSheet, "CommonStockValue", true),
            Some("treasury_stock")
        );
        assert_eq!(tag_hint(StatementType::BalanceSheet, "CommonStockValue", false), None);
        assert_eq!(
            tag_hint(
                StatementType::BalanceSheet,
                "StockholdersEquityIncludingPortionAttributableToNoncontrollingInterest",
                false
            ),
            Some("total_equity")
        );
        assert_eq!(tag_hint(StatementType::CashFlow, "CommonStockValue", true), None);
    }
}
